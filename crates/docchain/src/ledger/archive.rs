use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::document_type::DocumentType;
use crate::error::StorageError;
use crate::sanitize::sanitize_folder_name;

/// Attempts at a free `name_N` variant before giving up.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Long-term copy of every saved document, laid out as
/// `<root>/<type folder>/<counterparty>/<timestamp>_<original name>`.
pub struct DocumentArchive {
    root: PathBuf,
}

impl DocumentArchive {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copies `source` into the archive and returns the new path. The source
    /// file is left untouched.
    pub fn store(
        &self,
        source: &Path,
        doc_type: DocumentType,
        counterparty: Option<&str>,
        original_filename: &str,
    ) -> Result<PathBuf, StorageError> {
        let dir = self
            .root
            .join(doc_type.storage_folder())
            .join(sanitize_folder_name(counterparty.unwrap_or("")));
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::CreateDirectory {
            path: dir.clone(),
            source: e,
        })?;

        let filename = format!(
            "{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            sanitize_folder_name(original_filename)
        );
        let (mut target, path) = create_unique(&dir, &filename)?;

        let copy_err = |e: std::io::Error| StorageError::CopyFile {
            from: source.to_path_buf(),
            to: path.clone(),
            source: e,
        };
        let result = File::open(source)
            .and_then(|mut src| std::io::copy(&mut src, &mut target))
            .map_err(copy_err);

        if let Err(e) = result {
            drop(target);
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }

        Ok(path)
    }

    /// Removes an archived copy. Used when the ledger transaction that was
    /// meant to reference it did not commit.
    pub fn discard(&self, path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            log::warn!("Failed to discard archived copy {}: {}", path.display(), e);
        }
    }
}

/// Creates `dir/filename`, or the first free `base_N.ext` variant, with
/// `create_new` so two workers never claim the same name.
fn create_unique(dir: &Path, filename: &str) -> Result<(File, PathBuf), StorageError> {
    let (base, ext) = match filename.rfind('.') {
        Some(dot) if dot > 0 => (&filename[..dot], Some(&filename[dot..])),
        _ => (filename, None),
    };

    for counter in 1..=MAX_NAME_ATTEMPTS {
        let candidate = if counter == 1 {
            filename.to_string()
        } else {
            match ext {
                Some(ext) => format!("{}_{}{}", base, counter, ext),
                None => format!("{}_{}", base, counter),
            }
        };
        let path = dir.join(&candidate);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(StorageError::CopyFile {
                    from: PathBuf::from(filename),
                    to: path,
                    source: e,
                })
            }
        }
    }

    Err(StorageError::FileExists(dir.join(filename)))
}
