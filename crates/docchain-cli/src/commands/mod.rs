pub mod process;
pub mod report;

use std::path::Path;

use anyhow::Context;

use docchain::{load_config, Config, Database, SqliteLedger};

/// Reads the config file, or the defaults when none is given.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(Config::default()),
    }
}

pub fn open_ledger(config: &Config) -> anyhow::Result<SqliteLedger> {
    let db_path = config
        .resolved_database_path()
        .context("Cannot determine database path; set database_path in the config")?;
    let storage = config
        .resolved_storage_directory()
        .context("Cannot determine storage directory; set storage_directory in the config")?;

    let db = Database::open(&db_path)
        .with_context(|| format!("Failed to open ledger at {}", db_path.display()))?;
    Ok(SqliteLedger::new(db, storage, config.chains.overdue_after_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_without_path() {
        let config = load(None).unwrap();
        assert_eq!(config.worker_count, 3);
    }

    #[test]
    fn test_open_ledger_creates_database() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            database_path: Some(dir.path().join("data").join("ledger.db")),
            storage_directory: Some(dir.path().join("documents")),
            ..Config::default()
        };
        let ledger = open_ledger(&config).unwrap();
        assert_eq!(ledger.archive().root(), dir.path().join("documents"));
        assert!(dir.path().join("data").join("ledger.db").exists());
    }
}
