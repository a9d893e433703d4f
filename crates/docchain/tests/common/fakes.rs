//! Test doubles for the pipeline's external seams.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use docchain::inference::{InferenceBackend, InferenceError};
use docchain::text::{FileTextExtractor, TextExtractor};

/// Reads files normally but holds every call until the gate is opened.
pub struct GatedTextExtractor {
    inner: FileTextExtractor,
    gate: Semaphore,
    entered: AtomicUsize,
}

impl GatedTextExtractor {
    pub fn new() -> Self {
        Self {
            inner: FileTextExtractor::new(),
            gate: Semaphore::new(0),
            entered: AtomicUsize::new(0),
        }
    }

    /// Calls currently or previously blocked at the gate.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        self.gate.add_permits(1024);
    }
}

#[async_trait]
impl TextExtractor for GatedTextExtractor {
    async fn extract_text(&self, path: &Path) -> String {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let _permit = self.gate.acquire().await.expect("gate closed");
        self.inner.extract_text(path).await
    }
}

/// Replays canned responses in order, then fails.
#[derive(Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, InferenceError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn infer(&self, prompt: &str) -> Result<String, InferenceError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(InferenceError::Connection("script exhausted".to_string())))
    }
}
