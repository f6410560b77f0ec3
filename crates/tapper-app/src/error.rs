use tapper_config::ConfigError;
use tapper_core::{CaptureError, OcrEngineError, TemplateLoadError};
use tapper_input::ClickError;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Loop is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    TemplateLoad(#[from] TemplateLoadError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Ocr(#[from] OcrEngineError),

    #[error(transparent)]
    Click(#[from] ClickError),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl RunError {
    /// Fail-safe stops are intentional, not failures
    pub fn is_user_abort(&self) -> bool {
        matches!(self, RunError::Click(ClickError::AbortedByUser { .. }))
    }
}
