use std::path::PathBuf;
use std::time::Duration;

use tapper_types::Region;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("No monitor found")]
    NoMonitor,

    #[error("Region {region} does not fit on any monitor")]
    OutOfBounds { region: Region },

    #[error("Capture backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateLoadError {
    #[error("Failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode template {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Template {path} has no pixels")]
    Empty { path: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum OcrEngineError {
    #[error("OCR engine not available at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("OCR engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("OCR engine IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode image for OCR: {0}")]
    Encode(#[from] image::ImageError),
}

/// Engine messages that mean it can never succeed with the current setup
const SETUP_FAILURES: [&str; 4] = [
    "failed loading language",
    "error opening data file",
    "could not initialize tesseract",
    "please make sure the tessdata_prefix",
];

impl OcrEngineError {
    /// A missing or misconfigured engine ends the run, anything else only costs one pass
    pub fn is_fatal(&self) -> bool {
        match self {
            OcrEngineError::Unavailable { .. } => true,
            OcrEngineError::Failed { stderr, .. } => {
                let stderr = stderr.to_lowercase();
                SETUP_FAILURES.iter().any(|m| stderr.contains(m))
            }
            OcrEngineError::Timeout(_) | OcrEngineError::Io(_) | OcrEngineError::Encode(_) => false,
        }
    }
}
