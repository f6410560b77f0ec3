pub mod error;
pub mod locate;
pub mod preprocess;
pub mod source;
pub mod template;

/// Captured screen pixels, consumed by one detection pass
pub type Bitmap = image::RgbaImage;

pub use error::{CaptureError, OcrEngineError, TemplateLoadError};
pub use locate::{TextLocator, find_word};
pub use source::{OcrEngine, ScreenSource};
pub use template::{MatchResult, TemplateMatcher};
