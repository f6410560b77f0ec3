use image::GrayImage;
use tapper_types::{Region, Word};

use crate::Bitmap;
use crate::error::{CaptureError, OcrEngineError};

/// Screen pixel provider
pub trait ScreenSource: Send + Sync {
    /// Grab the screen as it is right now, cropped to `region` when given,
    /// otherwise the whole primary display.
    fn capture(&self, region: Option<Region>) -> Result<Bitmap, CaptureError>;
}

/// Word-level text recognition
pub trait OcrEngine: Send + Sync {
    /// Check the engine can be run at all
    fn probe(&self) -> Result<(), OcrEngineError> {
        Ok(())
    }

    /// Recognize words in a binarized image, in the engine's own output order
    fn recognize(&self, image: &GrayImage) -> Result<Vec<Word>, OcrEngineError>;
}
