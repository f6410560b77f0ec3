mod capture;
mod ocr;

pub use capture::{MonitorBounds, ScreenCapture, crop_to_region};
pub use ocr::{TesseractEngine, parse_tsv};
