use tapper_types::{ClickTarget, Polarity, Region, TieBreak, Word};

use crate::Bitmap;
use crate::error::OcrEngineError;
use crate::preprocess::{Binarizer, Preprocessor};
use crate::source::OcrEngine;

/// Finds a word on screen by OCR
pub struct TextLocator {
    engine: Box<dyn OcrEngine>,
    binarizer: Binarizer,
    tie_break: TieBreak,
}

impl TextLocator {
    pub fn new(engine: Box<dyn OcrEngine>, polarity: Polarity, tie_break: TieBreak) -> Self {
        Self {
            engine,
            binarizer: Binarizer::new(polarity),
            tie_break,
        }
    }

    pub fn probe(&self) -> Result<(), OcrEngineError> {
        self.engine.probe()
    }

    /// Center of the first word containing `target`, in screen coordinates.
    ///
    /// `region` must be the region `screenshot` was captured from.
    pub fn locate(
        &self,
        screenshot: &Bitmap,
        target: &str,
        region: Option<Region>,
    ) -> Result<Option<ClickTarget>, OcrEngineError> {
        let binary = self.binarizer.prepare(screenshot);
        let words = self.engine.recognize(&binary)?;
        tracing::debug!("OCR returned {} words", words.len());

        Ok(find_word(&words, target, self.tie_break)
            .map(|word| ClickTarget::from_capture(word.bbox.center(), region, word.text.clone())))
    }
}

/// Case-insensitive substring search over recognized words
pub fn find_word<'a>(words: &'a [Word], target: &str, tie_break: TieBreak) -> Option<&'a Word> {
    let needle = target.to_lowercase();
    let mut hits = words
        .iter()
        .filter(|w| !w.text.trim().is_empty() && w.text.to_lowercase().contains(&needle));

    match tie_break {
        TieBreak::EngineOrder => hits.next(),
        // min_by_key keeps the first of equal keys, so engine order still breaks exact ties
        TieBreak::ReadingOrder => hits.min_by_key(|w| (w.bbox.top, w.bbox.left)),
    }
}
