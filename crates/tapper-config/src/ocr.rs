use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tapper_types::{Polarity, TieBreak};

fn default_engine_path() -> PathBuf {
    PathBuf::from("tesseract")
}

fn default_language() -> String {
    "eng".to_string()
}

/// Tesseract `--psm 7`: treat the image as a single text line
fn default_page_seg_mode() -> u8 {
    7
}

fn default_engine_mode() -> u8 {
    3
}

fn default_timeout_ms() -> u64 {
    15_000
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct OcrConfig {
    /// Path to the tesseract binary, bare names are looked up on PATH
    #[serde(default = "default_engine_path")]
    pub engine_path: PathBuf,
    /// Passed to the engine as TESSDATA_PREFIX
    pub tessdata_dir: Option<PathBuf>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_page_seg_mode")]
    pub page_seg_mode: u8,
    #[serde(default = "default_engine_mode")]
    pub engine_mode: u8,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    pub polarity: Polarity,
    pub tie_break: TieBreak,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            tessdata_dir: None,
            language: default_language(),
            page_seg_mode: default_page_seg_mode(),
            engine_mode: default_engine_mode(),
            timeout_ms: default_timeout_ms(),
            polarity: Polarity::default(),
            tie_break: TieBreak::default(),
        }
    }
}
