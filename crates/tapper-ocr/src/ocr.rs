use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use image::{GrayImage, ImageFormat};
use tapper_core::{OcrEngine, OcrEngineError};
use tapper_types::{BoundingBox, Word};
use wait_timeout::ChildExt;

/// TSV row level of a single word
const WORD_LEVEL: &str = "5";

/// Bytes of engine stderr kept in error reports
const STDERR_TAIL: usize = 2048;

/// Tesseract run as a subprocess, one invocation per image
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    pub binary: PathBuf,
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
    pub page_seg_mode: u8,
    pub engine_mode: u8,
    pub timeout: Duration,
}

impl TesseractEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            tessdata_dir: None,
            language: "eng".to_string(),
            page_seg_mode: 7,
            engine_mode: 3,
            timeout: Duration::from_secs(15),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(dir) = &self.tessdata_dir {
            cmd.env("TESSDATA_PREFIX", dir);
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    fn unavailable(&self, reason: impl ToString) -> OcrEngineError {
        OcrEngineError::Unavailable {
            path: self.binary.clone(),
            reason: reason.to_string(),
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn probe(&self) -> Result<(), OcrEngineError> {
        let status = self
            .command()
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| self.unavailable(e))?;

        if !status.success() {
            return Err(self.unavailable(format!("--version exited with {status}")));
        }
        tracing::info!("Using OCR engine {}", self.binary.display());
        Ok(())
    }

    fn recognize(&self, image: &GrayImage) -> Result<Vec<Word>, OcrEngineError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("capture.png");
        let output_base = dir.path().join("words");
        image.save_with_format(&input, ImageFormat::Png)?;

        // a file never fills up the way an unread pipe does
        let stderr_path = dir.path().join("stderr.txt");
        let stderr_file = File::create(&stderr_path)?;

        let mut child = self
            .command()
            .arg(&input)
            .arg(&output_base)
            .args(["-l", self.language.as_str()])
            .arg("--oem")
            .arg(self.engine_mode.to_string())
            .arg("--psm")
            .arg(self.page_seg_mode.to_string())
            .arg("tsv")
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file))
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => self.unavailable(e),
                _ => OcrEngineError::Io(e),
            })?;

        let Some(status) = child.wait_timeout(self.timeout)? else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(OcrEngineError::Timeout(self.timeout));
        };

        if !status.success() {
            let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(OcrEngineError::Failed {
                status: status.to_string(),
                stderr: tail(stderr.trim(), STDERR_TAIL).to_string(),
            });
        }

        let tsv = fs::read_to_string(output_base.with_extension("tsv"))?;
        Ok(parse_tsv(&tsv))
    }
}

/// Last `max` bytes of `text`, cut on a char boundary
fn tail(text: &str, max: usize) -> &str {
    let mut start = text.len().saturating_sub(max);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Parse tesseract's TSV output into words, in output order.
///
/// Rows that are not words or cannot be parsed are skipped.
pub fn parse_tsv(tsv: &str) -> Vec<Word> {
    let mut words = Vec::new();

    for (line_no, line) in tsv.lines().enumerate() {
        if line.starts_with("level") || line.trim().is_empty() {
            continue;
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if cols.first() != Some(&WORD_LEVEL) {
            continue;
        }
        let text = cols.get(11).map(|t| t.trim()).unwrap_or_default();
        if text.is_empty() {
            continue;
        }

        match parse_word(&cols, text) {
            Some(word) => words.push(word),
            None => tracing::warn!("Skipping malformed OCR row {}: {line:?}", line_no + 1),
        }
    }

    words
}

fn parse_word(cols: &[&str], text: &str) -> Option<Word> {
    let num = |i: usize| cols.get(i)?.trim().parse::<u32>().ok();
    Some(Word {
        text: text.to_string(),
        bbox: BoundingBox {
            left: num(6)?,
            top: num(7)?,
            width: num(8)?,
            height: num(9)?,
        },
        confidence: cols.get(10)?.trim().parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t400\t40\t-1\t
2\t1\t1\t0\t0\t0\t12\t8\t300\t22\t-1\t
4\t1\t1\t1\t1\t0\t12\t8\t300\t22\t-1\t
5\t1\t1\t1\t1\t1\t12\t8\t80\t22\t91.5\tCancel
5\t1\t1\t1\t1\t2\t150\t9\t74\t21\t88.012\tSubmit
5\t1\t1\t1\t1\t3\t240\t9\t10\t21\t12\t
";

    #[test]
    fn test_parse_words_only() {
        let words = parse_tsv(SAMPLE);
        assert_eq!(words.len(), 2);

        assert_eq!(words[0].text, "Cancel");
        assert_eq!(
            words[1].bbox,
            BoundingBox {
                left: 150,
                top: 9,
                width: 74,
                height: 21
            }
        );
        assert!((words[1].confidence - 88.012).abs() < 1e-3);
    }

    #[test]
    fn test_parse_skips_malformed_rows() {
        let tsv = "5\t1\t1\t1\t1\t1\tx\t8\t80\t22\t91\tBroken\n5\t1\t1\t1\t1\t2\t1\t2\t3\t4\t50\tFine\n5\t1";
        let words = parse_tsv(tsv);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "Fine");
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("level\tpage_num\n").is_empty());
    }

    /// Executable shell script standing in for the engine binary
    #[cfg(unix)]
    fn fake_engine(dir: &std::path::Path, body: &str) -> TesseractEngine {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("tesseract");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let mut engine = TesseractEngine::new(path);
        engine.timeout = Duration::from_secs(10);
        engine
    }

    #[cfg(unix)]
    #[test]
    fn test_chatty_engine_does_not_stall() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            dir.path(),
            "i=0\nwhile [ $i -lt 4000 ]; do echo \"Warning: Invalid resolution 0 dpi. Using 70 instead.\" >&2; i=$((i+1)); done\nexit 1",
        );

        let started = std::time::Instant::now();
        let result = engine.recognize(&GrayImage::new(8, 8));
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());

        match result {
            Err(OcrEngineError::Failed { stderr, .. }) => {
                assert!(stderr.len() <= STDERR_TAIL);
                assert!(stderr.ends_with("Using 70 instead."));
            }
            other => panic!("expected a failed run, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_language_data_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let engine = fake_engine(
            dir.path(),
            "echo \"Failed loading language 'xyz'\" >&2\nexit 1",
        );

        let error = engine.recognize(&GrayImage::new(8, 8)).unwrap_err();
        assert!(matches!(error, OcrEngineError::Failed { .. }));
        assert!(error.is_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_engine_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = fake_engine(dir.path(), "sleep 5");
        engine.timeout = Duration::from_millis(200);

        let error = engine.recognize(&GrayImage::new(8, 8)).unwrap_err();
        assert!(matches!(error, OcrEngineError::Timeout(_)));
        assert!(!error.is_fatal());
    }

    #[test]
    fn test_stderr_tail_respects_char_boundaries() {
        assert_eq!(tail("abc", 10), "abc");
        assert_eq!(tail("abcdef", 2), "ef");
        assert_eq!(tail("añb", 2), "b");
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let engine = TesseractEngine::new("/nonexistent/bin/tesseract-for-tapper-tests");
        assert!(matches!(engine.probe(), Err(OcrEngineError::Unavailable { .. })));

        let image = GrayImage::new(8, 8);
        assert!(matches!(
            engine.recognize(&image),
            Err(OcrEngineError::Unavailable { .. })
        ));
    }
}
