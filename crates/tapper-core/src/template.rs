use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError};
use tapper_types::Point;

use crate::Bitmap;
use crate::error::TemplateLoadError;

/// Per-pixel variance, summed over RGB, below which a patch counts as one flat colour
const FLAT_VARIANCE: f64 = 1.0;

/// Largest per-channel difference at which two flat colours still score above 0
const FLAT_TOLERANCE: f64 = 64.0;

/// Half-size levels stop once the template's short side would drop below this
const MIN_COARSE_SIDE: u32 = 8;

const MAX_LEVELS: usize = 3;

/// Positions carried from one pyramid level down to the next
const CANDIDATES: usize = 8;

/// Search radius around a candidate after moving down a level
const REFINE_RADIUS: u32 = 2;

/// Best template position in a screenshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Top-left corner of the matched window
    pub position: Point,
    /// Similarity in [0, 1]
    pub score: f32,
    pub width: u32,
    pub height: u32,
}

impl MatchResult {
    pub fn center(&self) -> Point {
        Point {
            x: self.position.x + self.width / 2,
            y: self.position.y + self.height / 2,
        }
    }

    pub fn passes(&self, confidence: f32) -> bool {
        self.score >= confidence
    }
}

/// Normalized cross-correlation against one reference image.
///
/// Scores are the correlation coefficient over the RGB channels, clamped to
/// [0, 1]. Flat templates have no variance to correlate, so they only match
/// flat windows of nearly the same colour.
///
/// Textured templates are searched coarse to fine: every window of a
/// downscaled screenshot, then the strongest candidates again at each finer
/// level until full resolution.
pub struct TemplateMatcher {
    name: String,
    /// Full-size pattern, then one per half-size level
    levels: Vec<Pattern>,
}

impl TemplateMatcher {
    pub fn load(path: &Path) -> Result<Self, TemplateLoadError> {
        let image = image::open(path).map_err(|source| match source {
            ImageError::IoError(source) => TemplateLoadError::Io {
                path: path.to_path_buf(),
                source,
            },
            source => TemplateLoadError::Decode {
                path: path.to_path_buf(),
                source,
            },
        })?;

        if image.width() == 0 || image.height() == 0 {
            return Err(TemplateLoadError::Empty {
                path: path.to_path_buf(),
            });
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::info!("Loaded template {name} ({}x{})", image.width(), image.height());
        Ok(Self::from_image(name, &image))
    }

    pub fn from_image(name: impl Into<String>, image: &DynamicImage) -> Self {
        let mut current = image.to_rgba8();
        let mut levels = vec![Pattern::new(&current)];

        if !levels[0].flat {
            while levels.len() <= MAX_LEVELS {
                let (width, height) = (current.width() / 2, current.height() / 2);
                if width.min(height) < MIN_COARSE_SIDE {
                    break;
                }
                current = imageops::resize(&current, width, height, FilterType::Triangle);
                let pattern = Pattern::new(&current);
                if pattern.flat {
                    break;
                }
                levels.push(pattern);
            }
        }

        Self {
            name: name.into(),
            levels,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.levels[0].width, self.levels[0].height)
    }

    /// Find the single best window of the screenshot.
    ///
    /// Ties go to the first window in row-major order. A template larger than
    /// the screenshot scores 0 at the origin.
    pub fn find(&self, screenshot: &Bitmap) -> MatchResult {
        let base = &self.levels[0];
        let mut best = MatchResult {
            position: Point::default(),
            score: 0.0,
            width: base.width,
            height: base.height,
        };
        if base.width == 0 || base.height == 0 || !base.fits(screenshot.width(), screenshot.height()) {
            return best;
        }

        // screenshot pyramid, cut short where the pattern stops fitting
        let mut screens: Vec<Bitmap> = Vec::new();
        for pattern in &self.levels[1..] {
            let previous = screens.last().unwrap_or(screenshot);
            let (width, height) = (previous.width() / 2, previous.height() / 2);
            if !pattern.fits(width, height) {
                break;
            }
            let next = imageops::resize(previous, width, height, FilterType::Triangle);
            screens.push(next);
        }

        let found = if screens.is_empty() {
            base.best_window(screenshot)
        } else {
            self.coarse_to_fine(screenshot, &screens)
        };

        if let Some(found) = found {
            best.position = Point::new(found.x, found.y);
            best.score = found.score as f32;
        }

        tracing::debug!(
            "Template {} best score {:.4} at {} ({} levels)",
            self.name,
            best.score,
            best.position,
            screens.len() + 1
        );
        best
    }

    fn coarse_to_fine(&self, screenshot: &Bitmap, screens: &[Bitmap]) -> Option<Candidate> {
        let top = screens.len();
        let coarse = &screens[top - 1];
        let pattern = &self.levels[top];
        let integral = RgbIntegral::new(coarse);

        let mut scored = Vec::new();
        for y in 0..=(coarse.height() - pattern.height) {
            for x in 0..=(coarse.width() - pattern.width) {
                let score = pattern.score(coarse, &integral, x, y);
                scored.push(Candidate { score, x, y });
            }
        }
        let mut candidates = strongest(scored, CANDIDATES);

        for level in (0..top).rev() {
            let screen = if level == 0 { screenshot } else { &screens[level - 1] };
            let pattern = &self.levels[level];
            let integral = RgbIntegral::new(screen);
            let max_x = screen.width() - pattern.width;
            let max_y = screen.height() - pattern.height;

            let mut scored = Vec::new();
            for candidate in &candidates {
                let (cx, cy) = (candidate.x * 2, candidate.y * 2);
                for y in cy.saturating_sub(REFINE_RADIUS)..=(cy + REFINE_RADIUS).min(max_y) {
                    for x in cx.saturating_sub(REFINE_RADIUS)..=(cx + REFINE_RADIUS).min(max_x) {
                        let score = pattern.score(screen, &integral, x, y);
                        scored.push(Candidate { score, x, y });
                    }
                }
            }
            candidates = strongest(scored, CANDIDATES);
        }

        candidates.into_iter().next()
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    score: f64,
    x: u32,
    y: u32,
}

/// Highest scores first, row-major among equals, skipping direct neighbours of a kept one
fn strongest(mut scored: Vec<Candidate>, count: usize) -> Vec<Candidate> {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score).then((a.y, a.x).cmp(&(b.y, b.x))));

    let mut kept: Vec<Candidate> = Vec::with_capacity(count);
    for candidate in scored {
        if kept.len() == count {
            break;
        }
        let crowded = kept
            .iter()
            .any(|k| k.x.abs_diff(candidate.x) <= 1 && k.y.abs_diff(candidate.y) <= 1);
        if !crowded {
            kept.push(candidate);
        }
    }
    kept
}

/// Template pixels at one pyramid level
struct Pattern {
    width: u32,
    height: u32,
    /// RGB minus the per-channel mean, three values per pixel, row-major
    centered: Vec<f64>,
    /// Sum of squared deviations over all channels
    energy: f64,
    means: [f64; 3],
    flat: bool,
}

impl Pattern {
    fn new(image: &Bitmap) -> Self {
        let n = (image.width() * image.height()).max(1) as f64;

        let mut means = [0.0; 3];
        for pixel in image.pixels() {
            for c in 0..3 {
                means[c] += pixel.0[c] as f64;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut centered = Vec::with_capacity((image.width() * image.height()) as usize * 3);
        for pixel in image.pixels() {
            for c in 0..3 {
                centered.push(pixel.0[c] as f64 - means[c]);
            }
        }
        let energy: f64 = centered.iter().map(|v| v * v).sum();

        Self {
            width: image.width(),
            height: image.height(),
            centered,
            energy,
            means,
            flat: energy / n <= FLAT_VARIANCE,
        }
    }

    fn fits(&self, width: u32, height: u32) -> bool {
        self.width <= width && self.height <= height
    }

    /// Exhaustive search, keeping the first of equal scores
    fn best_window(&self, screen: &Bitmap) -> Option<Candidate> {
        let integral = RgbIntegral::new(screen);
        let mut best: Option<Candidate> = None;

        for y in 0..=(screen.height() - self.height) {
            for x in 0..=(screen.width() - self.width) {
                let score = self.score(screen, &integral, x, y);
                if best.is_none_or(|b| score > b.score) {
                    best = Some(Candidate { score, x, y });
                }
            }
        }
        best
    }

    fn score(&self, screen: &Bitmap, integral: &RgbIntegral, x: u32, y: u32) -> f64 {
        let n = (self.width * self.height) as f64;
        let (sums, sq) = integral.window(x, y, self.width, self.height);
        let variance = (sq - sums.iter().map(|s| s * s).sum::<f64>() / n).max(0.0);
        let window_flat = variance / n <= FLAT_VARIANCE;

        let score = match (self.flat, window_flat) {
            (true, true) => {
                let drift = (0..3)
                    .map(|c| (sums[c] / n - self.means[c]).abs())
                    .fold(0.0, f64::max);
                1.0 - drift / FLAT_TOLERANCE
            }
            (false, false) => self.cross(screen, x, y) / (variance * self.energy).sqrt(),
            _ => 0.0,
        };
        score.clamp(0.0, 1.0)
    }

    /// Sum of window pixels times the centered template
    fn cross(&self, screen: &Bitmap, x: u32, y: u32) -> f64 {
        let raw = screen.as_raw();
        let stride = screen.width() as usize * 4;
        let row_len = self.width as usize * 4;

        let mut cross = 0.0;
        for (ty, template_row) in self.centered.chunks_exact(self.width as usize * 3).enumerate() {
            let start = (y as usize + ty) * stride + x as usize * 4;
            for (px, t) in raw[start..start + row_len].chunks_exact(4).zip(template_row.chunks_exact(3)) {
                cross += px[0] as f64 * t[0] + px[1] as f64 * t[1] + px[2] as f64 * t[2];
            }
        }
        cross
    }
}

/// Summed-area tables of each colour channel and of squared intensity over all channels
struct RgbIntegral {
    stride: usize,
    sums: [Vec<f64>; 3],
    sq: Vec<f64>,
}

impl RgbIntegral {
    fn new(image: &Bitmap) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let size = stride * (h + 1);
        let mut sums = [vec![0.0; size], vec![0.0; size], vec![0.0; size]];
        let mut sq = vec![0.0; size];

        for (y, row) in image.as_raw().chunks_exact(w * 4).enumerate() {
            let mut row_sums = [0.0; 3];
            let mut row_sq = 0.0;
            for (x, px) in row.chunks_exact(4).enumerate() {
                let above = y * stride + x + 1;
                let at = above + stride;
                for c in 0..3 {
                    let v = px[c] as f64;
                    row_sums[c] += v;
                    row_sq += v * v;
                    sums[c][at] = sums[c][above] + row_sums[c];
                }
                sq[at] = sq[above] + row_sq;
            }
        }

        Self { stride, sums, sq }
    }

    /// Per-channel sums and the squared sum of one window
    fn window(&self, x: u32, y: u32, w: u32, h: u32) -> ([f64; 3], f64) {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        let area = |table: &[f64]| {
            table[y1 * self.stride + x1] - table[y1 * self.stride + x0] - table[y0 * self.stride + x1]
                + table[y0 * self.stride + x0]
        };
        (
            [area(&self.sums[0]), area(&self.sums[1]), area(&self.sums[2])],
            area(&self.sq),
        )
    }
}
