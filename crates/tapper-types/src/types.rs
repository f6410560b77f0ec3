use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Rectangle on the screen, in absolute pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    #[error("Region must have a non-zero size, got {width}x{height}")]
    Empty { width: u32, height: u32 },

    #[error("Region must be 'left,top,width,height', got '{0}'")]
    Format(String),

    #[error("Region {0} extends past the largest screen coordinate")]
    Overflow(String),
}

impl Region {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Result<Self, RegionError> {
        let region = Self {
            left,
            top,
            width,
            height,
        };
        region.validate()?;
        Ok(region)
    }

    pub fn validate(&self) -> Result<(), RegionError> {
        if self.width == 0 || self.height == 0 {
            return Err(RegionError::Empty {
                width: self.width,
                height: self.height,
            });
        }
        if self.left.checked_add(self.width).is_none() || self.top.checked_add(self.height).is_none() {
            return Err(RegionError::Overflow(self.to_string()));
        }
        Ok(())
    }

    pub fn right(&self) -> u32 {
        self.left.saturating_add(self.width)
    }

    pub fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }

    /// Translate a point relative to this region into screen coordinates.
    ///
    /// The local point is clamped to the region so the result never leaves it.
    pub fn to_absolute(&self, local: Point) -> Point {
        Point {
            x: self.left.saturating_add(local.x.min(self.width)),
            y: self.top.saturating_add(local.y.min(self.height)),
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        (self.left..=self.right()).contains(&point.x) && (self.top..=self.bottom()).contains(&point.y)
    }
}

impl FromStr for Region {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| RegionError::Format(s.to_string()))?;

        match parts.as_slice() {
            &[left, top, width, height] => Region::new(left, top, width, height),
            _ => Err(RegionError::Format(s.to_string())),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.left, self.top, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Absolute screen coordinate to click, consumed as soon as it is computed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickTarget {
    pub point: Point,
    /// What was found there: recognized word or template name
    pub label: String,
}

impl ClickTarget {
    /// Build a target from a point inside a captured bitmap.
    pub fn from_capture(local: Point, region: Option<Region>, label: impl Into<String>) -> Self {
        let point = match region {
            Some(region) => region.to_absolute(local),
            None => local,
        };
        Self {
            point,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn center(&self) -> Point {
        Point {
            x: self.left + self.width / 2,
            y: self.top + self.height / 2,
        }
    }
}

/// One word reported by the OCR engine
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Expected contrast of the text being searched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Light text on a dark background, inverted before binarizing
    #[default]
    LightOnDark,
    DarkOnLight,
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "light_on_dark" => Ok(Polarity::LightOnDark),
            "dark_on_light" => Ok(Polarity::DarkOnLight),
            other => Err(format!("unknown polarity '{other}'")),
        }
    }
}

/// Which word wins when several OCR words contain the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Top-most word first, then left-most
    #[default]
    ReadingOrder,
    /// Whatever the engine listed first
    EngineOrder,
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "reading_order" => Ok(TieBreak::ReadingOrder),
            "engine_order" => Ok(TieBreak::EngineOrder),
            other => Err(format!("unknown tie-break '{other}'")),
        }
    }
}

/// Lifecycle of the polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone)]
pub struct LoopEvent {
    pub at: DateTime<Local>,
    pub kind: EventKind,
}

impl LoopEvent {
    pub fn now(kind: EventKind) -> Self {
        Self {
            at: Local::now(),
            kind,
        }
    }
}

impl fmt::Display for LoopEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.at.format("%H:%M:%S"), self.kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Started,
    /// Target found and clicked
    Clicked {
        label: String,
        at: Point,
    },
    NotFound {
        target: String,
        /// Best template score seen this iteration, text search has none
        best_score: Option<f32>,
    },
    /// Iteration gave up on a recoverable failure, the loop keeps going
    Skipped(String),
    /// Failure that ended the run
    Error(String),
    /// Fail-safe corner reached
    Aborted,
    Stopped,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Started => write!(f, "started"),
            EventKind::Clicked { label, at } => write!(f, "found and clicked '{label}' at {at}"),
            EventKind::NotFound {
                target,
                best_score: Some(score),
            } => write!(f, "not found: '{target}' (best score {score:.3})"),
            EventKind::NotFound { target, .. } => write!(f, "not found: '{target}'"),
            EventKind::Skipped(reason) => write!(f, "skipped: {reason}"),
            EventKind::Error(message) => write!(f, "error: {message}"),
            EventKind::Aborted => write!(f, "aborted by fail-safe"),
            EventKind::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parse() {
        let region: Region = "100, 100,400,300".parse().unwrap();
        assert_eq!(region, Region::new(100, 100, 400, 300).unwrap());
        assert_eq!(region.to_string(), "100,100,400,300");
    }

    #[test]
    fn test_region_parse_rejects_bad_input() {
        assert!(matches!("1,2,3".parse::<Region>(), Err(RegionError::Format(_))));
        assert!(matches!("a,b,c,d".parse::<Region>(), Err(RegionError::Format(_))));
        assert!(matches!(
            "1,2,0,5".parse::<Region>(),
            Err(RegionError::Empty { width: 0, height: 5 })
        ));
    }

    #[test]
    fn test_region_rejects_overflowing_extent() {
        assert!(matches!(
            "4294967295,0,10,10".parse::<Region>(),
            Err(RegionError::Overflow(_))
        ));
        assert!(matches!(
            Region::new(0, u32::MAX - 4, 10, 5),
            Err(RegionError::Overflow(_))
        ));

        let edge = Region::new(u32::MAX - 10, 0, 10, 10).unwrap();
        assert_eq!(edge.right(), u32::MAX);
        assert_eq!(edge.to_absolute(Point::new(50, 50)), Point::new(u32::MAX, 10));
    }

    #[test]
    fn test_to_absolute_stays_inside_region() {
        let region = Region::new(100, 100, 400, 300).unwrap();
        let inside = region.to_absolute(Point::new(60, 70));
        assert_eq!(inside, Point::new(160, 170));

        let clamped = region.to_absolute(Point::new(1000, 1000));
        assert_eq!(clamped, Point::new(500, 400));
        assert!(region.contains(clamped));
    }

    #[test]
    fn test_click_target_without_region() {
        let target = ClickTarget::from_capture(Point::new(5, 6), None, "ok");
        assert_eq!(target.point, Point::new(5, 6));
        assert_eq!(target.label, "ok");
    }

    #[test]
    fn test_bbox_center_rounds_down() {
        let bbox = BoundingBox {
            left: 10,
            top: 20,
            width: 5,
            height: 7,
        };
        assert_eq!(bbox.center(), Point::new(12, 23));
    }

    #[test]
    fn test_event_display() {
        let kind = EventKind::Clicked {
            label: "Submit".to_string(),
            at: Point::new(3, 4),
        };
        assert_eq!(kind.to_string(), "found and clicked 'Submit' at (3, 4)");
    }
}
