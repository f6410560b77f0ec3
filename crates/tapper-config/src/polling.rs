use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

pub const INTERVAL_RANGE_SECS: RangeInclusive<u64> = 1..=3600;

fn default_interval_secs() -> u64 {
    10
}

fn default_confidence() -> f32 {
    0.8
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds to wait between two detection passes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum template score accepted as a match
    #[serde(default = "default_confidence")]
    pub confidence: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
        }
    }
}
