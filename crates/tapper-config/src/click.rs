use serde::{Deserialize, Serialize};

fn default_pause_ms() -> u64 {
    500
}

fn default_failsafe() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClickConfig {
    /// Minimum gap between two dispatched clicks
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    /// Abort when the cursor sits in a screen corner
    #[serde(default = "default_failsafe")]
    pub failsafe: bool,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            pause_ms: default_pause_ms(),
            failsafe: default_failsafe(),
        }
    }
}
