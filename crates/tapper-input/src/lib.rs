mod dispatcher;
mod pointer;

use tapper_types::Point;

pub use dispatcher::ClickDispatcher;
pub use pointer::{EnigoPointer, Pointer};

#[derive(Debug, thiserror::Error)]
pub enum ClickError {
    /// Fail-safe corner reached; an intentional stop rather than a failure
    #[error("Aborted by user: cursor in screen corner at ({x}, {y})")]
    AbortedByUser { x: i32, y: i32 },

    #[error("Click target {0} is outside the addressable screen")]
    OffScreen(Point),

    #[error("Input backend error: {0}")]
    Backend(String),
}
