pub mod controller;
pub mod error;
pub mod state;
mod worker;

pub use controller::{Backends, PollingLoop, StopHandle};
pub use error::RunError;
pub use worker::PointerFactory;
