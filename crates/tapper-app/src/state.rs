use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tapper_types::LoopState;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

/// Loop state shared between the controller and its worker
#[derive(Clone, Default)]
pub struct SharedState(Arc<AtomicU8>);

impl SharedState {
    pub fn get(&self) -> LoopState {
        match self.0.load(Ordering::SeqCst) {
            RUNNING => LoopState::Running,
            STOPPING => LoopState::Stopping,
            _ => LoopState::Idle,
        }
    }

    /// Idle -> Running; false if a run is already in progress
    pub fn try_start(&self) -> bool {
        self.0
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Running -> Stopping; other states are left alone
    pub fn begin_stop(&self) {
        let _ = self
            .0
            .compare_exchange(RUNNING, STOPPING, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn finish(&self) {
        self.0.store(IDLE, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let state = SharedState::default();
        assert_eq!(state.get(), LoopState::Idle);

        state.begin_stop();
        assert_eq!(state.get(), LoopState::Idle);

        assert!(state.try_start());
        assert!(!state.try_start());
        assert_eq!(state.get(), LoopState::Running);

        state.begin_stop();
        assert_eq!(state.get(), LoopState::Stopping);

        state.finish();
        assert_eq!(state.get(), LoopState::Idle);
    }
}
