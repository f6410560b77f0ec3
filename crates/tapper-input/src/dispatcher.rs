use std::time::{Duration, Instant};

use tapper_types::ClickTarget;

use crate::ClickError;
use crate::pointer::Pointer;

/// Issues clicks with a minimum gap between them and an emergency stop.
///
/// With the fail-safe enabled, a cursor parked in any corner of the main
/// display aborts before the next action.
pub struct ClickDispatcher {
    pointer: Box<dyn Pointer>,
    pause: Duration,
    failsafe: bool,
    last_action: Option<Instant>,
}

impl ClickDispatcher {
    pub fn new(pointer: Box<dyn Pointer>, pause: Duration, failsafe: bool) -> Self {
        Self {
            pointer,
            pause,
            failsafe,
            last_action: None,
        }
    }

    pub fn check_failsafe(&self) -> Result<(), ClickError> {
        if !self.failsafe {
            return Ok(());
        }

        let (x, y) = self.pointer.location()?;
        let (width, height) = self.pointer.display_size()?;
        let on_x_edge = x <= 0 || x >= width - 1;
        let on_y_edge = y <= 0 || y >= height - 1;

        if on_x_edge && on_y_edge {
            tracing::warn!("Cursor at corner ({x}, {y}), aborting");
            return Err(ClickError::AbortedByUser { x, y });
        }
        Ok(())
    }

    /// Move to the target and press the primary button once
    pub fn click(&mut self, target: &ClickTarget) -> Result<(), ClickError> {
        self.check_failsafe()?;
        self.throttle();

        let x = i32::try_from(target.point.x).map_err(|_| ClickError::OffScreen(target.point))?;
        let y = i32::try_from(target.point.y).map_err(|_| ClickError::OffScreen(target.point))?;

        self.pointer.move_to(x, y)?;
        self.pointer.click_primary()?;
        self.last_action = Some(Instant::now());

        tracing::info!("Clicked '{}' at {}", target.label, target.point);
        Ok(())
    }

    fn throttle(&self) {
        if let Some(last) = self.last_action {
            let since = last.elapsed();
            if since < self.pause {
                std::thread::sleep(self.pause - since);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tapper_types::Point;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Move(i32, i32),
        Click,
    }

    #[derive(Clone)]
    struct FakePointer {
        cursor: Arc<Mutex<(i32, i32)>>,
        calls: Arc<Mutex<Vec<(Call, Instant)>>>,
    }

    impl FakePointer {
        fn at(x: i32, y: i32) -> Self {
            Self {
                cursor: Arc::new(Mutex::new((x, y))),
                calls: Arc::default(),
            }
        }
    }

    impl Pointer for FakePointer {
        fn location(&self) -> Result<(i32, i32), ClickError> {
            Ok(*self.cursor.lock().unwrap())
        }

        fn display_size(&self) -> Result<(i32, i32), ClickError> {
            Ok((1920, 1080))
        }

        fn move_to(&mut self, x: i32, y: i32) -> Result<(), ClickError> {
            *self.cursor.lock().unwrap() = (x, y);
            self.calls.lock().unwrap().push((Call::Move(x, y), Instant::now()));
            Ok(())
        }

        fn click_primary(&mut self) -> Result<(), ClickError> {
            self.calls.lock().unwrap().push((Call::Click, Instant::now()));
            Ok(())
        }
    }

    fn target(x: u32, y: u32) -> ClickTarget {
        ClickTarget {
            point: Point::new(x, y),
            label: "button".to_string(),
        }
    }

    #[test]
    fn test_click_moves_then_clicks() {
        let pointer = FakePointer::at(700, 400);
        let calls = pointer.calls.clone();
        let mut dispatcher = ClickDispatcher::new(Box::new(pointer), Duration::ZERO, true);

        dispatcher.click(&target(160, 170)).unwrap();

        let calls: Vec<Call> = calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect();
        assert_eq!(calls, vec![Call::Move(160, 170), Call::Click]);
    }

    #[test]
    fn test_pause_between_clicks() {
        let pointer = FakePointer::at(700, 400);
        let calls = pointer.calls.clone();
        let pause = Duration::from_millis(80);
        let mut dispatcher = ClickDispatcher::new(Box::new(pointer), pause, false);

        dispatcher.click(&target(10, 10)).unwrap();
        dispatcher.click(&target(20, 20)).unwrap();

        let calls = calls.lock().unwrap();
        let clicks: Vec<Instant> = calls
            .iter()
            .filter(|(c, _)| *c == Call::Click)
            .map(|(_, at)| *at)
            .collect();
        assert_eq!(clicks.len(), 2);
        assert!(clicks[1] - clicks[0] >= pause);
    }

    #[test]
    fn test_failsafe_corner_aborts() {
        for corner in [(0, 0), (1919, 0), (0, 1079), (1919, 1079)] {
            let pointer = FakePointer::at(corner.0, corner.1);
            let calls = pointer.calls.clone();
            let mut dispatcher = ClickDispatcher::new(Box::new(pointer), Duration::ZERO, true);

            let result = dispatcher.click(&target(50, 50));
            assert!(matches!(result, Err(ClickError::AbortedByUser { .. })), "{corner:?}");
            assert!(calls.lock().unwrap().is_empty());
        }
    }

    #[test]
    fn test_edge_is_not_corner() {
        let pointer = FakePointer::at(0, 500);
        let dispatcher = ClickDispatcher::new(Box::new(pointer), Duration::ZERO, true);
        assert!(dispatcher.check_failsafe().is_ok());
    }

    #[test]
    fn test_failsafe_disabled() {
        let pointer = FakePointer::at(700, 400);
        let mut dispatcher = ClickDispatcher::new(Box::new(pointer), Duration::ZERO, false);
        assert!(dispatcher.check_failsafe().is_ok());
        assert!(dispatcher.click(&target(1, 1)).is_ok());
    }
}
