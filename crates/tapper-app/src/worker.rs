use std::thread;
use std::time::Duration;

use tapper_core::{Bitmap, ScreenSource, TemplateMatcher, TextLocator};
use tapper_input::{ClickDispatcher, ClickError, Pointer};
use tapper_types::{ClickTarget, EventKind, LoopEvent, Region};
use tokio_util::sync::CancellationToken;

use crate::error::RunError;
use crate::state::SharedState;

/// Granularity of the wait phase, and so the worst-case stop latency
const TICK: Duration = Duration::from_secs(1);

/// Builds the input backend on the worker thread
pub type PointerFactory = Box<dyn FnOnce() -> Result<Box<dyn Pointer>, ClickError> + Send>;

pub(crate) enum Detector {
    Template {
        matcher: TemplateMatcher,
        confidence: f32,
    },
    Text {
        locator: TextLocator,
        text: String,
    },
}

enum Detection {
    Found(ClickTarget),
    Missed { best_score: Option<f32> },
    /// Recoverable OCR failure, counts as a miss
    Skipped(String),
}

/// One run of the polling loop, executed on a blocking thread
pub(crate) struct Worker {
    pub screen: Box<dyn ScreenSource>,
    pub detector: Detector,
    pub region: Option<Region>,
    /// Target as shown in events
    pub target: String,
    pub interval_secs: u64,
    pub click_pause: Duration,
    pub failsafe: bool,
    pub cancel: CancellationToken,
    pub state: SharedState,
    pub events: kanal::Sender<LoopEvent>,
}

impl Worker {
    /// Runs until cancelled or the first failure, then reports how it ended
    pub fn run(self, pointer: PointerFactory) -> Result<(), RunError> {
        let events = self.events.clone();
        let state = self.state.clone();

        let result = self.poll(pointer);
        match &result {
            Ok(()) => tracing::info!("Polling loop stopped"),
            Err(e) if e.is_user_abort() => {
                tracing::warn!("{e}");
                emit(&events, EventKind::Aborted);
            }
            Err(e) => {
                tracing::error!("Polling loop failed: {e}");
                emit(&events, EventKind::Error(e.to_string()));
            }
        }

        emit(&events, EventKind::Stopped);
        state.finish();
        result
    }

    fn poll(self, pointer: PointerFactory) -> Result<(), RunError> {
        if let Detector::Text { locator, .. } = &self.detector {
            locator.probe()?;
        }
        let mut dispatcher = ClickDispatcher::new(pointer()?, self.click_pause, self.failsafe);

        tracing::info!(
            "Polling for '{}' every {}s in {}",
            self.target,
            self.interval_secs,
            self.region
                .map(|r| r.to_string())
                .unwrap_or_else(|| "full screen".to_string())
        );

        loop {
            self.iterate(&mut dispatcher)?;
            self.wait(&dispatcher)?;
            if self.cancel.is_cancelled() {
                return Ok(());
            }
        }
    }

    fn iterate(&self, dispatcher: &mut ClickDispatcher) -> Result<(), RunError> {
        let screenshot = self.screen.capture(self.region)?;

        match self.detect(&screenshot)? {
            Detection::Found(target) => {
                dispatcher.click(&target)?;
                emit(
                    &self.events,
                    EventKind::Clicked {
                        label: target.label,
                        at: target.point,
                    },
                );
            }
            Detection::Skipped(reason) => {
                tracing::warn!("Skipping pass: {reason}");
                emit(&self.events, EventKind::Skipped(reason));
            }
            Detection::Missed { best_score } => {
                tracing::debug!("'{}' not found", self.target);
                emit(
                    &self.events,
                    EventKind::NotFound {
                        target: self.target.clone(),
                        best_score,
                    },
                );
            }
        }
        Ok(())
    }

    fn detect(&self, screenshot: &Bitmap) -> Result<Detection, RunError> {
        match &self.detector {
            Detector::Template {
                matcher,
                confidence,
            } => {
                let result = matcher.find(screenshot);
                tracing::debug!("Best match {:.3} at {}", result.score, result.position);

                if result.passes(*confidence) {
                    let target = ClickTarget::from_capture(result.center(), self.region, matcher.name());
                    Ok(Detection::Found(target))
                } else {
                    Ok(Detection::Missed {
                        best_score: Some(result.score),
                    })
                }
            }
            Detector::Text { locator, text } => match locator.locate(screenshot, text, self.region) {
                Ok(Some(target)) => Ok(Detection::Found(target)),
                Ok(None) => Ok(Detection::Missed { best_score: None }),
                Err(e) if !e.is_fatal() => Ok(Detection::Skipped(e.to_string())),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Sleeps the interval one tick at a time, watching for a stop and the fail-safe corner
    fn wait(&self, dispatcher: &ClickDispatcher) -> Result<(), RunError> {
        for _ in 0..self.interval_secs {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            dispatcher.check_failsafe()?;
            thread::sleep(TICK);
        }
        Ok(())
    }
}

fn emit(events: &kanal::Sender<LoopEvent>, kind: EventKind) {
    let event = LoopEvent::now(kind);
    tracing::debug!("{event}");
    // Nobody listening is fine, the run goes on
    let _ = events.send(event);
}
