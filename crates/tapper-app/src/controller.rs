use std::time::Duration;

use kanal::AsyncReceiver;
use tapper_config::{Config, Target};
use tapper_core::{OcrEngine, ScreenSource, TemplateMatcher, TextLocator};
use tapper_input::{EnigoPointer, Pointer};
use tapper_ocr::{ScreenCapture, TesseractEngine};
use tapper_types::{EventKind, LoopEvent, LoopState};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::RunError;
use crate::state::SharedState;
use crate::worker::{Detector, PointerFactory, Worker};

/// External services one run talks to
pub struct Backends {
    pub screen: Box<dyn ScreenSource>,
    pub ocr: Box<dyn OcrEngine>,
    pub pointer: PointerFactory,
}

impl Backends {
    /// Live screen, tesseract subprocess and enigo input
    pub fn system(config: &Config) -> Self {
        let ocr = TesseractEngine {
            binary: config.ocr.engine_path.clone(),
            tessdata_dir: config.ocr.tessdata_dir.clone(),
            language: config.ocr.language.clone(),
            page_seg_mode: config.ocr.page_seg_mode,
            engine_mode: config.ocr.engine_mode,
            timeout: Duration::from_millis(config.ocr.timeout_ms),
        };

        Self {
            screen: Box::new(ScreenCapture::new()),
            ocr: Box::new(ocr),
            pointer: Box::new(|| Ok(Box::new(EnigoPointer::new()?) as Box<dyn Pointer>)),
        }
    }
}

/// Stops the run that was active when the handle was taken
#[derive(Clone)]
pub struct StopHandle {
    cancel: CancellationToken,
    state: SharedState,
}

impl StopHandle {
    pub fn stop(&self) {
        self.state.begin_stop();
        self.cancel.cancel();
    }
}

/// Start/stop control over a single background detection loop.
///
/// Every iteration outcome is published on the event channel returned by
/// [`PollingLoop::new`]. At most one run is active at a time.
pub struct PollingLoop {
    state: SharedState,
    cancel: CancellationToken,
    events: kanal::Sender<LoopEvent>,
    worker: Option<JoinHandle<Result<(), RunError>>>,
}

impl PollingLoop {
    pub fn new() -> (Self, AsyncReceiver<LoopEvent>) {
        let (events, receiver) = kanal::unbounded();
        let polling = Self {
            state: SharedState::default(),
            cancel: CancellationToken::new(),
            events,
            worker: None,
        };
        (polling, receiver.to_async())
    }

    pub fn state(&self) -> LoopState {
        self.state.get()
    }

    /// Idle -> Running. Must be called inside a tokio runtime.
    ///
    /// Config and template problems are returned here, before any iteration runs.
    pub fn start(&mut self, config: &Config, backends: Backends) -> Result<(), RunError> {
        if self.state.get() != LoopState::Idle {
            return Err(RunError::AlreadyRunning);
        }
        config.validate()?;

        let (detector, target) = match &config.target {
            Some(Target::Template(path)) => {
                let matcher = TemplateMatcher::load(path)?;
                let (width, height) = matcher.dimensions();
                tracing::info!("Loaded template {} ({width}x{height})", path.display());
                let detector = Detector::Template {
                    matcher,
                    confidence: config.matcher.confidence,
                };
                (detector, path.display().to_string())
            }
            Some(Target::Text(text)) => {
                let locator =
                    TextLocator::new(backends.ocr, config.ocr.polarity, config.ocr.tie_break);
                let detector = Detector::Text {
                    locator,
                    text: text.clone(),
                };
                (detector, text.clone())
            }
            None => return Err(tapper_config::ConfigError::MissingTarget.into()),
        };

        if !self.state.try_start() {
            return Err(RunError::AlreadyRunning);
        }
        self.cancel = CancellationToken::new();

        let worker = Worker {
            screen: backends.screen,
            detector,
            region: config.region,
            target,
            interval_secs: config.polling.interval_secs,
            click_pause: Duration::from_millis(config.click.pause_ms),
            failsafe: config.click.failsafe,
            cancel: self.cancel.clone(),
            state: self.state.clone(),
            events: self.events.clone(),
        };

        let _ = self.events.send(LoopEvent::now(EventKind::Started));
        let pointer = backends.pointer;
        self.worker = Some(tokio::task::spawn_blocking(move || worker.run(pointer)));
        Ok(())
    }

    /// Ask the worker to exit at its next checkpoint without waiting for it
    pub fn request_stop(&self) {
        self.state.begin_stop();
        self.cancel.cancel();
    }

    /// Running -> Stopping -> Idle, returning how the run ended
    pub async fn stop(&mut self) -> Result<(), RunError> {
        self.request_stop();
        self.join().await
    }

    /// Wait for the current run to end on its own
    pub async fn join(&mut self) -> Result<(), RunError> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.await.map_err(|e| {
            // A panicked worker never reached its own cleanup
            self.state.finish();
            RunError::Worker(e.to_string())
        })?
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            cancel: self.cancel.clone(),
            state: self.state.clone(),
        }
    }
}
