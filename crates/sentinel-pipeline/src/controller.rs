//! Pipeline controller.
//!
//! Owns the frame loop lifecycle (`Idle -> Running -> Stopping -> Idle`) and
//! wires source, detector, decision engine and dispatch queue together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use sentinel_dispatch::{AlertDispatcher, DispatchQueue, DispatchStats};
use sentinel_engine::{ClassAlertState, DecisionEngine};
use sentinel_models::{ClassId, ControlOutcome, Detection, PipelineState, PipelineStatus};

use crate::config::PipelineConfig;
use crate::detector::Detector;
use crate::error::{PipelineError, PipelineResult};
use crate::frame::{rescale_detections, Frame, FrameSampler};
use crate::logging::RunLogger;
use crate::metrics::{
    record_alert_emitted, record_detection, record_detector_fault, record_frame_captured,
    record_frame_sampled,
};
use crate::source::{FrameSink, FrameSinkProvider, FrameSource, FrameSourceProvider, NullSink};

/// State shared between the controller and its frame loop.
#[derive(Default)]
struct PipelineShared {
    state: RwLock<PipelineState>,
    frames_captured: AtomicU64,
    frames_sampled: AtomicU64,
    detector_faults: AtomicU64,
    alerts_emitted: AtomicU64,
    last_detection: RwLock<Option<DateTime<Utc>>>,
}

impl PipelineShared {
    fn state(&self) -> PipelineState {
        *self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    fn last_detection(&self) -> Option<DateTime<Utc>> {
        *self
            .last_detection
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mark_detection(&self, at: DateTime<Utc>) {
        *self
            .last_detection
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(at);
    }

    fn count_fault(&self) {
        self.detector_faults.fetch_add(1, Ordering::Relaxed);
        record_detector_fault();
    }
}

/// Source and sink handles of one run, released exactly once.
struct RunResources {
    source: Option<Box<dyn FrameSource>>,
    sink: Option<Box<dyn FrameSink>>,
}

impl RunResources {
    fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        if let Some(mut sink) = self.sink.take() {
            sink.close();
        }
    }
}

impl Drop for RunResources {
    fn drop(&mut self) {
        self.release();
    }
}

struct RunHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    run_id: String,
}

/// Everything the frame loop task owns for one run.
struct FrameLoop {
    config: Arc<PipelineConfig>,
    detector: Arc<dyn Detector>,
    engine: Arc<Mutex<DecisionEngine>>,
    queue: Arc<DispatchQueue>,
    shared: Arc<PipelineShared>,
    resources: RunResources,
    shutdown_rx: watch::Receiver<bool>,
    logger: RunLogger,
}

impl FrameLoop {
    async fn run(mut self) {
        self.logger.log_start("frame loop running");
        let mut sampler = FrameSampler::new(self.config.sampling_stride);
        let mut emitted = 0u64;

        loop {
            if *self.shutdown_rx.borrow() {
                debug!("Shutdown observed at iteration boundary");
                break;
            }

            let Some(source) = self.resources.source.as_mut() else {
                break;
            };
            let next = tokio::select! {
                _ = self.shutdown_rx.changed() => break,
                next = source.next_frame() => next,
            };
            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.logger.log_progress("end of stream");
                    break;
                }
                Err(e) => {
                    self.logger.log_error(&format!("frame source failed: {e}"));
                    break;
                }
            };

            self.shared.frames_captured.fetch_add(1, Ordering::Relaxed);
            record_frame_captured();

            let detections = if sampler.tick() {
                let Some(detections) = self.detect(&frame).await else {
                    // Shutdown arrived while the detector was busy
                    break;
                };
                emitted += self.decide(&frame, &detections);
                detections
            } else {
                Vec::new()
            };

            if let Some(sink) = self.resources.sink.as_mut() {
                if let Err(e) = sink.write(&frame, &detections).await {
                    warn!(frame = frame.index, "Frame sink write failed: {}", e);
                }
            }

            if self.config.loop_pause.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::select! {
                    _ = self.shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(self.config.loop_pause) => {}
                }
            }
        }

        self.shared.set_state(PipelineState::Stopping);
        self.resources.release();
        self.shared.set_state(PipelineState::Idle);
        self.logger.log_completion(&format!(
            "{} frames seen, {} alerts emitted",
            sampler.frames_seen(),
            emitted
        ));
    }

    /// Run the detector on a sampled frame and map boxes back to
    /// original-frame coordinates. A failed call yields an empty batch.
    ///
    /// Returns `None` when shutdown is requested mid-inference.
    async fn detect(&mut self, frame: &Frame) -> Option<Vec<Detection>> {
        self.shared.frames_sampled.fetch_add(1, Ordering::Relaxed);
        record_frame_sampled();

        let scale = self.config.processing_scale;
        let input = if self.config.downscales() {
            frame.downscale(scale)
        } else {
            frame.clone()
        };

        let result = tokio::select! {
            _ = self.shutdown_rx.changed() => return None,
            result = self.detector.infer(&input) => result,
        };

        match result {
            Ok(detections) => Some(rescale_detections(detections, scale)),
            Err(e) => {
                self.shared.count_fault();
                self.logger
                    .log_warning(&format!("frame {} skipped: {}", frame.index, e));
                Some(Vec::new())
            }
        }
    }

    /// Feed one batch to the engine and queue the resulting alerts.
    fn decide(&self, frame: &Frame, detections: &[Detection]) -> u64 {
        if detections.is_empty() {
            return 0;
        }
        let decided = {
            let mut engine = self
                .engine
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            engine.process(detections, frame.captured_at)
        };
        let events = match decided {
            Ok(events) => events,
            Err(e) => {
                self.shared.count_fault();
                self.logger
                    .log_warning(&format!("frame {} batch rejected: {}", frame.index, e));
                return 0;
            }
        };
        self.shared.mark_detection(frame.captured_at);
        for detection in detections {
            record_detection(detection.class_id);
        }

        let mut queued = 0;
        for event in events {
            self.shared.alerts_emitted.fetch_add(1, Ordering::Relaxed);
            record_alert_emitted(&event);
            match self.queue.push(event) {
                Ok(_) => queued += 1,
                Err(e) => warn!(class_id = %event.class_id, "Alert not queued: {}", e),
            }
        }
        queued
    }
}

/// Drives the frame -> detect -> decide -> dispatch loop.
///
/// `start`, `stop` and `status` are safe to call from any task in any state.
/// Decision state lives for the life of the controller, so it carries over
/// across restarts.
pub struct PipelineController {
    config: Arc<PipelineConfig>,
    provider: Arc<dyn FrameSourceProvider>,
    sink_provider: Arc<dyn FrameSinkProvider>,
    detector: Arc<dyn Detector>,
    dispatcher: Arc<dyn AlertDispatcher>,
    engine: Arc<Mutex<DecisionEngine>>,
    queue: Arc<DispatchQueue>,
    shared: Arc<PipelineShared>,
    run: tokio::sync::Mutex<Option<RunHandle>>,
}

impl PipelineController {
    /// Validate `config` and build an idle controller.
    ///
    /// Spawns the dispatch worker, so this must run inside a Tokio runtime.
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn FrameSourceProvider>,
        detector: Arc<dyn Detector>,
        dispatcher: Arc<dyn AlertDispatcher>,
    ) -> PipelineResult<Self> {
        config.validate()?;
        let engine = DecisionEngine::new(config.policies.clone())
            .map_err(|e| PipelineError::config_invalid(e.to_string()))?;
        let queue = DispatchQueue::spawn(Arc::clone(&dispatcher), config.dispatch_queue_capacity);

        info!(
            stride = config.sampling_stride,
            scale = config.processing_scale,
            policies = %config.policies,
            "Pipeline controller created"
        );

        Ok(Self {
            config: Arc::new(config),
            provider,
            sink_provider: Arc::new(NullSink),
            detector,
            dispatcher,
            engine: Arc::new(Mutex::new(engine)),
            queue: Arc::new(queue),
            shared: Arc::new(PipelineShared::default()),
            run: tokio::sync::Mutex::new(None),
        })
    }

    /// Use `sink_provider` for downstream frames instead of discarding them.
    pub fn with_sink(mut self, sink_provider: Arc<dyn FrameSinkProvider>) -> Self {
        self.sink_provider = sink_provider;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Open the source and spawn the frame loop.
    ///
    /// A source that cannot be opened is returned as `SourceUnavailable` and
    /// the controller stays idle.
    pub async fn start(&self) -> PipelineResult<ControlOutcome> {
        let mut run = self.run.lock().await;

        if let Some(handle) = run.as_ref() {
            if !handle.task.is_finished() && self.shared.state().is_running() {
                return Ok(ControlOutcome::AlreadyRunning);
            }
        }
        // Reap a run that ended on its own
        if let Some(previous) = run.take() {
            let _ = previous.shutdown.send(true);
            if let Err(e) = previous.task.await {
                warn!(run_id = %previous.run_id, "Previous frame loop ended abnormally: {}", e);
            }
        }

        let source = self.provider.open().await.map_err(|e| match e {
            PipelineError::SourceUnavailable(_) => e,
            other => PipelineError::source_unavailable(other.to_string()),
        })?;
        let mut resources = RunResources {
            source: Some(source),
            sink: None,
        };
        resources.sink = Some(self.sink_provider.open()?);

        let logger = RunLogger::new("frame_loop");
        let (shutdown, shutdown_rx) = watch::channel(false);
        let frame_loop = FrameLoop {
            config: Arc::clone(&self.config),
            detector: Arc::clone(&self.detector),
            engine: Arc::clone(&self.engine),
            queue: Arc::clone(&self.queue),
            shared: Arc::clone(&self.shared),
            resources,
            shutdown_rx,
            logger: logger.clone(),
        };

        self.shared.set_state(PipelineState::Running);
        let task = tokio::spawn(frame_loop.run().instrument(logger.create_span()));
        *run = Some(RunHandle {
            shutdown,
            task,
            run_id: logger.run_id().to_string(),
        });

        info!(run_id = %logger.run_id(), "Video processing started");
        self.notify_status("started");
        Ok(ControlOutcome::Started)
    }

    /// Signal the frame loop and wait for it to release its resources.
    pub async fn stop(&self) -> ControlOutcome {
        let mut run = self.run.lock().await;
        let Some(handle) = run.take() else {
            return ControlOutcome::AlreadyStopped;
        };

        let was_running = self.shared.state().is_running();
        if was_running {
            self.shared.set_state(PipelineState::Stopping);
        }
        let _ = handle.shutdown.send(true);
        if let Err(e) = handle.task.await {
            warn!(run_id = %handle.run_id, "Frame loop ended abnormally: {}", e);
        }
        self.shared.set_state(PipelineState::Idle);

        if was_running {
            info!(run_id = %handle.run_id, "Video processing stopped");
            self.notify_status("stopped");
            ControlOutcome::Stopped
        } else {
            ControlOutcome::AlreadyStopped
        }
    }

    pub fn status(&self) -> PipelineStatus {
        let state = self.shared.state();
        PipelineStatus {
            running: state.is_running(),
            state,
            frames_captured: self.shared.frames_captured.load(Ordering::Relaxed),
            frames_sampled: self.shared.frames_sampled.load(Ordering::Relaxed),
            detector_faults: self.shared.detector_faults.load(Ordering::Relaxed),
            alerts_emitted: self.shared.alerts_emitted.load(Ordering::Relaxed),
            alerts_dropped: self.queue.dropped(),
            last_detection: self.shared.last_detection(),
        }
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.queue.stats()
    }

    /// Snapshot of the alert state kept for `class_id`.
    pub fn class_state(&self, class_id: ClassId) -> Option<ClassAlertState> {
        self.engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .state(class_id)
            .cloned()
    }

    /// Stop any run and drain pending alerts. Used on process exit.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.queue.shutdown().await;
    }

    fn notify_status(&self, status: &'static str) {
        let dispatcher = Arc::clone(&self.dispatcher);
        tokio::spawn(async move {
            if !dispatcher.send_status(status).await {
                debug!(status, "Status update not delivered");
            }
        });
    }
}
