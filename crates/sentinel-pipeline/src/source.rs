//! Frame sources and sinks.
//!
//! A [`FrameSourceProvider`] opens a fresh [`FrameSource`] for every pipeline
//! run, which keeps the controller restartable. Sinks receive every captured
//! frame (sampled or not) together with the detections found on it.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use sentinel_models::Detection;

use crate::config::env_parse;
use crate::error::{PipelineError, PipelineResult};
use crate::frame::Frame;

/// Ordered stream of decoded frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream has ended.
    async fn next_frame(&mut self) -> PipelineResult<Option<Frame>>;

    /// Release the underlying handle. Calling it again is a no-op.
    fn close(&mut self);
}

/// Opens frame sources.
#[async_trait]
pub trait FrameSourceProvider: Send + Sync {
    /// Open a source; failure is `SourceUnavailable`.
    async fn open(&self) -> PipelineResult<Box<dyn FrameSource>>;
}

/// Downstream consumer of frames (rendering, recording).
#[async_trait]
pub trait FrameSink: Send {
    async fn write(&mut self, frame: &Frame, detections: &[Detection]) -> PipelineResult<()>;

    /// Release the underlying handle. Calling it again is a no-op.
    fn close(&mut self);
}

/// Opens a sink for each pipeline run.
pub trait FrameSinkProvider: Send + Sync {
    fn open(&self) -> PipelineResult<Box<dyn FrameSink>>;
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl FrameSink for NullSink {
    async fn write(&mut self, _frame: &Frame, _detections: &[Detection]) -> PipelineResult<()> {
        Ok(())
    }

    fn close(&mut self) {}
}

impl FrameSinkProvider for NullSink {
    fn open(&self) -> PipelineResult<Box<dyn FrameSink>> {
        Ok(Box::new(NullSink))
    }
}

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Replays a directory of still images, ordered by file name.
///
/// Each frame is stamped with the wall-clock time at which it was read.
#[derive(Debug)]
pub struct DirectoryFrameSource {
    dir: PathBuf,
    pending: VecDeque<PathBuf>,
    frame_interval: Option<Duration>,
    next_index: u64,
    closed: bool,
}

impl DirectoryFrameSource {
    /// List the frames in `dir`.
    pub async fn open(dir: impl AsRef<Path>, frame_interval: Option<Duration>) -> PipelineResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            PipelineError::source_unavailable(format!("cannot open {}: {}", dir.display(), e))
        })?;

        let mut frames = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if is_frame_file(&path) {
                frames.push(path);
            }
        }
        if frames.is_empty() {
            return Err(PipelineError::source_unavailable(format!(
                "no frames found in {}",
                dir.display()
            )));
        }
        frames.sort();

        info!(dir = %dir.display(), frames = frames.len(), "Opened frame directory");

        Ok(Self {
            dir,
            pending: frames.into(),
            frame_interval,
            next_index: 1,
            closed: false,
        })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn next_frame(&mut self) -> PipelineResult<Option<Frame>> {
        if self.closed {
            return Ok(None);
        }
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        if let Some(interval) = self.frame_interval {
            if self.next_index > 1 {
                tokio::time::sleep(interval).await;
            }
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            PipelineError::source_unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        let image = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| PipelineError::source_unavailable(format!("decoder task failed: {e}")))?
            .map_err(|e| {
                PipelineError::source_unavailable(format!("cannot decode {}: {}", path.display(), e))
            })?
            .to_rgb8();

        let frame = Frame::new(self.next_index, Utc::now(), image);
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.pending.clear();
            debug!(dir = %self.dir.display(), "Frame directory closed");
        }
    }
}

/// Opens a [`DirectoryFrameSource`] on every run.
#[derive(Debug, Clone)]
pub struct DirectorySourceProvider {
    pub dir: PathBuf,
    pub frame_interval: Option<Duration>,
}

impl DirectorySourceProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frame_interval: None,
        }
    }

    /// Create from `CAMERA_SOURCE` and `SOURCE_FPS` (0 = as fast as possible).
    pub fn from_env() -> PipelineResult<Self> {
        let dir = std::env::var("CAMERA_SOURCE").unwrap_or_else(|_| "./frames".to_string());
        let fps: f64 = env_parse("SOURCE_FPS", 0.0)?;
        if !(fps >= 0.0 && fps.is_finite()) {
            return Err(PipelineError::config_invalid(format!("SOURCE_FPS must be >= 0, got {fps}")));
        }
        let frame_interval = (fps > 0.0).then(|| Duration::from_secs_f64(1.0 / fps));

        Ok(Self {
            dir: PathBuf::from(dir),
            frame_interval,
        })
    }
}

#[async_trait]
impl FrameSourceProvider for DirectorySourceProvider {
    async fn open(&self) -> PipelineResult<Box<dyn FrameSource>> {
        let source = DirectoryFrameSource::open(&self.dir, self.frame_interval).await?;
        Ok(Box::new(source))
    }
}
