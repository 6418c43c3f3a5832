//! Progress reporting and per-run context

use serde::{Serialize, Serializer};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::PipelineError;

/// Pipeline phase reported with each progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressStatus {
    RotationDetection,
    Preprocessing,
    /// Running one recognition strategy
    Recognizing { strategy: String },
    PostProcessing,
    Done,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressStatus::RotationDetection => write!(f, "rotation_detection"),
            ProgressStatus::Preprocessing => write!(f, "preprocessing"),
            ProgressStatus::Recognizing { strategy } => write!(f, "recognizing:{}", strategy),
            ProgressStatus::PostProcessing => write!(f, "post_processing"),
            ProgressStatus::Done => write!(f, "done"),
        }
    }
}

impl Serialize for ProgressStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A progress checkpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    /// 0 - 100
    pub percent: f32,
}

/// Caller-supplied progress callback
pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Delivers progress events to an optional callback
///
/// A panicking callback is caught and logged; it never aborts the run.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(callback: Option<ProgressCallback>) -> Self {
        Self { callback }
    }

    pub fn report(&self, status: ProgressStatus, percent: f32) {
        let Some(callback) = &self.callback else {
            return;
        };

        let event = ProgressEvent {
            status,
            percent: percent.clamp(0.0, 100.0),
        };
        if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
            warn!("Progress callback panicked at '{}' ({:.0}%)", event.status, event.percent);
        }
    }
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

/// State shared by every stage of one extraction run
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub progress: ProgressReporter,
    pub cancel: CancellationToken,
    /// Collect step logs and all attempts
    pub debug: bool,
}

impl RunContext {
    /// Fail with [`PipelineError::Cancelled`] once the run was cancelled
    pub fn checkpoint(&self) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_status_tags() {
        assert_eq!(ProgressStatus::RotationDetection.to_string(), "rotation_detection");
        assert_eq!(
            ProgressStatus::Recognizing {
                strategy: "text_block_dense".to_string()
            }
            .to_string(),
            "recognizing:text_block_dense"
        );
        assert_eq!(ProgressStatus::Done.to_string(), "done");
    }

    #[test]
    fn test_reporter_delivers_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let reporter = ProgressReporter::new(Some(Arc::new(move |event: &ProgressEvent| {
            sink.lock().push(event.clone());
        })));

        reporter.report(ProgressStatus::Preprocessing, 18.0);
        reporter.report(ProgressStatus::Done, 140.0);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].status, ProgressStatus::Preprocessing);
        assert_eq!(seen[1].percent, 100.0);
    }

    #[test]
    fn test_panicking_callback_is_swallowed() {
        let reporter = ProgressReporter::new(Some(Arc::new(|_: &ProgressEvent| {
            panic!("callback failure");
        })));

        reporter.report(ProgressStatus::Done, 100.0);
    }

    #[test]
    fn test_checkpoint_after_cancel() {
        let ctx = RunContext::default();
        assert!(ctx.checkpoint().is_ok());

        ctx.cancel.cancel();
        assert!(matches!(ctx.checkpoint(), Err(PipelineError::Cancelled)));
    }

    #[test]
    fn test_event_serializes_status_as_string() {
        let event = ProgressEvent {
            status: ProgressStatus::PostProcessing,
            percent: 90.0,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"status":"post_processing","percent":90.0}"#);
    }
}
