//! Recording of ready paths
//!
//! A path starts a recorder when it becomes ready with `record` enabled and
//! closes it when it stops being ready, or when a reload changes any
//! record-* field. Writing segments to disk is up to the [`Recorder`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::conf::{PathConf, RecordFormat};
use crate::stream::Stream;

/// Callback invoked with the path of a newly created segment
pub type SegmentCreateHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback invoked with the path and duration of a completed segment
pub type SegmentCompleteHook = Arc<dyn Fn(&str, Duration) + Send + Sync>;

/// Parameters of a recording
#[derive(Clone)]
pub struct RecordParams {
    /// Name of the recorded path
    pub path_name: String,
    /// Segment path template
    pub path_format: String,
    pub format: RecordFormat,
    pub part_duration: Duration,
    pub max_part_size: u64,
    pub segment_duration: Duration,
    pub on_segment_create: SegmentCreateHook,
    pub on_segment_complete: SegmentCompleteHook,
}

impl RecordParams {
    /// Take the record-* fields of a configuration
    pub fn from_conf(path_name: &str, conf: &PathConf) -> Self {
        Self {
            path_name: path_name.to_string(),
            path_format: conf.record_path.clone(),
            format: conf.record_format,
            part_duration: conf.record_part_duration,
            max_part_size: conf.record_max_part_size,
            segment_duration: conf.record_segment_duration,
            on_segment_create: Arc::new(|_| {}),
            on_segment_complete: Arc::new(|_, _| {}),
        }
    }
}

impl fmt::Debug for RecordParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordParams")
            .field("path_name", &self.path_name)
            .field("path_format", &self.path_format)
            .field("format", &self.format)
            .field("part_duration", &self.part_duration)
            .field("max_part_size", &self.max_part_size)
            .field("segment_duration", &self.segment_duration)
            .finish()
    }
}

/// A running recording
pub trait Recorder: Send + 'static {
    /// Stop recording and flush what was written
    fn close(&mut self);
}

/// Starts recorders for ready paths
pub trait RecorderFactory: Send + Sync + 'static {
    fn start(&self, params: RecordParams, stream: Stream) -> Box<dyn Recorder>;
}
