//! Fakes shared by unit tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::conf::PathConf;
use crate::hooks::PathHooks;
use crate::path::{PathHandle, SourceParent};
use crate::recorder::{RecordParams, Recorder, RecorderFactory};
use crate::registry::HlsServer;
use crate::source::{
    Publisher, Reader, SourceDescriptor, StaticSource, StaticSourceFactory, StaticSourceParams,
};
use crate::stream::{Media, MediaDescription, Stream};

pub fn video_desc() -> MediaDescription {
    MediaDescription::new(vec![Media::video("H264")])
}

pub struct FakePublisher {
    id: String,
    closed: AtomicBool,
}

impl FakePublisher {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Publisher for FakePublisher {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::new("fakePublisher", self.id.clone())
    }
}

pub struct FakeReader {
    id: String,
    closed: AtomicBool,
}

impl FakeReader {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Reader for FakeReader {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::new("fakeReader", self.id.clone())
    }
}

/// Static sources that log every call and optionally become ready after a
/// delay once started
#[derive(Clone, Default)]
pub struct FakeSourceFactory {
    log: Arc<Mutex<Vec<String>>>,
    ready_after: Option<Duration>,
}

impl FakeSourceFactory {
    pub fn auto_ready(mut self, after: Duration) -> Self {
        self.ready_after = Some(after);
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

struct FakeSource {
    log: Arc<Mutex<Vec<String>>>,
    parent: SourceParent,
    ready_after: Option<Duration>,
    stream: Arc<Mutex<Option<Stream>>>,
}

impl StaticSource for FakeSource {
    fn start(&mut self, on_demand: bool, _query: &str) {
        self.log.lock().push(if on_demand {
            "start on_demand".to_string()
        } else {
            "start".to_string()
        });

        if let Some(after) = self.ready_after {
            let parent = self.parent.clone();
            let stream = self.stream.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                if let Ok(s) = parent.set_ready(video_desc(), false).await {
                    *stream.lock() = Some(s);
                }
            });
        }
    }

    fn stop(&mut self, reason: &str) {
        self.log.lock().push(format!("stop {}", reason));
        self.stream.lock().take();
    }

    fn reload_conf(&mut self, _conf: Arc<PathConf>) {
        self.log.lock().push("reload".to_string());
    }

    fn close(&mut self, reason: &str) {
        self.log.lock().push(format!("close {}", reason));
    }

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::new("fakeSource", self.parent.name())
    }
}

impl StaticSourceFactory for FakeSourceFactory {
    fn create(&self, params: StaticSourceParams) -> Box<dyn StaticSource> {
        self.log.lock().push(format!("create {}", params.name));
        Box::new(FakeSource {
            log: self.log.clone(),
            parent: params.parent,
            ready_after: self.ready_after,
            stream: Arc::new(Mutex::new(None)),
        })
    }
}

#[derive(Clone, Default)]
pub struct FakeRecorderFactory {
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeRecorderFactory {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

struct FakeRecorder {
    log: Arc<Mutex<Vec<String>>>,
    path_format: String,
}

impl Recorder for FakeRecorder {
    fn close(&mut self) {
        self.log.lock().push(format!("close {}", self.path_format));
    }
}

impl RecorderFactory for FakeRecorderFactory {
    fn start(&self, params: RecordParams, _stream: Stream) -> Box<dyn Recorder> {
        self.log.lock().push(format!("start {}", params.path_format));
        Box::new(FakeRecorder {
            log: self.log.clone(),
            path_format: params.path_format,
        })
    }
}

/// Hooks that record every transition
#[derive(Clone, Default)]
pub struct RecordingHooks {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl PathHooks for RecordingHooks {
    fn on_init(&self, _path: &PathHandle) {
        self.push("init".into());
    }

    fn on_uninit(&self, _path: &PathHandle) {
        self.push("uninit".into());
    }

    fn on_demand(&self, _path: &PathHandle, _query: &str) {
        self.push("demand".into());
    }

    fn on_undemand(&self, _path: &PathHandle, reason: &str) {
        self.push(format!("undemand {}", reason));
    }

    fn on_demand_static(&self, _path: &PathHandle, _query: &str) {
        self.push("demand_static".into());
    }

    fn on_undemand_static(&self, _path: &PathHandle, reason: &str) {
        self.push(format!("undemand_static {}", reason));
    }

    fn on_ready(&self, _path: &PathHandle) {
        self.push("ready".into());
    }

    fn on_not_ready(&self, _path: &PathHandle) {
        self.push("not_ready".into());
    }
}

#[derive(Clone, Default)]
pub struct RecordingHls {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingHls {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl HlsServer for RecordingHls {
    fn path_ready(&self, path: &PathHandle) {
        self.events.lock().push(format!("ready {}", path.name()));
    }

    fn path_not_ready(&self, path: &PathHandle) {
        self.events.lock().push(format!("not_ready {}", path.name()));
    }
}
