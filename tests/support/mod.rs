// Not every test binary uses every helper
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use media_paths::{
    AccessRequest, AddPublisherReq, Media, MediaDescription, PathConf, Publisher, Reader,
    RecordParams, Recorder, RecorderFactory, SourceDescriptor, SourceParent, StaticSource,
    StaticSourceFactory, Stream,
};
use media_paths::source::StaticSourceParams;
use parking_lot::Mutex;

pub(crate) fn video_desc() -> MediaDescription {
    MediaDescription::new(vec![Media::video("H264"), Media::audio("MPEG-4 Audio")])
}

pub(crate) struct TestPublisher {
    id: String,
    closed: AtomicBool,
}

impl TestPublisher {
    pub(crate) fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn publish_req(self: &Arc<Self>, name: &str) -> AddPublisherReq {
        AddPublisherReq::new(self.clone(), video_desc(), AccessRequest::publish(name))
    }
}

impl Publisher for TestPublisher {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::new("testPublisher", self.id.clone())
    }
}

pub(crate) struct TestReader {
    id: String,
    closed: AtomicBool,
}

impl TestReader {
    pub(crate) fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Reader for TestReader {
    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::new("testReader", self.id.clone())
    }
}

/// Static sources logging every call; with `ready_after` they report ready
/// that long after being started
#[derive(Clone, Default)]
pub(crate) struct TestSources {
    log: Arc<Mutex<Vec<String>>>,
    ready_after: Option<Duration>,
}

impl TestSources {
    pub(crate) fn ready_after(after: Duration) -> Self {
        Self {
            ready_after: Some(after),
            ..Default::default()
        }
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.log.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

struct TestSource {
    name: String,
    url: String,
    log: Arc<Mutex<Vec<String>>>,
    parent: SourceParent,
    ready_after: Option<Duration>,
}

impl StaticSource for TestSource {
    fn start(&mut self, on_demand: bool, _query: &str) {
        self.log
            .lock()
            .push(format!("start {} on_demand={}", self.name, on_demand));

        if let Some(after) = self.ready_after {
            let parent = self.parent.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let _ = parent.set_ready(video_desc(), false).await;
            });
        }
    }

    fn stop(&mut self, reason: &str) {
        self.log.lock().push(format!("stop {} {}", self.name, reason));
    }

    fn reload_conf(&mut self, conf: Arc<PathConf>) {
        self.log.lock().push(format!("reload {}", self.name));
        self.url = conf.source.to_string();
    }

    fn close(&mut self, reason: &str) {
        self.log.lock().push(format!("close {} {}", self.name, reason));
    }

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::new("testSource", self.url.clone())
    }
}

impl StaticSourceFactory for TestSources {
    fn create(&self, params: StaticSourceParams) -> Box<dyn StaticSource> {
        self.log.lock().push(format!("create {}", params.name));
        Box::new(TestSource {
            name: params.name,
            url: params.conf.source.to_string(),
            log: self.log.clone(),
            parent: params.parent,
            ready_after: self.ready_after,
        })
    }
}

#[derive(Clone, Default)]
pub(crate) struct TestRecorders {
    log: Arc<Mutex<Vec<String>>>,
}

impl TestRecorders {
    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

struct TestRecorder {
    log: Arc<Mutex<Vec<String>>>,
    params: RecordParams,
}

impl Recorder for TestRecorder {
    fn close(&mut self) {
        self.log
            .lock()
            .push(format!("close {}", self.params.path_format));
    }
}

impl RecorderFactory for TestRecorders {
    fn start(&self, params: RecordParams, _stream: Stream) -> Box<dyn Recorder> {
        self.log.lock().push(format!("start {}", params.path_format));
        Box::new(TestRecorder {
            log: self.log.clone(),
            params,
        })
    }
}

/// Poll `check` until it holds or a second of (possibly paused) time passes
pub(crate) async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
