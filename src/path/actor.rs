//! Path actor
//!
//! Owns every piece of mutable state of one path and processes one event at
//! a time: inbox messages, configuration reloads and on-demand timers. The
//! configuration pointer is the only state shared with the outside, behind
//! a read/write guard.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::AccessRequest;
use crate::conf::{record_changed, PathConf, SourceKind};
use crate::error::{PathError, Result};
use crate::hooks::{CommandHooks, CommandPool, PathHooks, Teardown};
use crate::recorder::{RecordParams, Recorder, RecorderFactory};
use crate::registry::RegistryConfig;
use crate::source::{
    identity, Publisher, Reader, SourceDescriptor, StaticSource, StaticSourceFactory,
    StaticSourceParams,
};
use crate::stats::PathSnapshot;
use crate::stream::{MediaDescription, Stream};

use super::handle::{PathHandle, SourceParent};
use super::on_demand::OnDemand;
use super::request::{
    AddPublisherReq, DescribeOutcome, PathMessage, PendingDescribe, PendingReader, Reply,
};

/// Collaborators shared by every path of a registry
pub(crate) struct PathDeps {
    pub hooks: Arc<dyn PathHooks>,
    pub static_sources: Arc<dyn StaticSourceFactory>,
    pub recorders: Option<Arc<dyn RecorderFactory>>,
    pub commands: CommandPool,
    pub config: RegistryConfig,
}

/// Notifications a path sends to its registry
pub(crate) enum PathEvent {
    Ready(PathHandle),
    NotReady(PathHandle),
    Closed(PathHandle),
}

/// A freshly spawned path
pub(crate) struct SpawnedPath {
    pub handle: PathHandle,
    pub conf_tx: watch::Sender<Arc<PathConf>>,
    pub join: JoinHandle<()>,
}

/// Spawn the actor of a path
///
/// The actor is cancelled together with `parent`.
pub(crate) fn spawn_path(
    name: &str,
    id: u64,
    conf: Arc<PathConf>,
    matches: Vec<String>,
    parent: &CancellationToken,
    events: mpsc::Sender<PathEvent>,
    deps: Arc<PathDeps>,
) -> SpawnedPath {
    let (tx, inbox) = mpsc::channel(deps.config.path_inbox_capacity);
    let (conf_tx, conf_rx) = watch::channel(Arc::clone(&conf));
    let token = parent.child_token();
    let shared_conf = Arc::new(RwLock::new(Arc::clone(&conf)));
    let handle = PathHandle::new(name, id, tx, token.clone(), Arc::clone(&shared_conf));
    let command_hooks = CommandHooks::new(
        deps.commands.clone(),
        name,
        &deps.config.rtsp_address,
        &matches,
    );

    let actor = PathActor {
        name: name.to_string(),
        conf,
        shared_conf,
        matches,
        handle: handle.clone(),
        inbox,
        conf_rx,
        token,
        events,
        deps,
        command_hooks,
        source: None,
        stream: None,
        ready_time: None,
        query: String::new(),
        readers: HashMap::new(),
        describe_on_hold: Vec::new(),
        readers_on_hold: Vec::new(),
        static_on_demand: OnDemand::default(),
        publisher_on_demand: OnDemand::default(),
        recorder: None,
        on_uninit: None,
        on_not_ready: None,
        on_undemand: None,
    };

    let join = tokio::spawn(actor.run());

    SpawnedPath {
        handle,
        conf_tx,
        join,
    }
}

enum Source {
    Redirect,
    Publisher(Arc<dyn Publisher>),
    Static(Box<dyn StaticSource>),
}

struct PathActor {
    name: String,
    conf: Arc<PathConf>,
    shared_conf: Arc<RwLock<Arc<PathConf>>>,
    matches: Vec<String>,
    handle: PathHandle,

    inbox: mpsc::Receiver<PathMessage>,
    conf_rx: watch::Receiver<Arc<PathConf>>,
    token: CancellationToken,
    events: mpsc::Sender<PathEvent>,

    deps: Arc<PathDeps>,
    command_hooks: CommandHooks,

    source: Option<Source>,
    stream: Option<Stream>,
    ready_time: Option<SystemTime>,
    /// Query of the request that activated the source
    query: String,

    /// Attached readers keyed by identity
    readers: HashMap<usize, Arc<dyn Reader>>,
    describe_on_hold: Vec<PendingDescribe>,
    readers_on_hold: Vec<PendingReader>,

    static_on_demand: OnDemand,
    publisher_on_demand: OnDemand,

    recorder: Option<Box<dyn Recorder>>,

    on_uninit: Option<Teardown>,
    on_not_ready: Option<Teardown>,
    on_undemand: Option<Teardown>,
}

impl PathActor {
    async fn run(mut self) {
        self.initialize();
        let reason = self.run_inner().await;
        self.shutdown(reason).await;
    }

    fn initialize(&mut self) {
        if self.conf.source == SourceKind::Redirect {
            self.source = Some(Source::Redirect);
        } else if self.conf.has_static_source() {
            let mut source = self.deps.static_sources.create(StaticSourceParams {
                name: self.name.clone(),
                conf: Arc::clone(&self.conf),
                matches: self.matches.clone(),
                parent: SourceParent::new(self.handle.clone()),
            });
            if !self.conf.source_on_demand {
                source.start(false, "");
            }
            self.source = Some(Source::Static(source));
        }

        self.on_uninit = Some(self.command_hooks.on_init(&self.conf));
        self.deps.hooks.on_init(&self.handle);

        tracing::debug!(path = %self.name, conf = %self.conf.name, "Path created");
    }

    async fn run_inner(&mut self) -> &'static str {
        loop {
            let check_close = tokio::select! {
                biased;

                _ = self.token.cancelled() => return "terminated",

                changed = self.conf_rx.changed() => {
                    if changed.is_err() {
                        return "terminated";
                    }
                    let conf = Arc::clone(&self.conf_rx.borrow_and_update());
                    self.reload_conf(conf);
                    false
                }

                _ = self.static_on_demand.ready_timer.wait() => {
                    self.fail_on_hold(PathError::SourceTimedOut(self.name.clone()));
                    self.static_on_demand_stop("timed out");
                    true
                }

                _ = self.static_on_demand.close_timer.wait() => {
                    if self.stream.is_some() {
                        self.set_not_ready().await;
                    }
                    self.static_on_demand_stop("not needed by anyone");
                    true
                }

                _ = self.publisher_on_demand.ready_timer.wait() => {
                    self.fail_on_hold(PathError::SourceTimedOut(self.name.clone()));
                    self.publisher_on_demand_stop("timed out");
                    true
                }

                _ = self.publisher_on_demand.close_timer.wait() => {
                    self.publisher_on_demand_stop("not needed by anyone");
                    false
                }

                msg = self.inbox.recv() => match msg {
                    Some(msg) => self.handle(msg).await,
                    None => return "terminated",
                },
            };

            if check_close && self.should_close() {
                return "not in use";
            }
        }
    }

    /// Process an inbox message; returns whether the path may have become unused
    async fn handle(&mut self, msg: PathMessage) -> bool {
        match msg {
            PathMessage::Describe { access, reply } => {
                self.describe(access, reply);
                true
            }
            PathMessage::AddPublisher { req, reply } => {
                let res = self.add_publisher(req).await;
                let rejected = res.is_err();
                let _ = reply.send(res);
                rejected
            }
            PathMessage::RemovePublisher { author, reply } => {
                self.remove_publisher(author).await;
                let _ = reply.send(());
                true
            }
            PathMessage::AddReader {
                author,
                access,
                reply,
            } => {
                self.add_reader(author, access, reply);
                true
            }
            PathMessage::RemoveReader { author, reply } => {
                self.remove_reader(author);
                let _ = reply.send(());
                false
            }
            PathMessage::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
                false
            }
            PathMessage::SourceReady {
                desc,
                generate_rtp_packets,
                reply,
            } => {
                let res = self.static_source_ready(desc, generate_rtp_packets).await;
                let _ = reply.send(res);
                false
            }
            PathMessage::SourceNotReady { reply } => {
                self.static_source_not_ready().await;
                let _ = reply.send(());
                true
            }
        }
    }

    fn should_close(&self) -> bool {
        self.conf.regexp.is_some()
            && self.source.is_none()
            && self.readers.is_empty()
            && self.describe_on_hold.is_empty()
            && self.readers_on_hold.is_empty()
    }

    fn describe(&mut self, access: AccessRequest, reply: Reply<Result<DescribeOutcome>>) {
        if matches!(self.source, Some(Source::Redirect)) {
            let target = self.conf.source_redirect.clone();
            tracing::debug!(path = %self.name, target = %target, "Redirecting describe");
            let _ = reply.send(Ok(DescribeOutcome::Redirect(target)));
            return;
        }

        if let Some(stream) = &self.stream {
            let _ = reply.send(Ok(DescribeOutcome::Stream(stream.clone())));
            return;
        }

        if self.conf.has_on_demand_static_source() {
            if self.static_on_demand.is_initial() {
                self.static_on_demand_start(&access.query);
            }
            self.describe_on_hold.push(PendingDescribe { reply });
            return;
        }

        if self.conf.has_on_demand_publisher() {
            if self.publisher_on_demand.is_initial() {
                self.publisher_on_demand_start(&access.query);
            }
            self.describe_on_hold.push(PendingDescribe { reply });
            return;
        }

        if !self.conf.fallback.is_empty() {
            let _ = reply.send(Ok(DescribeOutcome::Redirect(self.conf.fallback.clone())));
            return;
        }

        let _ = reply.send(Err(PathError::NoStreamAvailable(self.name.clone())));
    }

    async fn add_publisher(&mut self, req: AddPublisherReq) -> Result<Stream> {
        if self.conf.source != SourceKind::Publisher {
            return Err(PathError::NotPublisherSource(self.name.clone()));
        }

        if let Some(expected) = &req.conf_to_compare {
            if **expected != *self.conf {
                tracing::warn!(path = %self.name, "Publisher rejected, configuration has changed");
                return Err(PathError::ConfigurationChanged);
            }
        }

        if req.desc.is_empty() {
            return Err(PathError::EmptyDescription(self.name.clone()));
        }

        let current = match &self.source {
            Some(Source::Publisher(current)) => Some(Arc::clone(current)),
            _ => None,
        };

        if let Some(current) = current {
            if !self.conf.override_publisher {
                tracing::warn!(path = %self.name, "Publisher rejected, someone is already publishing");
                return Err(PathError::AlreadyPublishing(self.name.clone()));
            }

            tracing::info!(path = %self.name, publisher = %current.describe().id, "Closing existing publisher");
            current.close();
            self.execute_remove_publisher().await;
        }

        let descriptor = req.author.describe();
        self.source = Some(Source::Publisher(req.author));
        self.query = req.access.query;

        let stream = match self.set_ready(req.desc, req.generate_rtp_packets).await {
            Ok(stream) => stream,
            Err(e) => {
                self.source = None;
                return Err(e);
            }
        };

        tracing::info!(
            path = %self.name,
            kind = %descriptor.kind,
            publisher = %descriptor.id,
            "Publisher attached"
        );

        if self.conf.has_on_demand_publisher() && !self.publisher_on_demand.is_initial() {
            self.publisher_on_demand
                .ready(self.conf.run_on_demand_close_after);
        }

        self.consume_on_hold_requests();

        Ok(stream)
    }

    async fn remove_publisher(&mut self, author: Arc<dyn Publisher>) {
        let is_current = matches!(
            &self.source,
            Some(Source::Publisher(current)) if identity(current) == identity(&author)
        );

        if is_current {
            self.execute_remove_publisher().await;
            tracing::info!(path = %self.name, publisher = %author.describe().id, "Publisher detached");
        }
    }

    async fn execute_remove_publisher(&mut self) {
        if self.stream.is_some() {
            self.set_not_ready().await;
        }
        self.source = None;
    }

    fn add_reader(&mut self, author: Arc<dyn Reader>, access: AccessRequest, reply: Reply<Result<Stream>>) {
        if self.stream.is_some() {
            self.add_reader_post(author, reply);
            return;
        }

        if self.conf.has_on_demand_static_source() {
            if self.static_on_demand.is_initial() {
                self.static_on_demand_start(&access.query);
            }
            self.readers_on_hold.push(PendingReader { author, reply });
            return;
        }

        if self.conf.has_on_demand_publisher() {
            if self.publisher_on_demand.is_initial() {
                self.publisher_on_demand_start(&access.query);
            }
            self.readers_on_hold.push(PendingReader { author, reply });
            return;
        }

        let _ = reply.send(Err(PathError::NoStreamAvailable(self.name.clone())));
    }

    fn add_reader_post(&mut self, author: Arc<dyn Reader>, reply: Reply<Result<Stream>>) {
        let Some(stream) = self.stream.clone() else {
            let _ = reply.send(Err(PathError::NoStreamAvailable(self.name.clone())));
            return;
        };

        let key = identity(&author);
        if self.readers.contains_key(&key) {
            let _ = reply.send(Ok(stream));
            return;
        }

        if self.conf.max_readers != 0 && self.readers.len() >= self.conf.max_readers {
            tracing::warn!(
                path = %self.name,
                max_readers = self.conf.max_readers,
                "Reader rejected, maximum reader count reached"
            );
            let _ = reply.send(Err(PathError::MaxReadersReached(self.name.clone())));
            return;
        }

        let descriptor = author.describe();
        self.readers.insert(key, author);

        if self.conf.has_on_demand_static_source() {
            self.static_on_demand.reader_attached();
        }
        if self.conf.has_on_demand_publisher() {
            self.publisher_on_demand.reader_attached();
        }

        tracing::info!(
            path = %self.name,
            kind = %descriptor.kind,
            reader = %descriptor.id,
            readers = self.readers.len(),
            "Reader attached"
        );

        let _ = reply.send(Ok(stream));
    }

    fn remove_reader(&mut self, author: Arc<dyn Reader>) {
        if self.readers.remove(&identity(&author)).is_some() {
            tracing::info!(
                path = %self.name,
                reader = %author.describe().id,
                readers = self.readers.len(),
                "Reader detached"
            );
        }

        if self.readers.is_empty() {
            if self.conf.has_on_demand_static_source() {
                self.static_on_demand
                    .readers_gone(self.conf.source_on_demand_close_after);
            }
            if self.conf.has_on_demand_publisher() {
                self.publisher_on_demand
                    .readers_gone(self.conf.run_on_demand_close_after);
            }
        }
    }

    async fn static_source_ready(
        &mut self,
        desc: MediaDescription,
        generate_rtp_packets: bool,
    ) -> Result<Stream> {
        if self.stream.is_some() {
            self.set_not_ready().await;
        }

        let stream = self.set_ready(desc, generate_rtp_packets).await?;

        if self.conf.has_on_demand_static_source() {
            self.static_on_demand
                .ready(self.conf.source_on_demand_close_after);
        }

        self.consume_on_hold_requests();

        Ok(stream)
    }

    async fn static_source_not_ready(&mut self) {
        if self.stream.is_some() {
            self.set_not_ready().await;
        }

        if self.conf.has_on_demand_static_source() && !self.static_on_demand.is_initial() {
            self.static_on_demand_stop("an error occurred");
        }
    }

    async fn set_ready(&mut self, desc: MediaDescription, generate_rtp_packets: bool) -> Result<Stream> {
        let stream = Stream::new(
            &self.name,
            desc,
            generate_rtp_packets,
            self.deps.config.stream_capacity,
        )?;

        self.stream = Some(stream.clone());
        self.ready_time = Some(SystemTime::now());

        if self.conf.record {
            self.start_recording();
        }

        let source = self.source_descriptor();
        self.on_not_ready = Some(
            self.command_hooks
                .on_ready(&self.conf, source.as_ref(), &self.query),
        );
        self.deps.hooks.on_ready(&self.handle);

        tracing::info!(path = %self.name, tracks = %stream.desc(), "Stream is ready");

        let notified = self.notify(PathEvent::Ready(self.handle.clone()));
        notified.await;

        Ok(stream)
    }

    async fn set_not_ready(&mut self) {
        let notified = self.notify(PathEvent::NotReady(self.handle.clone()));
        notified.await;

        for (_, reader) in self.readers.drain() {
            reader.close();
        }

        if let Some(teardown) = self.on_not_ready.take() {
            teardown("not ready");
        }
        self.deps.hooks.on_not_ready(&self.handle);

        self.stop_recording();

        if let Some(stream) = self.stream.take() {
            stream.close();
        }
        self.ready_time = None;

        tracing::info!(path = %self.name, "Stream is not ready");
    }

    fn consume_on_hold_requests(&mut self) {
        let Some(stream) = self.stream.clone() else {
            return;
        };

        for req in self.describe_on_hold.drain(..) {
            let _ = req
                .reply
                .send(Ok(DescribeOutcome::Stream(stream.clone())));
        }

        for req in std::mem::take(&mut self.readers_on_hold) {
            // the caller gave up while waiting
            if req.reply.is_closed() {
                continue;
            }
            self.add_reader_post(req.author, req.reply);
        }
    }

    fn fail_on_hold(&mut self, err: PathError) {
        for req in self.describe_on_hold.drain(..) {
            let _ = req.reply.send(Err(err.clone()));
        }
        for req in self.readers_on_hold.drain(..) {
            let _ = req.reply.send(Err(err.clone()));
        }
    }

    fn static_on_demand_start(&mut self, query: &str) {
        if let Some(Source::Static(source)) = &mut self.source {
            source.start(true, query);
        }
        self.query = query.to_string();
        self.static_on_demand
            .begin(self.conf.source_on_demand_start_timeout);
        self.deps.hooks.on_demand_static(&self.handle, query);

        tracing::info!(path = %self.name, "Starting on-demand static source");
    }

    fn static_on_demand_stop(&mut self, reason: &str) {
        self.static_on_demand.reset();
        if let Some(Source::Static(source)) = &mut self.source {
            source.stop(reason);
        }
        self.deps.hooks.on_undemand_static(&self.handle, reason);

        tracing::info!(path = %self.name, reason = reason, "Stopping on-demand static source");
    }

    fn publisher_on_demand_start(&mut self, query: &str) {
        self.on_undemand = Some(self.command_hooks.on_demand(&self.conf, query));
        self.publisher_on_demand
            .begin(self.conf.run_on_demand_start_timeout);
        self.deps.hooks.on_demand(&self.handle, query);

        tracing::info!(path = %self.name, "Waiting for on-demand publisher");
    }

    fn publisher_on_demand_stop(&mut self, reason: &str) {
        self.publisher_on_demand.reset();
        if let Some(teardown) = self.on_undemand.take() {
            teardown(reason);
        }
        self.deps.hooks.on_undemand(&self.handle, reason);

        tracing::info!(path = %self.name, reason = reason, "Stopping on-demand publisher");
    }

    fn start_recording(&mut self) {
        let Some(stream) = self.stream.clone() else {
            return;
        };
        let Some(factory) = self.deps.recorders.clone() else {
            tracing::warn!(path = %self.name, "Recording enabled but no recorder is configured");
            return;
        };

        let mut params = RecordParams::from_conf(&self.name, &self.conf);
        let (on_create, on_complete) = self.command_hooks.segment_hooks(&self.conf);
        params.on_segment_create = on_create;
        params.on_segment_complete = on_complete;

        tracing::info!(path = %self.name, record_path = %params.path_format, "Recording started");
        self.recorder = Some(factory.start(params, stream));
    }

    fn stop_recording(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.close();
            tracing::info!(path = %self.name, "Recording stopped");
        }
    }

    fn reload_conf(&mut self, conf: Arc<PathConf>) {
        let old = std::mem::replace(&mut self.conf, Arc::clone(&conf));
        *self.shared_conf.write() = Arc::clone(&conf);

        if let Some(Source::Static(source)) = &mut self.source {
            source.reload_conf(Arc::clone(&conf));
        }

        if self.stream.is_some() && record_changed(&old, &conf) {
            self.stop_recording();
            if conf.record {
                self.start_recording();
            }
        }

        tracing::info!(path = %self.name, conf = %conf.name, "Configuration reloaded");
    }

    fn source_descriptor(&self) -> Option<SourceDescriptor> {
        match self.source.as_ref()? {
            Source::Redirect => Some(SourceDescriptor::new(
                "redirect",
                self.conf.source_redirect.clone(),
            )),
            Source::Publisher(publisher) => Some(publisher.describe()),
            Source::Static(source) => Some(source.describe()),
        }
    }

    fn snapshot(&self) -> PathSnapshot {
        let mut snap = PathSnapshot::idle(self.name.clone(), self.conf.name.clone());
        snap.source = self.source_descriptor();
        snap.readers = self.readers.values().map(|r| r.describe()).collect();

        if let Some(stream) = &self.stream {
            snap.ready = true;
            snap.ready_time = self.ready_time;
            snap.tracks = stream.desc().codecs();
            snap.bytes_received = stream.bytes_received();
            snap.bytes_sent = stream.bytes_sent();
        }

        snap
    }

    /// Deliver an event to the registry unless this path is being cancelled
    fn notify(&self, event: PathEvent) -> impl Future<Output = ()> + Send + 'static {
        let token = self.token.clone();
        let events = self.events.clone();
        let name = self.name.clone();

        async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                sent = events.send(event) => {
                    if sent.is_err() {
                        tracing::debug!(path = %name, "Registry is gone, event dropped");
                    }
                }
            }
        }
    }

    async fn shutdown(mut self, reason: &str) {
        let notified = self.notify(PathEvent::Closed(self.handle.clone()));
        notified.await;
        self.token.cancel();

        self.static_on_demand.stop_timers();
        self.publisher_on_demand.stop_timers();

        if let Some(teardown) = self.on_uninit.take() {
            teardown(reason);
        }
        self.deps.hooks.on_uninit(&self.handle);

        self.fail_on_hold(PathError::Terminated);

        if self.stream.is_some() {
            self.set_not_ready().await;
        }

        match self.source.take() {
            Some(Source::Static(mut source)) => {
                if !self.conf.source_on_demand || !self.static_on_demand.is_initial() {
                    source.close("path is closing");
                }
            }
            Some(Source::Publisher(publisher)) => publisher.close(),
            Some(Source::Redirect) | None => {}
        }

        if !self.publisher_on_demand.is_initial() {
            self.publisher_on_demand_stop("path destroyed");
        }

        tracing::debug!(path = %self.name, reason = reason, "Path destroyed");
    }
}
