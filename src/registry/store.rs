//! Path registry handle
//!
//! The public face of the registry loop. Routing requests resolve and
//! create the path inside the loop, then talk to the path directly so that
//! a slow path never holds up the registry.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::{AccessRequest, AllowAll, Authenticator};
use crate::conf::{FoundConf, PathConf, PathConfs};
use crate::error::{PathError, Result};
use crate::hooks::{CommandPool, NoHooks, PathHooks};
use crate::path::{AddPublisherReq, DescribeOutcome, PathDeps, PathHandle};
use crate::recorder::RecorderFactory;
use crate::source::{IdleSourceFactory, Reader, StaticSourceFactory};
use crate::stats::PathSnapshot;
use crate::stream::Stream;

use super::actor::{RegistryActor, RegistryMessage};
use super::config::RegistryConfig;
use super::hls::HlsServer;

/// Central registry of live paths
///
/// Cheap to clone; all clones drive the same registry loop.
#[derive(Clone)]
pub struct PathRegistry {
    tx: mpsc::Sender<RegistryMessage>,
    token: CancellationToken,
    join: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl PathRegistry {
    /// Start a registry with default collaborators
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(confs: PathConfs) -> Self {
        Self::builder(confs).spawn()
    }

    /// Configure a registry before starting it
    pub fn builder(confs: PathConfs) -> RegistryBuilder {
        RegistryBuilder::new(confs)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> RegistryMessage) -> Result<T> {
        let (reply, rx) = oneshot::channel();

        tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(PathError::Terminated),
            sent = self.tx.send(make(reply)) => sent.map_err(|_| PathError::Terminated)?,
        }

        tokio::select! {
            biased;
            res = rx => res.map_err(|_| PathError::Terminated),
            _ = self.token.cancelled() => Err(PathError::Terminated),
        }
    }

    /// Resolve and authenticate the configuration of a path without
    /// creating it
    pub async fn find_path_conf(&self, access: AccessRequest) -> Result<FoundConf> {
        self.request(|reply| RegistryMessage::FindPathConf { access, reply })
            .await?
    }

    async fn acquire_path(
        &self,
        access: AccessRequest,
        conf_to_compare: Option<Arc<PathConf>>,
    ) -> Result<PathHandle> {
        self.request(|reply| RegistryMessage::AcquirePath {
            access,
            conf_to_compare,
            reply,
        })
        .await?
    }

    /// Ask for the stream of a path, or where to find it
    pub async fn describe(&self, access: AccessRequest) -> Result<DescribeOutcome> {
        let path = self.acquire_path(access.clone(), None).await?;
        path.describe(access).await
    }

    /// Publish to a path
    ///
    /// Returns the path, to detach from later, and the stream to write to.
    pub async fn add_publisher(&self, req: AddPublisherReq) -> Result<(PathHandle, Stream)> {
        let path = self
            .acquire_path(req.access.clone(), req.conf_to_compare.clone())
            .await?;
        let stream = path.add_publisher(req).await?;
        Ok((path, stream))
    }

    /// Read from a path
    ///
    /// Returns the path, to detach from later, and the stream to read from.
    pub async fn add_reader(
        &self,
        author: Arc<dyn Reader>,
        access: AccessRequest,
    ) -> Result<(PathHandle, Stream)> {
        let path = self.acquire_path(access.clone(), None).await?;
        let stream = path.add_reader(author, access).await?;
        Ok((path, stream))
    }

    /// Replace the whole configuration set
    ///
    /// Returns once every live path has been reloaded, recreated or
    /// destroyed as needed.
    pub async fn reload_path_confs(&self, confs: PathConfs) -> Result<()> {
        self.request(|reply| RegistryMessage::ReloadPathConfs { confs, reply })
            .await
    }

    /// Attach or detach the HLS front-end
    pub async fn set_hls_server(&self, server: Option<Arc<dyn HlsServer>>) -> Result<()> {
        self.request(|reply| RegistryMessage::SetHlsServer { server, reply })
            .await
    }

    /// Handle of a live path
    pub async fn get_path(&self, name: &str) -> Result<PathHandle> {
        let name = name.to_string();
        self.request(|reply| RegistryMessage::GetPath { name, reply })
            .await?
    }

    /// Snapshots of every live path, sorted by name
    pub async fn list_snapshots(&self) -> Result<Vec<PathSnapshot>> {
        let paths = self
            .request(|reply| RegistryMessage::ListPaths { reply })
            .await?;

        let mut snapshots = Vec::with_capacity(paths.len());
        for path in paths {
            // paths closing in the meantime are skipped
            if let Ok(snap) = path.snapshot().await {
                snapshots.push(snap);
            }
        }
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(snapshots)
    }

    /// Snapshot of a single path
    pub async fn get_snapshot(&self, name: &str) -> Result<PathSnapshot> {
        let path = self.get_path(name).await?;
        path.snapshot()
            .await
            .map_err(|_| PathError::NotFound(name.to_string()))
    }

    /// Destroy every path and stop the registry
    pub async fn close(&self) {
        self.token.cancel();

        let join = self.join.lock().take();
        if let Some(join) = join {
            if let Err(e) = join.await {
                tracing::warn!(error = %e, "Registry task failed");
            }
        }
    }
}

impl std::fmt::Debug for PathRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathRegistry")
            .field("closed", &self.token.is_cancelled())
            .finish()
    }
}

/// Builder for [`PathRegistry`]
pub struct RegistryBuilder {
    confs: PathConfs,
    config: RegistryConfig,
    authenticator: Arc<dyn Authenticator>,
    hooks: Arc<dyn PathHooks>,
    static_sources: Arc<dyn StaticSourceFactory>,
    recorders: Option<Arc<dyn RecorderFactory>>,
    hls: Option<Arc<dyn HlsServer>>,
}

impl RegistryBuilder {
    fn new(confs: PathConfs) -> Self {
        Self {
            confs,
            config: RegistryConfig::default(),
            authenticator: Arc::new(AllowAll),
            hooks: Arc::new(NoHooks),
            static_sources: Arc::new(IdleSourceFactory),
            recorders: None,
            hls: None,
        }
    }

    /// Set registry tuning
    pub fn config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the authenticator (default: allow everything)
    pub fn authenticator(mut self, authenticator: impl Authenticator) -> Self {
        self.authenticator = Arc::new(authenticator);
        self
    }

    /// Set the lifecycle observer
    pub fn hooks(mut self, hooks: impl PathHooks) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Set the factory of static source runners
    pub fn static_sources(mut self, factory: impl StaticSourceFactory) -> Self {
        self.static_sources = Arc::new(factory);
        self
    }

    /// Set the factory of recorders
    pub fn recorders(mut self, factory: impl RecorderFactory) -> Self {
        self.recorders = Some(Arc::new(factory));
        self
    }

    /// Attach an HLS front-end from the start
    pub fn hls_server(mut self, server: Arc<dyn HlsServer>) -> Self {
        self.hls = Some(server);
        self
    }

    /// Start the registry loop
    ///
    /// Fixed-name paths are created immediately. Must be called from within
    /// a Tokio runtime.
    pub fn spawn(self) -> PathRegistry {
        let (tx, inbox) = mpsc::channel(self.config.registry_inbox_capacity);
        let token = CancellationToken::new();

        let deps = Arc::new(PathDeps {
            hooks: self.hooks,
            static_sources: self.static_sources,
            recorders: self.recorders,
            commands: CommandPool::new(),
            config: self.config,
        });

        let actor = RegistryActor::new(
            self.confs,
            self.authenticator,
            self.hls,
            deps,
            inbox,
            token.clone(),
        );
        let join = tokio::spawn(actor.run());

        PathRegistry {
            tx,
            token,
            join: Arc::new(Mutex::new(Some(join))),
        }
    }
}
