//! Registry bookkeeping for a live path

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::conf::PathConf;
use crate::path::{PathHandle, SpawnedPath};

/// A path owned by the registry
pub(crate) struct PathEntry {
    pub handle: PathHandle,
    /// Delivers hot-reloaded configurations to the actor
    pub conf_tx: watch::Sender<Arc<PathConf>>,
    pub join: JoinHandle<()>,
    /// Last readiness reported by the actor
    pub ready: bool,
}

impl PathEntry {
    pub fn new(spawned: SpawnedPath) -> Self {
        Self {
            handle: spawned.handle,
            conf_tx: spawned.conf_tx,
            join: spawned.join,
            ready: false,
        }
    }

    /// Whether an event from `handle` concerns this entry
    pub fn is(&self, handle: &PathHandle) -> bool {
        self.handle.same_as(handle)
    }

    /// Configuration most recently handed to the actor
    ///
    /// Unlike the handle's view this is current as soon as `reload` returns.
    pub fn conf(&self) -> Arc<PathConf> {
        Arc::clone(&self.conf_tx.borrow())
    }

    /// Hand a new configuration to the running actor
    pub fn reload(&self, conf: Arc<PathConf>) {
        self.conf_tx.send_replace(conf);
    }

    /// Cancel the actor and wait until it is gone
    pub async fn destroy(self) -> bool {
        self.handle.cancel();
        if let Err(e) = self.join.await {
            tracing::warn!(path = %self.handle.name(), error = %e, "Path task failed");
        }
        self.ready
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::hooks::{CommandPool, NoHooks};
    use crate::path::{spawn_path, PathDeps};
    use crate::registry::RegistryConfig;
    use crate::test_support::FakeSourceFactory;

    fn entry(conf: PathConf, token: &CancellationToken) -> PathEntry {
        let (events_tx, _events) = mpsc::channel(8);
        let deps = Arc::new(PathDeps {
            hooks: Arc::new(NoHooks),
            static_sources: Arc::new(FakeSourceFactory::default()),
            recorders: None,
            commands: CommandPool::new(),
            config: RegistryConfig::default(),
        });
        let name = conf.name.clone();
        PathEntry::new(spawn_path(&name, 1, Arc::new(conf), Vec::new(), token, events_tx, deps))
    }

    #[tokio::test]
    async fn test_conf_follows_reload_immediately() {
        let token = CancellationToken::new();
        let entry = entry(PathConf::new("~^eph/.+$").unwrap(), &token);

        // no await in between: the actor has not seen either update yet
        entry.reload(Arc::new(PathConf::new("~^eph/(.+)$").unwrap()));
        assert_eq!(entry.conf().name, "~^eph/(.+)$");

        entry.reload(Arc::new(PathConf::new("~^eph/(.+)$").unwrap().record("/data")));
        assert_eq!(entry.conf().record_path, "/data");

        entry.destroy().await;
    }
}
