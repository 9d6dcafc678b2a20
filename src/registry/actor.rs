//! Registry loop
//!
//! Owns the set of live paths. Requests, reloads and path events are
//! processed one at a time, so creating, destroying and replacing paths
//! never races with itself.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::{AccessRequest, Authenticator};
use crate::conf::{can_hot_reload, FoundConf, PathConf, PathConfs};
use crate::error::{PathError, Result};
use crate::path::{spawn_path, PathDeps, PathEvent, PathHandle};

use super::entry::PathEntry;
use super::hls::HlsServer;

type Reply<T> = tokio::sync::oneshot::Sender<T>;

pub(crate) enum RegistryMessage {
    FindPathConf {
        access: AccessRequest,
        reply: Reply<Result<FoundConf>>,
    },
    AcquirePath {
        access: AccessRequest,
        /// Publishers may require the path to still run with this configuration
        conf_to_compare: Option<Arc<PathConf>>,
        reply: Reply<Result<PathHandle>>,
    },
    ReloadPathConfs {
        confs: PathConfs,
        reply: Reply<()>,
    },
    SetHlsServer {
        server: Option<Arc<dyn HlsServer>>,
        reply: Reply<()>,
    },
    GetPath {
        name: String,
        reply: Reply<Result<PathHandle>>,
    },
    ListPaths {
        reply: Reply<Vec<PathHandle>>,
    },
}

pub(crate) struct RegistryActor {
    confs: PathConfs,
    paths: HashMap<String, PathEntry>,
    next_id: u64,

    authenticator: Arc<dyn Authenticator>,
    hls: Option<Arc<dyn HlsServer>>,
    deps: Arc<PathDeps>,

    inbox: mpsc::Receiver<RegistryMessage>,
    events_rx: mpsc::Receiver<PathEvent>,
    events_tx: mpsc::Sender<PathEvent>,
    token: CancellationToken,
}

impl RegistryActor {
    pub fn new(
        confs: PathConfs,
        authenticator: Arc<dyn Authenticator>,
        hls: Option<Arc<dyn HlsServer>>,
        deps: Arc<PathDeps>,
        inbox: mpsc::Receiver<RegistryMessage>,
        token: CancellationToken,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(deps.config.event_capacity);

        Self {
            confs,
            paths: HashMap::new(),
            next_id: 0,
            authenticator,
            hls,
            deps,
            inbox,
            events_rx,
            events_tx,
            token,
        }
    }

    pub async fn run(mut self) {
        self.create_fixed_paths();

        tracing::info!(confs = self.confs.len(), paths = self.paths.len(), "Path registry started");

        loop {
            tokio::select! {
                biased;

                _ = self.token.cancelled() => break,

                Some(event) = self.events_rx.recv() => self.handle_event(event),

                msg = self.inbox.recv() => match msg {
                    Some(msg) => self.handle(msg).await,
                    None => break,
                },
            }
        }

        self.shutdown().await;
    }

    async fn handle(&mut self, msg: RegistryMessage) {
        match msg {
            RegistryMessage::FindPathConf { access, reply } => {
                let _ = reply.send(self.find_path_conf(&access));
            }
            RegistryMessage::AcquirePath {
                access,
                conf_to_compare,
                reply,
            } => {
                let res = self.acquire_path(&access, conf_to_compare.as_deref()).await;
                let _ = reply.send(res);
            }
            RegistryMessage::ReloadPathConfs { confs, reply } => {
                self.reload_path_confs(confs).await;
                let _ = reply.send(());
            }
            RegistryMessage::SetHlsServer { server, reply } => {
                self.set_hls_server(server);
                let _ = reply.send(());
            }
            RegistryMessage::GetPath { name, reply } => {
                let res = self
                    .paths
                    .get(&name)
                    .map(|entry| entry.handle.clone())
                    .ok_or(PathError::NotFound(name));
                let _ = reply.send(res);
            }
            RegistryMessage::ListPaths { reply } => {
                let mut handles: Vec<PathHandle> =
                    self.paths.values().map(|e| e.handle.clone()).collect();
                handles.sort_by(|a, b| a.name().cmp(b.name()));
                let _ = reply.send(handles);
            }
        }
    }

    fn handle_event(&mut self, event: PathEvent) {
        match event {
            PathEvent::Ready(handle) => {
                let Some(entry) = self.paths.get_mut(handle.name()) else {
                    return;
                };
                if !entry.is(&handle) {
                    return;
                }
                entry.ready = true;
                if let Some(hls) = &self.hls {
                    hls.path_ready(&handle);
                }
            }

            PathEvent::NotReady(handle) => {
                let Some(entry) = self.paths.get_mut(handle.name()) else {
                    return;
                };
                if !entry.is(&handle) {
                    return;
                }
                entry.ready = false;
                if let Some(hls) = &self.hls {
                    hls.path_not_ready(&handle);
                }
            }

            PathEvent::Closed(handle) => {
                let owned = self
                    .paths
                    .get(handle.name())
                    .is_some_and(|entry| entry.is(&handle));
                if !owned {
                    return;
                }

                if let Some(entry) = self.paths.remove(handle.name()) {
                    if entry.ready {
                        if let Some(hls) = &self.hls {
                            hls.path_not_ready(&handle);
                        }
                    }
                }

                tracing::debug!(path = %handle.name(), "Path closed itself");
            }
        }
    }

    fn find_path_conf(&self, access: &AccessRequest) -> Result<FoundConf> {
        let found = self.confs.find(&access.name)?;
        self.authenticate(access)?;
        Ok(found)
    }

    fn authenticate(&self, access: &AccessRequest) -> Result<()> {
        if access.skip_auth {
            return Ok(());
        }
        self.authenticator
            .authenticate(&access.to_auth_request())
            .map_err(PathError::from)
    }

    /// Resolve, authenticate and return the path serving a request,
    /// creating it if needed
    ///
    /// A publisher expecting a configuration other than the resolved one is
    /// turned away before any path is created.
    async fn acquire_path(
        &mut self,
        access: &AccessRequest,
        conf_to_compare: Option<&PathConf>,
    ) -> Result<PathHandle> {
        let found = self.confs.find(&access.name)?;

        if let Some(expected) = conf_to_compare {
            if *expected != *found.conf {
                tracing::warn!(path = %access.name, "Publisher rejected, configuration has changed");
                return Err(PathError::ConfigurationChanged);
            }
        }

        self.authenticate(access)?;

        if let Some(entry) = self.paths.get(&access.name) {
            if !entry.handle.is_terminated() {
                return Ok(entry.handle.clone());
            }

            // the previous actor is on its way out; wait for it before
            // starting a new one under the same name
            if let Some(entry) = self.paths.remove(&access.name) {
                let handle = entry.handle.clone();
                if entry.destroy().await {
                    if let Some(hls) = &self.hls {
                        hls.path_not_ready(&handle);
                    }
                }
            }
        }

        Ok(self.create_path(found.conf, &access.name, found.matches))
    }

    fn create_path(&mut self, conf: Arc<PathConf>, name: &str, matches: Vec<String>) -> PathHandle {
        self.next_id += 1;

        let spawned = spawn_path(
            name,
            self.next_id,
            conf,
            matches,
            &self.token,
            self.events_tx.clone(),
            Arc::clone(&self.deps),
        );
        let handle = spawned.handle.clone();
        self.paths.insert(name.to_string(), PathEntry::new(spawned));

        handle
    }

    fn create_fixed_paths(&mut self) {
        let missing: Vec<(String, Arc<PathConf>)> = self
            .confs
            .iter()
            .filter(|(name, conf)| conf.regexp.is_none() && !self.paths.contains_key(*name))
            .map(|(name, conf)| (name.clone(), Arc::clone(conf)))
            .collect();

        for (name, conf) in missing {
            self.create_path(conf, &name, Vec::new());
        }
    }

    async fn remove_and_close(&mut self, name: &str) {
        let Some(entry) = self.paths.remove(name) else {
            return;
        };

        let handle = entry.handle.clone();
        if entry.destroy().await {
            if let Some(hls) = &self.hls {
                hls.path_not_ready(&handle);
            }
        }
    }

    async fn reload_path_confs(&mut self, new_confs: PathConfs) {
        let mut to_recreate = HashSet::new();
        let mut to_reload = HashSet::new();

        for (name, old) in self.confs.iter() {
            match new_confs.get(name) {
                Some(new) if new != old => {
                    if can_hot_reload(old, new) {
                        to_reload.insert(name.clone());
                    } else {
                        to_recreate.insert(name.clone());
                    }
                }
                Some(_) => {}
                None => {
                    to_recreate.insert(name.clone());
                }
            }
        }

        let mut names: Vec<String> = self.paths.keys().cloned().collect();
        names.sort();

        for name in names {
            let Some(current) = self.paths.get(&name).map(PathEntry::conf) else {
                continue;
            };

            let found = match new_confs.find(&name) {
                Ok(found) => found,
                Err(_) => {
                    tracing::info!(path = %name, "Path is no longer configured, destroying");
                    self.remove_and_close(&name).await;
                    continue;
                }
            };

            // the path is now governed by a different configuration
            if found.conf.name != current.name {
                if can_hot_reload(&current, &found.conf) {
                    tracing::info!(path = %name, conf = %found.conf.name, "Moving path to a new configuration");
                    if let Some(entry) = self.paths.get(&name) {
                        entry.reload(found.conf);
                    }
                } else {
                    tracing::info!(path = %name, conf = %found.conf.name, "Configuration replaced, recreating path");
                    self.remove_and_close(&name).await;
                }
                continue;
            }

            if to_recreate.contains(&found.conf.name) {
                tracing::info!(path = %name, "Configuration changed, recreating path");
                self.remove_and_close(&name).await;
                continue;
            }

            if to_reload.contains(&found.conf.name) {
                tracing::info!(path = %name, "Configuration changed, reloading path");
                if let Some(entry) = self.paths.get(&name) {
                    entry.reload(found.conf);
                }
            }
        }

        self.confs = new_confs;
        self.create_fixed_paths();

        tracing::debug!(
            recreated = to_recreate.len(),
            reloaded = to_reload.len(),
            paths = self.paths.len(),
            "Path configurations reloaded"
        );
    }

    fn set_hls_server(&mut self, server: Option<Arc<dyn HlsServer>>) {
        if let Some(server) = &server {
            let mut ready: Vec<&PathEntry> = self.paths.values().filter(|e| e.ready).collect();
            ready.sort_by(|a, b| a.handle.name().cmp(b.handle.name()));
            for entry in ready {
                server.path_ready(&entry.handle);
            }
        }
        self.hls = server;
    }

    async fn shutdown(mut self) {
        self.token.cancel();

        for (_, entry) in self.paths.drain() {
            entry.destroy().await;
        }

        // teardowns may have launched final commands
        self.deps.commands.close().await;

        tracing::info!("Path registry closed");
    }
}
