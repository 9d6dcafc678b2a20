//! External command hooks
//!
//! Commands are run through the system shell with an environment describing
//! the path. A command started with `restart` is launched again after it
//! exits, until its teardown runs.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::conf::PathConf;
use crate::recorder::{SegmentCompleteHook, SegmentCreateHook};
use crate::source::SourceDescriptor;

/// Pause before relaunching a command that exited
const RESTART_PAUSE: Duration = Duration::from_secs(5);

/// Environment variables passed to a command
pub type Environment = HashMap<String, String>;

/// Undoes a hook; receives the reason the hook is being torn down
pub type Teardown = Box<dyn FnOnce(&str) + Send>;

/// A teardown that does nothing
pub fn noop_teardown() -> Teardown {
    Box::new(|_| {})
}

/// Keeps track of launched commands so shutdown can wait for them
#[derive(Debug, Clone, Default)]
pub struct CommandPool {
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CommandPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Number of commands still running
    pub fn running(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }

    /// Wait until every command has exited
    ///
    /// Commands are stopped by their owners; this only waits.
    pub async fn close(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Command task failed");
            }
        }
    }
}

/// A running external command
pub struct ExternalCmd {
    token: CancellationToken,
}

impl ExternalCmd {
    /// Launch a command line
    ///
    /// Must be called from within a Tokio runtime; outside of one the command
    /// is not launched.
    pub fn spawn(
        pool: &CommandPool,
        path: &str,
        cmdline: &str,
        restart: bool,
        env: Environment,
    ) -> Self {
        let token = CancellationToken::new();

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(path = %path, cmd = %cmdline, "No runtime available, command not launched");
                return Self { token };
            }
        };

        let path = path.to_string();
        let cmdline = cmdline.to_string();
        let cancel = token.clone();

        let task = handle.spawn(async move {
            loop {
                let mut child = match shell(&cmdline)
                    .envs(&env)
                    .stdin(Stdio::null())
                    .kill_on_drop(true)
                    .spawn()
                {
                    Ok(child) => child,
                    Err(e) => {
                        tracing::warn!(path = %path, cmd = %cmdline, error = %e, "Failed to launch command");
                        if !restart {
                            return;
                        }
                        tokio::select! {
                            _ = tokio::time::sleep(RESTART_PAUSE) => continue,
                            _ = cancel.cancelled() => return,
                        }
                    }
                };

                tokio::select! {
                    status = child.wait() => {
                        match status {
                            Ok(status) => tracing::info!(path = %path, cmd = %cmdline, %status, "Command exited"),
                            Err(e) => tracing::warn!(path = %path, cmd = %cmdline, error = %e, "Command wait failed"),
                        }
                    }
                    _ = cancel.cancelled() => {
                        if let Err(e) = child.kill().await {
                            tracing::debug!(path = %path, error = %e, "Failed to kill command");
                        }
                        return;
                    }
                }

                if !restart {
                    return;
                }

                tokio::select! {
                    _ = tokio::time::sleep(RESTART_PAUSE) => {}
                    _ = cancel.cancelled() => return,
                }
            }
        });
        pool.track(task);

        Self { token }
    }

    /// Kill the command and stop restarting it
    pub fn close(self) {
        self.token.cancel();
    }
}

#[cfg(unix)]
fn shell(cmdline: &str) -> Command {
    let mut cmd = Command::new("/bin/sh");
    cmd.arg("-c").arg(cmdline);
    cmd
}

#[cfg(windows)]
fn shell(cmdline: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(cmdline);
    cmd
}

/// Launches the external commands configured on a path
#[derive(Debug, Clone)]
pub struct CommandHooks {
    pool: CommandPool,
    path: String,
    env: Environment,
}

impl CommandHooks {
    /// Build the base environment of a path
    pub fn new(pool: CommandPool, path: &str, rtsp_address: &str, matches: &[String]) -> Self {
        let port = rtsp_address
            .rsplit_once(':')
            .map(|(_, port)| port.to_string())
            .unwrap_or_default();

        let mut env = Environment::new();
        env.insert("MTX_PATH".into(), path.to_string());
        env.insert("RTSP_PATH".into(), path.to_string());
        env.insert("RTSP_PORT".into(), port);

        for (i, group) in matches.iter().enumerate().skip(1) {
            env.insert(format!("G{}", i), group.clone());
        }

        Self {
            pool,
            path: path.to_string(),
            env,
        }
    }

    /// Base environment
    pub fn env(&self) -> &Environment {
        &self.env
    }

    fn launch(&self, hook: &str, cmdline: &str, restart: bool, env: Environment) -> ExternalCmd {
        tracing::info!(path = %self.path, hook = hook, "Command launched");
        ExternalCmd::spawn(&self.pool, &self.path, cmdline, restart, env)
    }

    /// Run `runOnInit`; the teardown kills it
    pub fn on_init(&self, conf: &PathConf) -> Teardown {
        if conf.run_on_init.is_empty() {
            return noop_teardown();
        }

        let cmd = self.launch(
            "runOnInit",
            &conf.run_on_init,
            conf.run_on_init_restart,
            self.env.clone(),
        );
        let path = self.path.clone();

        Box::new(move |_| {
            tracing::info!(path = %path, hook = "runOnInit", "Command stopped");
            cmd.close();
        })
    }

    /// Run `runOnDemand`; the teardown kills it and runs `runOnUnDemand`
    pub fn on_demand(&self, conf: &PathConf, query: &str) -> Teardown {
        let mut env = self.env.clone();
        env.insert("MTX_QUERY".into(), query.to_string());

        let cmd = (!conf.run_on_demand.is_empty()).then(|| {
            self.launch(
                "runOnDemand",
                &conf.run_on_demand,
                conf.run_on_demand_restart,
                env.clone(),
            )
        });
        let un_demand = conf.run_on_un_demand.clone();
        let hooks = self.clone();

        Box::new(move |reason| {
            if let Some(cmd) = cmd {
                tracing::info!(path = %hooks.path, hook = "runOnDemand", reason = reason, "Command stopped");
                cmd.close();
            }
            if !un_demand.is_empty() {
                hooks.launch("runOnUnDemand", &un_demand, false, env);
            }
        })
    }

    /// Run `runOnReady`; the teardown kills it and runs `runOnNotReady`
    pub fn on_ready(&self, conf: &PathConf, source: Option<&SourceDescriptor>, query: &str) -> Teardown {
        let mut env = self.env.clone();
        env.insert("MTX_QUERY".into(), query.to_string());
        if let Some(source) = source {
            env.insert("MTX_SOURCE_TYPE".into(), source.kind.clone());
            env.insert("MTX_SOURCE_ID".into(), source.id.clone());
        }

        let cmd = (!conf.run_on_ready.is_empty()).then(|| {
            self.launch(
                "runOnReady",
                &conf.run_on_ready,
                conf.run_on_ready_restart,
                env.clone(),
            )
        });
        let not_ready = conf.run_on_not_ready.clone();
        let hooks = self.clone();

        Box::new(move |_| {
            if let Some(cmd) = cmd {
                tracing::info!(path = %hooks.path, hook = "runOnReady", "Command stopped");
                cmd.close();
            }
            if !not_ready.is_empty() {
                hooks.launch("runOnNotReady", &not_ready, false, env);
            }
        })
    }

    /// Callbacks running `runOnRecordSegmentCreate` and `runOnRecordSegmentComplete`
    pub fn segment_hooks(&self, conf: &PathConf) -> (SegmentCreateHook, SegmentCompleteHook) {
        let create_cmd = conf.run_on_record_segment_create.clone();
        let create_hooks = self.clone();
        let on_create: SegmentCreateHook = std::sync::Arc::new(move |segment: &str| {
            if create_cmd.is_empty() {
                return;
            }
            let mut env = create_hooks.env.clone();
            env.insert("MTX_SEGMENT_PATH".into(), segment.to_string());
            create_hooks.launch("runOnRecordSegmentCreate", &create_cmd, false, env);
        });

        let complete_cmd = conf.run_on_record_segment_complete.clone();
        let complete_hooks = self.clone();
        let on_complete: SegmentCompleteHook =
            std::sync::Arc::new(move |segment: &str, duration: Duration| {
                if complete_cmd.is_empty() {
                    return;
                }
                let mut env = complete_hooks.env.clone();
                env.insert("MTX_SEGMENT_PATH".into(), segment.to_string());
                env.insert(
                    "MTX_SEGMENT_DURATION".into(),
                    duration.as_secs_f64().to_string(),
                );
                complete_hooks.launch("runOnRecordSegmentComplete", &complete_cmd, false, env);
            });

        (on_create, on_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment() {
        let matches = vec!["cam/7/main".to_string(), "7".to_string(), "main".to_string()];
        let hooks = CommandHooks::new(CommandPool::new(), "cam/7/main", ":8554", &matches);
        let env = hooks.env();

        assert_eq!(env["MTX_PATH"], "cam/7/main");
        assert_eq!(env["RTSP_PATH"], "cam/7/main");
        assert_eq!(env["RTSP_PORT"], "8554");
        assert_eq!(env["G1"], "7");
        assert_eq!(env["G2"], "main");
        assert!(!env.contains_key("G0"));
    }

    #[test]
    fn test_empty_hooks_are_noops() {
        let hooks = CommandHooks::new(CommandPool::new(), "cam1", ":8554", &[]);
        let conf = PathConf::new("cam1").unwrap();

        // nothing is configured, so no runtime is needed
        hooks.on_init(&conf)("closing");
        hooks.on_demand(&conf, "")("not needed");
        hooks.on_ready(&conf, None, "")("not ready");

        let (create, complete) = hooks.segment_hooks(&conf);
        create("/rec/seg.mp4");
        complete("/rec/seg.mp4", Duration::from_secs(1));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_runs_with_environment() {
        let dir = std::env::temp_dir().join(format!("media-paths-hook-{}", std::process::id()));
        let out = dir.with_extension("out");
        let _ = std::fs::remove_file(&out);

        let hooks = CommandHooks::new(CommandPool::new(), "cam1", ":8554", &[]);
        let mut conf = PathConf::new("cam1").unwrap();
        conf.run_on_init = format!("echo \"$MTX_PATH\" > {}", out.display());

        let teardown = hooks.on_init(&conf);

        let mut written = String::new();
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            written = std::fs::read_to_string(&out).unwrap_or_default();
            if !written.is_empty() {
                break;
            }
        }
        teardown("done");
        let _ = std::fs::remove_file(&out);

        assert_eq!(written.trim(), "cam1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pool_close_waits_for_commands() {
        let out = std::env::temp_dir().join(format!("media-paths-pool-{}.out", std::process::id()));
        let _ = std::fs::remove_file(&out);

        let pool = CommandPool::new();
        let hooks = CommandHooks::new(pool.clone(), "cam1", ":8554", &[]);
        let mut conf = PathConf::new("cam1").unwrap();
        conf.run_on_init = format!("sleep 0.2; echo done > {}", out.display());

        let _teardown = hooks.on_init(&conf);
        assert_eq!(pool.running(), 1);

        tokio::time::timeout(Duration::from_secs(10), pool.close())
            .await
            .unwrap();

        let written = std::fs::read_to_string(&out).unwrap_or_default();
        let _ = std::fs::remove_file(&out);
        assert_eq!(written.trim(), "done");
        assert_eq!(pool.running(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_pool_close_after_teardown_kills() {
        let pool = CommandPool::new();
        let hooks = CommandHooks::new(pool.clone(), "cam1", ":8554", &[]);
        let mut conf = PathConf::new("cam1").unwrap();
        conf.run_on_init = "sleep 30".into();
        conf.run_on_init_restart = true;

        let teardown = hooks.on_init(&conf);
        tokio::time::sleep(Duration::from_millis(50)).await;
        teardown("closing");

        tokio::time::timeout(Duration::from_secs(5), pool.close())
            .await
            .unwrap();
        assert_eq!(pool.running(), 0);
    }
}
