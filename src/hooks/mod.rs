//! Path lifecycle hooks
//!
//! Two kinds of hooks run at path lifecycle transitions:
//!
//! - [`PathHooks`]: an in-process observer notified of every transition.
//! - External commands ([`command`]): `runOnInit`, `runOnDemand`,
//!   `runOnReady` and friends, launched as child processes and killed by the
//!   matching teardown.
//!
//! ```text
//!  created ──► on_init
//!     │
//!     ├─► on_demand / on_demand_static ──► ... ──► on_undemand / on_undemand_static
//!     │
//!     ├─► on_ready ──► ... ──► on_not_ready
//!     │
//!  destroyed ──► on_uninit
//! ```

pub mod command;

use crate::path::PathHandle;

pub use command::{CommandHooks, CommandPool, Environment, ExternalCmd, Teardown};

/// Observer of path lifecycle transitions
///
/// Called from inside the path actor: implementations must return quickly
/// and must not call back into the same path synchronously.
pub trait PathHooks: Send + Sync + 'static {
    fn on_init(&self, _path: &PathHandle) {}

    fn on_uninit(&self, _path: &PathHandle) {}

    /// A publisher launch was requested on demand
    fn on_demand(&self, _path: &PathHandle, _query: &str) {}

    fn on_undemand(&self, _path: &PathHandle, _reason: &str) {}

    /// A static source was started on demand
    fn on_demand_static(&self, _path: &PathHandle, _query: &str) {}

    fn on_undemand_static(&self, _path: &PathHandle, _reason: &str) {}

    fn on_ready(&self, _path: &PathHandle) {}

    fn on_not_ready(&self, _path: &PathHandle) {}
}

/// Hooks that do nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl PathHooks for NoHooks {}
