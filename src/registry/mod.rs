//! Path registry
//!
//! The registry owns the set of live paths. It resolves which configuration
//! governs a requested name, authenticates the request, creates paths on
//! demand and applies configuration reloads.
//!
//! # Architecture
//!
//! ```text
//!                            PathRegistry (handle)
//!                                   │ mpsc
//!                                   ▼
//!                     ┌───────────────────────────┐
//!                     │ RegistryActor             │
//!                     │   confs: PathConfs        │◄──── PathEvent (ready,
//!                     │   paths: HashMap<name,    │      not ready, closed)
//!                     │     PathEntry {           │
//!                     │       handle, conf_tx,    │
//!                     │       join, ready         │
//!                     │     }                     │
//!                     │   >                       │
//!                     └─────────────┬─────────────┘
//!                                   │ spawn / cancel / reload
//!         ┌─────────────────────────┼─────────────────────────┐
//!         ▼                         ▼                         ▼
//!    [PathActor]               [PathActor]               [PathActor]
//! ```
//!
//! Routing requests return a [`PathHandle`](crate::path::PathHandle); the
//! request itself is then sent to the path directly, outside the registry
//! loop.
//!
//! # Reload
//!
//! For every live path, a new configuration set either leaves it alone,
//! hot-reloads it through its `watch` channel, or destroys it (waiting for
//! the actor to finish) so that it can be recreated. Two actors never run
//! under the same name.

mod actor;
pub mod config;
mod entry;
pub mod hls;
pub mod store;

pub use config::RegistryConfig;
pub use hls::HlsServer;
pub use store::{PathRegistry, RegistryBuilder};
