//! Path actors
//!
//! Every live path runs as its own task and owns all of its state: source,
//! stream, readers, on-demand timers and requests waiting for the path to
//! become ready. Callers talk to it through a [`PathHandle`].
//!
//! # Architecture
//!
//! ```text
//!   front-end ──► PathHandle ──► mpsc inbox ──┐
//!                                             ▼
//!   registry ──► watch (conf) ──────────► PathActor ──► PathEvent ──► registry
//!                                          │    ▲
//!                            static source │    │ SourceParent
//!                                          ▼    │
//!                                    StaticSource
//! ```
//!
//! Replies travel back on single-use `oneshot` slots. Every send and every
//! wait races the actor's cancellation token, so a caller is never left
//! waiting on an actor that is shutting down.

pub(crate) mod actor;
pub mod handle;
pub(crate) mod on_demand;
pub mod request;

pub(crate) use actor::{spawn_path, PathDeps, PathEvent, SpawnedPath};
pub use handle::{PathHandle, SourceParent};
pub use request::{AddPublisherReq, DescribeOutcome};
