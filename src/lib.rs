//! Path lifecycle core for a live-media routing server
//!
//! Tracks every named media path, decides when its source must be started
//! or torn down, arbitrates publishers and readers contending for it, and
//! applies configuration reloads to live paths.
//!
//! Each path runs as its own actor; a single registry actor owns the set of
//! paths. Protocol front-ends talk to the [`PathRegistry`] and get back a
//! [`PathHandle`] and a [`Stream`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use media_paths::{
//!     AccessRequest, AddPublisherReq, Media, MediaDescription, PathConf, PathConfs,
//!     PathRegistry, Publisher, SourceDescriptor,
//! };
//!
//! struct Conn;
//!
//! impl Publisher for Conn {
//!     fn close(&self) {}
//!     fn describe(&self) -> SourceDescriptor {
//!         SourceDescriptor::new("rtmpConn", "1")
//!     }
//! }
//!
//! # async fn run() -> media_paths::Result<()> {
//! let confs: PathConfs = [PathConf::new("cam1")?].into_iter().collect();
//! let registry = PathRegistry::new(confs);
//!
//! let desc = MediaDescription::new(vec![Media::video("H264")]);
//! let (path, stream) = registry
//!     .add_publisher(AddPublisherReq::new(Arc::new(Conn), desc, AccessRequest::publish("cam1")))
//!     .await?;
//! # let _ = (path, stream);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod conf;
pub mod error;
pub mod hooks;
pub mod path;
pub mod recorder;
pub mod registry;
pub mod source;
pub mod stats;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{AccessRequest, AllowAll, AuthAction, AuthError, Authenticator, InternalAuth};
pub use conf::{PathConf, PathConfs, SourceKind};
pub use error::{PathError, Result};
pub use hooks::{CommandHooks, NoHooks, PathHooks};
pub use path::{AddPublisherReq, DescribeOutcome, PathHandle, SourceParent};
pub use recorder::{RecordParams, Recorder, RecorderFactory};
pub use registry::{HlsServer, PathRegistry, RegistryBuilder, RegistryConfig};
pub use source::{Publisher, Reader, SourceDescriptor, StaticSource, StaticSourceFactory};
pub use stats::PathSnapshot;
pub use stream::{Media, MediaDescription, Stream, Unit};
