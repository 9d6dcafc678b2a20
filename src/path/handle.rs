//! Handles to a running path actor

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::auth::AccessRequest;
use crate::conf::PathConf;
use crate::error::{PathError, Result};
use crate::source::{Publisher, Reader};
use crate::stats::PathSnapshot;
use crate::stream::{MediaDescription, Stream};

use super::request::{AddPublisherReq, DescribeOutcome, PathMessage, Reply};

/// Handle to a path actor
///
/// Cheap to clone. Every operation is a round-trip through the actor inbox
/// and fails with [`PathError::Terminated`] once the actor is shutting down.
#[derive(Clone)]
pub struct PathHandle {
    name: Arc<str>,
    id: u64,
    tx: mpsc::Sender<PathMessage>,
    token: CancellationToken,
    conf: Arc<RwLock<Arc<PathConf>>>,
}

impl PathHandle {
    pub(crate) fn new(
        name: &str,
        id: u64,
        tx: mpsc::Sender<PathMessage>,
        token: CancellationToken,
        conf: Arc<RwLock<Arc<PathConf>>>,
    ) -> Self {
        Self {
            name: Arc::from(name),
            id,
            tx,
            token,
            conf,
        }
    }

    /// Path name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registry-assigned identifier, unique for the lifetime of the registry
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Configuration the path is currently running with
    pub fn conf(&self) -> Arc<PathConf> {
        Arc::clone(&self.conf.read())
    }

    /// Whether the actor has started shutting down
    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether two handles refer to the same actor
    pub fn same_as(&self, other: &PathHandle) -> bool {
        self.id == other.id && self.name == other.name
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> PathMessage) -> Result<T> {
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

    /// Ask for the stream of the path, or where to find it
    pub async fn describe(&self, access: AccessRequest) -> Result<DescribeOutcome> {
        self.request(|reply| PathMessage::Describe { access, reply })
            .await?
    }

    /// Attach a publisher and make the path ready
    pub async fn add_publisher(&self, req: AddPublisherReq) -> Result<Stream> {
        self.request(|reply| PathMessage::AddPublisher { req, reply })
            .await?
    }

    /// Detach a publisher; a no-op if it isn't the current source
    pub async fn remove_publisher(&self, author: Arc<dyn Publisher>) {
        let _ = self
            .request(|reply| PathMessage::RemovePublisher { author, reply })
            .await;
    }

    /// Attach a reader
    pub async fn add_reader(&self, author: Arc<dyn Reader>, access: AccessRequest) -> Result<Stream> {
        self.request(|reply| PathMessage::AddReader {
            author,
            access,
            reply,
        })
        .await?
    }

    /// Detach a reader; a no-op if it isn't attached
    pub async fn remove_reader(&self, author: Arc<dyn Reader>) {
        let _ = self
            .request(|reply| PathMessage::RemoveReader { author, reply })
            .await;
    }

    /// Read-only view of the path
    pub async fn snapshot(&self) -> Result<PathSnapshot> {
        self.request(|reply| PathMessage::Snapshot { reply }).await
    }
}

impl fmt::Debug for PathHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathHandle")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Channel a static source uses to report to its path
#[derive(Clone, Debug)]
pub struct SourceParent {
    path: PathHandle,
}

impl SourceParent {
    pub(crate) fn new(path: PathHandle) -> Self {
        Self { path }
    }

    /// Name of the path being fed
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Report that the source is producing media
    ///
    /// Returns the stream the source must write to.
    pub async fn set_ready(&self, desc: MediaDescription, generate_rtp_packets: bool) -> Result<Stream> {
        self.path
            .request(|reply| PathMessage::SourceReady {
                desc,
                generate_rtp_packets,
                reply,
            })
            .await?
    }

    /// Report that the source stopped producing media
    pub async fn set_not_ready(&self) {
        let _ = self
            .path
            .request(|reply| PathMessage::SourceNotReady { reply })
            .await;
    }
}
