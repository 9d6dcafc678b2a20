//! Messages exchanged with a path actor

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::auth::AccessRequest;
use crate::conf::PathConf;
use crate::error::Result;
use crate::source::{Publisher, Reader};
use crate::stats::PathSnapshot;
use crate::stream::{MediaDescription, Stream};

/// Single-use reply slot
pub(crate) type Reply<T> = oneshot::Sender<T>;

/// Result of a describe request
#[derive(Debug, Clone)]
pub enum DescribeOutcome {
    /// The path is ready
    Stream(Stream),
    /// The client must look elsewhere
    Redirect(String),
}

impl DescribeOutcome {
    pub fn stream(&self) -> Option<&Stream> {
        match self {
            DescribeOutcome::Stream(stream) => Some(stream),
            DescribeOutcome::Redirect(_) => None,
        }
    }

    pub fn redirect(&self) -> Option<&str> {
        match self {
            DescribeOutcome::Stream(_) => None,
            DescribeOutcome::Redirect(target) => Some(target),
        }
    }
}

/// Request to attach a publisher
pub struct AddPublisherReq {
    pub author: Arc<dyn Publisher>,
    /// Medias the publisher is going to send
    pub desc: MediaDescription,
    pub generate_rtp_packets: bool,
    pub access: AccessRequest,
    /// Configuration the publisher expects the path to run with
    ///
    /// When set and different from the current configuration, the request
    /// fails with `ConfigurationChanged`.
    pub conf_to_compare: Option<Arc<PathConf>>,
}

impl AddPublisherReq {
    pub fn new(author: Arc<dyn Publisher>, desc: MediaDescription, access: AccessRequest) -> Self {
        Self {
            author,
            desc,
            generate_rtp_packets: false,
            access,
            conf_to_compare: None,
        }
    }

    /// Require RTP packets to be generated for readers
    pub fn generate_rtp_packets(mut self, enabled: bool) -> Self {
        self.generate_rtp_packets = enabled;
        self
    }

    /// Reject the request if the path configuration is no longer `conf`
    pub fn conf_to_compare(mut self, conf: Arc<PathConf>) -> Self {
        self.conf_to_compare = Some(conf);
        self
    }
}

/// Inbox messages of a path actor
pub(crate) enum PathMessage {
    Describe {
        access: AccessRequest,
        reply: Reply<Result<DescribeOutcome>>,
    },
    AddPublisher {
        req: AddPublisherReq,
        reply: Reply<Result<Stream>>,
    },
    RemovePublisher {
        author: Arc<dyn Publisher>,
        reply: Reply<()>,
    },
    AddReader {
        author: Arc<dyn Reader>,
        access: AccessRequest,
        reply: Reply<Result<Stream>>,
    },
    RemoveReader {
        author: Arc<dyn Reader>,
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<PathSnapshot>,
    },
    SourceReady {
        desc: MediaDescription,
        generate_rtp_packets: bool,
        reply: Reply<Result<Stream>>,
    },
    SourceNotReady {
        reply: Reply<()>,
    },
}

/// A describe request waiting for the path to become ready
pub(crate) struct PendingDescribe {
    pub reply: Reply<Result<DescribeOutcome>>,
}

/// A reader waiting for the path to become ready
pub(crate) struct PendingReader {
    pub author: Arc<dyn Reader>,
    pub reply: Reply<Result<Stream>>,
}
