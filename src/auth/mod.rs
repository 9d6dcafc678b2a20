//! Authentication of publish and read requests
//!
//! The path core only needs a single allow/deny decision per request; how
//! credentials are checked is up to the [`Authenticator`] implementation.

pub mod internal;

use std::fmt;
use std::net::IpAddr;

use thiserror::Error;

pub use internal::{InternalAuth, InternalUser, Permission, ANY_USER};

/// Action a request wants to perform on a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthAction {
    Publish,
    Read,
    Playback,
}

impl fmt::Display for AuthAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthAction::Publish => write!(f, "publish"),
            AuthAction::Read => write!(f, "read"),
            AuthAction::Playback => write!(f, "playback"),
        }
    }
}

/// Protocol front-end a request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Rtsp,
    Rtmp,
    Hls,
    WebRtc,
    Srt,
}

/// Username and password supplied by a client
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

/// Access context attached to every describe/publish/read request
#[derive(Debug, Clone, Default)]
pub struct AccessRequest {
    /// Requested path name
    pub name: String,
    /// Query string, forwarded to on-demand hooks
    pub query: String,
    /// Whether the client wants to publish
    pub publish: bool,
    /// Skip authentication (the front-end already did it)
    pub skip_auth: bool,
    pub credentials: Option<Credentials>,
    pub ip: Option<IpAddr>,
    pub protocol: Protocol,
}

impl AccessRequest {
    /// Request to read a path
    pub fn read(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Request to publish to a path
    pub fn publish(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            publish: true,
            ..Default::default()
        }
    }

    /// Attach a query string
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Attach credentials
    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            pass: pass.into(),
        });
        self
    }

    /// Mark the request as already authenticated
    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    /// Convert into the request passed to the authenticator
    pub fn to_auth_request(&self) -> AuthRequest {
        AuthRequest {
            action: if self.publish {
                AuthAction::Publish
            } else {
                AuthAction::Read
            },
            path: self.name.clone(),
            query: self.query.clone(),
            credentials: self.credentials.clone().unwrap_or_default(),
            ip: self.ip,
            protocol: self.protocol,
        }
    }
}

/// Request evaluated by an [`Authenticator`]
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub action: AuthAction,
    pub path: String,
    pub query: String,
    pub credentials: Credentials,
    pub ip: Option<IpAddr>,
    pub protocol: Protocol,
}

/// Authentication failure
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The user is not allowed to perform the action on the path
    #[error("user '{user}' is not allowed on path '{path}'")]
    Denied { user: String, path: String },

    /// The external authentication service could not be reached
    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
}

/// Decides whether a request may proceed
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(&self, req: &AuthRequest) -> Result<(), AuthError>;
}

/// Authenticator that accepts every request
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authenticator for AllowAll {
    fn authenticate(&self, _req: &AuthRequest) -> Result<(), AuthError> {
        Ok(())
    }
}
