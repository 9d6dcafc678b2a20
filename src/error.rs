//! Error types for path operations
//!
//! Every failure a publisher, reader or observer can receive from the path
//! core is a [`PathError`]. None of them are fatal to the actor that
//! produced them.

use thiserror::Error;

use crate::auth::AuthError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, PathError>;

/// Error type for path and registry operations
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// No configuration matches the requested name
    #[error("path '{0}' is not configured")]
    NotFound(String),

    /// The requested name is not a valid path name
    #[error("invalid path name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Authentication rejected the request
    #[error("authentication failed: {0}")]
    AuthDenied(#[from] AuthError),

    /// The path does not accept publishers
    #[error("can't publish to path '{0}' since 'source' is not 'publisher'")]
    NotPublisherSource(String),

    /// Someone is already publishing and override is disabled
    #[error("someone is already publishing to path '{0}'")]
    AlreadyPublishing(String),

    /// The configured maximum number of readers is attached
    #[error("maximum reader count reached on path '{0}'")]
    MaxReadersReached(String),

    /// Nobody is publishing and the path can't be activated
    #[error("no stream is available on path '{0}'")]
    NoStreamAvailable(String),

    /// The on-demand source did not become ready in time
    #[error("source of path '{0}' has timed out")]
    SourceTimedOut(String),

    /// The actor serving the request is shutting down
    #[error("terminated")]
    Terminated,

    /// The configuration changed between lookup and publish
    #[error("configuration has changed")]
    ConfigurationChanged,

    /// A stream was announced without any media
    #[error("media description of path '{0}' contains no medias")]
    EmptyDescription(String),
}

impl PathError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PathError::NotFound(_) => "path_not_found",
            PathError::InvalidName { .. } => "path_invalid_name",
            PathError::AuthDenied(_) => "path_auth_denied",
            PathError::NotPublisherSource(_) => "path_not_publisher_source",
            PathError::AlreadyPublishing(_) => "path_already_publishing",
            PathError::MaxReadersReached(_) => "path_max_readers_reached",
            PathError::NoStreamAvailable(_) => "path_no_stream_available",
            PathError::SourceTimedOut(_) => "path_source_timed_out",
            PathError::Terminated => "path_terminated",
            PathError::ConfigurationChanged => "path_configuration_changed",
            PathError::EmptyDescription(_) => "path_empty_description",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_path_name() {
        let err = PathError::SourceTimedOut("cam1".into());
        assert_eq!(err.to_string(), "source of path 'cam1' has timed out");

        let err = PathError::NotFound("missing".into());
        assert_eq!(err.to_string(), "path 'missing' is not configured");
    }

    #[test]
    fn test_auth_error_converts() {
        let err: PathError = AuthError::Denied {
            user: "bob".into(),
            path: "cam".into(),
        }
        .into();

        assert_eq!(err.as_label(), "path_auth_denied");
        assert!(err.to_string().contains("bob"));
    }
}
