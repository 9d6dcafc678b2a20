//! Sources and readers attached to a path
//!
//! Protocol front-ends hand the path core opaque [`Publisher`] and [`Reader`]
//! handles. The core never looks inside them: it only closes them, asks them
//! to describe themselves, and compares them by identity.

pub mod static_source;

use std::sync::Arc;

pub use static_source::{IdleSourceFactory, StaticSource, StaticSourceFactory, StaticSourceParams};

/// Description of a source or reader, used in snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    /// Kind of entity (e.g., "rtspSession", "rtmpConn", "redirect")
    pub kind: String,
    /// Identifier of the entity
    pub id: String,
}

impl SourceDescriptor {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// A client publishing to a path
pub trait Publisher: Send + Sync + 'static {
    /// Forcibly disconnect the publisher
    fn close(&self);

    fn describe(&self) -> SourceDescriptor;
}

/// A client reading from a path
pub trait Reader: Send + Sync + 'static {
    /// Forcibly disconnect the reader
    fn close(&self);

    fn describe(&self) -> SourceDescriptor;
}

/// Identity of a shared handle
///
/// Valid only while the handle is kept alive by whoever stores the key.
pub(crate) fn identity<T: ?Sized>(handle: &Arc<T>) -> usize {
    Arc::as_ptr(handle) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    impl Reader for Dummy {
        fn close(&self) {}

        fn describe(&self) -> SourceDescriptor {
            SourceDescriptor::new("dummy", "1")
        }
    }

    #[test]
    fn test_identity_follows_allocation() {
        let a: Arc<dyn Reader> = Arc::new(Dummy);
        let b: Arc<dyn Reader> = Arc::new(Dummy);
        let a2 = Arc::clone(&a);

        assert_eq!(identity(&a), identity(&a2));
        assert_ne!(identity(&a), identity(&b));
    }
}
