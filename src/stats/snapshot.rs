//! Read-only projections of path state

use std::time::SystemTime;

use crate::source::SourceDescriptor;

/// Point-in-time view of a path
#[derive(Debug, Clone, PartialEq)]
pub struct PathSnapshot {
    /// Path name
    pub name: String,
    /// Name of the configuration the path was matched against
    pub conf_name: String,
    /// Current source, if any
    pub source: Option<SourceDescriptor>,
    /// Whether a stream is available
    pub ready: bool,
    /// When the path last became ready
    pub ready_time: Option<SystemTime>,
    /// Codec of every track
    pub tracks: Vec<String>,
    /// Total bytes received from the source
    pub bytes_received: u64,
    /// Total bytes delivered to readers
    pub bytes_sent: u64,
    /// Attached readers
    pub readers: Vec<SourceDescriptor>,
}

impl PathSnapshot {
    /// Snapshot of a path with nothing attached
    pub fn idle(name: impl Into<String>, conf_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conf_name: conf_name.into(),
            source: None,
            ready: false,
            ready_time: None,
            tracks: Vec::new(),
            bytes_received: 0,
            bytes_sent: 0,
            readers: Vec::new(),
        }
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_snapshot() {
        let snap = PathSnapshot::idle("cam1", "~^cam\\d+$");
        assert_eq!(snap.name, "cam1");
        assert_eq!(snap.conf_name, "~^cam\\d+$");
        assert!(!snap.ready);
        assert!(snap.source.is_none());
        assert_eq!(snap.reader_count(), 0);
    }
}
