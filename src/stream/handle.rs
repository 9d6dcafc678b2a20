//! Stream handle shared between a path, its source and its readers

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::error::{PathError, Result};

use super::description::MediaDescription;

/// A unit of media data
///
/// Cheap to clone: `Bytes` is reference counted, so every reader shares the
/// same allocation.
#[derive(Debug, Clone)]
pub struct Unit {
    /// Index of the media in the stream description
    pub media: usize,
    /// Timestamp in milliseconds
    pub timestamp: u32,
    pub data: Bytes,
    pub is_keyframe: bool,
}

impl Unit {
    pub fn new(media: usize, timestamp: u32, data: Bytes) -> Self {
        Self {
            media,
            timestamp,
            data,
            is_keyframe: false,
        }
    }
}

struct StreamInner {
    desc: MediaDescription,
    generate_rtp_packets: bool,
    tx: Mutex<Option<broadcast::Sender<Unit>>>,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
}

/// Handle to the stream of a ready path
///
/// Allocated when the path becomes ready and closed when it stops being
/// ready. Clones refer to the same stream.
#[derive(Clone)]
pub struct Stream {
    inner: Arc<StreamInner>,
}

impl Stream {
    /// Allocate a stream for a description
    pub(crate) fn new(
        path: &str,
        desc: MediaDescription,
        generate_rtp_packets: bool,
        capacity: usize,
    ) -> Result<Self> {
        if desc.is_empty() {
            return Err(PathError::EmptyDescription(path.to_string()));
        }

        let (tx, _) = broadcast::channel(capacity.max(1));

        Ok(Self {
            inner: Arc::new(StreamInner {
                desc,
                generate_rtp_packets,
                tx: Mutex::new(Some(tx)),
                bytes_received: AtomicU64::new(0),
                bytes_sent: AtomicU64::new(0),
            }),
        })
    }

    /// Media description
    pub fn desc(&self) -> &MediaDescription {
        &self.inner.desc
    }

    /// Whether RTP packets must be generated for readers
    pub fn generate_rtp_packets(&self) -> bool {
        self.inner.generate_rtp_packets
    }

    /// Write a unit coming from the source and fan it out to readers
    ///
    /// Returns the number of readers that received it. Writes to a closed
    /// stream are dropped.
    pub fn write_unit(&self, unit: Unit) -> usize {
        let len = unit.data.len() as u64;
        let tx = self.inner.tx.lock();
        let Some(tx) = tx.as_ref() else {
            return 0;
        };

        self.inner.bytes_received.fetch_add(len, Ordering::Relaxed);
        let receivers = tx.send(unit).unwrap_or(0);
        self.inner
            .bytes_sent
            .fetch_add(len * receivers as u64, Ordering::Relaxed);
        receivers
    }

    /// Subscribe to the units of this stream
    ///
    /// Returns `None` once the stream is closed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<Unit>> {
        self.inner.tx.lock().as_ref().map(|tx| tx.subscribe())
    }

    pub fn bytes_received(&self) -> u64 {
        self.inner.bytes_received.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.inner.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.tx.lock().is_none()
    }

    /// Whether two handles refer to the same stream
    pub fn same_as(&self, other: &Stream) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Close the stream; subscribed readers observe the channel closing
    pub(crate) fn close(&self) {
        self.inner.tx.lock().take();
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("desc", &self.inner.desc)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::description::Media;

    fn stream() -> Stream {
        let desc = MediaDescription::new(vec![Media::video("H264")]);
        Stream::new("cam1", desc, false, 16).unwrap()
    }

    #[test]
    fn test_empty_description_rejected() {
        let res = Stream::new("cam1", MediaDescription::default(), false, 16);
        assert_eq!(
            res.unwrap_err(),
            PathError::EmptyDescription("cam1".into())
        );
    }

    #[tokio::test]
    async fn test_fan_out_counts_bytes() {
        let stream = stream();
        let mut rx1 = stream.subscribe().unwrap();
        let mut rx2 = stream.subscribe().unwrap();

        let delivered = stream.write_unit(Unit::new(0, 0, Bytes::from_static(&[1, 2, 3, 4])));
        assert_eq!(delivered, 2);

        assert_eq!(rx1.recv().await.unwrap().data.len(), 4);
        assert_eq!(rx2.recv().await.unwrap().data.len(), 4);
        assert_eq!(stream.bytes_received(), 4);
        assert_eq!(stream.bytes_sent(), 8);
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let stream = stream();
        let mut rx = stream.subscribe().unwrap();

        stream.close();

        assert!(stream.is_closed());
        assert!(stream.subscribe().is_none());
        assert!(rx.recv().await.is_err());
        assert_eq!(stream.write_unit(Unit::new(0, 0, Bytes::from_static(&[1]))), 0);
        assert_eq!(stream.bytes_received(), 0);
    }
}
