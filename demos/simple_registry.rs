//! Simple path registry example
//!
//! Run with: cargo run --example simple_registry
//!
//! Sets up three paths and walks through their lifecycle:
//!
//! - `cam1`: clients publish to it; a publisher attaches, a reader receives a
//!   few units, then the publisher leaves.
//! - `camX`: pulled on demand from a simulated camera. The first reader
//!   starts the source; it is stopped again a few seconds after the last
//!   reader leaves.
//! - `~^live/.+$`: any `live/...` name is published to and disappears once
//!   unused.
//!
//! Logging is controlled with `RUST_LOG`, e.g.
//!   RUST_LOG=media_paths=debug cargo run --example simple_registry

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use media_paths::source::StaticSourceParams;
use media_paths::{
    AccessRequest, AddPublisherReq, Media, MediaDescription, PathConf, PathConfs, PathHandle,
    PathHooks, PathRegistry, Publisher, Reader, SourceDescriptor, SourceParent, StaticSource,
    StaticSourceFactory, Unit,
};
use tokio_util::sync::CancellationToken;

fn camera_desc() -> MediaDescription {
    MediaDescription::new(vec![Media::video("H264"), Media::audio("MPEG-4 Audio")])
}

/// Connection stand-in used for both publishers and readers
struct Conn {
    id: String,
}

impl Conn {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self { id: id.to_string() })
    }
}

impl Publisher for Conn {
    fn close(&self) {
        println!("[{}] closed by path", self.id);
    }

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::new("demoConn", self.id.clone())
    }
}

impl Reader for Conn {
    fn close(&self) {
        println!("[{}] disconnected", self.id);
    }

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::new("demoConn", self.id.clone())
    }
}

/// Pretends to pull from a camera: ready after a short delay, then emits a
/// unit every 40ms until stopped
struct SimulatedCamera;

struct CameraSource {
    url: String,
    parent: SourceParent,
    running: Option<CancellationToken>,
}

impl StaticSource for CameraSource {
    fn start(&mut self, on_demand: bool, _query: &str) {
        println!("[{}] camera starting (on demand: {})", self.parent.name(), on_demand);

        let token = CancellationToken::new();
        self.running = Some(token.clone());
        let parent = self.parent.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            }

            let stream = match parent.set_ready(camera_desc(), false).await {
                Ok(stream) => stream,
                Err(e) => {
                    eprintln!("[{}] camera rejected: {}", parent.name(), e);
                    return;
                }
            };

            let mut timestamp = 0u32;
            let mut tick = tokio::time::interval(Duration::from_millis(40));
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => {
                        let mut unit = Unit::new(0, timestamp, Bytes::from_static(&[0u8; 1024]));
                        unit.is_keyframe = timestamp % 2000 == 0;
                        stream.write_unit(unit);
                        timestamp += 40;
                    }
                }
            }
        });
    }

    fn stop(&mut self, reason: &str) {
        println!("[{}] camera stopping: {}", self.parent.name(), reason);
        if let Some(token) = self.running.take() {
            token.cancel();
        }
    }

    fn reload_conf(&mut self, conf: Arc<PathConf>) {
        self.url = conf.source.to_string();
    }

    fn close(&mut self, reason: &str) {
        self.stop(reason);
    }

    fn describe(&self) -> SourceDescriptor {
        SourceDescriptor::new("simulatedCamera", self.url.clone())
    }
}

impl StaticSourceFactory for SimulatedCamera {
    fn create(&self, params: StaticSourceParams) -> Box<dyn StaticSource> {
        Box::new(CameraSource {
            url: params.conf.source.to_string(),
            parent: params.parent,
            running: None,
        })
    }
}

/// Prints every lifecycle transition
struct PrintHooks;

impl PathHooks for PrintHooks {
    fn on_init(&self, path: &PathHandle) {
        println!("[{}] path created", path.name());
    }

    fn on_uninit(&self, path: &PathHandle) {
        println!("[{}] path destroyed", path.name());
    }

    fn on_ready(&self, path: &PathHandle) {
        println!("[{}] ready", path.name());
    }

    fn on_not_ready(&self, path: &PathHandle) {
        println!("[{}] not ready", path.name());
    }
}

async fn print_paths(registry: &PathRegistry) -> media_paths::Result<()> {
    for snap in registry.list_snapshots().await? {
        println!(
            "  {:<10} ready={:<5} tracks={:?} readers={} bytes_in={} bytes_out={}",
            snap.name,
            snap.ready,
            snap.tracks,
            snap.reader_count(),
            snap.bytes_received,
            snap.bytes_sent,
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("media_paths=info".parse()?),
        )
        .init();

    let confs: PathConfs = [
        PathConf::new("cam1")?,
        PathConf::new("camX")?
            .pull("rtsp://10.0.0.1/main")
            .source_on_demand(Duration::from_secs(5), Duration::from_secs(2)),
        PathConf::new("~^live/.+$")?,
    ]
    .into_iter()
    .collect();

    let registry = PathRegistry::builder(confs)
        .static_sources(SimulatedCamera)
        .hooks(PrintHooks)
        .spawn();

    // cam1: publish, read a few units, leave
    let publisher = Conn::new("obs");
    let (cam1, stream) = registry
        .add_publisher(AddPublisherReq::new(
            publisher.clone(),
            camera_desc(),
            AccessRequest::publish("cam1"),
        ))
        .await?;

    let viewer = Conn::new("vlc");
    let (_, read_stream) = registry
        .add_reader(viewer.clone(), AccessRequest::read("cam1"))
        .await?;

    if let Some(mut rx) = read_stream.subscribe() {
        for ts in 0..3u32 {
            stream.write_unit(Unit::new(0, ts * 40, Bytes::from_static(b"frame")));
        }
        for _ in 0..3 {
            let unit = rx.recv().await?;
            println!("[vlc] got unit ts={} ({} bytes)", unit.timestamp, unit.data.len());
        }
    }

    println!("Paths:");
    print_paths(&registry).await?;

    cam1.remove_publisher(publisher).await;

    // camX: the first reader starts the camera
    let watcher = Conn::new("ffplay");
    let (cam_x, _) = registry
        .add_reader(watcher.clone(), AccessRequest::read("camX"))
        .await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    println!("Paths:");
    print_paths(&registry).await?;

    cam_x.remove_reader(watcher).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    // live/...: created on publish, removed when the publisher leaves
    let streamer = Conn::new("ffmpeg");
    let (live, _) = registry
        .add_publisher(AddPublisherReq::new(
            streamer.clone(),
            camera_desc(),
            AccessRequest::publish("live/show"),
        ))
        .await?;

    println!("Paths:");
    print_paths(&registry).await?;

    live.remove_publisher(streamer).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    println!("Paths:");
    print_paths(&registry).await?;

    registry.close().await;
    Ok(())
}
