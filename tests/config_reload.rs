mod support;

use std::sync::Arc;
use std::time::Duration;

use media_paths::{PathConf, PathConfs, PathRegistry};
use parking_lot::Mutex;
use support::{eventually, TestPublisher, TestReader, TestRecorders, TestSources};

#[derive(Clone, Default)]
struct Hls {
    events: Arc<Mutex<Vec<String>>>,
}

impl media_paths::HlsServer for Hls {
    fn path_ready(&self, path: &media_paths::PathHandle) {
        self.events.lock().push(format!("ready {}", path.name()));
    }

    fn path_not_ready(&self, path: &media_paths::PathHandle) {
        self.events.lock().push(format!("not_ready {}", path.name()));
    }
}

fn cam_y(record_path: &str) -> PathConf {
    PathConf::new("camY")
        .unwrap()
        .pull("rtsp://10.0.0.2/main")
        .record(record_path)
}

async fn wait_ready(registry: &PathRegistry, name: &str) -> bool {
    let name = name.to_string();
    eventually(|| {
        let registry = registry.clone();
        let name = name.clone();
        async move {
            registry
                .get_snapshot(&name)
                .await
                .map(|s| s.ready)
                .unwrap_or(false)
        }
    })
    .await
}

#[tokio::test]
async fn identical_reload_is_noop() {
    let sources = TestSources::ready_after(Duration::from_millis(10));
    let hls = Hls::default();
    let confs: PathConfs = [
        PathConf::new("cam1").unwrap(),
        PathConf::new("cam2").unwrap().pull("rtsp://10.0.0.9/main"),
    ]
    .into_iter()
    .collect();

    let registry = PathRegistry::builder(confs.clone())
        .static_sources(sources.clone())
        .hls_server(Arc::new(hls.clone()))
        .spawn();
    assert!(wait_ready(&registry, "cam2").await);

    let before: Vec<u64> = vec![
        registry.get_path("cam1").await.unwrap().id(),
        registry.get_path("cam2").await.unwrap().id(),
    ];
    let hls_before = hls.events.lock().clone();

    registry.reload_path_confs(confs).await.unwrap();

    let after: Vec<u64> = vec![
        registry.get_path("cam1").await.unwrap().id(),
        registry.get_path("cam2").await.unwrap().id(),
    ];
    assert_eq!(before, after);
    assert_eq!(sources.count("reload"), 0);
    assert_eq!(sources.count("create"), 1);
    assert_eq!(*hls.events.lock(), hls_before);

    registry.close().await;
}

#[tokio::test]
async fn record_path_change_is_hot_reloaded() {
    let sources = TestSources::ready_after(Duration::from_millis(10));
    let recorders = TestRecorders::default();
    let registry = PathRegistry::builder([cam_y("/data/a")].into_iter().collect())
        .static_sources(sources.clone())
        .recorders(recorders.clone())
        .spawn();
    assert!(wait_ready(&registry, "camY").await);

    let path = registry.get_path("camY").await.unwrap();
    let stream = path
        .describe(media_paths::AccessRequest::read("camY"))
        .await
        .unwrap()
        .stream()
        .unwrap()
        .clone();
    let reader = TestReader::new("r1");
    registry
        .add_reader(reader.clone(), media_paths::AccessRequest::read("camY"))
        .await
        .unwrap();

    registry
        .reload_path_confs([cam_y("/data/b")].into_iter().collect())
        .await
        .unwrap();

    let restarted = eventually(|| {
        let recorders = recorders.clone();
        async move { recorders.log().len() == 3 }
    })
    .await;
    assert!(restarted);
    assert_eq!(
        recorders.log(),
        vec!["start /data/a", "close /data/a", "start /data/b"]
    );

    let reloaded = registry.get_path("camY").await.unwrap();
    assert_eq!(reloaded.id(), path.id());
    assert_eq!(reloaded.conf().record_path, "/data/b");
    assert!(!stream.is_closed());
    assert!(!reader.is_closed());
    assert_eq!(registry.get_snapshot("camY").await.unwrap().readers.len(), 1);
    assert_eq!(sources.count("reload camY"), 1);
    assert_eq!(sources.count("create"), 1);

    registry.close().await;
}

#[tokio::test]
async fn source_change_recreates_path() {
    let sources = TestSources::ready_after(Duration::from_millis(10));
    let conf = PathConf::new("camZ").unwrap().pull("rtsp://10.0.0.3/main");
    let registry = PathRegistry::builder([conf].into_iter().collect())
        .static_sources(sources.clone())
        .spawn();
    assert!(wait_ready(&registry, "camZ").await);

    let old = registry.get_path("camZ").await.unwrap();

    let changed = PathConf::new("camZ").unwrap().pull("rtsp://10.0.0.4/main");
    registry
        .reload_path_confs([changed].into_iter().collect())
        .await
        .unwrap();

    let new = registry.get_path("camZ").await.unwrap();
    assert_ne!(new.id(), old.id());
    assert!(old.is_terminated());
    assert!(sources
        .log()
        .contains(&"close camZ path is closing".to_string()));
    assert_eq!(sources.count("create camZ"), 2);

    assert!(wait_ready(&registry, "camZ").await);
    let snap = registry.get_snapshot("camZ").await.unwrap();
    assert_eq!(snap.source.unwrap().id, "rtsp://10.0.0.4/main");

    registry.close().await;
}

#[tokio::test]
async fn removed_conf_destroys_path() {
    let hls = Hls::default();
    let confs: PathConfs = [PathConf::new("cam1").unwrap(), PathConf::new("cam2").unwrap()]
        .into_iter()
        .collect();
    let registry = PathRegistry::builder(confs)
        .hls_server(Arc::new(hls.clone()))
        .spawn();

    let publisher = TestPublisher::new("p1");
    registry
        .add_publisher(publisher.publish_req("cam2"))
        .await
        .unwrap();

    let ready = eventually(|| {
        let hls = hls.clone();
        async move { hls.events.lock().contains(&"ready cam2".to_string()) }
    })
    .await;
    assert!(ready);

    let old = registry.get_path("cam2").await.unwrap();
    registry
        .reload_path_confs([PathConf::new("cam1").unwrap()].into_iter().collect())
        .await
        .unwrap();

    assert!(registry.get_path("cam2").await.is_err());
    assert!(registry.get_path("cam1").await.is_ok());
    assert!(old.is_terminated());
    assert!(publisher.is_closed());
    assert!(hls.events.lock().contains(&"not_ready cam2".to_string()));

    registry.close().await;
}

#[tokio::test]
async fn added_conf_creates_fixed_path() {
    let registry = PathRegistry::new([PathConf::new("cam1").unwrap()].into_iter().collect());
    assert!(registry.get_path("cam3").await.is_err());

    let confs: PathConfs = [PathConf::new("cam1").unwrap(), PathConf::new("cam3").unwrap()]
        .into_iter()
        .collect();
    registry.reload_path_confs(confs).await.unwrap();

    assert!(registry.get_path("cam3").await.is_ok());
    let names: Vec<String> = registry
        .list_snapshots()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["cam1", "cam3"]);

    registry.close().await;
}

#[tokio::test]
async fn consecutive_reloads_compare_against_latest_conf() {
    let registry = PathRegistry::new([PathConf::new("~^eph/.+$").unwrap()].into_iter().collect());

    let publisher = TestPublisher::new("p1");
    let (path, _) = registry
        .add_publisher(publisher.publish_req("eph/a"))
        .await
        .unwrap();

    // first reload only renames the governing pattern
    registry
        .reload_path_confs([PathConf::new("~^eph/(.+)$").unwrap()].into_iter().collect())
        .await
        .unwrap();

    // second reload records under the new pattern: still hot-reloadable
    registry
        .reload_path_confs(
            [PathConf::new("~^eph/(.+)$").unwrap().record("/data/eph")]
                .into_iter()
                .collect(),
        )
        .await
        .unwrap();

    let current = registry.get_path("eph/a").await.unwrap();
    assert_eq!(current.id(), path.id());
    // a round-trip guarantees the actor has applied both reloads
    current.snapshot().await.unwrap();
    assert!(!publisher.is_closed());
    assert_eq!(current.conf().name, "~^eph/(.+)$");
    assert_eq!(current.conf().record_path, "/data/eph");

    // third reload changes a field that needs a new path
    registry
        .reload_path_confs(
            [PathConf::new("~^eph/(.+)$")
                .unwrap()
                .record("/data/eph")
                .override_publisher(false)]
            .into_iter()
            .collect(),
        )
        .await
        .unwrap();

    assert!(path.is_terminated());
    assert!(publisher.is_closed());
    assert!(registry.get_path("eph/a").await.is_err());

    registry.close().await;
}
