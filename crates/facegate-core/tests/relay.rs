//! Relay client against an in-process stand-in for the recognition service.

use facegate_core::{RelayClient, RelayConfig, RelayError};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::Filter;

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    content_type: String,
    body: Vec<u8>,
}

struct MockUpstream {
    addr: SocketAddr,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<Recorded>>>,
}

impl MockUpstream {
    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn recorded(&self) -> Vec<Recorded> {
        self.seen.lock().unwrap().clone()
    }
}

/// Serve `body` with `status` for every request.
fn spawn_upstream(status: u16, body: Value) -> MockUpstream {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let route = {
        let calls = calls.clone();
        let seen = seen.clone();
        warp::any()
            .and(warp::method())
            .and(warp::path::full())
            .and(warp::header::optional::<String>("content-type"))
            .and(warp::body::bytes())
            .map(
                move |method: warp::http::Method,
                      path: warp::path::FullPath,
                      content_type: Option<String>,
                      bytes: Bytes| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    seen.lock().unwrap().push(Recorded {
                        method: method.to_string(),
                        path: path.as_str().to_string(),
                        content_type: content_type.unwrap_or_default(),
                        body: bytes.to_vec(),
                    });
                    warp::reply::with_status(
                        warp::reply::json(&body),
                        StatusCode::from_u16(status).unwrap(),
                    )
                },
            )
    };

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    MockUpstream { addr, calls, seen }
}

fn client(base_url: &str, scratch: &Path) -> RelayClient {
    RelayClient::new(RelayConfig {
        base_url: base_url.to_string(),
        scratch_dir: scratch.to_path_buf(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn scratch_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[tokio::test]
async fn register_sends_name_and_file_parts() {
    let upstream = spawn_upstream(200, json!({"status": "success", "name": "ada"}));
    let scratch = tempfile::tempdir().unwrap();
    let relay = client(&upstream.base_url(), scratch.path());

    let image = b"\xFF\xD8\xFFfake-jpeg-ada";
    let data = relay.register("ada", image).await.unwrap();
    assert_eq!(data, json!({"status": "success", "name": "ada"}));

    let recorded = upstream.recorded();
    assert_eq!(recorded.len(), 1);
    let req = &recorded[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.path, "/add_face/");
    assert!(req.content_type.starts_with("multipart/form-data"), "{}", req.content_type);
    assert!(contains(&req.body, b"name=\"name\""));
    assert!(contains(&req.body, b"\r\n\r\nada\r\n"));
    assert!(contains(&req.body, b"name=\"file\"; filename=\"register_"));
    assert!(contains(&req.body, b"Content-Type: image/jpeg"));
    assert!(contains(&req.body, image));

    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn recognize_sends_only_file_part() {
    let detections = json!([
        {"bounding_box": [10, 120, 90, 40], "name": "ada", "status": "match"},
        {"bounding_box": [15, 300, 110, 220], "name": "Unknown", "status": "unknown"}
    ]);
    let upstream = spawn_upstream(200, detections.clone());
    let scratch = tempfile::tempdir().unwrap();
    let relay = client(&upstream.base_url(), scratch.path());

    let results = relay.recognize(b"frame-bytes").await.unwrap();
    assert_eq!(results, detections);

    let req = &upstream.recorded()[0];
    assert_eq!(req.path, "/identify_face/");
    assert!(!contains(&req.body, b"name=\"name\""));
    assert!(contains(&req.body, b"filename=\"recognize_"));
    assert!(contains(&req.body, b"frame-bytes"));
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn duplicate_name_is_distinguished() {
    let upstream = spawn_upstream(400, json!({"detail": "Name must be unique."}));
    let scratch = tempfile::tempdir().unwrap();
    let relay = client(&upstream.base_url(), scratch.path());

    let err = relay.register("ada", b"img").await.unwrap_err();
    assert!(matches!(err, RelayError::DuplicateName));
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn upstream_detail_is_surfaced() {
    let upstream = spawn_upstream(400, json!({"detail": "No face detected."}));
    let scratch = tempfile::tempdir().unwrap();
    let relay = client(&upstream.base_url(), scratch.path());

    let err = relay.register("ada", b"img").await.unwrap_err();
    match err {
        RelayError::Upstream { status, detail } => {
            assert_eq!(status, Some(400));
            assert_eq!(detail, "No face detected.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn no_retry_on_failure() {
    let upstream = spawn_upstream(500, json!({"detail": "boom"}));
    let scratch = tempfile::tempdir().unwrap();
    let relay = client(&upstream.base_url(), scratch.path());

    assert!(relay.recognize(b"img").await.is_err());
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn repeated_failures_leave_no_artifacts() {
    let upstream = spawn_upstream(500, json!({"detail": "model crashed"}));
    let scratch = tempfile::tempdir().unwrap();
    let relay = client(&upstream.base_url(), scratch.path());

    for i in 0..120 {
        let image = format!("frame-{i}");
        let err = relay.recognize(image.as_bytes()).await.unwrap_err();
        assert_eq!(err.detail(), "model crashed");
    }
    assert_eq!(upstream.calls(), 120);
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn transport_failure_leaves_no_artifacts() {
    // Bind and immediately drop a listener so the port is closed.
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);

    let scratch = tempfile::tempdir().unwrap();
    let relay = client(&format!("http://{addr}"), scratch.path());

    for _ in 0..100 {
        let err = relay.register("ada", b"img").await.unwrap_err();
        match err {
            RelayError::Upstream { status, detail } => {
                assert_eq!(status, None);
                assert!(!detail.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn cancelled_call_leaves_no_artifacts() {
    // Upstream that holds every request well past the caller's deadline.
    let route = warp::any().and_then(|| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok::<_, std::convert::Infallible>(warp::reply::json(&json!({"status": "success"})))
    });
    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);

    let scratch = tempfile::tempdir().unwrap();
    let relay = client(&format!("http://{addr}"), scratch.path());

    for _ in 0..8 {
        let outcome =
            tokio::time::timeout(Duration::from_millis(100), relay.register("ada", b"img")).await;
        assert!(outcome.is_err(), "call should still be waiting on the upstream");
    }
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn concurrent_registers_do_not_collide() {
    let upstream = spawn_upstream(200, json!({"status": "success"}));
    let scratch = tempfile::tempdir().unwrap();
    let relay = Arc::new(client(&upstream.base_url(), scratch.path()));

    let mut handles = Vec::new();
    for i in 0..16 {
        let relay = relay.clone();
        handles.push(tokio::spawn(async move {
            let name = format!("person-{i}");
            let image = format!("image-of-person-{i}");
            relay.register(&name, image.as_bytes()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let recorded = upstream.recorded();
    assert_eq!(recorded.len(), 16);
    for i in 0..16 {
        let image = format!("image-of-person-{i}");
        let name = format!("\r\n\r\nperson-{i}\r\n");
        let matching: Vec<_> = recorded
            .iter()
            .filter(|r| contains(&r.body, image.as_bytes()))
            .collect();
        assert_eq!(matching.len(), 1, "image {i} uploaded once");
        assert!(contains(&matching[0].body, name.as_bytes()), "image {i} paired with its name");
    }
    assert_eq!(scratch_entries(scratch.path()), 0);
}

#[tokio::test]
async fn list_and_delete_faces_relay() {
    let upstream = spawn_upstream(200, json!({"faces": ["ada", "grace"]}));
    let scratch = tempfile::tempdir().unwrap();
    let relay = client(&upstream.base_url(), scratch.path());

    let faces = relay.list_faces().await.unwrap();
    assert_eq!(faces["faces"], json!(["ada", "grace"]));
    relay.delete_all_faces().await.unwrap();
    relay.health().await.unwrap();

    let recorded = upstream.recorded();
    let calls: Vec<_> = recorded
        .iter()
        .map(|r| (r.method.as_str(), r.path.as_str()))
        .collect();
    assert_eq!(
        calls,
        vec![
            ("GET", "/list_faces/"),
            ("DELETE", "/delete_all_faces/"),
            ("GET", "/"),
        ]
    );
}
