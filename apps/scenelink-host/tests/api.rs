use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use domain::{BindingConfig, Operation, Protocol};
use http_body_util::BodyExt;
use scenelink_auth::AuthManager;
use scenelink_host::{AppState, bootstrap::register_scene_bindings, build_app};
use scenelink_protocol::{ClientSettings, DefaultClientFactory};
use scenelink_runtime::ProtocolManager;
use scenelink_scene::{AttributeRecord, EntityRecord, InMemoryScene};
use serde_json::{Value, json};
use tower::ServiceExt;

struct Host {
    app: Router,
    scene: Arc<InMemoryScene>,
    _dir: tempfile::TempDir,
    reading: std::path::PathBuf,
    setpoint: std::path::PathBuf,
}

fn file_binding(path: &Path, operation: Operation, type_name: &str) -> BindingConfig {
    let mut config = BindingConfig::new(Protocol::File, "", "");
    config.operation = operation;
    config.uri = Some(format!("file://{}", path.display()));
    config.attribute_type = Some(type_name.to_string());
    config
}

async fn host() -> Host {
    let dir = tempfile::tempdir().expect("tempdir");
    let reading = dir.path().join("temperature.txt");
    let setpoint = dir.path().join("out").join("setpoint.json");
    std::fs::write(&reading, "42.5").expect("write reading");

    let scene = Arc::new(InMemoryScene::new());
    scene
        .insert_entity(
            EntityRecord::new("/World/Pump")
                .with_attribute(AttributeRecord::new("temperature", "double"))
                .with_attribute(AttributeRecord::new("setpoint", "int")),
        )
        .expect("insert entity");

    let auth = Arc::new(AuthManager::empty());
    let factory = Arc::new(DefaultClientFactory::new(
        auth.clone(),
        ClientSettings::default(),
    ));
    let manager = ProtocolManager::new(factory, scene.clone());
    manager
        .register_binding(
            "/World/Pump",
            "temperature",
            file_binding(&reading, Operation::Read, "double"),
        )
        .await
        .expect("register read binding");
    manager
        .register_binding(
            "/World/Pump",
            "setpoint",
            file_binding(&setpoint, Operation::Write, "int"),
        )
        .await
        .expect("register write binding");

    Host {
        app: build_app(AppState { manager, auth }),
        scene,
        _dir: dir,
        reading,
        setpoint,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let body = serde_json::from_slice(&bytes).expect("json body");
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("request")
}

fn post(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

#[tokio::test]
async fn health_carries_request_ids() {
    let host = host().await;
    let response = host.app.clone().oneshot(get("/health")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(response.headers().contains_key("x-trace-id"));
}

#[tokio::test]
async fn lists_registered_bindings() {
    let host = host().await;
    let (status, body) = send(&host.app, get("/api/bindings")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let items = body["data"].as_array().expect("array");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["attributeName"], "setpoint");
    assert_eq!(items[0]["state"], "disconnected");
    assert_eq!(items[1]["attributeName"], "temperature");
    assert_eq!(items[1]["state"], "connected");
    assert_eq!(items[1]["lastValue"], json!(42.5));
}

#[tokio::test]
async fn single_binding_lookup() {
    let host = host().await;
    let (status, body) = send(
        &host.app,
        get("/api/binding?entity=%2FWorld%2FPump&attribute=temperature"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["protocol"], "file");

    let (status, body) = send(
        &host.app,
        get("/api/binding?entity=%2FWorld%2FPump&attribute=rpm"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "RESOURCE.NOT_FOUND");
}

#[tokio::test]
async fn manual_read_applies_new_value() {
    let host = host().await;
    std::fs::write(&host.reading, "43.25").expect("update reading");

    let (status, body) = send(
        &host.app,
        post(
            "/api/bindings/read",
            json!({"entity": "/World/Pump", "attribute": "temperature"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], json!(43.25));
    assert_eq!(
        host.scene.attribute_value("/World/Pump", "temperature"),
        Some(json!(43.25))
    );
}

#[tokio::test]
async fn read_after_disconnect_is_rejected() {
    let host = host().await;
    let target = json!({"entity": "/World/Pump", "attribute": "temperature"});

    let (status, body) = send(&host.app, post("/api/bindings/disconnect", target.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "disconnected");

    let (status, body) = send(&host.app, post("/api/bindings/read", target.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "BINDING.NOT_CONNECTED");

    let (status, body) = send(&host.app, post("/api/bindings/connect", target)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["state"], "connected");
}

#[tokio::test]
async fn manual_write_reaches_file() {
    let host = host().await;
    let (status, body) = send(
        &host.app,
        post(
            "/api/bindings/write",
            json!({"entity": "/World/Pump", "attribute": "setpoint", "value": 1500}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["accepted"], json!(true));
    let written = std::fs::read_to_string(&host.setpoint).expect("setpoint file");
    assert_eq!(written, "1500");
}

#[tokio::test]
async fn unknown_binding_actions_return_not_found() {
    let host = host().await;
    let (status, body) = send(
        &host.app,
        post(
            "/api/bindings/connect",
            json!({"entity": "/World/Nowhere", "attribute": "x"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "BINDING.NOT_FOUND");
}

#[tokio::test]
async fn streaming_endpoints_report_per_binding() {
    let host = host().await;
    let (status, body) = send(&host.app, post("/api/streaming/start", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["succeeded"], json!([]));
    assert_eq!(body["data"]["failed"], json!([]));

    let (status, _) = send(&host.app, post("/api/streaming/stop", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn profile_endpoints_without_profiles() {
    let host = host().await;
    let (status, body) = send(&host.app, get("/api/profiles")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, body) = send(&host.app, get("/api/profiles/plant/validate")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["profile"], "plant");
    assert_eq!(body["data"]["valid"], json!(false));
}

#[tokio::test]
async fn metrics_snapshot_is_exposed() {
    let host = host().await;
    let (status, body) = send(&host.app, get("/api/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["valuesReceived"].as_u64().expect("counter") >= 1);
}

#[tokio::test]
async fn scene_bindings_register_concurrently() {
    // 接受连接但从不应答，每次读取都要等满 HTTP 超时
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let scene = Arc::new(InMemoryScene::new());
    let mut entity = EntityRecord::new("/World/Line3");
    for name in ["a", "b", "c", "d", "e"] {
        entity = entity.with_attribute(AttributeRecord::new(name, "double"));
    }
    scene.insert_entity(entity).expect("insert entity");

    let settings = ClientSettings {
        http_timeout: Duration::from_millis(400),
        ..ClientSettings::default()
    };
    let factory = Arc::new(DefaultClientFactory::new(Arc::new(AuthManager::empty()), settings));
    let manager = ProtocolManager::new(factory, scene);

    let mut configs = Vec::new();
    for name in ["a", "b", "c", "d"] {
        let mut config = BindingConfig::new(Protocol::Rest, "/World/Line3", name);
        config.uri = Some(format!("http://{addr}/sensors/{name}"));
        config.attribute_type = Some("double".into());
        configs.push(config);
    }
    configs.push(BindingConfig::new(Protocol::Rest, "/World/Line3", "e"));

    let started = Instant::now();
    let registered = register_scene_bindings(&manager, configs).await;
    let elapsed = started.elapsed();

    assert_eq!(registered, 4);
    assert!(elapsed < Duration::from_millis(1200), "took {elapsed:?}");
    for snapshot in manager.bindings() {
        assert!(snapshot.last_error.is_some());
    }
}
