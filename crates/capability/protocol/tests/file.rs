use std::sync::Arc;
use std::time::{Duration, SystemTime};

use domain::{BindingConfig, Protocol};
use futures::FutureExt;
use scenelink_protocol::{FileClient, ProtocolClient, StreamHandler, ValueCallback};
use serde_json::{json, Value};
use tokio::sync::mpsc;

fn file_binding(path: &std::path::Path) -> BindingConfig {
    let mut config = BindingConfig::new(Protocol::File, "/World/Tank", "level");
    config.uri = Some(format!("file://{}", path.display()));
    config
}

#[tokio::test]
async fn json_round_trip_creates_parent_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/state.json");
    let config = file_binding(&path);

    let client = FileClient::new();
    client.connect(&config).await.unwrap();
    let value = json!({"level": 0.75, "alarm": false});
    assert!(client.write(&config, &value).await.unwrap());

    assert_eq!(client.read(&config).await.unwrap(), value);
}

#[tokio::test]
async fn text_files_parse_numbers_first() {
    let dir = tempfile::tempdir().unwrap();
    let int_path = dir.path().join("count.txt");
    let float_path = dir.path().join("level.txt");
    let text_path = dir.path().join("mode.txt");
    std::fs::write(&int_path, "42\n").unwrap();
    std::fs::write(&float_path, "3.5").unwrap();
    std::fs::write(&text_path, "auto").unwrap();

    let client = FileClient::new();
    assert_eq!(client.read(&file_binding(&int_path)).await.unwrap(), json!(42));
    assert_eq!(client.read(&file_binding(&float_path)).await.unwrap(), json!(3.5));
    assert_eq!(client.read(&file_binding(&text_path)).await.unwrap(), json!("auto"));
}

#[tokio::test]
async fn missing_file_reads_as_null() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_binding(&dir.path().join("absent.json"));

    let client = FileClient::new();
    client.connect(&config).await.unwrap();
    assert_eq!(client.read(&config).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn stream_waits_for_modification() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.json");
    std::fs::write(&path, r#"{"v": 1}"#).unwrap();
    let mut config = file_binding(&path);
    config.refresh_policy = Some("interval:0.1s".into());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let on_value: ValueCallback = Arc::new(move |value: Value| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(value);
        }
        .boxed()
    });

    let client = FileClient::new();
    client.connect(&config).await.unwrap();
    client.start_stream(&config, StreamHandler::new(on_value)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(rx.try_recv().is_err());

    std::fs::write(&path, r#"{"v": 2}"#).unwrap();
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();

    let value = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value, json!({"v": 2}));

    client.stop_stream(&config).await.unwrap();
    client.disconnect().await.unwrap();
    assert!(!client.is_connected());
}
