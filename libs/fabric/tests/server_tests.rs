use std::sync::Arc;
use std::time::Duration;

use socklink_core::decode::MAX_DEPTH;
use socklink_core::{decode, DecodeError, Value};
use socklink_fabric::{
    listen, request, request_with, transport::UnixTransport, BoxError, Error, Handler, Server,
    Stage,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Notify;

async fn uppercase(value: Value) -> Result<Value, BoxError> {
    match value {
        Value::String(s) => Ok(Value::String(s.to_uppercase())),
        other => Err(format!("expected a string, got {}", other.kind()).into()),
    }
}

/// Holds "slow" requests until released
struct Gate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait::async_trait]
impl Handler for Gate {
    async fn handle(&self, request: Value) -> Result<Value, BoxError> {
        if request.as_str() == Some("slow") {
            self.started.notify_one();
            self.release.notified().await;
        }
        uppercase(request).await
    }
}

#[tokio::test]
async fn request_round_trips_through_handler() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upper.sock");

    let (server, mut errors) = listen(&path, uppercase).await.unwrap();
    assert_eq!(server.path(), Some(path.as_path()));

    let response = request(&path, &Value::from("hello")).await.unwrap();
    assert_eq!(response, Value::from("HELLO"));

    server.shutdown().await.unwrap();
    assert!(errors.try_recv().is_none());
}

#[tokio::test]
async fn structured_values_cross_the_wire() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("echo.sock");

    let (server, _errors) = listen(&path, echo).await.unwrap();

    let mut map = std::collections::BTreeMap::new();
    map.insert("zeros".into(), Value::Binary(vec![0; 3000]));
    map.insert("count".into(), Value::from(-5i64));
    map.insert("ratio".into(), Value::from(0.5));
    map.insert("missing".into(), Value::Nil);
    let value = Value::Map(map);

    assert_eq!(request(&path, &value).await.unwrap(), value);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_clients_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gate.sock");

    let gate = Gate {
        started: Arc::new(Notify::new()),
        release: Arc::new(Notify::new()),
    };
    let started = gate.started.clone();
    let release = gate.release.clone();
    let (server, _errors) = listen(&path, gate).await.unwrap();

    let slow_path = path.clone();
    let slow = tokio::spawn(async move { request(&slow_path, &Value::from("slow")).await });
    started.notified().await;

    // The first request is parked inside the handler
    let fast = request(&path, &Value::from("fast")).await.unwrap();
    assert_eq!(fast, Value::from("FAST"));
    assert!(!slow.is_finished());

    release.notify_one();
    assert_eq!(slow.await.unwrap().unwrap(), Value::from("SLOW"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn many_clients_at_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("many.sock");

    let (server, mut errors) = listen(&path, uppercase).await.unwrap();

    let clients: Vec<_> = (0..16)
        .map(|i| {
            let path = path.clone();
            tokio::spawn(async move { request(&path, &Value::from(format!("client {i}"))).await })
        })
        .collect();

    for (i, client) in clients.into_iter().enumerate() {
        let response = client.await.unwrap().unwrap();
        assert_eq!(response, Value::from(format!("CLIENT {i}")));
    }

    server.shutdown().await.unwrap();
    assert!(errors.drain().is_empty());
}

#[tokio::test]
async fn malformed_request_is_reported_and_server_keeps_going() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("resilient.sock");

    let (server, mut errors) = listen(&path, uppercase).await.unwrap();

    let mut stream = UnixStream::connect(&path).await.unwrap();
    stream.write_all(&[0xc1, 0x00]).await.unwrap();
    stream.flush().await.unwrap();

    let failure = errors.recv().await.unwrap();
    assert_eq!(failure.stage, Stage::Decode);
    assert!(matches!(
        failure.error,
        Error::Decode(DecodeError::Reserved { tag: 0xc1, .. })
    ));

    let response = request(&path, &Value::from("again")).await.unwrap();
    assert_eq!(response, Value::from("AGAIN"));

    server.shutdown().await.unwrap();
}

async fn echo(value: Value) -> Result<Value, BoxError> {
    Ok(value)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deeply_nested_requests_do_not_take_the_server_down() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("deep.sock");

    let (server, mut errors) = listen(&path, echo).await.unwrap();

    // One level past the limit is rejected on its own connection
    let mut stream = UnixStream::connect(&path).await.unwrap();
    let mut too_deep = vec![0x91; MAX_DEPTH + 1];
    too_deep.extend_from_slice(&[0xc0, 0x00]);
    stream.write_all(&too_deep).await.unwrap();
    stream.flush().await.unwrap();

    let failure = errors.recv().await.unwrap();
    assert_eq!(failure.stage, Stage::Decode);
    assert!(matches!(
        failure.error,
        Error::Decode(DecodeError::TooDeep { limit: MAX_DEPTH, .. })
    ));

    // Exactly at the limit is answered
    let mut deepest = vec![0x91; MAX_DEPTH];
    deepest.push(0xc0);
    let deepest = decode(&deepest).unwrap();
    assert_eq!(request(&path, &deepest).await.unwrap(), deepest);

    let response = request(&path, &Value::from("still here")).await.unwrap();
    assert_eq!(response, Value::from("still here"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn handler_failure_closes_connection_without_response() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("handler.sock");

    let (server, mut errors) = listen(&path, uppercase).await.unwrap();

    // The handler only accepts strings
    let result = request(&path, &Value::from(5u8)).await;
    assert!(matches!(result, Err(Error::Decode(e)) if e.is_truncated()));

    let failure = errors.recv().await.unwrap();
    assert_eq!(failure.stage, Stage::Handle);
    assert!(failure.to_string().contains("expected a string"));

    server.shutdown().await.unwrap();
}

/// Send a malformed frame and wait for the server to hang up
async fn send_garbage(path: &std::path::Path) {
    let mut stream = UnixStream::connect(path).await.unwrap();
    stream.write_all(&[0xc1, 0x00]).await.unwrap();
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).await.unwrap();
    assert!(rest.is_empty());
}

#[tokio::test]
async fn undrained_failures_are_capped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capped.sock");

    let (server, mut errors) = Server::builder()
        .path(&path)
        .event_capacity(2)
        .listen(uppercase)
        .await
        .unwrap();

    for _ in 0..5 {
        send_garbage(&path).await;
    }
    // Reports land just after the connection is dropped
    tokio::time::sleep(Duration::from_millis(100)).await;

    let queued = errors.drain();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].connection, 1);
    assert_eq!(queued[1].connection, 2);

    // Room again once drained
    send_garbage(&path).await;
    let failure = errors.recv().await.unwrap();
    assert_eq!(failure.connection, 6);
    assert_eq!(failure.stage, Stage::Decode);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn connect_failure_is_reported_to_client() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nobody.sock");

    let result = request(&path, &Value::Nil).await;
    assert!(matches!(result, Err(Error::Connect { .. })));
}

#[tokio::test]
async fn read_timeout_drops_silent_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("silent.sock");

    let (server, mut errors) = Server::builder()
        .path(&path)
        .read_timeout(Duration::from_millis(100))
        .listen(uppercase)
        .await
        .unwrap();

    // Connected but never sends anything
    let _idle = UnixStream::connect(&path).await.unwrap();

    let failure = errors.recv().await.unwrap();
    assert_eq!(failure.stage, Stage::Read);
    assert!(matches!(failure.error, Error::Custom(ref msg) if msg.contains("timeout")));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn client_builder_settings_apply_to_request() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configured.sock");

    let (server, _errors) = listen(&path, uppercase).await.unwrap();

    let builder = UnixTransport::builder()
        .path(&path)
        .connect_timeout(Duration::from_secs(1))
        .receive_timeout(Duration::from_secs(1));
    let response = request_with(builder, &Value::from("configured")).await.unwrap();
    assert_eq!(response, Value::from("CONFIGURED"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn listen_replaces_stale_socket_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stale.sock");
    std::fs::write(&path, b"").unwrap();

    let (server, _errors) = listen(&path, uppercase).await.unwrap();
    assert_eq!(
        request(&path, &Value::from("fresh")).await.unwrap(),
        Value::from("FRESH")
    );

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_removes_socket_and_ends_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shutdown.sock");

    let (server, mut errors) = listen(&path, uppercase).await.unwrap();
    assert!(path.exists());
    assert!(!server.is_finished());

    server.shutdown().await.unwrap();

    assert!(!path.exists());
    assert!(errors.recv().await.is_none());
    assert!(matches!(
        request(&path, &Value::from("late")).await,
        Err(Error::Connect { .. })
    ));
}
