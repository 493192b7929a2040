//! In-memory backend for driving a fully wired [`sloop::app::SloopApp`].

use sloop_core::collaborators::{ResetAction, RestartNotifier};
use sloop_core::config::{PathSource, SloopPaths};
use sloop_core::error::transport::TransportError;
use sloop_core::listeners::ListenerAttacher;
use sloop_core::transport::codec::{read_message, write_message};
use sloop_core::transport::{BackendLauncher, Connection};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{BufReader, DuplexStream, ReadHalf, WriteHalf, duplex, split};
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(5);

pub struct FakeBackend {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    buf: String,
}

impl FakeBackend {
    pub async fn recv(&mut self) -> Option<Value> {
        timeout(WAIT, read_message(&mut self.reader, &mut self.buf))
            .await
            .expect("Timed out waiting for a message from the host")
            .expect("Malformed frame from the host")
    }

    pub async fn expect_request(&mut self, method: &str) -> (Value, Value) {
        let message = self.recv().await.expect("Host closed the connection");
        assert_eq!(message["method"], method, "unexpected message: {message}");
        let id = message.get("id").cloned().expect("Expected a request");
        (id, message["params"].clone())
    }

    pub async fn expect_notification(&mut self, method: &str) -> Value {
        let message = self.recv().await.expect("Host closed the connection");
        assert_eq!(message["method"], method, "unexpected message: {message}");
        assert!(message.get("id").is_none(), "Expected a notification: {message}");
        message["params"].clone()
    }

    pub async fn send(&mut self, value: Value) {
        write_message(&mut self.writer, &value)
            .await
            .expect("Failed to write to the host");
    }

    pub async fn respond(&mut self, id: Value, result: Value) {
        self.send(json!({"jsonrpc": "2.0", "id": id, "result": result}))
            .await;
    }
}

/// Hands every launch a fresh in-memory pipe and passes the backend end to the test.
pub struct DuplexLauncher {
    backends: mpsc::UnboundedSender<FakeBackend>,
}

impl DuplexLauncher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FakeBackend>) {
        let (backends, rx) = mpsc::unbounded_channel();
        (Self { backends }, rx)
    }
}

impl BackendLauncher for DuplexLauncher {
    fn launch(&self, listeners: &ListenerAttacher) -> Result<Connection, TransportError> {
        let (host, backend) = duplex(64 * 1024);
        let (host_reader, host_writer) = split(host);
        let (backend_reader, backend_writer) = split(backend);

        let connection = Connection::over_streams(host_reader, host_writer, listeners, WAIT);
        let _ = self.backends.send(FakeBackend {
            reader: BufReader::new(backend_reader),
            writer: backend_writer,
            buf: String::new(),
        });
        Ok(connection)
    }
}

pub async fn next_backend(backends: &mut mpsc::UnboundedReceiver<FakeBackend>) -> FakeBackend {
    timeout(WAIT, backends.recv())
        .await
        .expect("Timed out waiting for a launch")
        .expect("Launcher dropped")
}

/// Passes the reset callback straight to the test.
pub struct ChannelNotifier(mpsc::UnboundedSender<ResetAction>);

impl ChannelNotifier {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ResetAction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self(tx)), rx)
    }
}

impl RestartNotifier for ChannelNotifier {
    fn show(&self, reset: ResetAction) {
        let _ = self.0.send(reset);
    }
}

pub fn test_paths() -> SloopPaths {
    let data_dir = PathBuf::from("/tmp/sloop-host-test");
    SloopPaths {
        storage_root: data_dir.join("storage"),
        work_dir: data_dir.join("work"),
        user_home: data_dir.join(".sloop"),
        log_dir: data_dir.join("logs"),
        data_dir,
        source: PathSource::EnvVar,
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {WAIT:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
