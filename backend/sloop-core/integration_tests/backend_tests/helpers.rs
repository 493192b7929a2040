//! Test helpers for driving a [`Connection`] against an in-memory backend.
//!
//! - [`FakeBackend`] plays the backend side of a duplex pipe
//! - [`DuplexLauncher`] hands out a fresh pipe per launch
//! - Recording doubles for the host collaborators

use sloop_core::collaborators::{
    ActiveBindingTracker, AliveConnectionTracker, ConfigScopeTracker, ConfigScopeUpdater,
    ResetAction, RestartNotifier,
};
use sloop_core::config::{FileConfigurationProvider, PathSource, SloopConfig, SloopPaths};
use sloop_core::connection_factory::RpcConnectionFactory;
use sloop_core::error::transport::TransportError;
use sloop_core::instance::SloopInstanceFactory;
use sloop_core::listeners::{ListenerAttacher, LogListener, RpcListener};
use sloop_core::services::ServiceRegistry;
use sloop_core::transport::codec::{read_message, write_message};
use sloop_core::transport::{BackendLauncher, Connection, ResponseError};

use models::BindingConfiguration;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{Value, json};
use tokio::io::{BufReader, DuplexStream, ReadHalf, WriteHalf, duplex, split};
use tokio::sync::mpsc;
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(5);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const PIPE_CAPACITY: usize = 64 * 1024;

/// Backend end of an in-memory connection.
pub struct FakeBackend {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
    buf: String,
}

impl FakeBackend {
    /// Next message from the host, or `None` once the host closed its side.
    pub async fn recv(&mut self) -> Option<Value> {
        timeout(WAIT, read_message(&mut self.reader, &mut self.buf))
            .await
            .expect("Timed out waiting for a message from the host")
            .expect("Failed to read message from the host")
    }

    /// Next message, which must be a request for `method`. Returns its id and params.
    pub async fn expect_request(&mut self, method: &str) -> (Value, Value) {
        let message = self.recv().await.expect("Host closed the connection");
        assert_eq!(message["jsonrpc"], "2.0");
        assert_eq!(message["method"], method, "unexpected message: {message}");
        let id = message.get("id").cloned().expect("Expected a request, got a notification");
        (id, message["params"].clone())
    }

    /// Next message, which must be a notification for `method`. Returns its params.
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

    pub async fn respond_error(&mut self, id: Value, code: i64, message: &str) {
        self.send(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": code, "message": message},
        }))
        .await;
    }

    /// Answers the `initialize` handshake.
    pub async fn complete_handshake(&mut self) -> Value {
        let (id, params) = self.expect_request("initialize").await;
        self.respond(id, json!({})).await;
        params
    }

    /// Simulates the backend process dying.
    pub fn crash(self) {
        drop(self);
    }
}

/// Host and backend ends of a fresh in-memory connection.
pub fn connection_pair(request_timeout: Duration) -> (Connection, FakeBackend) {
    connection_pair_with(&ListenerAttacher::default(), request_timeout)
}

/// Like [`connection_pair`], with `listeners` attached from the start.
pub fn connection_pair_with(
    listeners: &ListenerAttacher,
    request_timeout: Duration,
) -> (Connection, FakeBackend) {
    let (host, backend) = duplex(PIPE_CAPACITY);
    let (host_reader, host_writer) = split(host);
    let (backend_reader, backend_writer) = split(backend);

    let connection =
        Connection::over_streams(host_reader, host_writer, listeners, request_timeout);
    let backend = FakeBackend {
        reader: BufReader::new(backend_reader),
        writer: backend_writer,
        buf: String::new(),
    };
    (connection, backend)
}

/// Launcher whose "processes" are in-memory pipes handed to the test.
pub struct DuplexLauncher {
    backends: mpsc::UnboundedSender<FakeBackend>,
    fail: Arc<AtomicBool>,
    launches: Arc<AtomicUsize>,
    gate: Arc<LaunchGate>,
    request_timeout: Duration,
}

pub struct LaunchControl {
    pub backends: mpsc::UnboundedReceiver<FakeBackend>,
    pub fail: Arc<AtomicBool>,
    pub launches: Arc<AtomicUsize>,
    pub gate: Arc<LaunchGate>,
}

/// Holds `launch()` inside the launcher until the test releases it.
#[derive(Default)]
pub struct LaunchGate {
    held: Mutex<bool>,
    changed: Condvar,
    entered: AtomicBool,
}

impl LaunchGate {
    pub fn hold(&self) {
        *self.held.lock().unwrap() = true;
    }

    pub fn release(&self) {
        *self.held.lock().unwrap() = false;
        self.changed.notify_all();
    }

    /// True once a launch is waiting at (or went through) the gate.
    pub fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    fn pass(&self) {
        self.entered.store(true, Ordering::SeqCst);
        let mut held = self.held.lock().unwrap();
        while *held {
            held = self.changed.wait(held).unwrap();
        }
    }
}

impl LaunchControl {
    pub async fn next_backend(&mut self) -> FakeBackend {
        timeout(WAIT, self.backends.recv())
            .await
            .expect("Timed out waiting for a launch")
            .expect("Launcher dropped")
    }
}

impl DuplexLauncher {
    pub fn new(request_timeout: Duration) -> (Self, LaunchControl) {
        let (backends_tx, backends_rx) = mpsc::unbounded_channel();
        let fail = Arc::new(AtomicBool::new(false));
        let launches = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(LaunchGate::default());
        let launcher = Self {
            backends: backends_tx,
            fail: Arc::clone(&fail),
            launches: Arc::clone(&launches),
            gate: Arc::clone(&gate),
            request_timeout,
        };
        let control = LaunchControl {
            backends: backends_rx,
            fail,
            launches,
            gate,
        };
        (launcher, control)
    }
}

impl BackendLauncher for DuplexLauncher {
    fn launch(&self, listeners: &ListenerAttacher) -> Result<Connection, TransportError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::locate("no backend in this test"));
        }
        self.gate.pass();

        let (connection, backend) = connection_pair_with(listeners, self.request_timeout);
        let _ = self.backends.send(backend);
        Ok(connection)
    }
}

/// Listener that forwards everything it sees to the test.
pub struct RecordingListener {
    service: &'static str,
    seen: mpsc::UnboundedSender<(String, Value)>,
}

impl RecordingListener {
    pub fn new(service: &'static str) -> (Arc<Self>, mpsc::UnboundedReceiver<(String, Value)>) {
        let (seen, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { service, seen }), rx)
    }
}

impl RpcListener for RecordingListener {
    fn service(&self) -> &str {
        self.service
    }

    fn on_notification(&self, method: &str, params: Value) {
        let _ = self.seen.send((method.to_string(), params));
    }

    fn on_request(&self, method: &str, params: Value) -> Result<Value, ResponseError> {
        let _ = self.seen.send((method.to_string(), params.clone()));
        match method {
            "echo" => Ok(params),
            _ => Err(ResponseError::method_not_found(method)),
        }
    }
}

/// Host-side collaborators that record what the instance and supervisor asked of them.
#[derive(Default)]
pub struct RecordingHost {
    pub configuration: Option<BindingConfiguration>,
    pub events: Mutex<Vec<String>>,
    pub applied: Mutex<Vec<BindingConfiguration>>,
    pub resets: AtomicUsize,
}

impl RecordingHost {
    pub fn with_configuration(configuration: BindingConfiguration) -> Arc<Self> {
        Arc::new(Self {
            configuration: Some(configuration),
            ..Self::default()
        })
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: &str) {
        self.events.lock().unwrap().push(event.to_string());
    }
}

impl ActiveBindingTracker for RecordingHost {
    fn current_configuration(&self) -> Option<BindingConfiguration> {
        self.configuration.clone()
    }

    fn initialize(&self) -> BoxFuture<'_, ()> {
        async move { self.record("binding.initialize") }.boxed()
    }
}

impl ConfigScopeUpdater for RecordingHost {
    fn set_current_configuration(&self, configuration: BindingConfiguration) -> BoxFuture<'_, ()> {
        async move {
            self.record("scope.set_current_configuration");
            self.applied.lock().unwrap().push(configuration);
        }
        .boxed()
    }
}

impl ConfigScopeTracker for RecordingHost {
    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.record("scope.reset");
    }

    fn dispose(&self) {
        self.record("scope.dispose");
    }
}

impl AliveConnectionTracker for RecordingHost {
    fn dispose(&self) {
        self.record("connection.dispose");
    }
}

/// Notifier that hands each reset callback to the test.
pub struct ChannelNotifier {
    shown: mpsc::UnboundedSender<ResetAction>,
}

impl ChannelNotifier {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ResetAction>) {
        let (shown, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { shown }), rx)
    }
}

impl RestartNotifier for ChannelNotifier {
    fn show(&self, reset: ResetAction) {
        let _ = self.shown.send(reset);
    }
}

pub fn test_paths() -> SloopPaths {
    let data_dir = PathBuf::from("/tmp/sloop-test");
    SloopPaths {
        storage_root: data_dir.join("storage"),
        work_dir: data_dir.join("work"),
        user_home: data_dir.join(".sloop"),
        log_dir: data_dir.join("logs"),
        data_dir,
        source: PathSource::EnvVar,
    }
}

/// Everything needed to create real instances against in-memory backends.
pub struct InstanceStack {
    pub factory: SloopInstanceFactory,
    pub registry: Arc<ServiceRegistry>,
    pub control: LaunchControl,
}

pub fn instance_stack(host: &Arc<RecordingHost>, shutdown_timeout: Duration) -> InstanceStack {
    let (launcher, control) = DuplexLauncher::new(REQUEST_TIMEOUT);
    let registry = Arc::new(ServiceRegistry::new());
    let attacher = ListenerAttacher::new(vec![Arc::new(LogListener)]);
    let connection_factory = Arc::new(RpcConnectionFactory::new(
        Box::new(launcher),
        Arc::clone(&registry),
        attacher,
    ));
    let providers =
        FileConfigurationProvider::new(SloopConfig::default(), test_paths()).into_providers();

    let factory = SloopInstanceFactory::new(
        connection_factory,
        providers,
        host.clone(),
        host.clone(),
    )
    .with_shutdown_timeout(shutdown_timeout);

    InstanceStack {
        factory,
        registry,
        control,
    }
}

/// Polls `condition` until it holds or [`WAIT`] elapses.
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
