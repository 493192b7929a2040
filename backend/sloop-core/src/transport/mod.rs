//! Framed JSON-RPC connection to an out-of-process backend.

pub mod codec;
mod io;
pub mod launcher;
pub mod message;

pub use launcher::{BackendLauncher, BackendLocator, LaunchOptions, ProcessLauncher};
pub use message::{Message, RequestId, ResponseError};

use self::io::{Shared, run_reader, run_writer};
use crate::error::transport::TransportError;
use crate::listeners::{ListenerAttacher, RpcListener};
use crate::services::{RpcService, ServiceProxy};

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use backoff::{ExponentialBackoff, backoff::Backoff};
use log::{debug, info, trace, warn};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::process::Child;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::{sleep, timeout};
use uuid::Uuid;

const EXIT_GRACE_PERIOD: Duration = Duration::from_secs(2);
const KILL_VERIFY_MAX_ELAPSED: Duration = Duration::from_secs(5);
const EXIT_POLL_INITIAL_INTERVAL: Duration = Duration::from_millis(50);

/// One live channel to a backend. Owns the backend process when it was launched locally.
///
/// The connection is alive from construction until the stream hits EOF, a read or write
/// fails, or [`Connection::dispose`] runs. It never comes back to life.
pub struct Connection {
    shared: Arc<Shared>,
    outbound_tx: mpsc::UnboundedSender<Value>,
    next_id: AtomicI64,
    request_timeout: Duration,
    process: Mutex<Option<Child>>,
}

impl Connection {
    /// Wraps an already-open byte stream pair. Must be called inside a Tokio runtime.
    ///
    /// `listeners` are in place before the reader starts, so they see the first inbound message.
    pub fn over_streams<R, W>(
        reader: R,
        writer: W,
        listeners: &ListenerAttacher,
        request_timeout: Duration,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::with_process(reader, writer, None, listeners, request_timeout)
    }

    /// Takes ownership of a spawned backend and talks to it over its stdio pipes.
    pub fn over_process(
        mut child: Child,
        listeners: &ListenerAttacher,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::protocol("backend process has no stdin pipe"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::protocol("backend process has no stdout pipe"))?;
        let stderr = child.stderr.take();

        let connection =
            Self::with_process(stdout, stdin, Some(child), listeners, request_timeout);

        if let Some(stderr) = stderr {
            let id = connection.id();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!("Backend stderr [{id}]: {line}");
                }
            });
        }

        Ok(connection)
    }

    fn with_process<R, W>(
        reader: R,
        writer: W,
        process: Option<Child>,
        listeners: &ListenerAttacher,
        request_timeout: Duration,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let shared = Arc::new(Shared::new(Uuid::new_v4(), listeners.listeners().to_vec()));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_reader(reader, Arc::clone(&shared), outbound_tx.clone()));
        tokio::spawn(run_writer(writer, outbound_rx, Arc::clone(&shared)));

        debug!(
            "Opened connection {} with {} listener(s)",
            shared.id,
            listeners.len()
        );

        Self {
            shared,
            outbound_tx,
            next_id: AtomicI64::new(0),
            request_timeout,
            process: Mutex::new(process),
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn is_alive(&self) -> bool {
        self.shared.is_alive()
    }

    /// Resolves once the connection is dead. Resolves immediately if it already is.
    pub async fn closed(&self) {
        self.shared.closed().await
    }

    pub fn add_listener(&self, listener: Arc<dyn RpcListener>) {
        self.shared.add_listener(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listener_count()
    }

    /// Builds a typed proxy bound to this connection.
    pub fn create_service<T: RpcService>(self: &Arc<Self>) -> T {
        T::bind(ServiceProxy::new(Arc::clone(self), T::NAME))
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = oneshot::channel();
        self.shared.register(id.clone(), tx)?;

        let message = Message::Request {
            id: id.clone(),
            method: method.to_string(),
            params,
        };
        if self.outbound_tx.send(message.into_value()).is_err() {
            self.shared.take_pending(&id);
            return Err(TransportError::closed(format!(
                "cannot send '{method}': writer for {} stopped",
                self.id()
            )));
        }
        trace!("-> {method} (#{id}) on connection {}", self.id());

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::closed(format!("'{method}' was abandoned"))),
            Err(_) => {
                self.shared.take_pending(&id);
                Err(TransportError::timeout(format!(
                    "'{method}' got no response within {:?}",
                    self.request_timeout
                )))
            }
        }
    }

    pub fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        if !self.is_alive() {
            return Err(TransportError::closed(format!(
                "cannot notify '{method}': connection {} is closed",
                self.id()
            )));
        }

        let message = Message::Notification {
            method: method.to_string(),
            params,
        };
        self.outbound_tx.send(message.into_value()).map_err(|_| {
            TransportError::closed(format!("cannot notify '{method}': writer stopped"))
        })?;
        trace!("-> {method} (notification) on connection {}", self.id());
        Ok(())
    }

    /// Closes the streams and stops the owned backend process, if any. Idempotent.
    ///
    /// The process gets a short grace period to exit on its own after its stdin closes, then
    /// it is killed and its exit is verified with exponential backoff.
    pub async fn dispose(&self) {
        self.shared.mark_closed("connection disposed");

        let child = self.process.lock().await.take();
        if let Some(child) = child {
            stop_process(self.id(), child).await;
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.mark_closed("connection dropped");
    }
}

async fn stop_process(id: Uuid, mut child: Child) -> bool {
    if wait_for_exit(id, &mut child, EXIT_GRACE_PERIOD).await {
        return true;
    }

    debug!("Backend for connection {id} did not exit on its own, killing it");
    if let Err(e) = child.start_kill() {
        warn!("Failed to kill backend for connection {id}: {e}");
    }

    if wait_for_exit(id, &mut child, KILL_VERIFY_MAX_ELAPSED).await {
        return true;
    }

    warn!("Backend for connection {id} still running after {KILL_VERIFY_MAX_ELAPSED:?}");
    false
}

async fn wait_for_exit(id: Uuid, child: &mut Child, max_elapsed: Duration) -> bool {
    let mut backoff = ExponentialBackoff {
        initial_interval: EXIT_POLL_INITIAL_INTERVAL,
        max_elapsed_time: Some(max_elapsed),
        ..Default::default()
    };

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                info!("Backend for connection {id} exited: {status}");
                return true;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to poll backend for connection {id}: {e}");
                return false;
            }
        }

        match backoff.next_backoff() {
            Some(duration) => {
                trace!("Backend for connection {id} still alive, retrying after {duration:?}");
                sleep(duration).await;
            }
            None => return false,
        }
    }
}
