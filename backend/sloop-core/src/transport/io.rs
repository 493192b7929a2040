use super::codec::{read_message, write_message};
use super::message::{Message, RequestId, ResponseError, split_method};
use crate::error::transport::TransportError;
use crate::listeners::RpcListener;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use log::{debug, error, info, trace, warn};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

pub(super) type PendingResponse = oneshot::Sender<Result<Value, TransportError>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared between a [`super::Connection`] and its reader/writer tasks.
pub(super) struct Shared {
    pub(super) id: Uuid,
    alive: AtomicBool,
    closed_tx: watch::Sender<bool>,
    pending: Mutex<HashMap<RequestId, PendingResponse>>,
    listeners: RwLock<Vec<Arc<dyn RpcListener>>>,
}

impl Shared {
    pub(super) fn new(id: Uuid, listeners: Vec<Arc<dyn RpcListener>>) -> Self {
        Self {
            id,
            alive: AtomicBool::new(true),
            closed_tx: watch::Sender::new(false),
            pending: Mutex::new(HashMap::new()),
            listeners: RwLock::new(listeners),
        }
    }

    pub(super) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Marks the connection dead, wakes every `closed()` waiter and fails in-flight requests.
    pub(super) fn mark_closed(&self, reason: &str) {
        if self.alive.swap(false, Ordering::SeqCst) {
            info!("Connection {} closed: {reason}", self.id);
        }
        self.closed_tx.send_replace(true);

        let drained: Vec<PendingResponse> = lock(&self.pending).drain().map(|(_, tx)| tx).collect();
        if !drained.is_empty() {
            debug!(
                "Failing {} pending request(s) on connection {}",
                drained.len(),
                self.id
            );
        }
        for tx in drained {
            let _ = tx.send(Err(TransportError::closed(reason.to_string())));
        }
    }

    pub(super) async fn closed(&self) {
        let mut rx = self.closed_tx.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    pub(super) fn register(&self, id: RequestId, tx: PendingResponse) -> Result<(), TransportError> {
        let mut pending = lock(&self.pending);
        if !self.is_alive() {
            return Err(TransportError::closed(format!(
                "connection {} is no longer alive",
                self.id
            )));
        }
        pending.insert(id, tx);
        Ok(())
    }

    pub(super) fn take_pending(&self, id: &RequestId) -> Option<PendingResponse> {
        lock(&self.pending).remove(id)
    }

    pub(super) fn add_listener(&self, listener: Arc<dyn RpcListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub(super) fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn listener_for(&self, service: &str) -> Option<Arc<dyn RpcListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|listener| listener.service() == service)
            .cloned()
    }
}

/// Reads framed messages until EOF, a read failure or disposal.
pub(super) async fn run_reader<R>(
    reader: R,
    shared: Arc<Shared>,
    outbound_tx: mpsc::UnboundedSender<Value>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(reader);
    let mut buf = String::new();

    let reason = loop {
        tokio::select! {
            result = read_message(&mut reader, &mut buf) => match result {
                Ok(Some(value)) => handle_inbound(&shared, &outbound_tx, value),
                Ok(None) => break "backend closed the stream",
                Err(e) => {
                    error!("Error reading from connection {}: {e}", shared.id);
                    break "read failure";
                }
            },
            _ = shared.closed() => break "connection disposed",
        }
    };

    shared.mark_closed(reason);
}

/// Writes queued messages in order until the connection closes.
pub(super) async fn run_writer<W>(
    mut writer: W,
    mut outbound_rx: mpsc::UnboundedReceiver<Value>,
    shared: Arc<Shared>,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = shared.closed() => break,
            next = outbound_rx.recv() => match next {
                Some(value) => {
                    if let Err(e) = write_message(&mut writer, &value).await {
                        error!("Outbound write failed on connection {}: {e}", shared.id);
                        shared.mark_closed("write failure");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    if let Err(e) = writer.shutdown().await {
        trace!("Closing writer for connection {} failed: {e}", shared.id);
    }
}

fn handle_inbound(shared: &Shared, outbound_tx: &mpsc::UnboundedSender<Value>, value: Value) {
    let message = match Message::from_value(value) {
        Ok(message) => message,
        Err(e) => {
            warn!("Discarding malformed message on connection {}: {e}", shared.id);
            return;
        }
    };

    match message {
        Message::Response { id, result } => match shared.take_pending(&id) {
            Some(tx) => {
                let _ = tx.send(result.map_err(|e| TransportError::rpc(e.code, e.message)));
            }
            None => debug!("Response for unknown request {id} on connection {}", shared.id),
        },
        Message::Notification { method, params } => {
            let (service, name) = split_method(&method);
            match shared.listener_for(service) {
                Some(listener) => listener.on_notification(name, params),
                None => trace!("Unhandled notification {method} on connection {}", shared.id),
            }
        }
        Message::Request { id, method, params } => {
            let (service, name) = split_method(&method);
            let result = match shared.listener_for(service) {
                Some(listener) => listener.on_request(name, params),
                None => {
                    debug!("Unhandled request {method} on connection {}", shared.id);
                    Err(ResponseError::method_not_found(&method))
                }
            };
            let reply = Message::Response { id, result }.into_value();
            if outbound_tx.send(reply).is_err() {
                debug!("Dropping reply to {method}: writer for {} stopped", shared.id);
            }
        }
    }
}
