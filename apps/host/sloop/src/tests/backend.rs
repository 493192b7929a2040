// Minimal in-memory backend for exercising the trackers against a real connection.

use sloop_core::listeners::ListenerAttacher;
use sloop_core::services::ServiceRegistry;
use sloop_core::transport::Connection;
use sloop_core::transport::codec::read_message;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{BufReader, DuplexStream, ReadHalf, WriteHalf, duplex, split};
use tokio::time::timeout;

pub(crate) const WAIT: Duration = Duration::from_secs(5);

pub(crate) struct Backend {
    reader: BufReader<ReadHalf<DuplexStream>>,
    _writer: WriteHalf<DuplexStream>,
    buf: String,
}

impl Backend {
    pub(crate) async fn next(&mut self) -> Value {
        timeout(WAIT, read_message(&mut self.reader, &mut self.buf))
            .await
            .expect("Timed out waiting for the host")
            .expect("Read failed")
            .expect("Host closed the connection")
    }

    /// Asserts nothing else arrives within a short window.
    pub(crate) async fn assert_quiet(&mut self) {
        let pending = timeout(
            Duration::from_millis(50),
            read_message(&mut self.reader, &mut self.buf),
        )
        .await;
        assert!(pending.is_err(), "unexpected message: {pending:?}");
    }
}

/// Registry whose current connection talks to the returned backend.
pub(crate) fn registry_with_backend() -> (Arc<ServiceRegistry>, Arc<Connection>, Backend) {
    let (host, backend) = duplex(64 * 1024);
    let (host_reader, host_writer) = split(host);
    let (backend_reader, backend_writer) = split(backend);

    let connection = Arc::new(Connection::over_streams(
        host_reader,
        host_writer,
        &ListenerAttacher::default(),
        Duration::from_secs(5),
    ));
    let registry = Arc::new(ServiceRegistry::new());
    registry.reset(Some(Arc::clone(&connection)));

    let backend = Backend {
        reader: BufReader::new(backend_reader),
        _writer: backend_writer,
        buf: String::new(),
    };
    (registry, connection, backend)
}
