//! In-process loopback transport.
//!
//! [`memory_pair`] returns a connector for the session and a [`MemoryBroker`]
//! handle playing the server: it sees every frame the client sends and can
//! deliver frames, refuse connections or hang up.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use stomp_core::error::{StompError, StompResult};
use stomp_core::transport::{BoxFuture, Connection, Connector, FrameSink, FrameSource};

#[derive(Debug, Default)]
struct Shared {
    refuse: bool,
    connects: Vec<(String, u16)>,
    sent: Vec<String>,
    to_client: Option<mpsc::UnboundedSender<String>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // A panicking test thread must not hide the log from the others.
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Create a connected connector/broker pair.
pub fn memory_pair() -> (MemoryConnector, MemoryBroker) {
    let shared = Arc::new(Mutex::new(Shared::default()));
    (
        MemoryConnector {
            shared: shared.clone(),
        },
        MemoryBroker { shared },
    )
}

/// Client side of the loopback.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    shared: Arc<Mutex<Shared>>,
}

impl Connector for MemoryConnector {
    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, StompResult<Connection>> {
        Box::pin(async move {
            let mut shared = lock(&self.shared);
            if shared.refuse {
                return Err(StompError::ConnectionRefused(format!("{host}:{port}")));
            }
            shared.connects.push((host.to_string(), port));

            let (tx, rx) = mpsc::unbounded_channel();
            shared.to_client = Some(tx);
            Ok(Connection {
                sink: Box::new(MemorySink {
                    shared: self.shared.clone(),
                    closed: false,
                }),
                source: Box::new(MemorySource { rx }),
            })
        })
    }
}

struct MemorySink {
    shared: Arc<Mutex<Shared>>,
    closed: bool,
}

impl FrameSink for MemorySink {
    fn send<'a>(&'a mut self, frame: &'a str) -> BoxFuture<'a, StompResult<()>> {
        Box::pin(async move {
            let mut shared = lock(&self.shared);
            if self.closed || shared.to_client.is_none() {
                return Err(StompError::Transport("connection closed".into()));
            }
            shared.sent.push(frame.to_string());
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, StompResult<()>> {
        Box::pin(async move {
            self.closed = true;
            // Dropping the sender ends the paired source.
            lock(&self.shared).to_client = None;
            Ok(())
        })
    }
}

struct MemorySource {
    rx: mpsc::UnboundedReceiver<String>,
}

impl FrameSource for MemorySource {
    fn recv(&mut self) -> BoxFuture<'_, StompResult<Option<String>>> {
        Box::pin(async move { Ok(self.rx.recv().await) })
    }
}

/// Server side of the loopback.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    shared: Arc<Mutex<Shared>>,
}

impl MemoryBroker {
    /// Make subsequent connection attempts fail.
    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.shared).refuse = refuse;
    }

    /// Deliver a frame's text to the connected client. Returns false when no
    /// client is connected.
    pub fn deliver(&self, frame: &str) -> bool {
        match lock(&self.shared).to_client.as_ref() {
            Some(tx) => tx.send(frame.to_string()).is_ok(),
            None => false,
        }
    }

    /// Close the connection from the server side.
    pub fn hang_up(&self) {
        lock(&self.shared).to_client = None;
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared).to_client.is_some()
    }

    /// Every frame the client has sent, in order.
    pub fn sent(&self) -> Vec<String> {
        lock(&self.shared).sent.clone()
    }

    /// Every `(host, port)` the client connected to.
    pub fn connects(&self) -> Vec<(String, u16)> {
        lock(&self.shared).connects.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (connector, broker) = memory_pair();
        let Connection { mut sink, mut source } = connector.connect("h", 1).await.unwrap();

        sink.send("CONNECT\n\n").await.unwrap();
        assert_eq!(broker.sent(), vec!["CONNECT\n\n".to_string()]);
        assert_eq!(broker.connects(), vec![("h".to_string(), 1)]);

        assert!(broker.deliver("CONNECTED\n\n"));
        assert_eq!(source.recv().await.unwrap().as_deref(), Some("CONNECTED\n\n"));
    }

    #[tokio::test]
    async fn close_ends_source() {
        let (connector, broker) = memory_pair();
        let Connection { mut sink, mut source } = connector.connect("h", 1).await.unwrap();

        sink.close().await.unwrap();
        assert!(!broker.is_connected());
        assert_eq!(source.recv().await.unwrap(), None);
        assert!(sink.send("SEND\n\n").await.is_err());
    }

    #[tokio::test]
    async fn refusal() {
        let (connector, broker) = memory_pair();
        broker.refuse_connections(true);
        assert!(matches!(
            connector.connect("h", 1).await,
            Err(StompError::ConnectionRefused(_))
        ));
        assert!(!broker.deliver("CONNECTED\n\n"));
    }
}
