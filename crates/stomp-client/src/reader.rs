//! Background frame reader.
//!
//! Owns the connection's source half, decodes frames and forwards them to
//! the session over an unbounded channel. It never touches session state
//! beyond the lock-free login flag.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use stomp_core::error::StompError;
use stomp_core::frame::ServerFrame;
use stomp_core::transport::FrameSource;

use crate::session::{LoginFlag, LoginState};

/// What the reader hands to the session.
#[derive(Debug)]
pub enum Inbound {
    Frame(ServerFrame),
    /// A frame or byte sequence that failed to decode. The reader stops
    /// after sending it.
    Malformed(StompError),
    /// The peer closed the connection.
    Closed,
    /// The transport failed while receiving.
    Failed(StompError),
}

/// Handle to a running reader task.
pub(crate) struct FrameReader {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl FrameReader {
    /// Spawn the reader. Returns the handle and the receiving end of the
    /// inbound channel.
    pub(crate) fn spawn(
        source: Box<dyn FrameSource>,
        login: Arc<LoginFlag>,
    ) -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(read_loop(source, tx, stop_rx, login));
        (
            Self {
                stop: Some(stop_tx),
                handle,
            },
            rx,
        )
    }

    /// Signal the reader to stop. Safe to call more than once.
    pub(crate) fn signal_stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            // The reader may already have exited on its own.
            let _ = stop.send(());
        }
    }

    /// Wait for the reader task to finish.
    pub(crate) async fn join(mut self) {
        self.signal_stop();
        if let Err(e) = self.handle.await {
            warn!("frame reader task failed: {}", e);
        }
    }
}

async fn read_loop(
    mut source: Box<dyn FrameSource>,
    tx: mpsc::UnboundedSender<Inbound>,
    mut stop: oneshot::Receiver<()>,
    login: Arc<LoginFlag>,
) {
    loop {
        let received = tokio::select! {
            biased;
            _ = &mut stop => {
                debug!("frame reader stopped");
                return;
            }
            received = source.recv() => received,
        };

        let inbound = match received {
            Ok(Some(text)) => match ServerFrame::decode(&text) {
                Ok(frame) => {
                    debug!(?frame, "frame received");
                    Inbound::Frame(frame)
                }
                Err(e) => {
                    login.set(LoginState::LoggedOut);
                    warn!("failed to decode frame: {}", e);
                    let _ = tx.send(Inbound::Malformed(e));
                    return;
                }
            },
            Ok(None) => {
                login.set(LoginState::LoggedOut);
                debug!("connection closed by peer");
                let _ = tx.send(Inbound::Closed);
                return;
            }
            Err(e) => {
                login.set(LoginState::LoggedOut);
                if e.is_protocol_violation() {
                    warn!("malformed data from peer: {}", e);
                    let _ = tx.send(Inbound::Malformed(e));
                } else {
                    warn!("receive failed: {}", e);
                    let _ = tx.send(Inbound::Failed(e));
                }
                return;
            }
        };

        if tx.send(inbound).is_err() {
            debug!("session dropped its inbound channel");
            return;
        }
    }
}
