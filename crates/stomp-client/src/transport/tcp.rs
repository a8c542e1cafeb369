//! TCP transport: one socket, NUL-terminated STOMP frames.

use std::collections::VecDeque;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use stomp_core::codec::{frame_encode, FrameDecoder};
use stomp_core::error::{StompError, StompResult};
use stomp_core::transport::{BoxFuture, Connection, Connector, FrameSink, FrameSource};

const READ_BUF_SIZE: usize = 8192;

/// Connects to a broker over plain TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, StompResult<Connection>> {
        Box::pin(async move {
            let stream = TcpStream::connect((host, port)).await.map_err(|e| {
                StompError::ConnectionRefused(format!("{host}:{port}: {e}"))
            })?;
            stream.set_nodelay(true)?;
            tracing::info!("TCP connected to {}:{}", host, port);

            let (read, write) = stream.into_split();
            Ok(Connection {
                sink: Box::new(TcpSink {
                    write,
                    closed: false,
                }),
                source: Box::new(TcpSource {
                    read,
                    decoder: FrameDecoder::new(),
                    ready: VecDeque::new(),
                    buf: vec![0u8; READ_BUF_SIZE],
                }),
            })
        })
    }
}

struct TcpSink {
    write: OwnedWriteHalf,
    closed: bool,
}

impl FrameSink for TcpSink {
    fn send<'a>(&'a mut self, frame: &'a str) -> BoxFuture<'a, StompResult<()>> {
        Box::pin(async move {
            if self.closed {
                return Err(StompError::Transport("connection closed".into()));
            }
            self.write
                .write_all(&frame_encode(frame))
                .await
                .map_err(|e| StompError::Transport(format!("TCP write error: {e}")))?;
            self.write
                .flush()
                .await
                .map_err(|e| StompError::Transport(format!("TCP flush error: {e}")))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, StompResult<()>> {
        Box::pin(async move {
            if !self.closed {
                self.closed = true;
                self.write
                    .shutdown()
                    .await
                    .map_err(|e| StompError::Transport(format!("TCP shutdown error: {e}")))?;
            }
            Ok(())
        })
    }
}

struct TcpSource {
    read: OwnedReadHalf,
    decoder: FrameDecoder,
    ready: VecDeque<String>,
    buf: Vec<u8>,
}

impl FrameSource for TcpSource {
    fn recv(&mut self) -> BoxFuture<'_, StompResult<Option<String>>> {
        Box::pin(async move {
            loop {
                if let Some(frame) = self.ready.pop_front() {
                    return Ok(Some(frame));
                }

                // Frames held back behind a bad one, or its error.
                let held = self.decoder.feed(&[])?;
                if !held.is_empty() {
                    self.ready.extend(held);
                    continue;
                }

                let n = self
                    .read
                    .read(&mut self.buf)
                    .await
                    .map_err(|e| StompError::Transport(format!("TCP read error: {e}")))?;
                if n == 0 {
                    if self.decoder.pending() > 0 {
                        tracing::warn!(
                            "connection closed with {} bytes of partial frame",
                            self.decoder.pending()
                        );
                    }
                    return Ok(None);
                }

                let frames = self.decoder.feed(&self.buf[..n])?;
                self.ready.extend(frames);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn exchanges_nul_terminated_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 256];
            while !received.contains(&0u8) {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
            }
            socket
                .write_all(b"CONNECTED\nversion:1.2\n\n\0\nRECEIPT\nreceipt-id:0\n\n\0")
                .await
                .unwrap();
            received
        });

        let conn = TcpConnector.connect("127.0.0.1", port).await.unwrap();
        let Connection { mut sink, mut source } = conn;
        sink.send("CONNECT\nlogin:alice\n\n").await.unwrap();

        assert_eq!(
            source.recv().await.unwrap().as_deref(),
            Some("CONNECTED\nversion:1.2\n\n")
        );
        assert_eq!(
            source.recv().await.unwrap().as_deref(),
            Some("RECEIPT\nreceipt-id:0\n\n")
        );

        let received = server.await.unwrap();
        assert_eq!(received, b"CONNECT\nlogin:alice\n\n\0".to_vec());

        // Server dropped its socket.
        assert_eq!(source.recv().await.unwrap(), None);
        sink.close().await.unwrap();
        assert!(sink.send("DISCONNECT\n\n").await.is_err());
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = TcpConnector.connect("127.0.0.1", port).await;
        assert!(matches!(result, Err(StompError::ConnectionRefused(_))));
    }

    #[tokio::test]
    async fn frame_ahead_of_invalid_utf8_is_delivered() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"RECEIPT\nreceipt-id:0\n\n\0E\xff\n\n\0")
                .await
                .unwrap();
            socket
        });

        let Connection { sink: _sink, mut source } =
            TcpConnector.connect("127.0.0.1", port).await.unwrap();
        let _socket = server.await.unwrap();

        assert_eq!(
            source.recv().await.unwrap().as_deref(),
            Some("RECEIPT\nreceipt-id:0\n\n")
        );
        let err = source.recv().await.unwrap_err();
        assert!(err.is_protocol_violation(), "{err}");
    }
}
