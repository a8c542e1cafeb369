//! Abstract transport traits for the STOMP client.
//!
//! A connection is split into a sink (owned by the session) and a source
//! (owned by the background reader) so both directions can make progress
//! independently.

use crate::error::StompResult;
use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future returned by the transport traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outgoing half of a connection.
pub trait FrameSink: Send {
    /// Send one frame's text. The implementation adds any wire terminator.
    fn send<'a>(&'a mut self, frame: &'a str) -> BoxFuture<'a, StompResult<()>>;

    /// Close the connection. A pending [`FrameSource::recv`] on the paired
    /// source may or may not observe the close; the reader's stop signal
    /// is what guarantees it wakes.
    fn close(&mut self) -> BoxFuture<'_, StompResult<()>>;
}

/// Incoming half of a connection.
pub trait FrameSource: Send {
    /// Receive the next complete frame's text. `None` means the peer closed.
    fn recv(&mut self) -> BoxFuture<'_, StompResult<Option<String>>>;
}

/// A freshly established connection.
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Establishes connections to a broker.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, host: &'a str, port: u16) -> BoxFuture<'a, StompResult<Connection>>;
}
