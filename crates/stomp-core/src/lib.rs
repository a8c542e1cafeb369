//! stomp-core: Shared protocol library for the STOMP event client.
//!
//! Provides the text frame model, NUL-delimited codec, event records and
//! their JSON file format, and abstract transport traits.

pub mod codec;
pub mod error;
pub mod event;
pub mod frame;
pub mod transport;

// Re-export commonly used items at crate root.
pub use codec::{frame_encode, FrameDecoder};
pub use error::{StompError, StompResult};
pub use event::{parse_events_file, sort_events, Event, EventFile};
pub use frame::{ClientFrame, Frame, ServerFrame};
pub use transport::{BoxFuture, Connection, Connector, FrameSink, FrameSource};
