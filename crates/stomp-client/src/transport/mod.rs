//! Transport implementations for the STOMP client.
//!
//! - [`TcpConnector`] talks to a real broker over TCP.
//! - [`memory_pair`] wires the session to an in-process broker handle.

pub mod memory;
pub mod tcp;

pub use memory::{memory_pair, MemoryBroker, MemoryConnector};
pub use tcp::TcpConnector;
