//! stomp-client: async client session for the emergency-report pub/sub
//! service.
//!
//! Parses user command lines, drives the login/subscription/receipt state
//! machine over a pluggable transport, keeps the per-user event store and
//! writes channel summaries.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use stomp_client::{Session, SessionConfig, TcpConnector};
//!
//! # async fn example() {
//! let mut session = Session::new(Arc::new(TcpConnector), SessionConfig::default());
//!
//! let out = session.execute("login 127.0.0.1:7777 alice secret").await;
//! for notice in &out.notices {
//!     println!("{notice}");
//! }
//!
//! session.execute("join police").await;
//! let reply = session.process_next().await;
//! println!("{:?}", reply.notices);
//!
//! session.close().await;
//! # }
//! ```

pub mod command;
mod reader;
pub mod receipts;
pub mod session;
pub mod store;
pub mod subscriptions;
pub mod summary;
pub mod transport;

// Re-export primary public types.
pub use command::{Command, CommandError, Keyword};
pub use reader::Inbound;
pub use receipts::{ReceiptKind, ReceiptTracker};
pub use session::{
    EventParser, JsonEventParser, LoginFlag, LoginState, Notice, Outcome, Session, SessionConfig,
};
pub use store::EventStore;
pub use subscriptions::{Subscription, SubscriptionTable};
pub use summary::{write_summary, SummaryStats};
pub use transport::{memory_pair, MemoryBroker, MemoryConnector, TcpConnector};

// Re-export stomp-core error types for convenience.
pub use stomp_core::{StompError, StompResult};
