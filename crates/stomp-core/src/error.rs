use thiserror::Error;

/// Errors produced by the STOMP protocol layer.
#[derive(Debug, Error)]
pub enum StompError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("unknown frame verb: {0}")]
    UnknownVerb(String),

    #[error("missing header '{header}' in {verb} frame")]
    MissingHeader { verb: String, header: String },

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The server confirmed a receipt id this client never issued.
    #[error("receipt {0} was never issued by this client")]
    UnknownReceipt(u64),

    /// The receipt id was issued but is no longer pending (duplicate
    /// confirmation or local bookkeeping bug).
    #[error("receipt {0} is not pending")]
    StaleReceipt(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("timed out")]
    Timeout,

    #[error("event file error: {0}")]
    EventFile(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StompError {
    /// Whether this error means the local and remote views of the session
    /// have diverged, which forces a teardown.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            StompError::Codec(_)
                | StompError::UnknownVerb(_)
                | StompError::MissingHeader { .. }
                | StompError::InvalidMessage(_)
                | StompError::UnknownReceipt(_)
                | StompError::StaleReceipt(_)
        )
    }
}

pub type StompResult<T> = Result<T, StompError>;
