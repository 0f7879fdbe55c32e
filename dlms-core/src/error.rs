use thiserror::Error;

/// Main error type for meter reading sessions
#[derive(Error, Debug)]
pub enum DlmsError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// No reply within the receive retry ceiling
    #[error("Transport timeout: {0}")]
    TransportTimeout(String),

    /// The remote reported a non-zero application error code
    #[error("Protocol error: remote returned error code {0}")]
    Protocol(u16),

    /// The legacy line-speed negotiation produced an unusable reply
    #[error("Handshake error: {0}")]
    Handshake(String),

    /// A batched read returned a different number of values than requested
    #[error("Invalid reply. Read items count do not match: expected {expected}, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The operator interrupted the session
    #[error("Operation cancelled")]
    Cancelled,
}

impl DlmsError {
    /// True for failures reported by the remote or caused by a silent remote.
    ///
    /// Bulk passes log these plainly; anything else is also sent to the
    /// diagnostic sink because it points at a local defect.
    pub fn is_protocol_or_timeout(&self) -> bool {
        matches!(self, DlmsError::Protocol(_) | DlmsError::TransportTimeout(_))
    }

    /// Whether the session was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DlmsError::Cancelled)
    }
}

/// Result type alias for meter reading operations
pub type DlmsResult<T> = Result<T, DlmsError>;
