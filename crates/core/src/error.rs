/// Result alias that carries the custom [`LipSyncError`] type.
pub type Result<T> = std::result::Result<T, LipSyncError>;

/// Common error type for the core crate.
///
/// The animation path itself never fails; errors only surface at the edges
/// where configuration is loaded or a speech transport refuses a request.
#[derive(Debug, thiserror::Error)]
pub enum LipSyncError {
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// The speech transport rejected or failed a request.
    #[error("speech transport failure: {0}")]
    Transport(String),
}

impl LipSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates a transport error from any displayable reason.
    pub fn transport<T: Into<String>>(reason: T) -> Self {
        Self::Transport(reason.into())
    }
}

impl From<&str> for LipSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LipSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
