use crate::clip::ClipError;

/// Error types for the session controller surface.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// An operation was requested in a mode that does not allow it; the
    /// session state is unchanged.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Clip storage was missing, unwritable or malformed.
    #[error(transparent)]
    Clip(#[from] ClipError),

    /// Settings file could not be read or written.
    #[error("failed to access settings file")]
    SettingsIo(#[from] std::io::Error),

    /// Settings file held malformed JSON.
    #[error("malformed settings file")]
    SettingsFormat(#[from] serde_json::Error),
}
