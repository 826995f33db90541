#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Clip recording and playback.
pub mod clip;

/// Session configuration.
pub mod config;

/// Session error types.
pub mod error;

/// Floor extraction.
pub mod floor;

/// Captured frames.
pub mod frame;

/// The session controller and its mode state machine.
pub mod session;

/// Frame source boundary.
pub mod source;

pub use config::{EndOfClipPolicy, SessionConfig};
pub use error::SessionError;
pub use frame::Frame;
pub use session::{OperationMode, SessionController, SessionSnapshot};
