//! Error types for the bridge.
//!
//! Only start-up and console input can fail. Once the engine loop is
//! running, malformed datagrams, receive timeouts and send failures are
//! handled in place and never surface here.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// A specialized `Result` type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised while setting up or controlling the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// A UDP socket could not be bound.
    #[error("Failed to bind {role} socket on {addr}: {source}")]
    Bind {
        /// Which socket failed ("tracker" or "opentrack").
        role: &'static str,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The configuration cannot be used.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A console command could not be parsed.
    #[error("Invalid command '{input}': {reason}")]
    InvalidCommand { input: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl BridgeError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        BridgeError::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_command(input: &str, reason: impl Into<String>) -> Self {
        BridgeError::InvalidCommand {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
