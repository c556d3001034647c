//! Error types for datagram decoding.

use thiserror::Error;

/// Errors that can occur when decoding an inbound owoTrack datagram.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The datagram is shorter than its packet type requires.
    #[error("Insufficient data for packet type {packet_type:?}: need {needed} bytes, got {got}")]
    InsufficientData {
        /// Packet type read from the header, `None` if even the header is missing.
        packet_type: Option<u32>,
        needed: usize,
        got: usize,
    },

    /// The packet type is not one the bridge understands.
    #[error("Unknown packet type: {0}")]
    UnknownPacketType(u32),
}
