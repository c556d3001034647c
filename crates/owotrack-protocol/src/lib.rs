//! Wire formats spoken by the owoTrack bridge.
//!
//! This crate is a pure byte-level codec with no sockets and no clocks:
//!
//! - **owoTrack inbound**: big-endian datagrams sent by the phone app
//!   (handshake, rotation quaternion, battery level)
//! - **owoTrack outbound**: the handshake reply and the 4-byte heartbeat
//!   the bridge sends back to each phone
//! - **OpenTrack**: the 48-byte little-endian "UDP over network" pose
//!   consumed by OpenTrack
//!
//! # Example
//!
//! ```rust
//! use owotrack_protocol::{InboundPacket, OpenTrackPose, ParseError};
//!
//! let mut datagram = Vec::new();
//! datagram.extend_from_slice(&1u32.to_be_bytes());
//! datagram.extend_from_slice(&42i64.to_be_bytes());
//! for c in [0.0f32, 0.0, 0.0, 1.0] {
//!     datagram.extend_from_slice(&c.to_be_bytes());
//! }
//!
//! match InboundPacket::decode(&datagram) {
//!     Ok(InboundPacket::Rotation { sequence, quaternion }) => {
//!         assert_eq!(sequence, 42);
//!         assert_eq!(quaternion.w, 1.0);
//!     }
//!     Ok(other) => panic!("unexpected packet {other:?}"),
//!     Err(ParseError::InsufficientData { needed, got, .. }) => {
//!         eprintln!("Need {} bytes, got {}", needed, got);
//!     }
//!     Err(e) => eprintln!("Parse error: {}", e),
//! }
//!
//! let pose = OpenTrackPose::from_angles(10.0, -5.0, 0.0);
//! assert_eq!(pose.encode().len(), 48);
//! ```

mod error;
mod opentrack;
mod packet;

pub use error::ParseError;
pub use opentrack::{OpenTrackPose, OPENTRACK_POSE_LEN};
pub use packet::{
    heartbeat, InboundPacket, Quaternion, BATTERY_MIN_LEN, HANDSHAKE_REPLY, HEARTBEAT_LEN,
    PACKET_BATTERY, PACKET_HANDSHAKE, PACKET_HEARTBEAT, PACKET_ROTATION, ROTATION_MIN_LEN,
};
