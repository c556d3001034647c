//! owoTrack datagram decoder.
//!
//! # Inbound Binary Format
//!
//! Every datagram sent by the phone starts with a big-endian packet type:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Packet type (u32, big-endian)
//!
//! Type 3 (handshake): no payload required
//!
//! Type 1 (rotation), at least 28 bytes:
//! 4       8     Sequence id (i64)
//! 12      16    Quaternion x, y, z, w (4 x f32)
//!
//! Type 12 (battery), at least 16 bytes:
//! 12      4     Battery fraction 0.0..=1.0 (f32)
//! ```
//!
//! Bytes 4..12 of a battery packet carry a sequence id that the bridge does
//! not use. Trailing bytes past the minimum length are ignored.

use std::io::{self, Cursor};

use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Rotation packet type.
pub const PACKET_ROTATION: u32 = 1;
/// Discovery/handshake packet type.
pub const PACKET_HANDSHAKE: u32 = 3;
/// Battery level packet type.
pub const PACKET_BATTERY: u32 = 12;
/// Packet type carried by the outbound heartbeat.
pub const PACKET_HEARTBEAT: u32 = 1;

/// Length of the packet type header.
const HEADER_LEN: usize = 4;
/// Minimum length of a rotation packet.
pub const ROTATION_MIN_LEN: usize = 28;
/// Minimum length of a battery packet.
pub const BATTERY_MIN_LEN: usize = 16;
/// Offset of the battery fraction inside a battery packet.
const BATTERY_OFFSET: u64 = 12;
/// Length of the outbound heartbeat.
pub const HEARTBEAT_LEN: usize = 4;

/// Fixed reply to a handshake, sent back to the phone on the inbound socket.
pub const HANDSHAKE_REPLY: &[u8] = b"\x03Hey OVR =D 5\0";

/// Orientation quaternion as sent by the phone (x, y, z, w order on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    /// The identity rotation.
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Euclidean norm; 1.0 for a well-formed rotation.
    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A decoded inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InboundPacket {
    /// Discovery request; answered with [`HANDSHAKE_REPLY`].
    Handshake,
    /// Orientation update.
    Rotation {
        sequence: i64,
        quaternion: Quaternion,
    },
    /// Battery level report.
    Battery { fraction: f32 },
}

impl InboundPacket {
    /// Decode a single datagram.
    ///
    /// Unknown packet types and datagrams shorter than their type's minimum
    /// length are reported as errors; callers that must tolerate bad input
    /// simply drop them.
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < HEADER_LEN {
            return Err(ParseError::InsufficientData {
                packet_type: None,
                needed: HEADER_LEN,
                got: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let packet_type = cursor
            .read_u32::<BigEndian>()
            .map_err(truncated(None, HEADER_LEN, data.len()))?;

        match packet_type {
            PACKET_HANDSHAKE => Ok(InboundPacket::Handshake),
            PACKET_ROTATION => {
                require_len(packet_type, ROTATION_MIN_LEN, data.len())?;
                let short = || truncated(Some(packet_type), ROTATION_MIN_LEN, data.len());

                let sequence = cursor.read_i64::<BigEndian>().map_err(short())?;
                let x = cursor.read_f32::<BigEndian>().map_err(short())?;
                let y = cursor.read_f32::<BigEndian>().map_err(short())?;
                let z = cursor.read_f32::<BigEndian>().map_err(short())?;
                let w = cursor.read_f32::<BigEndian>().map_err(short())?;

                Ok(InboundPacket::Rotation {
                    sequence,
                    quaternion: Quaternion { x, y, z, w },
                })
            }
            PACKET_BATTERY => {
                require_len(packet_type, BATTERY_MIN_LEN, data.len())?;
                cursor.set_position(BATTERY_OFFSET);
                let fraction = cursor
                    .read_f32::<BigEndian>()
                    .map_err(truncated(Some(packet_type), BATTERY_MIN_LEN, data.len()))?;

                Ok(InboundPacket::Battery { fraction })
            }
            other => Err(ParseError::UnknownPacketType(other)),
        }
    }

    /// Wire packet type of this packet.
    pub fn packet_type(&self) -> u32 {
        match self {
            InboundPacket::Handshake => PACKET_HANDSHAKE,
            InboundPacket::Rotation { .. } => PACKET_ROTATION,
            InboundPacket::Battery { .. } => PACKET_BATTERY,
        }
    }
}

/// The 4-byte keep-alive sent to every live tracker.
pub fn heartbeat() -> [u8; HEARTBEAT_LEN] {
    PACKET_HEARTBEAT.to_be_bytes()
}

fn require_len(packet_type: u32, needed: usize, got: usize) -> Result<(), ParseError> {
    if got < needed {
        return Err(ParseError::InsufficientData {
            packet_type: Some(packet_type),
            needed,
            got,
        });
    }
    Ok(())
}

fn truncated(
    packet_type: Option<u32>,
    needed: usize,
    got: usize,
) -> impl Fn(io::Error) -> ParseError {
    move |_| ParseError::InsufficientData {
        packet_type,
        needed,
        got,
    }
}
