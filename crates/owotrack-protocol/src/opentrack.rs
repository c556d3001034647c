//! OpenTrack "UDP over network" pose encoding.
//!
//! OpenTrack's UDP input expects exactly six little-endian `f64` values:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       8     X translation (cm)
//! 8       8     Y translation (cm)
//! 16      8     Z translation (cm)
//! 24      8     Yaw (degrees)
//! 32      8     Pitch (degrees)
//! 40      8     Roll (degrees)
//! ```

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Size of an encoded OpenTrack pose.
pub const OPENTRACK_POSE_LEN: usize = 48;

/// A six degree-of-freedom pose as consumed by OpenTrack.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OpenTrackPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl OpenTrackPose {
    /// Rotation-only pose; a phone tracker has no positional data, so the
    /// translation is always zero.
    pub fn from_angles(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            yaw,
            pitch,
            roll,
        }
    }

    /// Encode into the 48-byte wire format.
    pub fn encode(&self) -> [u8; OPENTRACK_POSE_LEN] {
        let mut buf = [0u8; OPENTRACK_POSE_LEN];
        let mut cursor = Cursor::new(&mut buf[..]);
        for value in [self.x, self.y, self.z, self.yaw, self.pitch, self.roll] {
            // Six doubles always fit the fixed buffer.
            let _ = cursor.write_f64::<LittleEndian>(value);
        }
        buf
    }

    /// Decode a pose, as an OpenTrack receiver would.
    pub fn decode(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < OPENTRACK_POSE_LEN {
            return Err(ParseError::InsufficientData {
                packet_type: None,
                needed: OPENTRACK_POSE_LEN,
                got: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let mut values = [0.0f64; 6];
        for value in values.iter_mut() {
            *value = cursor
                .read_f64::<LittleEndian>()
                .map_err(|_| ParseError::InsufficientData {
                    packet_type: None,
                    needed: OPENTRACK_POSE_LEN,
                    got: data.len(),
                })?;
        }

        let [x, y, z, yaw, pitch, roll] = values;
        Ok(Self {
            x,
            y,
            z,
            yaw,
            pitch,
            roll,
        })
    }
}
