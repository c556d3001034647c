//! User-configurable routing of calibrated angles onto OpenTrack axes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::orientation::EulerAngles;

/// One of the three OpenTrack rotation axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputAxis {
    Yaw,
    Pitch,
    Roll,
}

impl OutputAxis {
    pub const ALL: [OutputAxis; 3] = [OutputAxis::Yaw, OutputAxis::Pitch, OutputAxis::Roll];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputAxis::Yaw => "yaw",
            OutputAxis::Pitch => "pitch",
            OutputAxis::Roll => "roll",
        }
    }
}

impl fmt::Display for OutputAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaw" => Ok(OutputAxis::Yaw),
            "pitch" => Ok(OutputAxis::Pitch),
            "roll" => Ok(OutputAxis::Roll),
            other => Err(format!("unknown axis '{other}', expected yaw, pitch or roll")),
        }
    }
}

/// Where an output axis takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisSource {
    Yaw,
    Pitch,
    Roll,
    Disabled,
}

impl AxisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AxisSource::Yaw => "yaw",
            AxisSource::Pitch => "pitch",
            AxisSource::Roll => "roll",
            AxisSource::Disabled => "disabled",
        }
    }

    fn read(&self, angles: &EulerAngles) -> Option<f64> {
        match self {
            AxisSource::Yaw => Some(angles.yaw),
            AxisSource::Pitch => Some(angles.pitch),
            AxisSource::Roll => Some(angles.roll),
            AxisSource::Disabled => None,
        }
    }
}

impl From<OutputAxis> for AxisSource {
    fn from(axis: OutputAxis) -> Self {
        match axis {
            OutputAxis::Yaw => AxisSource::Yaw,
            OutputAxis::Pitch => AxisSource::Pitch,
            OutputAxis::Roll => AxisSource::Roll,
        }
    }
}

impl fmt::Display for AxisSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AxisSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" | "off" | "none" => Ok(AxisSource::Disabled),
            other => other
                .parse::<OutputAxis>()
                .map(AxisSource::from)
                .map_err(|_| {
                    format!("unknown source '{other}', expected yaw, pitch, roll or disabled")
                }),
        }
    }
}

/// Source and sign of one output axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisMapping {
    pub source: AxisSource,
    pub invert: bool,
}

impl AxisMapping {
    pub fn new(source: AxisSource, invert: bool) -> Self {
        Self { source, invert }
    }

    /// A disabled axis is exactly 0.0 regardless of `invert`.
    fn resolve(&self, angles: &EulerAngles) -> f64 {
        match self.source.read(angles) {
            Some(value) if self.invert => -value,
            Some(value) => value,
            None => 0.0,
        }
    }
}

/// Mapping for all three output axes. Defaults to identity, no inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMapping {
    pub yaw: AxisMapping,
    pub pitch: AxisMapping,
    pub roll: AxisMapping,
}

impl Default for OutputMapping {
    fn default() -> Self {
        Self {
            yaw: AxisMapping::new(AxisSource::Yaw, false),
            pitch: AxisMapping::new(AxisSource::Pitch, false),
            roll: AxisMapping::new(AxisSource::Roll, false),
        }
    }
}

impl OutputMapping {
    pub fn get(&self, axis: OutputAxis) -> AxisMapping {
        match axis {
            OutputAxis::Yaw => self.yaw,
            OutputAxis::Pitch => self.pitch,
            OutputAxis::Roll => self.roll,
        }
    }

    pub fn set(&mut self, axis: OutputAxis, mapping: AxisMapping) {
        match axis {
            OutputAxis::Yaw => self.yaw = mapping,
            OutputAxis::Pitch => self.pitch = mapping,
            OutputAxis::Roll => self.roll = mapping,
        }
    }

    /// Output angles for the given calibrated angles.
    pub fn apply(&self, final_angles: &EulerAngles) -> EulerAngles {
        EulerAngles {
            yaw: self.yaw.resolve(final_angles),
            pitch: self.pitch.resolve(final_angles),
            roll: self.roll.resolve(final_angles),
        }
    }
}
