//! owoTrack to OpenTrack bridge.
//!
//! Receives orientation datagrams from owoTrack phone apps, turns them into
//! calibrated and remapped head angles, and forwards them to OpenTrack's
//! "UDP over network" input.
//!
//! ```text
//! phone --UDP 6969--> BridgeEngine --UDP 4242--> OpenTrack
//!                         |
//!                    BridgeHandle  <-- console / status view
//! ```
//!
//! # Example
//!
//! ```no_run
//! use owotrack_bridge::{BridgeConfig, BridgeEngine, BridgeHandle};
//!
//! # fn main() -> owotrack_bridge::BridgeResult<()> {
//! let config = BridgeConfig::default();
//! let handle = BridgeHandle::new(&config);
//! let engine = BridgeEngine::bind(config, handle.clone())?.spawn()?;
//!
//! handle.set_forwarding(true);
//! // ...
//! engine.stop();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod handle;
pub mod mapping;
pub mod orientation;
pub mod status;
pub mod tracker;

pub use config::{parse_port, BridgeConfig, DEFAULT_LISTEN_PORT, DEFAULT_OPENTRACK_PORT};
pub use control::{CommandEffect, ControlCommand};
pub use engine::{BridgeEngine, DatagramOutcome, EngineThread, SweepReport};
pub use error::{BridgeError, BridgeResult};
pub use handle::{BridgeHandle, BridgeSnapshot, PipelineSettings};
pub use mapping::{AxisMapping, AxisSource, OutputAxis, OutputMapping};
pub use orientation::{Calibration, EulerAngles};
pub use status::{StatusEvent, StatusView, DEGREE_CHANGE_THRESHOLD};
pub use tracker::{TrackerSnapshot, TrackerState, TrackerStore};
