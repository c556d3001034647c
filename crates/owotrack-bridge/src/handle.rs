//! Shared state between the engine worker and whoever controls it.
//!
//! [`BridgeHandle`] is cheap to clone. The engine mutates the tracker store
//! through it; the console reads snapshots and changes settings through it.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::info;

use crate::config::{self, BridgeConfig};
use crate::mapping::{AxisMapping, AxisSource, OutputAxis, OutputMapping};
use crate::orientation::{Calibration, EulerAngles};
use crate::tracker::{TrackerSnapshot, TrackerStore};

/// Calibration and output mapping, read together by the engine so a
/// pipeline run never mixes old and new settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PipelineSettings {
    pub calibration: Calibration,
    pub mapping: OutputMapping,
}

impl PipelineSettings {
    /// Final and output angles for the given raw angles.
    pub fn process(&self, raw: EulerAngles) -> (EulerAngles, EulerAngles) {
        let final_angles = self.calibration.apply(raw);
        let output = self.mapping.apply(&final_angles);
        (final_angles, output)
    }
}

/// Consistent copy of everything the presentation side can show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeSnapshot {
    pub trackers: Vec<TrackerSnapshot>,
    pub settings: PipelineSettings,
    pub forwarding: bool,
    pub destination: SocketAddr,
}

impl BridgeSnapshot {
    /// The tracker connected longest, which is the one a status display follows.
    pub fn earliest_tracker(&self) -> Option<&TrackerSnapshot> {
        self.trackers
            .iter()
            .min_by(|a, b| a.first_seen.cmp(&b.first_seen).then(a.addr.cmp(&b.addr)))
    }
}

struct HandleInner {
    trackers: Mutex<TrackerStore>,
    pipeline: RwLock<PipelineSettings>,
    forwarding: AtomicBool,
    opentrack_ip: IpAddr,
    opentrack_port: AtomicU16,
    stop: AtomicBool,
}

/// Clonable handle to the bridge's shared state.
#[derive(Clone)]
pub struct BridgeHandle {
    inner: Arc<HandleInner>,
}

impl BridgeHandle {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                trackers: Mutex::new(TrackerStore::new()),
                pipeline: RwLock::new(PipelineSettings::default()),
                forwarding: AtomicBool::new(config.forwarding),
                opentrack_ip: config.opentrack_ip,
                opentrack_port: AtomicU16::new(config.opentrack_port),
                stop: AtomicBool::new(false),
            }),
        }
    }

    /// Run `f` with exclusive access to the tracker store.
    pub fn with_trackers<R>(&self, f: impl FnOnce(&mut TrackerStore) -> R) -> R {
        f(&mut *self.inner.trackers.lock())
    }

    pub fn snapshot(&self) -> BridgeSnapshot {
        let now = Instant::now();
        let settings = self.pipeline();
        let trackers = self.inner.trackers.lock().snapshots(now);
        BridgeSnapshot {
            trackers,
            settings,
            forwarding: self.is_forwarding(),
            destination: self.destination(),
        }
    }

    pub fn tracker_count(&self) -> usize {
        self.inner.trackers.lock().len()
    }

    /// Copy of the current calibration and mapping.
    pub fn pipeline(&self) -> PipelineSettings {
        *self.inner.pipeline.read()
    }

    pub fn set_forwarding(&self, enabled: bool) {
        let previous = self.inner.forwarding.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "forwarding toggled");
        }
    }

    pub fn is_forwarding(&self) -> bool {
        self.inner.forwarding.load(Ordering::SeqCst)
    }

    /// Change the OpenTrack port from user input. Invalid input selects the
    /// default port. Returns the port now in use.
    pub fn set_opentrack_port(&self, input: &str) -> u16 {
        let port = config::port_or_default(input);
        self.inner.opentrack_port.store(port, Ordering::SeqCst);
        info!(destination = %self.destination(), "OpenTrack destination set");
        port
    }

    pub fn opentrack_port(&self) -> u16 {
        self.inner.opentrack_port.load(Ordering::SeqCst)
    }

    /// Where forwarded poses are sent.
    pub fn destination(&self) -> SocketAddr {
        SocketAddr::new(self.inner.opentrack_ip, self.opentrack_port())
    }

    /// Route `source` onto `axis`. Applies from the next accepted rotation.
    pub fn set_mapping(&self, axis: OutputAxis, source: AxisSource, invert: bool) {
        self.inner
            .pipeline
            .write()
            .mapping
            .set(axis, AxisMapping::new(source, invert));
        info!(axis = %axis, source = %source, invert, "axis mapping changed");
    }

    pub fn mapping(&self) -> OutputMapping {
        self.inner.pipeline.read().mapping
    }

    /// Use the most recently active tracker's raw angles as the new zero.
    /// Returns the applied offset, or `None` if no tracker has rotation data.
    pub fn zero(&self) -> Option<EulerAngles> {
        let candidate = self.with_trackers(|store| {
            store
                .zero_candidate()
                .and_then(|state| state.raw_angles.map(|raw| (state.addr, raw)))
        });
        let (addr, offset) = candidate?;

        self.inner.pipeline.write().calibration = Calibration::new(offset);
        info!(
            addr = %addr,
            yaw = offset.yaw,
            pitch = offset.pitch,
            roll = offset.roll,
            "calibration zeroed"
        );
        Some(offset)
    }

    pub fn calibration(&self) -> Calibration {
        self.inner.pipeline.read().calibration
    }

    pub fn request_stop(&self) {
        self.inner.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.inner.stop.load(Ordering::SeqCst)
    }
}

impl Default for BridgeHandle {
    fn default() -> Self {
        Self::new(&BridgeConfig::default())
    }
}
