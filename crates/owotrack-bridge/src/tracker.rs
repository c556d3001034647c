//! Per-tracker state, keyed by the sender's UDP address.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use owotrack_protocol::Quaternion;
use serde::Serialize;

use crate::handle::PipelineSettings;
use crate::orientation::{self, EulerAngles};

/// Everything the bridge knows about one connected phone.
#[derive(Debug, Clone)]
pub struct TrackerState {
    pub addr: SocketAddr,
    /// Wall-clock time the tracker was first heard from.
    pub first_seen: DateTime<Utc>,
    /// Last valid datagram of any type. Drives eviction.
    pub last_seen: Instant,
    /// Last accepted rotation.
    pub last_rotation: Option<Instant>,
    pub last_sequence_id: Option<i64>,
    pub quaternion: Option<Quaternion>,
    pub raw_angles: Option<EulerAngles>,
    pub final_angles: Option<EulerAngles>,
    pub output_angles: Option<EulerAngles>,
    pub battery_fraction: Option<f32>,
    pub rotations_accepted: u64,
    pub rotations_discarded: u64,
}

impl TrackerState {
    pub fn new(addr: SocketAddr, now: Instant) -> Self {
        Self {
            addr,
            first_seen: Utc::now(),
            last_seen: now,
            last_rotation: None,
            last_sequence_id: None,
            quaternion: None,
            raw_angles: None,
            final_angles: None,
            output_angles: None,
            battery_fraction: None,
            rotations_accepted: 0,
            rotations_discarded: 0,
        }
    }

    /// Apply a rotation packet. Returns `false` if `sequence` is not newer
    /// than the last accepted one, in which case nothing but the discard
    /// counter changes.
    pub fn apply_rotation(
        &mut self,
        sequence: i64,
        quaternion: Quaternion,
        settings: &PipelineSettings,
        now: Instant,
    ) -> bool {
        if matches!(self.last_sequence_id, Some(last) if sequence <= last) {
            self.rotations_discarded += 1;
            return false;
        }

        let raw = orientation::raw_angles(&quaternion);
        let (final_angles, output) = settings.process(raw);

        self.last_sequence_id = Some(sequence);
        self.last_rotation = Some(now);
        self.quaternion = Some(quaternion);
        self.raw_angles = Some(raw);
        self.final_angles = Some(final_angles);
        self.output_angles = Some(output);
        self.rotations_accepted += 1;
        true
    }

    pub fn set_battery(&mut self, fraction: f32) {
        self.battery_fraction = Some(fraction);
    }

    /// Battery level in percent, if the phone has reported one.
    pub fn battery_percent(&self) -> Option<f32> {
        self.battery_fraction.map(|f| f * 100.0)
    }

    pub fn idle(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }

    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        self.idle(now) > timeout
    }

    pub fn snapshot(&self, now: Instant) -> TrackerSnapshot {
        TrackerSnapshot {
            addr: self.addr,
            first_seen: self.first_seen,
            idle_ms: self.idle(now).as_millis() as u64,
            last_sequence_id: self.last_sequence_id,
            quaternion: self.quaternion,
            raw_angles: self.raw_angles,
            final_angles: self.final_angles,
            output_angles: self.output_angles,
            battery_fraction: self.battery_fraction,
            rotations_accepted: self.rotations_accepted,
            rotations_discarded: self.rotations_discarded,
        }
    }
}

/// Read-only copy of a tracker, handed to the presentation side.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerSnapshot {
    pub addr: SocketAddr,
    pub first_seen: DateTime<Utc>,
    pub idle_ms: u64,
    pub last_sequence_id: Option<i64>,
    pub quaternion: Option<Quaternion>,
    pub raw_angles: Option<EulerAngles>,
    pub final_angles: Option<EulerAngles>,
    pub output_angles: Option<EulerAngles>,
    pub battery_fraction: Option<f32>,
    pub rotations_accepted: u64,
    pub rotations_discarded: u64,
}

impl TrackerSnapshot {
    pub fn battery_percent(&self) -> Option<f32> {
        self.battery_fraction.map(|f| f * 100.0)
    }
}

/// Addresses partitioned by a heartbeat sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Trackers that stay and should receive a heartbeat.
    pub live: Vec<SocketAddr>,
    /// Trackers that were removed.
    pub evicted: Vec<SocketAddr>,
}

/// All connected trackers.
#[derive(Debug, Default)]
pub struct TrackerStore {
    trackers: HashMap<SocketAddr, TrackerState>,
}

impl TrackerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a valid datagram from `addr`, creating its entry if needed.
    /// Returns `true` when the tracker is new.
    pub fn touch(&mut self, addr: SocketAddr, now: Instant) -> bool {
        match self.trackers.get_mut(&addr) {
            Some(state) => {
                state.last_seen = now;
                false
            }
            None => {
                self.trackers.insert(addr, TrackerState::new(addr, now));
                true
            }
        }
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&TrackerState> {
        self.trackers.get(addr)
    }

    pub fn get_mut(&mut self, addr: &SocketAddr) -> Option<&mut TrackerState> {
        self.trackers.get_mut(addr)
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Tracked addresses in ascending order.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        let mut addrs: Vec<_> = self.trackers.keys().copied().collect();
        addrs.sort();
        addrs
    }

    /// Split trackers into live and stale, and drop the stale ones.
    pub fn sweep(&mut self, now: Instant, timeout: Duration) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        for addr in self.addresses() {
            match self.trackers.get(&addr) {
                Some(state) if state.is_stale(now, timeout) => outcome.evicted.push(addr),
                Some(_) => outcome.live.push(addr),
                None => {}
            }
        }
        for addr in &outcome.evicted {
            self.trackers.remove(addr);
        }
        outcome
    }

    /// Tracker whose raw angles become the calibration offset: the one with
    /// the most recent accepted rotation, lowest address on a tie.
    pub fn zero_candidate(&self) -> Option<&TrackerState> {
        self.trackers
            .values()
            .filter(|state| state.raw_angles.is_some())
            .max_by(|a, b| {
                a.last_rotation
                    .cmp(&b.last_rotation)
                    .then_with(|| b.addr.cmp(&a.addr))
            })
    }

    /// Snapshots of every tracker, ordered by address.
    pub fn snapshots(&self, now: Instant) -> Vec<TrackerSnapshot> {
        let mut snapshots: Vec<_> = self
            .trackers
            .values()
            .map(|state| state.snapshot(now))
            .collect();
        snapshots.sort_by_key(|s| s.addr);
        snapshots
    }
}
