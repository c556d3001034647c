//! Change-driven status reporting for the console.

use std::fmt::Write as _;
use std::net::SocketAddr;

use serde::Serialize;

use crate::handle::BridgeSnapshot;
use crate::orientation::EulerAngles;
use crate::tracker::TrackerSnapshot;

/// Output angles must move by more than this (degrees) to be reported again.
pub const DEGREE_CHANGE_THRESHOLD: f64 = 0.1;

/// Something worth printing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusEvent {
    /// No tracker is connected.
    Waiting,
    Tracker(TrackerSnapshot),
}

impl StatusEvent {
    /// One human-readable line.
    pub fn render(&self) -> String {
        match self {
            StatusEvent::Waiting => "waiting for a tracker...".to_string(),
            StatusEvent::Tracker(tracker) => render_tracker(tracker),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Follows one tracker across snapshots and reports only meaningful changes.
#[derive(Debug, Default)]
pub struct StatusView {
    followed: Option<SocketAddr>,
    last_output: Option<EulerAngles>,
    reported: bool,
    waiting_reported: bool,
}

impl StatusView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address of the tracker currently shown.
    pub fn followed(&self) -> Option<SocketAddr> {
        self.followed
    }

    /// Forget the last reported angles so the next poll reports.
    pub fn invalidate(&mut self) {
        self.last_output = None;
        self.reported = false;
        self.waiting_reported = false;
    }

    /// Inspect a snapshot. Returns an event when the display should change.
    pub fn poll(&mut self, snapshot: &BridgeSnapshot) -> Option<StatusEvent> {
        let still_present = self
            .followed
            .is_some_and(|addr| snapshot.trackers.iter().any(|t| t.addr == addr));
        if !still_present {
            self.followed = snapshot.earliest_tracker().map(|t| t.addr);
            self.last_output = None;
            self.reported = false;
        }

        let Some(tracker) = self
            .followed
            .and_then(|addr| snapshot.trackers.iter().find(|t| t.addr == addr))
        else {
            if self.waiting_reported {
                return None;
            }
            self.waiting_reported = true;
            return Some(StatusEvent::Waiting);
        };
        self.waiting_reported = false;

        let changed = match (tracker.output_angles, self.last_output) {
            (Some(current), Some(previous)) => {
                current.max_delta(&previous) > DEGREE_CHANGE_THRESHOLD
            }
            _ => !self.reported || tracker.output_angles.is_some(),
        };
        if !changed {
            return None;
        }

        self.last_output = tracker.output_angles;
        self.reported = true;
        Some(StatusEvent::Tracker(tracker.clone()))
    }

    /// Current state of the followed tracker, regardless of change.
    pub fn current(&self, snapshot: &BridgeSnapshot) -> StatusEvent {
        self.followed
            .and_then(|addr| snapshot.trackers.iter().find(|t| t.addr == addr))
            .or_else(|| snapshot.earliest_tracker())
            .map_or(StatusEvent::Waiting, |t| StatusEvent::Tracker(t.clone()))
    }
}

fn render_tracker(tracker: &TrackerSnapshot) -> String {
    let mut line = format!("{}  battery ", tracker.addr);
    match tracker.battery_percent() {
        Some(percent) => {
            let _ = write!(line, "{percent:.1}%");
        }
        None => line.push_str("..."),
    }
    match (tracker.raw_angles, tracker.output_angles) {
        (Some(raw), Some(output)) => {
            let _ = write!(
                line,
                "  raw {:.1}/{:.1}/{:.1}  out {:.1}/{:.1}/{:.1}",
                raw.yaw, raw.pitch, raw.roll, output.yaw, output.pitch, output.roll
            );
        }
        _ => line.push_str("  no rotation yet"),
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::PipelineSettings;
    use chrono::{Duration as ChronoDuration, Utc};

    fn tracker(port: u16, output: Option<EulerAngles>) -> TrackerSnapshot {
        TrackerSnapshot {
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            first_seen: Utc::now(),
            idle_ms: 0,
            last_sequence_id: output.map(|_| 1),
            quaternion: None,
            raw_angles: output,
            final_angles: output,
            output_angles: output,
            battery_fraction: None,
            rotations_accepted: 0,
            rotations_discarded: 0,
        }
    }

    fn snapshot(trackers: Vec<TrackerSnapshot>) -> BridgeSnapshot {
        BridgeSnapshot {
            trackers,
            settings: PipelineSettings::default(),
            forwarding: false,
            destination: "127.0.0.1:4242".parse().unwrap(),
        }
    }

    fn angles(yaw: f64) -> Option<EulerAngles> {
        Some(EulerAngles::new(yaw, 0.0, 0.0))
    }

    #[test]
    fn test_waiting_reported_once() {
        let mut view = StatusView::new();
        let empty = snapshot(vec![]);
        assert_eq!(view.poll(&empty), Some(StatusEvent::Waiting));
        assert_eq!(view.poll(&empty), None);
    }

    #[test]
    fn test_small_changes_suppressed() {
        let mut view = StatusView::new();
        assert!(view.poll(&snapshot(vec![tracker(5000, angles(10.0))])).is_some());
        assert!(view.poll(&snapshot(vec![tracker(5000, angles(10.05))])).is_none());
        assert!(view.poll(&snapshot(vec![tracker(5000, angles(10.2))])).is_some());
    }

    #[test]
    fn test_invalidate_forces_report() {
        let mut view = StatusView::new();
        let snap = snapshot(vec![tracker(5000, angles(10.0))]);
        assert!(view.poll(&snap).is_some());
        assert!(view.poll(&snap).is_none());
        view.invalidate();
        assert!(view.poll(&snap).is_some());
    }

    #[test]
    fn test_follows_earliest_until_evicted() {
        let mut view = StatusView::new();
        let mut older = tracker(6000, angles(1.0));
        older.first_seen = Utc::now() - ChronoDuration::seconds(30);
        let newer = tracker(5000, angles(2.0));

        view.poll(&snapshot(vec![newer.clone(), older.clone()]));
        assert_eq!(view.followed(), Some(older.addr));

        // A newer tracker joining does not steal the display
        view.poll(&snapshot(vec![newer.clone(), older]));
        assert_eq!(view.followed(), Some(SocketAddr::from(([127, 0, 0, 1], 6000))));

        let event = view.poll(&snapshot(vec![newer.clone()]));
        assert_eq!(view.followed(), Some(newer.addr));
        assert_eq!(event, Some(StatusEvent::Tracker(newer)));
    }

    #[test]
    fn test_tracker_without_rotation_reported_once() {
        let mut view = StatusView::new();
        let snap = snapshot(vec![tracker(5000, None)]);
        assert!(view.poll(&snap).is_some());
        assert!(view.poll(&snap).is_none());
    }

    #[test]
    fn test_render_line() {
        let mut t = tracker(5000, Some(EulerAngles::new(12.34, -5.0, 0.06)));
        assert_eq!(
            StatusEvent::Tracker(t.clone()).render(),
            "127.0.0.1:5000  battery ...  raw 12.3/-5.0/0.1  out 12.3/-5.0/0.1"
        );
        t.battery_fraction = Some(0.875);
        assert!(StatusEvent::Tracker(t).render().contains("battery 87.5%"));
    }

    #[test]
    fn test_json_event() {
        let json = StatusEvent::Waiting.to_json().unwrap();
        assert_eq!(json, r#"{"status":"waiting"}"#);

        let value: serde_json::Value =
            serde_json::from_str(&StatusEvent::Tracker(tracker(5000, angles(3.0))).to_json().unwrap())
                .unwrap();
        assert_eq!(value["status"], "tracker");
        assert_eq!(value["addr"], "127.0.0.1:5000");
        assert_eq!(value["output_angles"]["yaw"], 3.0);
    }
}
