//! UDP receive/heartbeat loop.
//!
//! The engine owns two sockets. The tracker socket receives owoTrack
//! datagrams and carries handshake replies and heartbeats back to the
//! phones. The OpenTrack socket only sends forwarded poses.
//!
//! Each loop iteration first runs the heartbeat sweep if it is due, then
//! waits at most `recv_timeout` for one datagram, so heartbeat cadence and
//! stop requests never depend on traffic.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use owotrack_protocol::{heartbeat, InboundPacket, OpenTrackPose, HANDSHAKE_REPLY};
use tracing::{debug, info, trace, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::handle::BridgeHandle;

/// Largest datagram the engine reads; owoTrack packets are far smaller.
const RECV_BUFFER_LEN: usize = 2048;

/// What a single datagram did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// Malformed or unknown; nothing changed.
    Ignored,
    /// Handshake answered.
    Handshake,
    /// Rotation accepted; `forwarded` when a pose was sent to OpenTrack.
    Rotation { forwarded: bool },
    /// Rotation with an old sequence id, discarded.
    StaleRotation,
    /// Battery level stored.
    Battery,
}

/// Result of one heartbeat sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Heartbeats successfully sent.
    pub heartbeats: usize,
    pub evicted: Vec<SocketAddr>,
}

/// The bridge worker. Call [`BridgeEngine::run`] from a dedicated thread,
/// or use [`BridgeEngine::spawn`].
pub struct BridgeEngine {
    config: BridgeConfig,
    handle: BridgeHandle,
    tracker_socket: UdpSocket,
    opentrack_socket: UdpSocket,
    last_sweep: Option<Instant>,
}

impl BridgeEngine {
    /// Bind the tracker socket on `config.listen_addr` and an ephemeral
    /// socket for OpenTrack output.
    pub fn bind(config: BridgeConfig, handle: BridgeHandle) -> BridgeResult<Self> {
        config.validate()?;

        let tracker_socket =
            UdpSocket::bind(config.listen_addr).map_err(|source| BridgeError::Bind {
                role: "tracker",
                addr: config.listen_addr,
                source,
            })?;

        let unspecified = match config.opentrack_ip {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let output_addr = SocketAddr::new(unspecified, 0);
        let opentrack_socket =
            UdpSocket::bind(output_addr).map_err(|source| BridgeError::Bind {
                role: "opentrack",
                addr: output_addr,
                source,
            })?;

        Self::from_sockets(config, handle, tracker_socket, opentrack_socket)
    }

    /// Build an engine from already-bound sockets (for testing).
    pub fn from_sockets(
        config: BridgeConfig,
        handle: BridgeHandle,
        tracker_socket: UdpSocket,
        opentrack_socket: UdpSocket,
    ) -> BridgeResult<Self> {
        config.validate()?;
        tracker_socket.set_read_timeout(Some(config.recv_timeout))?;

        Ok(Self {
            config,
            handle,
            tracker_socket,
            opentrack_socket,
            last_sweep: None,
        })
    }

    /// Address the tracker socket is bound to.
    pub fn local_addr(&self) -> BridgeResult<SocketAddr> {
        Ok(self.tracker_socket.local_addr()?)
    }

    pub fn handle(&self) -> &BridgeHandle {
        &self.handle
    }

    /// Process one datagram from `src`. Public for unit testing.
    pub fn handle_datagram(&mut self, data: &[u8], src: SocketAddr, now: Instant) -> DatagramOutcome {
        let packet = match InboundPacket::decode(data) {
            Ok(packet) => packet,
            Err(err) => {
                trace!(addr = %src, len = data.len(), error = %err, "ignoring datagram");
                return DatagramOutcome::Ignored;
            }
        };

        // Settings are copied before the store is locked; never hold both.
        let settings = self.handle.pipeline();

        let (outcome, output) = self.handle.with_trackers(|store| {
            if store.touch(src, now) {
                info!(addr = %src, trackers = store.len(), "tracker connected");
            }
            let Some(state) = store.get_mut(&src) else {
                return (DatagramOutcome::Ignored, None);
            };

            match packet {
                InboundPacket::Handshake => (DatagramOutcome::Handshake, None),
                InboundPacket::Rotation {
                    sequence,
                    quaternion,
                } => {
                    if state.apply_rotation(sequence, quaternion, &settings, now) {
                        (DatagramOutcome::Rotation { forwarded: false }, state.output_angles)
                    } else {
                        debug!(
                            addr = %src,
                            sequence,
                            last = ?state.last_sequence_id,
                            "discarding stale rotation"
                        );
                        (DatagramOutcome::StaleRotation, None)
                    }
                }
                InboundPacket::Battery { fraction } => {
                    state.set_battery(fraction);
                    debug!(addr = %src, battery = fraction, "battery updated");
                    (DatagramOutcome::Battery, None)
                }
            }
        });

        match outcome {
            DatagramOutcome::Handshake => {
                if send(&self.tracker_socket, HANDSHAKE_REPLY, src, "handshake") {
                    debug!(addr = %src, "handshake answered");
                }
                outcome
            }
            DatagramOutcome::Rotation { .. } if self.handle.is_forwarding() => {
                let forwarded = output.is_some_and(|angles| {
                    let pose = OpenTrackPose::from_angles(angles.yaw, angles.pitch, angles.roll);
                    send(
                        &self.opentrack_socket,
                        &pose.encode(),
                        self.handle.destination(),
                        "opentrack",
                    )
                });
                DatagramOutcome::Rotation { forwarded }
            }
            other => other,
        }
    }

    /// Evict stale trackers and send a heartbeat to every remaining one.
    /// Public for unit testing.
    pub fn heartbeat_sweep(&mut self, now: Instant) -> SweepReport {
        self.last_sweep = Some(now);
        let outcome = self
            .handle
            .with_trackers(|store| store.sweep(now, self.config.tracker_timeout));

        for addr in &outcome.evicted {
            info!(addr = %addr, "tracker timed out");
        }

        let beat = heartbeat();
        let heartbeats = outcome
            .live
            .iter()
            .filter(|&&addr| send(&self.tracker_socket, &beat, addr, "heartbeat"))
            .count();
        trace!(heartbeats, "heartbeat sweep");

        SweepReport {
            heartbeats,
            evicted: outcome.evicted,
        }
    }

    fn sweep_due(&self, now: Instant) -> bool {
        self.last_sweep
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.heartbeat_interval)
    }

    /// Run until [`BridgeHandle::request_stop`] is called.
    pub fn run(&mut self) {
        info!(
            listen = ?self.tracker_socket.local_addr().ok(),
            destination = %self.handle.destination(),
            forwarding = self.handle.is_forwarding(),
            "bridge engine started"
        );

        let mut buf = [0u8; RECV_BUFFER_LEN];
        while !self.handle.stop_requested() {
            let now = Instant::now();
            if self.sweep_due(now) {
                self.heartbeat_sweep(now);
            }

            match self.tracker_socket.recv_from(&mut buf) {
                Ok((n, src)) => {
                    self.handle_datagram(&buf[..n], src, Instant::now());
                }
                Err(err)
                    if matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
                // Windows reports ICMP port unreachable from a departed phone as a reset.
                Err(err) if err.kind() == io::ErrorKind::ConnectionReset => {
                    trace!(error = %err, "peer unreachable");
                }
                Err(err) => {
                    warn!(error = %err, "receive failed");
                }
            }
        }

        info!("bridge engine stopped");
    }

    /// Run the engine on its own named thread.
    pub fn spawn(self) -> BridgeResult<EngineThread> {
        let handle = self.handle.clone();
        let mut engine = self;
        let join = thread::Builder::new()
            .name("owotrack-engine".to_string())
            .spawn(move || engine.run())?;

        Ok(EngineThread {
            handle,
            join: Some(join),
        })
    }
}

/// Sends `bytes`, logging failures. Returns whether the datagram went out.
fn send(socket: &UdpSocket, bytes: &[u8], addr: SocketAddr, what: &str) -> bool {
    match socket.send_to(bytes, addr) {
        Ok(_) => true,
        Err(err) => {
            warn!(addr = %addr, error = %err, "failed to send {what}");
            false
        }
    }
}

/// A running engine. Stopping or dropping it ends the loop, joins the
/// thread and releases both sockets.
pub struct EngineThread {
    handle: BridgeHandle,
    join: Option<JoinHandle<()>>,
}

impl EngineThread {
    pub fn handle(&self) -> &BridgeHandle {
        &self.handle
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|join| !join.is_finished())
    }

    /// Request stop and wait for the worker to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.handle.request_stop();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                warn!("bridge engine thread panicked");
            }
        }
    }
}

impl Drop for EngineThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use owotrack_protocol::{PACKET_BATTERY, PACKET_HANDSHAKE, PACKET_ROTATION};
    use std::time::Duration;

    fn engine() -> BridgeEngine {
        let tracker = UdpSocket::bind("127.0.0.1:0").unwrap();
        let output = UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = BridgeConfig::default();
        let handle = BridgeHandle::new(&config);
        BridgeEngine::from_sockets(config, handle, tracker, output).unwrap()
    }

    fn phone(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn rotation(sequence: i64) -> Vec<u8> {
        let mut buf = PACKET_ROTATION.to_be_bytes().to_vec();
        buf.extend_from_slice(&sequence.to_be_bytes());
        for c in [0.0f32, 0.0, 0.0, 1.0] {
            buf.extend_from_slice(&c.to_be_bytes());
        }
        buf
    }

    #[test]
    fn test_malformed_datagram_creates_no_state() {
        let mut engine = engine();
        let now = Instant::now();

        assert_eq!(
            engine.handle_datagram(&[0, 0], phone(9), now),
            DatagramOutcome::Ignored
        );
        assert_eq!(
            engine.handle_datagram(&rotation(1)[..20], phone(9), now),
            DatagramOutcome::Ignored
        );
        assert_eq!(
            engine.handle_datagram(&42u32.to_be_bytes(), phone(9), now),
            DatagramOutcome::Ignored
        );
        assert_eq!(engine.handle().tracker_count(), 0);
    }

    #[test]
    fn test_rotation_updates_tracker() {
        let mut engine = engine();
        let now = Instant::now();

        assert_eq!(
            engine.handle_datagram(&rotation(3), phone(9), now),
            DatagramOutcome::Rotation { forwarded: false }
        );
        assert_eq!(
            engine.handle_datagram(&rotation(3), phone(9), now),
            DatagramOutcome::StaleRotation
        );

        let snapshot = engine.handle().snapshot();
        assert_eq!(snapshot.trackers.len(), 1);
        assert_eq!(snapshot.trackers[0].last_sequence_id, Some(3));
        assert!(snapshot.trackers[0].output_angles.is_some());
    }

    #[test]
    fn test_battery_and_handshake_touch_tracker() {
        let mut engine = engine();
        let now = Instant::now();

        assert_eq!(
            engine.handle_datagram(&PACKET_HANDSHAKE.to_be_bytes(), phone(9), now),
            DatagramOutcome::Handshake
        );

        let mut battery = PACKET_BATTERY.to_be_bytes().to_vec();
        battery.extend_from_slice(&[0u8; 8]);
        battery.extend_from_slice(&0.25f32.to_be_bytes());
        assert_eq!(
            engine.handle_datagram(&battery, phone(9), now + Duration::from_secs(1)),
            DatagramOutcome::Battery
        );

        let snapshot = engine.handle().snapshot();
        assert_eq!(snapshot.trackers[0].battery_fraction, Some(0.25));
        assert_eq!(snapshot.trackers[0].last_sequence_id, None);
    }

    #[test]
    fn test_sweep_evicts_after_timeout() {
        let mut engine = engine();
        let t0 = Instant::now();
        engine.handle_datagram(&rotation(1), phone(9), t0);

        let report = engine.heartbeat_sweep(t0 + Duration::from_secs(2));
        assert!(report.evicted.is_empty());
        assert_eq!(report.heartbeats, 1);

        let report = engine.heartbeat_sweep(t0 + Duration::from_secs(6));
        assert_eq!(report.evicted, vec![phone(9)]);
        assert_eq!(report.heartbeats, 0);
        assert_eq!(engine.handle().tracker_count(), 0);
    }

    #[test]
    fn test_first_sweep_is_due_immediately() {
        let mut engine = engine();
        let t0 = Instant::now();
        assert!(engine.sweep_due(t0));
        engine.heartbeat_sweep(t0);
        assert!(!engine.sweep_due(t0 + Duration::from_secs(1)));
        assert!(engine.sweep_due(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn test_zero_recv_timeout_rejected() {
        let tracker = UdpSocket::bind("127.0.0.1:0").unwrap();
        let output = UdpSocket::bind("127.0.0.1:0").unwrap();
        let config = BridgeConfig {
            recv_timeout: Duration::ZERO,
            ..Default::default()
        };
        let handle = BridgeHandle::new(&config);
        assert!(BridgeEngine::from_sockets(config, handle, tracker, output).is_err());
    }
}
