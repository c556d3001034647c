//! Bridge configuration and defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tracing::warn;

use crate::error::{BridgeError, BridgeResult};

/// Port the owoTrack app sends to.
pub const DEFAULT_LISTEN_PORT: u16 = 6969;
/// Port OpenTrack's UDP input listens on.
pub const DEFAULT_OPENTRACK_PORT: u16 = 4242;
/// How often live trackers are sent a heartbeat.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);
/// Idle time after which a tracker is evicted.
pub const TRACKER_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on a single socket receive wait.
pub const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Configuration for the bridge engine.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address the tracker socket is bound to.
    pub listen_addr: SocketAddr,
    /// Host running OpenTrack.
    pub opentrack_ip: IpAddr,
    /// Initial OpenTrack port; can be changed at runtime.
    pub opentrack_port: u16,
    /// Heartbeat and eviction sweep period.
    pub heartbeat_interval: Duration,
    /// Idle time after which a tracker is evicted.
    pub tracker_timeout: Duration,
    /// Bounded wait for one receive.
    pub recv_timeout: Duration,
    /// Whether forwarding starts enabled.
    pub forwarding: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_LISTEN_PORT),
            opentrack_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            opentrack_port: DEFAULT_OPENTRACK_PORT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            tracker_timeout: TRACKER_TIMEOUT,
            recv_timeout: RECV_TIMEOUT,
            forwarding: false,
        }
    }
}

impl BridgeConfig {
    /// Check the configuration can drive the engine loop.
    pub fn validate(&self) -> BridgeResult<()> {
        if self.recv_timeout.is_zero() {
            return Err(BridgeError::configuration(
                "receive timeout must be greater than zero",
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(BridgeError::configuration(
                "heartbeat interval must be greater than zero",
            ));
        }
        if self.tracker_timeout.is_zero() {
            return Err(BridgeError::configuration(
                "tracker timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Current OpenTrack destination.
    pub fn opentrack_addr(&self) -> SocketAddr {
        SocketAddr::new(self.opentrack_ip, self.opentrack_port)
    }
}

/// Parse a destination port typed by the user. Port 0 is rejected since
/// nothing can listen on it.
pub fn parse_port(input: &str) -> Option<u16> {
    match input.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

/// Parse a destination port, falling back to [`DEFAULT_OPENTRACK_PORT`].
pub fn port_or_default(input: &str) -> u16 {
    parse_port(input).unwrap_or_else(|| {
        warn!(
            input,
            fallback = DEFAULT_OPENTRACK_PORT,
            "invalid OpenTrack port, using default"
        );
        DEFAULT_OPENTRACK_PORT
    })
}
