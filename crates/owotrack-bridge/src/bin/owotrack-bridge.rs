//! owoTrack to OpenTrack bridge.
//!
//! Listens for owoTrack phones, prints the followed tracker's angles when
//! they change, and reads control commands from stdin (`help` lists them).
//!
//! Usage:
//!   cargo run -p owotrack-bridge -- --forward --opentrack-port 4242

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use owotrack_bridge::config::{self, RECV_TIMEOUT};
use owotrack_bridge::control::HELP;
use owotrack_bridge::{
    BridgeConfig, BridgeEngine, BridgeHandle, CommandEffect, ControlCommand, StatusEvent,
    StatusView,
};

/// Bridge owoTrack phone head-trackers to OpenTrack.
#[derive(Parser, Debug)]
#[command(name = "owotrack-bridge", version, about = "Forward owoTrack orientation to OpenTrack over UDP")]
struct Cli {
    /// Address:port the phones send to.
    #[arg(long, default_value = "0.0.0.0:6969")]
    listen: SocketAddr,

    /// Host running OpenTrack.
    #[arg(long, default_value = "127.0.0.1")]
    opentrack_host: IpAddr,

    /// OpenTrack UDP port. Invalid values fall back to 4242.
    #[arg(long, default_value = "4242")]
    opentrack_port: String,

    /// Start with forwarding enabled.
    #[arg(long)]
    forward: bool,

    /// Heartbeat interval in milliseconds.
    #[arg(long, default_value_t = 2000)]
    heartbeat_ms: u64,

    /// Evict trackers silent for longer than this many milliseconds.
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    /// Status poll period in milliseconds.
    #[arg(long, default_value_t = 16)]
    refresh_ms: u64,

    /// Print status as JSON lines.
    #[arg(long)]
    json: bool,

    /// Do not print status lines.
    #[arg(long, short)]
    quiet: bool,
}

impl Cli {
    fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            listen_addr: self.listen,
            opentrack_ip: self.opentrack_host,
            opentrack_port: config::port_or_default(&self.opentrack_port),
            heartbeat_interval: Duration::from_millis(self.heartbeat_ms),
            tracker_timeout: Duration::from_millis(self.timeout_ms),
            recv_timeout: RECV_TIMEOUT,
            forwarding: self.forward,
        }
    }
}

fn print_event(event: &StatusEvent, json: bool) {
    if json {
        match event.to_json() {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "failed to encode status"),
        }
    } else {
        println!("{}", event.render());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so status lines on stdout stay parseable
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.bridge_config();
    config.validate().context("invalid command line")?;

    let handle = BridgeHandle::new(&config);
    let engine = BridgeEngine::bind(config, handle.clone())
        .context("failed to start bridge")?
        .spawn()
        .context("failed to spawn engine thread")?;

    let mut view = StatusView::new();
    let mut refresh = tokio::time::interval(Duration::from_millis(cli.refresh_ms.max(1)));
    refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = refresh.tick() => {
                if handle.stop_requested() || !engine.is_running() {
                    break;
                }
                if !cli.quiet {
                    if let Some(event) = view.poll(&handle.snapshot()) {
                        print_event(&event, cli.json);
                    }
                }
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin closed");
                        stdin_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                match line.parse::<ControlCommand>() {
                    Ok(command) => match command.apply(&handle) {
                        CommandEffect::Zeroed(None) => println!("no tracker with rotation data to zero"),
                        CommandEffect::Zeroed(Some(offset)) => println!(
                            "zeroed at {:.1}/{:.1}/{:.1}",
                            offset.yaw, offset.pitch, offset.roll
                        ),
                        CommandEffect::Forwarding(on) => {
                            println!("forwarding {}", if on { "on" } else { "off" });
                        }
                        CommandEffect::Port(port) => println!("sending to OpenTrack port {port}"),
                        CommandEffect::MappingChanged => view.invalidate(),
                        CommandEffect::ShowStatus => print_event(&view.current(&handle.snapshot()), cli.json),
                        CommandEffect::ShowHelp => println!("{HELP}"),
                        CommandEffect::Stop => break,
                    },
                    Err(e) => {
                        println!("{e}");
                        println!("{HELP}");
                    }
                }
            }
        }
    }

    engine.stop();
    info!("bye");
    Ok(())
}
