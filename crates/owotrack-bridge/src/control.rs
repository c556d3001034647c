//! Console commands that drive a running bridge.

use std::str::FromStr;

use crate::error::BridgeError;
use crate::handle::BridgeHandle;
use crate::mapping::{AxisSource, OutputAxis};
use crate::orientation::EulerAngles;

/// Usage text printed for `help` and after a bad command.
pub const HELP: &str = "\
commands:
  zero                               use the current pose as the new center
  forward on|off                     start or stop sending to OpenTrack
  port <number>                      set the OpenTrack port (invalid -> 4242)
  map <yaw|pitch|roll> <yaw|pitch|roll|disabled> [invert]
                                     route a source angle onto an output axis
  status                             print the followed tracker now
  help                               show this text
  quit                               stop the bridge and exit";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Zero,
    Forward(bool),
    /// Raw input; invalid values fall back to the default port.
    Port(String),
    Map {
        axis: OutputAxis,
        source: AxisSource,
        invert: bool,
    },
    Status,
    Help,
    Quit,
}

/// What happened when a command was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandEffect {
    /// Calibration offset applied, or `None` if no tracker had data.
    Zeroed(Option<EulerAngles>),
    Forwarding(bool),
    Port(u16),
    /// Mapping changed; a status display must forget its last angles.
    MappingChanged,
    ShowStatus,
    ShowHelp,
    Stop,
}

impl FromStr for ControlCommand {
    type Err = BridgeError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = input.split_whitespace().collect();
        let invalid = |reason: &str| BridgeError::invalid_command(input.trim(), reason);

        let Some((&verb, args)) = words.split_first() else {
            return Err(invalid("empty command"));
        };

        match (verb.to_ascii_lowercase().as_str(), args) {
            ("zero", []) => Ok(ControlCommand::Zero),
            ("forward", [state]) => match state.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => Ok(ControlCommand::Forward(true)),
                "off" | "false" | "0" => Ok(ControlCommand::Forward(false)),
                _ => Err(invalid("expected 'forward on' or 'forward off'")),
            },
            ("port", [value]) => Ok(ControlCommand::Port((*value).to_string())),
            ("map", [axis, source, rest @ ..]) => {
                let axis: OutputAxis = axis.parse().map_err(|e: String| invalid(e.as_str()))?;
                let source: AxisSource = source.parse().map_err(|e: String| invalid(e.as_str()))?;
                let invert = match rest {
                    [] => false,
                    [flag] if flag.eq_ignore_ascii_case("invert") => true,
                    _ => return Err(invalid("only 'invert' may follow the source axis")),
                };
                Ok(ControlCommand::Map {
                    axis,
                    source,
                    invert,
                })
            }
            ("status", []) => Ok(ControlCommand::Status),
            ("help" | "?", []) => Ok(ControlCommand::Help),
            ("quit" | "exit", []) => Ok(ControlCommand::Quit),
            ("zero" | "status" | "help" | "quit" | "exit", _) => {
                Err(invalid("command takes no arguments"))
            }
            ("forward" | "port" | "map", _) => Err(invalid("wrong number of arguments")),
            _ => Err(invalid("unknown command")),
        }
    }
}

impl ControlCommand {
    /// Perform the command against the bridge.
    pub fn apply(&self, handle: &BridgeHandle) -> CommandEffect {
        match self {
            ControlCommand::Zero => CommandEffect::Zeroed(handle.zero()),
            ControlCommand::Forward(enabled) => {
                handle.set_forwarding(*enabled);
                CommandEffect::Forwarding(*enabled)
            }
            ControlCommand::Port(value) => CommandEffect::Port(handle.set_opentrack_port(value)),
            ControlCommand::Map {
                axis,
                source,
                invert,
            } => {
                handle.set_mapping(*axis, *source, *invert);
                CommandEffect::MappingChanged
            }
            ControlCommand::Status => CommandEffect::ShowStatus,
            ControlCommand::Help => CommandEffect::ShowHelp,
            ControlCommand::Quit => {
                handle.request_stop();
                CommandEffect::Stop
            }
        }
    }
}
