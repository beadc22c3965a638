//! Line console standing in for the BLE client on host runs.
//!
//! # Commands
//!
//! - `connect` - a BLE client attaches
//! - `disconnect` - the client goes away
//! - `ssid <text>` - write the network characteristic
//! - `password <text>` - write the password characteristic
//! - `status` - show connectivity state
//! - `help` - show available commands
//!
//! # Example Session
//!
//! ```text
//! > connect
//! > ssid HomeNet
//! > password s3cr3t
//! [ble] Credentials complete, restarting in 500ms
//! ```

use crate::config::Field;
use crate::provisioning::RadioEvent;
use crate::state::StateSnapshot;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Deliver an event to the provisioning server.
    Radio(RadioEvent),
    /// Show connectivity state.
    Status,
    /// Show help.
    Help,
    /// Unknown or invalid command.
    Unknown(String),
}

impl ConsoleCommand {
    /// Parse a command from an input line.
    ///
    /// Field values are taken verbatim after the first space, so passwords
    /// may contain spaces.
    pub fn parse(input: &str) -> Self {
        let input = input.trim_end_matches(['\r', '\n']).trim_start();
        if input.trim().is_empty() {
            return Self::Unknown(String::new());
        }

        let (cmd, args) = match input.split_once(' ') {
            Some((cmd, args)) => (cmd, args),
            None => (input.trim_end(), ""),
        };

        match cmd.to_lowercase().as_str() {
            "connect" | "c" => Self::Radio(RadioEvent::LinkConnected),
            "disconnect" | "d" => Self::Radio(RadioEvent::LinkDisconnected),
            "ssid" | "network" => Self::Radio(RadioEvent::FieldWritten {
                field: Field::NetworkId,
                bytes: args.as_bytes().to_vec(),
            }),
            "password" | "pw" => Self::Radio(RadioEvent::FieldWritten {
                field: Field::Secret,
                bytes: args.as_bytes().to_vec(),
            }),
            "status" | "s" => Self::Status,
            "help" | "h" | "?" => Self::Help,
            _ => Self::Unknown(format!(
                "Unknown command: {}. Type 'help' for commands.",
                cmd
            )),
        }
    }
}

/// Help text for available commands.
pub const HELP_TEXT: &str = r#"
Available commands:
  connect            Simulate a BLE client attaching
  disconnect         Simulate the BLE client going away
  ssid <text>        Write the network identifier
  password <text>    Write the password (restarts once a network is set)
  status             Show connectivity state
  help               Show this help

Shortcuts: c=connect, d=disconnect, pw=password, s=status, h=help
"#;

/// One-line status summary. Never includes the password.
pub fn format_status(snapshot: &StateSnapshot) -> String {
    let network = if snapshot.credentials.is_configured() {
        snapshot.credentials.ssid()
    } else {
        "<none>"
    };
    format!(
        "network: {} | ble: {} | wifi: {}",
        network,
        if snapshot.link_connected { "connected" } else { "disconnected" },
        if snapshot.network_connected { "connected" } else { "disconnected" },
    )
}
