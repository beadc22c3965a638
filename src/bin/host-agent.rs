//! Provisioning agent running on the host.
//!
//! Runs the same core as the firmware with simulated collaborators:
//! - BLE client: commands typed on stdin (see `help`)
//! - Wi-Fi: [`SimNetwork`], associating after two seconds
//! - Storage: `~/.wifi-provision-esp32/eeprom.bin`
//! - Restart: the process exits with status 3 (`RESTART_EXIT_CODE`); run it
//!   under a loop that relaunches on that status only
//!
//! ```bash
//! while :; do cargo run --bin host-agent; [ $? -eq 3 ] || break; done
//! ```
//!
//! End of input exits with status 0, which ends the loop.
//!
//! Set `SIM_WIFI_SSID` / `SIM_WIFI_PASSWORD` to make the simulated access
//! point accept only that pair.

use log::{error, info};
use std::io::{BufRead, Write};
use std::time::Duration;
use wifi_provision_esp32::agent::{self, ProcessExitRestarter};
use wifi_provision_esp32::config::{Credentials, Timing, STORAGE_CAPACITY};
use wifi_provision_esp32::console::{format_status, ConsoleCommand, HELP_TEXT};
use wifi_provision_esp32::sim::{RecordingAdvertiser, SimNetwork};
use wifi_provision_esp32::status::LogIndicator;
use wifi_provision_esp32::storage::{default_image_path, FileMedium};
use wifi_provision_esp32::{CredentialStore, ProvisioningServer, SystemClock};

/// Simulated association time.
const SIM_LATENCY: Duration = Duration::from_secs(2);

fn platform_init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Print the prompt.
fn print_prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    platform_init();
    info!("=== WiFi provisioning agent starting (host) ===");

    let timing = Timing::default();
    let clock = SystemClock::new();

    let path = default_image_path()?;
    info!("Credential image: {}", path.display());
    let store = CredentialStore::new(FileMedium::open(path, STORAGE_CAPACITY)?)?;
    let state = agent::load_state(&store);
    info!("Booting with {}", agent::describe(&state.credentials()));

    let network = SimNetwork::new(clock);
    network.set_latency(SIM_LATENCY);
    if let Ok(ssid) = std::env::var("SIM_WIFI_SSID") {
        let password = std::env::var("SIM_WIFI_PASSWORD").unwrap_or_default();
        info!("Simulated access point only accepts '{}'", ssid);
        network.accept_only(Credentials::new(ssid, password));
    }

    let mut server = ProvisioningServer::new(
        state.clone(),
        store,
        RecordingAdvertiser::new(),
        ProcessExitRestarter,
        timing.restart_grace,
    );
    server.start();

    agent::start_tasks(state.clone(), network, LogIndicator::new(), clock, timing)?;

    println!("Type 'help' for commands.");
    print_prompt();
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };
        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Radio(event) => server.handle(event),
            ConsoleCommand::Status => println!("{}", format_status(&state.snapshot())),
            ConsoleCommand::Help => println!("{}", HELP_TEXT),
            ConsoleCommand::Unknown(msg) if msg.is_empty() => {}
            ConsoleCommand::Unknown(msg) => println!("{}", msg),
        }
        print_prompt();
    }

    info!("stdin closed, shutting down");
    Ok(())
}
