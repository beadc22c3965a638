//! Boot sequence and task spawning.
//!
//! ```text
//! boot ─┬─ load credentials ──> SharedState
//!       ├─ provisioning server (BLE callbacks, platform specific)
//!       ├─ "wifi-manager" thread: NetworkManager::run
//!       └─ "status" thread:       StatusReporter::run
//! ```
//!
//! None of the spawned tasks ever returns.
//!
//! ## Task layout
//!
//! On ESP32 both threads are FreeRTOS tasks pinned to the application core,
//! so Wi-Fi blocking calls never compete with the BLE host on the protocol
//! core. Priorities: status 3, wifi-manager 2.

use crate::clock::Clock;
use crate::config::{Credentials, Timing};
use crate::network::{NetworkLink, NetworkManager};
use crate::provisioning::Restarter;
use crate::state::SharedState;
use crate::status::{Indicator, StatusReporter};
use crate::storage::{CredentialStore, StorageMedium};
use log::{info, warn};
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Name, stack size and priority of one long-running task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLayout {
    pub name: &'static str,
    pub stack_size: usize,
    pub priority: u8,
}

/// Network manager task.
pub const WIFI_TASK: TaskLayout = TaskLayout {
    name: "wifi-manager",
    stack_size: 6 * 1024,
    priority: 2,
};

/// Status reporter task.
pub const STATUS_TASK: TaskLayout = TaskLayout {
    name: "status",
    stack_size: 3 * 1024,
    priority: 3,
};

/// Load persisted credentials and build the shared state from them.
pub fn load_state<M: StorageMedium>(store: &CredentialStore<M>) -> Arc<SharedState> {
    let credentials = store.load_all();
    if !credentials.is_configured() {
        info!("No WiFi credentials stored, waiting for provisioning over BLE");
    }
    Arc::new(SharedState::with_credentials(credentials))
}

/// Spawn one long-running task.
#[cfg(not(feature = "esp32"))]
pub fn spawn_task<F>(layout: TaskLayout, task: F) -> Result<JoinHandle<()>, AgentError>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(layout.name.to_string())
        .stack_size(layout.stack_size)
        .spawn(task)
        .map_err(|e| AgentError::Spawn(layout.name, e))
}

/// Spawn one long-running task pinned to the application core.
#[cfg(feature = "esp32")]
pub fn spawn_task<F>(layout: TaskLayout, task: F) -> Result<JoinHandle<()>, AgentError>
where
    F: FnOnce() + Send + 'static,
{
    use esp_idf_hal::cpu::Core;
    use esp_idf_hal::task::thread::ThreadSpawnConfiguration;

    let core = if cfg!(esp_idf_freertos_unicore) {
        Core::Core0
    } else {
        Core::Core1
    };

    ThreadSpawnConfiguration {
        stack_size: layout.stack_size,
        priority: layout.priority,
        pin_to_core: Some(core),
        ..Default::default()
    }
    .set()
    .map_err(|e| AgentError::Spawn(layout.name, io::Error::new(io::ErrorKind::Other, e)))?;

    let handle = std::thread::Builder::new()
        .name(layout.name.to_string())
        .stack_size(layout.stack_size)
        .spawn(task)
        .map_err(|e| AgentError::Spawn(layout.name, e));

    // Later threads (NimBLE, restart) use the defaults again
    if let Err(e) = ThreadSpawnConfiguration::default().set() {
        warn!("Failed to reset thread spawn configuration: {:?}", e);
    }
    handle
}

/// Handles of the background tasks.
pub struct Tasks {
    pub network: JoinHandle<()>,
    pub status: JoinHandle<()>,
}

/// Start the network manager and the status reporter.
pub fn start_tasks<L, I, C>(
    state: Arc<SharedState>,
    link: L,
    indicator: I,
    clock: C,
    timing: Timing,
) -> Result<Tasks, AgentError>
where
    L: NetworkLink + 'static,
    I: Indicator + 'static,
    C: Clock + Clone + 'static,
{
    let mut manager = NetworkManager::new(link, state.clone(), clock.clone(), timing);
    let network = spawn_task(WIFI_TASK, move || manager.run())?;

    let mut reporter = StatusReporter::new(indicator, state, clock, timing);
    let status = spawn_task(STATUS_TASK, move || reporter.run())?;

    info!("Background tasks started");
    Ok(Tasks { network, status })
}

/// Summary line for boot logs. Never includes the password.
pub fn describe(credentials: &Credentials) -> String {
    if credentials.is_configured() {
        format!(
            "network '{}' ({})",
            credentials.ssid(),
            if credentials.is_open() { "open" } else { "secured" }
        )
    } else {
        "unconfigured".to_string()
    }
}

/// Exit status of the host process when it restarts to load new credentials.
///
/// Any other status (0 on end of input) means the agent stopped for good.
pub const RESTART_EXIT_CODE: i32 = 3;

/// Host restarter: exits with [`RESTART_EXIT_CODE`] so a supervisor can
/// relaunch it.
#[derive(Debug, Default)]
pub struct ProcessExitRestarter;

impl Restarter for ProcessExitRestarter {
    fn schedule_restart(&mut self, grace: Duration) {
        let spawned = std::thread::Builder::new()
            .name("restart".into())
            .spawn(move || {
                std::thread::sleep(grace);
                info!("Restarting: exiting so the new credentials load on next start");
                std::process::exit(RESTART_EXIT_CODE);
            });
        if let Err(e) = spawned {
            warn!("Failed to spawn restart thread ({}), exiting now", e);
            std::process::exit(RESTART_EXIT_CODE);
        }
    }
}

/// Errors during boot.
#[derive(Debug)]
pub enum AgentError {
    /// A task could not be spawned.
    Spawn(&'static str, io::Error),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(name, e) => write!(f, "failed to spawn task '{}': {}", name, e),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(_, e) => Some(e),
        }
    }
}
