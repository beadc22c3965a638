//! BLE provisioning server.
//!
//! Accepts Wi-Fi credentials written by a BLE client, stores them and restarts
//! the device once a complete pair has arrived.
//!
//! # GATT Service Structure
//!
//! ```text
//! Service: WiFi Provisioning
//! ├── Network (Read, Write) - Wi-Fi network identifier
//! └── Password (Write)      - Wi-Fi password, never readable
//! ```
//!
//! The BLE stack is reduced to [`RadioEvent`]s delivered to
//! [`ProvisioningServer::handle`]; `esp32-nimble` wiring lives in `gatt`
//! (feature `esp32`).
//!
//! # Restart on completion
//!
//! Writing the password while a network identifier is present schedules a
//! device restart after a short grace period. The network manager never sees
//! credentials change under a running attempt: it always starts from the
//! freshly loaded pair after boot.
//!
//! # Security Considerations
//!
//! Credentials travel and are stored as plaintext. The client is not
//! authenticated. Keeping the password write-only only stops casual reads.

#[cfg(feature = "esp32")]
mod gatt;

use crate::config::{fit_to_slot, Field, DEVICE_NAME};
use crate::state::SharedState;
use crate::storage::{CredentialStore, StorageMedium};
use log::{error, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "esp32")]
pub use gatt::{start_ble_service, EspAdvertiser, EspRestarter};

/// Event delivered by the BLE stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// A client attached.
    LinkConnected,
    /// The client went away.
    LinkDisconnected,
    /// A client wrote `bytes` to a characteristic.
    FieldWritten { field: Field, bytes: Vec<u8> },
}

/// BLE advertising capability.
pub trait Advertiser: Send {
    /// Start (or restart) advertising the provisioning service.
    fn start_advertising(&mut self) -> Result<(), RadioError>;
}

/// Advertising parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingConfig {
    /// Advertised device name.
    pub name: &'static str,
    /// Answer scan requests. Some phones do not connect without it.
    pub scan_response: bool,
}

impl Default for AdvertisingConfig {
    fn default() -> Self {
        Self {
            name: DEVICE_NAME,
            scan_response: true,
        }
    }
}

/// Device restart capability.
pub trait Restarter: Send {
    /// Restart the device after `grace`.
    ///
    /// Must return immediately; it is called on the BLE callback path.
    fn schedule_restart(&mut self, grace: Duration);
}

/// Advertising state of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Advertising,
    LinkEstablished,
}

/// Provisioning server.
///
/// Handlers run synchronously on the BLE callback path; none of them sleeps.
pub struct ProvisioningServer<M, A, R> {
    state: Arc<SharedState>,
    store: CredentialStore<M>,
    advertiser: A,
    restarter: R,
    restart_grace: Duration,
    server_state: ServerState,
    readable_identifier: String,
    restart_scheduled: bool,
}

impl<M: StorageMedium, A: Advertiser, R: Restarter> ProvisioningServer<M, A, R> {
    pub fn new(
        state: Arc<SharedState>,
        store: CredentialStore<M>,
        advertiser: A,
        restarter: R,
        restart_grace: Duration,
    ) -> Self {
        let readable_identifier = state.credentials().ssid().to_string();
        Self {
            state,
            store,
            advertiser,
            restarter,
            restart_grace,
            server_state: ServerState::Advertising,
            readable_identifier,
            restart_scheduled: false,
        }
    }

    /// Start advertising for the first time.
    pub fn start(&mut self) {
        self.advertise();
        info!("[ble] Provisioning service advertising");
    }

    /// Single entry point for BLE events.
    pub fn handle(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::LinkConnected => self.on_link_connect(),
            RadioEvent::LinkDisconnected => self.on_link_disconnect(),
            RadioEvent::FieldWritten { field, bytes } => self.on_field_written(field, &bytes),
        }
    }

    fn on_link_connect(&mut self) {
        self.state.set_link_connected(true);
        self.server_state = ServerState::LinkEstablished;
        info!("[ble] Client connected");
    }

    fn on_link_disconnect(&mut self) {
        self.state.set_link_connected(false);
        self.server_state = ServerState::Advertising;
        info!("[ble] Client disconnected, advertising again");
        // Not automatic: without this the device is invisible after the first drop
        self.advertise();
    }

    fn on_field_written(&mut self, field: Field, bytes: &[u8]) {
        let decoded = String::from_utf8_lossy(bytes);
        let value = fit_to_slot(&decoded);

        self.state.set_field(field, value);
        match field {
            Field::NetworkId => {
                self.readable_identifier = value.to_string();
                info!("[ble] Changed WiFi network to: {}", value);
            }
            Field::Secret => info!("[ble] Changed WiFi password ({} bytes)", value.len()),
        }

        let persisted = match self.store.write_field(field, value) {
            Ok(()) => true,
            Err(e) => {
                error!("[ble] Failed to persist {}: {}", field, e);
                false
            }
        };

        if field == Field::Secret && self.state.has_network_id() {
            if !persisted {
                warn!("[ble] Credentials not persisted; restart will revert them");
            }
            self.schedule_restart();
        }
    }

    fn schedule_restart(&mut self) {
        if self.restart_scheduled {
            return;
        }
        self.restart_scheduled = true;
        info!(
            "[ble] Credentials complete, restarting in {:?}",
            self.restart_grace
        );
        self.restarter.schedule_restart(self.restart_grace);
    }

    fn advertise(&mut self) {
        if let Err(e) = self.advertiser.start_advertising() {
            error!("[ble] Failed to start advertising: {}", e);
        }
    }

    /// Advertising state.
    pub fn server_state(&self) -> ServerState {
        self.server_state
    }

    /// Value a client reads from the network characteristic.
    pub fn readable_identifier(&self) -> &str {
        &self.readable_identifier
    }

    /// True once a restart has been scheduled.
    pub fn restart_scheduled(&self) -> bool {
        self.restart_scheduled
    }

    pub fn store(&self) -> &CredentialStore<M> {
        &self.store
    }
}

/// Errors reported by the BLE stack.
#[derive(Debug)]
pub enum RadioError {
    /// Advertising could not be configured or started.
    Advertising(String),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advertising(reason) => write!(f, "advertising failed: {}", reason),
        }
    }
}

impl std::error::Error for RadioError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credentials, MAX_FIELD_LEN, STORAGE_CAPACITY};
    use crate::sim::{MemoryMedium, RecordingAdvertiser, RecordingRestarter};

    struct Fixture {
        server: ProvisioningServer<MemoryMedium, RecordingAdvertiser, RecordingRestarter>,
        state: Arc<SharedState>,
        medium: MemoryMedium,
        advertiser: RecordingAdvertiser,
        restarter: RecordingRestarter,
    }

    fn fixture(creds: Credentials) -> Fixture {
        let state = Arc::new(SharedState::with_credentials(creds));
        let medium = MemoryMedium::new(STORAGE_CAPACITY);
        let advertiser = RecordingAdvertiser::new();
        let restarter = RecordingRestarter::new();
        let server = ProvisioningServer::new(
            state.clone(),
            CredentialStore::new(medium.clone()).unwrap(),
            advertiser.clone(),
            restarter.clone(),
            Duration::from_millis(500),
        );
        Fixture {
            server,
            state,
            medium,
            advertiser,
            restarter,
        }
    }

    fn write(field: Field, value: &str) -> RadioEvent {
        RadioEvent::FieldWritten {
            field,
            bytes: value.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_start_advertises() {
        let mut f = fixture(Credentials::empty());
        f.server.start();
        assert_eq!(f.advertiser.count(), 1);
        assert_eq!(f.server.server_state(), ServerState::Advertising);
    }

    #[test]
    fn test_connect_and_disconnect() {
        let mut f = fixture(Credentials::empty());
        f.server.handle(RadioEvent::LinkConnected);
        assert!(f.state.link_connected());
        assert_eq!(f.server.server_state(), ServerState::LinkEstablished);

        f.server.handle(RadioEvent::LinkDisconnected);
        assert!(!f.state.link_connected());
        assert_eq!(f.server.server_state(), ServerState::Advertising);
        assert_eq!(f.advertiser.count(), 1);
    }

    #[test]
    fn test_advertising_failure_is_not_fatal() {
        let mut f = fixture(Credentials::empty());
        f.advertiser.fail(true);
        f.server.handle(RadioEvent::LinkDisconnected);
        assert_eq!(f.server.server_state(), ServerState::Advertising);
    }

    #[test]
    fn test_network_write_updates_state_store_and_readback() {
        let mut f = fixture(Credentials::empty());
        f.server.handle(write(Field::NetworkId, "HomeNet"));

        assert_eq!(f.state.credentials().ssid(), "HomeNet");
        assert_eq!(f.server.readable_identifier(), "HomeNet");
        assert_eq!(f.server.store().load_all().ssid(), "HomeNet");
        assert!(!f.server.restart_scheduled());
    }

    #[test]
    fn test_readback_starts_from_loaded_identifier() {
        let f = fixture(Credentials::new("Saved", "pw"));
        assert_eq!(f.server.readable_identifier(), "Saved");
    }

    #[test]
    fn test_complete_pair_schedules_restart() {
        let mut f = fixture(Credentials::empty());
        f.server.handle(write(Field::NetworkId, "HomeNet"));
        f.server.handle(write(Field::Secret, "s3cr3t"));

        assert!(f.server.restart_scheduled());
        assert_eq!(f.restarter.scheduled(), vec![Duration::from_millis(500)]);
    }

    #[test]
    fn test_secret_without_network_does_not_restart() {
        let mut f = fixture(Credentials::empty());
        f.server.handle(write(Field::Secret, "s3cr3t"));

        assert!(!f.server.restart_scheduled());
        assert_eq!(f.state.credentials().password(), "s3cr3t");
        assert_eq!(f.server.store().load_all().password(), "s3cr3t");
    }

    #[test]
    fn test_restart_scheduled_once() {
        let mut f = fixture(Credentials::empty());
        f.server.handle(write(Field::NetworkId, "HomeNet"));
        f.server.handle(write(Field::Secret, "one"));
        f.server.handle(write(Field::Secret, "two"));
        assert_eq!(f.restarter.scheduled().len(), 1);
    }

    #[test]
    fn test_oversized_write_truncated() {
        let mut f = fixture(Credentials::empty());
        f.server.handle(write(Field::NetworkId, &"n".repeat(200)));
        assert_eq!(f.state.credentials().ssid().len(), MAX_FIELD_LEN);
        assert_eq!(f.server.readable_identifier().len(), MAX_FIELD_LEN);
    }

    #[test]
    fn test_invalid_utf8_decoded_lossily() {
        let mut f = fixture(Credentials::empty());
        f.server.handle(RadioEvent::FieldWritten {
            field: Field::NetworkId,
            bytes: vec![b'N', 0xC3, b'e', b't'],
        });
        assert_eq!(f.state.credentials().ssid(), "N\u{FFFD}et");
    }

    #[test]
    fn test_storage_failure_still_updates_state() {
        let mut f = fixture(Credentials::empty());
        f.medium.fail_commits(true);
        f.server.handle(write(Field::NetworkId, "HomeNet"));
        f.server.handle(write(Field::Secret, "s3cr3t"));

        assert_eq!(f.state.credentials(), Credentials::new("HomeNet", "s3cr3t"));
        assert_eq!(f.server.readable_identifier(), "HomeNet");
        assert!(f.server.restart_scheduled());
        // A restart reverts to the last committed image
        let rebooted = CredentialStore::new(f.medium.reboot()).unwrap();
        assert_eq!(rebooted.load_all(), Credentials::empty());
    }

    #[test]
    fn test_default_advertising_answers_scans() {
        let config = AdvertisingConfig::default();
        assert!(config.scan_response);
        assert_eq!(config.name, "WiFi-Provision");
    }
}
