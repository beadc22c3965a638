//! BLE Wi-Fi provisioning agent for ESP32.
//!
//! An unconfigured device accepts Wi-Fi credentials over a BLE GATT service,
//! keeps them in non-volatile storage and maintains the Wi-Fi connection on
//! its own from then on.
//!
//! This library contains the platform-independent core, which can be tested
//! on the host machine without ESP32 hardware. ESP-IDF adapters are compiled
//! with the `esp32` feature.

pub mod agent;
pub mod clock;
pub mod config;
pub mod console;
pub mod network;
pub mod provisioning;
pub mod sim;
pub mod state;
pub mod status;
pub mod storage;

// Re-export commonly used items
pub use clock::{Clock, SystemClock};
pub use config::{Credentials, Field, Timing};
pub use network::{LinkStatus, ManagerState, NetworkLink, NetworkManager};
pub use provisioning::{ProvisioningServer, RadioEvent};
pub use state::{SharedState, StateSnapshot};
pub use status::{StatusPattern, StatusReporter};
pub use storage::{CredentialStore, StorageError, StorageMedium};
