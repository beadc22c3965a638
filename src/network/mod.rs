//! Wi-Fi network management.
//!
//! This module provides the platform-independent connection state machine and
//! the capability it drives:
//! - **ESP32** (`esp32` feature): [`EspWifiLink`] on top of ESP-IDF Wi-Fi
//! - **Host**: [`crate::sim::SimNetwork`], a scripted stand-in
//!
//! # Example
//!
//! ```ignore
//! use wifi_provision_esp32::network::NetworkManager;
//!
//! let mut manager = NetworkManager::new(link, state, SystemClock::new(), Timing::default());
//! manager.run(); // never returns
//! ```

mod manager;
#[cfg(feature = "esp32")]
mod wifi;

use crate::config::Credentials;
use std::fmt;
use std::time::Duration;

pub use manager::{ManagerState, NetworkManager};
#[cfg(feature = "esp32")]
pub use wifi::EspWifiLink;

/// Association state reported by the Wi-Fi stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Wi-Fi station capability.
///
/// `begin` only starts an association; it must return without waiting for
/// the outcome. The manager polls [`status`](NetworkLink::status) and
/// enforces its own timeout.
pub trait NetworkLink: Send {
    /// Start associating with the given network.
    fn begin(&mut self, credentials: &Credentials) -> Result<(), LinkError>;

    /// Current association state.
    fn status(&self) -> LinkStatus;

    /// Address assigned to the station, if known.
    fn ip(&self) -> Option<String> {
        None
    }
}

/// Outcome of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Succeeded,
    TimedOut,
}

/// One connection cycle of the network manager. Never persisted.
#[derive(Debug, Clone)]
pub struct ConnectionAttempt {
    credentials: Credentials,
    started_at: Duration,
    outcome: AttemptOutcome,
}

impl ConnectionAttempt {
    /// Start an attempt at clock time `started_at`.
    pub fn new(credentials: Credentials, started_at: Duration) -> Self {
        Self {
            credentials,
            started_at,
            outcome: AttemptOutcome::Pending,
        }
    }

    /// Credentials this attempt targets.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn outcome(&self) -> AttemptOutcome {
        self.outcome
    }

    /// Time spent on this attempt as of `now`.
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started_at)
    }

    /// Returns true if the attempt has run for `timeout` or longer.
    pub fn is_expired(&self, now: Duration, timeout: Duration) -> bool {
        self.elapsed(now) >= timeout
    }

    pub fn succeed(&mut self) {
        self.outcome = AttemptOutcome::Succeeded;
    }

    pub fn time_out(&mut self) {
        self.outcome = AttemptOutcome::TimedOut;
    }
}

/// Errors that can occur when starting an association.
#[derive(Debug)]
pub enum LinkError {
    /// SSID rejected by the Wi-Fi stack.
    InvalidSsid,
    /// Password rejected by the Wi-Fi stack.
    InvalidPassword,
    /// Wi-Fi stack not available.
    Unavailable(String),
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::Unavailable(reason) => write!(f, "Wi-Fi unavailable: {}", reason),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for LinkError {}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for LinkError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_attempt_is_pending() {
        let attempt = ConnectionAttempt::new(Credentials::new("HomeNet", "pw"), Duration::ZERO);
        assert_eq!(attempt.outcome(), AttemptOutcome::Pending);
        assert_eq!(attempt.credentials().ssid(), "HomeNet");
    }

    #[test]
    fn test_attempt_expiry() {
        let attempt = ConnectionAttempt::new(Credentials::empty(), Duration::from_secs(5));
        let timeout = Duration::from_secs(10);
        assert!(!attempt.is_expired(Duration::from_secs(14), timeout));
        assert!(attempt.is_expired(Duration::from_secs(15), timeout));
        // Clock earlier than the start never underflows
        assert_eq!(attempt.elapsed(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_attempt_outcomes() {
        let mut attempt = ConnectionAttempt::new(Credentials::empty(), Duration::ZERO);
        attempt.succeed();
        assert_eq!(attempt.outcome(), AttemptOutcome::Succeeded);
        attempt.time_out();
        assert_eq!(attempt.outcome(), AttemptOutcome::TimedOut);
    }

    #[test]
    fn test_link_error_display() {
        assert_eq!(LinkError::InvalidSsid.to_string(), "invalid SSID");
        assert_eq!(
            LinkError::Unavailable("radio off".into()).to_string(),
            "Wi-Fi unavailable: radio off"
        );
    }
}
