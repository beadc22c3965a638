//! Provisioning agent configuration.
//!
//! This module holds the storage layout constants, the timing policy of the
//! long-running tasks and the credential types shared by every component.
//!
//! # Components
//!
//! - [`credentials`] - Wi-Fi credentials and the two provisionable fields
//!
//! Everything here is platform-independent and host-testable.

mod credentials;

use std::time::Duration;

pub use credentials::{fit_to_slot, Credentials, Field};

/// Width in bytes of one storage slot, terminator included.
pub const SLOT_WIDTH: usize = 50;

/// Longest text a slot can hold.
pub const MAX_FIELD_LEN: usize = SLOT_WIDTH - 1;

/// Size of the emulated EEPROM image.
///
/// Only the first `2 * SLOT_WIDTH` bytes are used; the rest is reserved so
/// images written by earlier firmware keep their size.
pub const STORAGE_CAPACITY: usize = 300;

/// Name advertised over BLE.
pub const DEVICE_NAME: &str = "WiFi-Provision";

/// Timing policy for the network manager, status reporter and restart path.
///
/// The defaults are the production values. Tests build tighter timings with
/// struct update syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Re-check interval while no credentials are configured.
    pub idle_poll: Duration,
    /// Status poll interval during a connection attempt.
    pub connect_poll: Duration,
    /// How long a single connection attempt may take.
    pub connect_timeout: Duration,
    /// Re-confirm interval while connected.
    pub connected_poll: Duration,
    /// Penalty wait after a failed attempt.
    pub backoff: Duration,
    /// Delay between a completed credential pair and the device restart.
    pub restart_grace: Duration,
    /// Half period of the slow pulse (nothing connected).
    pub slow_pulse: Duration,
    /// Half period of the fast pulse (BLE client attached).
    pub fast_pulse: Duration,
    /// Re-check interval while the indicator is steady on.
    pub steady_poll: Duration,
    /// Interval of the periodic status log line.
    pub status_log: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            idle_poll: Duration::from_secs(30),
            connect_poll: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(10),
            connected_poll: Duration::from_secs(10),
            backoff: Duration::from_secs(20),
            restart_grace: Duration::from_millis(500),
            slow_pulse: Duration::from_millis(1000),
            fast_pulse: Duration::from_millis(100),
            steady_poll: Duration::from_millis(250),
            status_log: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_fits_capacity() {
        assert!(2 * SLOT_WIDTH <= STORAGE_CAPACITY);
        assert_eq!(MAX_FIELD_LEN, 49);
    }

    #[test]
    fn test_default_timing() {
        let timing = Timing::default();
        assert_eq!(timing.idle_poll, Duration::from_secs(30));
        assert_eq!(timing.connect_timeout, Duration::from_secs(10));
        assert_eq!(timing.backoff, Duration::from_secs(20));
        assert!(timing.connect_poll < timing.connect_timeout);
        assert!(timing.fast_pulse < timing.slow_pulse);
    }
}
