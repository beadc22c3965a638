//! Shared connectivity state.
//!
//! The single mutable resource touched by more than one task: the provisioning
//! server writes credentials and the BLE link flag, the network manager writes
//! the network flag and reads credentials, the status reporter reads both
//! flags.
//!
//! # Consistency
//!
//! One `Mutex` guards the whole state. Every getter copies what it needs under
//! one critical section and releases the lock before returning, so
//! [`SharedState::snapshot`] and [`SharedState::credentials`] are consistent
//! snapshots and no caller ever observes a half-written credential pair.
//! No lock is held across a sleep or an external call.

use crate::config::{Credentials, Field};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Point-in-time copy of the shared state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Current Wi-Fi credentials (possibly empty).
    pub credentials: Credentials,
    /// A BLE client is attached to the provisioning service.
    pub link_connected: bool,
    /// The station has an active Wi-Fi association.
    pub network_connected: bool,
}

/// Both connectivity flags, read together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkFlags {
    pub link_connected: bool,
    pub network_connected: bool,
}

/// Process-wide connectivity state, shared by handle (`Arc<SharedState>`).
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<StateSnapshot>,
}

impl SharedState {
    /// Fresh state with empty credentials and both flags cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// State seeded with credentials loaded at boot.
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: Mutex::new(StateSnapshot {
                credentials,
                ..StateSnapshot::default()
            }),
        }
    }

    // Writers never leave the state half-updated, so a poisoned lock still
    // guards valid data.
    fn lock(&self) -> MutexGuard<'_, StateSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consistent copy of every field.
    pub fn snapshot(&self) -> StateSnapshot {
        self.lock().clone()
    }

    /// Consistent copy of the credential pair.
    pub fn credentials(&self) -> Credentials {
        self.lock().credentials.clone()
    }

    /// Replace the whole credential pair.
    pub fn set_credentials(&self, credentials: Credentials) {
        self.lock().credentials = credentials;
    }

    /// Replace one credential field.
    pub fn set_field(&self, field: Field, value: &str) {
        self.lock().credentials.set(field, value);
    }

    /// True once a network identifier is present.
    pub fn has_network_id(&self) -> bool {
        self.lock().credentials.is_configured()
    }

    pub fn link_connected(&self) -> bool {
        self.lock().link_connected
    }

    pub fn set_link_connected(&self, connected: bool) {
        self.lock().link_connected = connected;
    }

    pub fn network_connected(&self) -> bool {
        self.lock().network_connected
    }

    pub fn set_network_connected(&self, connected: bool) {
        self.lock().network_connected = connected;
    }

    /// Both flags under one lock.
    pub fn flags(&self) -> LinkFlags {
        let state = self.lock();
        LinkFlags {
            link_connected: state.link_connected,
            network_connected: state.network_connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_state_is_empty() {
        let state = SharedState::new();
        let snap = state.snapshot();
        assert!(!snap.credentials.is_configured());
        assert!(!snap.link_connected);
        assert!(!snap.network_connected);
    }

    #[test]
    fn test_flags_are_independent() {
        let state = SharedState::new();
        state.set_link_connected(true);
        assert_eq!(
            state.flags(),
            LinkFlags {
                link_connected: true,
                network_connected: false
            }
        );

        state.set_link_connected(false);
        state.set_network_connected(true);
        assert_eq!(
            state.flags(),
            LinkFlags {
                link_connected: false,
                network_connected: true
            }
        );
    }

    #[test]
    fn test_set_field_updates_one_field() {
        let state = SharedState::with_credentials(Credentials::new("Old", "oldpass"));
        state.set_field(Field::NetworkId, "HomeNet");
        let creds = state.credentials();
        assert_eq!(creds.ssid(), "HomeNet");
        assert_eq!(creds.password(), "oldpass");
        assert!(state.has_network_id());
    }

    #[test]
    fn test_concurrent_pair_swaps_are_never_torn() {
        let state = Arc::new(SharedState::with_credentials(Credentials::new("a", "a")));

        let writer_state = state.clone();
        let writer = thread::spawn(move || {
            for i in 0..2000 {
                let v = if i % 2 == 0 { "a" } else { "bbbbbbbb" };
                writer_state.set_credentials(Credentials::new(v, v));
            }
        });

        for _ in 0..2000 {
            let creds = state.credentials();
            assert_eq!(creds.ssid(), creds.password());
        }

        writer.join().unwrap();
    }
}
