//! Wi-Fi connection state machine.
//!
//! ```text
//!            creds empty
//!          +-----------+
//!          v           |
//!        Idle ---------+
//!          | creds present
//!          v
//!   +-> Connecting --timeout--> Backoff
//!   |      | connected             |
//!   |      v                       |
//!   +-- Connected      <-----------+ (after penalty, back to Connecting)
//!   link lost
//! ```
//!
//! Failures are never fatal: a failed attempt always leads to a fixed
//! backoff and another attempt, forever. Credentials changed during an
//! attempt are not picked up by that attempt; completing a credential pair
//! restarts the device instead (see [`crate::provisioning`]).

use super::{AttemptOutcome, ConnectionAttempt, LinkStatus, NetworkLink};
use crate::clock::Clock;
use crate::config::Timing;
use crate::state::SharedState;
use log::{debug, info, warn};
use std::sync::Arc;

/// States of the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// No credentials; nothing to connect to.
    Idle,
    /// An attempt is about to run (or just ran).
    Connecting,
    /// Associated; periodically re-confirming.
    Connected,
    /// Waiting out the penalty after a failed attempt.
    Backoff,
}

/// Supervisory loop keeping the station connected.
pub struct NetworkManager<L, C> {
    link: L,
    state: Arc<SharedState>,
    clock: C,
    timing: Timing,
    current: ManagerState,
    attempts: u64,
    address: Option<String>,
}

impl<L: NetworkLink, C: Clock> NetworkManager<L, C> {
    pub fn new(link: L, state: Arc<SharedState>, clock: C, timing: Timing) -> Self {
        Self {
            link,
            state,
            clock,
            timing,
            current: ManagerState::Idle,
            attempts: 0,
            address: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ManagerState {
        self.current
    }

    /// Number of connection attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Station address reported on the last successful connect.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Run the state machine forever.
    pub fn run(&mut self) -> ! {
        info!("[wifi] Network manager started");
        loop {
            self.step();
        }
    }

    /// Perform one transition, including any wait it implies.
    ///
    /// Returns the new state.
    pub fn step(&mut self) -> ManagerState {
        let next = match self.current {
            ManagerState::Idle => self.idle(),
            ManagerState::Connecting => self.connect(),
            ManagerState::Connected => self.confirm(),
            ManagerState::Backoff => self.backoff(),
        };
        if next != self.current {
            debug!("[wifi] {:?} -> {:?}", self.current, next);
        }
        self.current = next;
        next
    }

    fn idle(&mut self) -> ManagerState {
        if !self.state.has_network_id() {
            self.state.set_network_connected(false);
            debug!("[wifi] No credentials, waiting for provisioning");
            self.clock.sleep(self.timing.idle_poll);
            return ManagerState::Idle;
        }
        if self.link.status() == LinkStatus::Connected {
            ManagerState::Connected
        } else {
            ManagerState::Connecting
        }
    }

    fn connect(&mut self) -> ManagerState {
        let credentials = self.state.credentials();
        if !credentials.is_configured() {
            self.state.set_network_connected(false);
            return ManagerState::Idle;
        }

        self.state.set_network_connected(false);
        self.attempts += 1;
        info!(
            "[wifi] Connecting to '{}' (attempt {})",
            credentials.ssid(),
            self.attempts
        );

        let mut attempt = ConnectionAttempt::new(credentials, self.clock.now());
        if let Err(e) = self.link.begin(attempt.credentials()) {
            warn!("[wifi] Failed to start connection: {}", e);
            attempt.time_out();
            return ManagerState::Backoff;
        }

        // Bounded poll; begin() is not trusted to time out on its own
        loop {
            if self.link.status() == LinkStatus::Connected {
                attempt.succeed();
                break;
            }
            if attempt.is_expired(self.clock.now(), self.timing.connect_timeout) {
                attempt.time_out();
                break;
            }
            self.clock.sleep(self.timing.connect_poll);
        }

        match attempt.outcome() {
            AttemptOutcome::Succeeded => {
                self.state.set_network_connected(true);
                self.address = self.link.ip();
                info!(
                    "[wifi] Connected to '{}' after {:?}, address {}",
                    attempt.credentials().ssid(),
                    attempt.elapsed(self.clock.now()),
                    self.address.as_deref().unwrap_or("unknown")
                );
                ManagerState::Connected
            }
            _ => {
                warn!(
                    "[wifi] Failed to connect to '{}' within {:?}",
                    attempt.credentials().ssid(),
                    self.timing.connect_timeout
                );
                ManagerState::Backoff
            }
        }
    }

    fn confirm(&mut self) -> ManagerState {
        if self.link.status() == LinkStatus::Connected {
            self.state.set_network_connected(true);
            debug!("[wifi] Still connected");
            self.clock.sleep(self.timing.connected_poll);
            return ManagerState::Connected;
        }
        warn!("[wifi] Connection lost, reconnecting");
        self.state.set_network_connected(false);
        self.address = None;
        ManagerState::Connecting
    }

    fn backoff(&mut self) -> ManagerState {
        debug!("[wifi] Backing off for {:?}", self.timing.backoff);
        self.clock.sleep(self.timing.backoff);
        ManagerState::Connecting
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::sim::{ManualClock, SimNetwork, SIM_STATION_IP};
    use std::time::Duration;

    fn manager(
        creds: Credentials,
        network: &SimNetwork,
        clock: &ManualClock,
    ) -> (NetworkManager<SimNetwork, ManualClock>, Arc<SharedState>) {
        let state = Arc::new(SharedState::with_credentials(creds));
        let manager = NetworkManager::new(
            network.clone(),
            state.clone(),
            clock.clone(),
            Timing::default(),
        );
        (manager, state)
    }

    #[test]
    fn test_idle_without_credentials_never_attempts() {
        let clock = ManualClock::new();
        let network = SimNetwork::new(clock.clone());
        let (mut manager, state) = manager(Credentials::empty(), &network, &clock);

        for _ in 0..50 {
            assert_eq!(manager.step(), ManagerState::Idle);
        }
        assert_eq!(network.begin_count(), 0);
        assert_eq!(manager.attempts(), 0);
        assert!(!state.network_connected());
        assert_eq!(clock.now(), Duration::from_secs(30 * 50));
    }

    #[test]
    fn test_leaves_idle_once_credentials_arrive() {
        let clock = ManualClock::new();
        let network = SimNetwork::new(clock.clone());
        let (mut manager, state) = manager(Credentials::empty(), &network, &clock);

        assert_eq!(manager.step(), ManagerState::Idle);
        state.set_credentials(Credentials::new("HomeNet", "s3cr3t"));
        assert_eq!(manager.step(), ManagerState::Connecting);
        assert_eq!(manager.step(), ManagerState::Connected);
        assert_eq!(network.begin_count(), 1);
    }

    #[test]
    fn test_successful_connect() {
        let clock = ManualClock::new();
        let network = SimNetwork::new(clock.clone());
        network.set_latency(Duration::from_secs(2));
        let (mut manager, state) = manager(Credentials::new("HomeNet", "s3cr3t"), &network, &clock);

        assert_eq!(manager.step(), ManagerState::Connecting);
        assert_eq!(manager.step(), ManagerState::Connected);
        assert!(state.network_connected());
        assert_eq!(network.last_ssid().as_deref(), Some("HomeNet"));
        // Detected at the first poll after the latency elapsed
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[test]
    fn test_connect_records_station_address() {
        let clock = ManualClock::new();
        let network = SimNetwork::new(clock.clone());
        let (mut manager, _state) = manager(Credentials::new("HomeNet", "pw"), &network, &clock);
        assert_eq!(manager.address(), None);

        manager.step();
        assert_eq!(manager.step(), ManagerState::Connected);
        assert_eq!(manager.address(), Some(SIM_STATION_IP));
        assert_eq!(network.ip_queries(), 1);

        network.drop_connection();
        assert_eq!(manager.step(), ManagerState::Connecting);
        assert_eq!(manager.address(), None);
    }

    #[test]
    fn test_timeout_backs_off_and_retries_forever() {
        let clock = ManualClock::new();
        let network = SimNetwork::new(clock.clone());
        network.set_reachable(false);
        let (mut manager, state) = manager(Credentials::new("HomeNet", "wrong"), &network, &clock);

        assert_eq!(manager.step(), ManagerState::Connecting);
        for cycle in 1..=25u64 {
            let started = clock.now();
            assert_eq!(manager.step(), ManagerState::Backoff);
            assert_eq!(clock.now() - started, Duration::from_secs(10));
            assert!(!state.network_connected());

            let started = clock.now();
            assert_eq!(manager.step(), ManagerState::Connecting);
            assert_eq!(clock.now() - started, Duration::from_secs(20));
            assert_eq!(manager.attempts(), cycle);
        }
        assert_eq!(network.begin_count(), 25);
    }

    #[test]
    fn test_begin_error_backs_off() {
        let clock = ManualClock::new();
        let network = SimNetwork::new(clock.clone());
        network.fail_begin(true);
        let (mut manager, _state) = manager(Credentials::new("HomeNet", "pw"), &network, &clock);

        manager.step();
        assert_eq!(manager.step(), ManagerState::Backoff);
        assert_eq!(clock.now(), Duration::ZERO);
    }

    #[test]
    fn test_connected_polls_at_long_interval() {
        let clock = ManualClock::new();
        let network = SimNetwork::new(clock.clone());
        let (mut manager, _state) = manager(Credentials::new("HomeNet", "pw"), &network, &clock);

        manager.step();
        manager.step();
        let started = clock.now();
        assert_eq!(manager.step(), ManagerState::Connected);
        assert_eq!(clock.now() - started, Duration::from_secs(10));
        assert_eq!(network.begin_count(), 1);
    }

    #[test]
    fn test_connection_loss_reconnects_immediately() {
        let clock = ManualClock::new();
        let network = SimNetwork::new(clock.clone());
        let (mut manager, state) = manager(Credentials::new("HomeNet", "pw"), &network, &clock);

        manager.step();
        assert_eq!(manager.step(), ManagerState::Connected);
        assert!(state.network_connected());

        network.drop_connection();
        let before = clock.now();
        assert_eq!(manager.step(), ManagerState::Connecting);
        assert_eq!(clock.now(), before);
        assert!(!state.network_connected());

        assert_eq!(manager.step(), ManagerState::Connected);
        assert_eq!(network.begin_count(), 2);
    }

    #[test]
    fn test_already_connected_skips_attempt() {
        let clock = ManualClock::new();
        let network = SimNetwork::new(clock.clone());
        network.force_connected();
        let (mut manager, _state) = manager(Credentials::new("HomeNet", "pw"), &network, &clock);

        assert_eq!(manager.step(), ManagerState::Connected);
        assert_eq!(network.begin_count(), 0);
    }
}
