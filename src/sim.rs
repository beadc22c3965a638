//! Simulated collaborators for host runs and tests.
//!
//! Every type here is a cheap handle (`Clone` shares the underlying state), so
//! a test can hand one clone to a component and inspect or script the other.
//!
//! - [`ManualClock`] - virtual time; `sleep` advances it instantly
//! - [`MemoryMedium`] - RAM storage image with commit and power-cycle model
//! - [`SimNetwork`] - Wi-Fi station with configurable latency and reachability
//! - [`RecordingAdvertiser`], [`RecordingRestarter`], [`RecordingIndicator`]

use crate::clock::Clock;
use crate::config::Credentials;
use crate::network::{LinkError, LinkStatus, NetworkLink};
use crate::provisioning::{Advertiser, RadioError, Restarter};
use crate::status::{Indicator, IndicatorResult};
use crate::storage::{check_bounds, StorageError, StorageMedium};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Virtual clock. `sleep` returns immediately after advancing time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward without sleeping.
    pub fn advance(&self, duration: Duration) {
        *lock(&self.now) += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *lock(&self.now)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

#[derive(Debug)]
struct MediumInner {
    pending: Vec<u8>,
    committed: Vec<u8>,
    commits: usize,
}

/// RAM storage image.
///
/// Writes land in a pending image; `commit` copies it to the committed
/// image. [`reboot`](MemoryMedium::reboot) throws away uncommitted writes,
/// like a power cycle.
#[derive(Debug, Clone)]
pub struct MemoryMedium {
    inner: Arc<Mutex<MediumInner>>,
    fail_reads: Arc<AtomicBool>,
    fail_commits: Arc<AtomicBool>,
}

impl MemoryMedium {
    /// Zero-filled image.
    pub fn new(capacity: usize) -> Self {
        Self::filled(capacity, 0)
    }

    /// Image of erased flash (all 0xFF).
    pub fn erased(capacity: usize) -> Self {
        Self::filled(capacity, 0xFF)
    }

    fn filled(capacity: usize, byte: u8) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MediumInner {
                pending: vec![byte; capacity],
                committed: vec![byte; capacity],
                commits: 0,
            })),
            fail_reads: Arc::new(AtomicBool::new(false)),
            fail_commits: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every read fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every commit fail.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Number of successful commits.
    pub fn commit_count(&self) -> usize {
        lock(&self.inner).commits
    }

    /// Drop uncommitted writes and return a handle to the same image.
    pub fn reboot(&self) -> Self {
        {
            let mut inner = lock(&self.inner);
            inner.pending = inner.committed.clone();
        }
        self.clone()
    }
}

impl StorageMedium for MemoryMedium {
    fn capacity(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StorageError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated read failure").into());
        }
        let inner = lock(&self.inner);
        check_bounds(offset, buf.len(), inner.pending.len())?;
        buf.copy_from_slice(&inner.pending[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), StorageError> {
        let mut inner = lock(&self.inner);
        check_bounds(offset, data.len(), inner.pending.len())?;
        inner.pending[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "simulated commit failure").into());
        }
        let mut inner = lock(&self.inner);
        inner.committed = inner.pending.clone();
        inner.commits += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct NetworkInner {
    status: LinkStatus,
    connect_at: Option<Duration>,
    latency: Duration,
    reachable: bool,
    accepted: Option<Credentials>,
    fail_begin: bool,
    begun: Vec<String>,
    ip_queries: usize,
}

/// Address [`SimNetwork`] reports while associated.
pub const SIM_STATION_IP: &str = "192.168.4.2";

/// Scripted Wi-Fi station.
///
/// `begin` moves to `Connecting`; the station reports `Connected` once the
/// configured latency has passed on the clock, provided the network is
/// reachable and the credentials are accepted.
#[derive(Clone)]
pub struct SimNetwork {
    inner: Arc<Mutex<NetworkInner>>,
    clock: Arc<dyn Clock + Sync>,
}

impl SimNetwork {
    /// Reachable network, zero latency, any credentials accepted.
    pub fn new(clock: impl Clock + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(NetworkInner {
                status: LinkStatus::Disconnected,
                connect_at: None,
                latency: Duration::ZERO,
                reachable: true,
                accepted: None,
                fail_begin: false,
                begun: Vec::new(),
                ip_queries: 0,
            })),
            clock: Arc::new(clock),
        }
    }

    /// Time between `begin` and a successful association.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.inner).latency = latency;
    }

    /// An unreachable network never associates.
    pub fn set_reachable(&self, reachable: bool) {
        lock(&self.inner).reachable = reachable;
    }

    /// Only associate with exactly these credentials.
    pub fn accept_only(&self, credentials: Credentials) {
        lock(&self.inner).accepted = Some(credentials);
    }

    /// Make `begin` return an error.
    pub fn fail_begin(&self, fail: bool) {
        lock(&self.inner).fail_begin = fail;
    }

    /// Report connected without any attempt.
    pub fn force_connected(&self) {
        let mut inner = lock(&self.inner);
        inner.status = LinkStatus::Connected;
        inner.connect_at = None;
    }

    /// Simulate the access point going away.
    pub fn drop_connection(&self) {
        let mut inner = lock(&self.inner);
        inner.status = LinkStatus::Disconnected;
        inner.connect_at = None;
    }

    /// Number of `begin` calls.
    pub fn begin_count(&self) -> usize {
        lock(&self.inner).begun.len()
    }

    /// Number of address lookups.
    pub fn ip_queries(&self) -> usize {
        lock(&self.inner).ip_queries
    }

    /// SSID of the most recent `begin`.
    pub fn last_ssid(&self) -> Option<String> {
        lock(&self.inner).begun.last().cloned()
    }
}

impl NetworkLink for SimNetwork {
    fn begin(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        let now = self.clock.now();
        let mut inner = lock(&self.inner);
        if inner.fail_begin {
            return Err(LinkError::Unavailable("simulated failure".into()));
        }
        inner.begun.push(credentials.ssid().to_string());

        let accepted = match &inner.accepted {
            Some(expected) => expected == credentials,
            None => true,
        };
        inner.status = LinkStatus::Connecting;
        inner.connect_at = if inner.reachable && accepted {
            Some(now + inner.latency)
        } else {
            None
        };
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        let now = self.clock.now();
        let mut inner = lock(&self.inner);
        if let Some(at) = inner.connect_at {
            if now >= at {
                inner.status = LinkStatus::Connected;
                inner.connect_at = None;
            }
        }
        inner.status
    }

    fn ip(&self) -> Option<String> {
        let mut inner = lock(&self.inner);
        inner.ip_queries += 1;
        (inner.status == LinkStatus::Connected).then(|| SIM_STATION_IP.to_string())
    }
}

/// Counts advertising starts.
#[derive(Debug, Clone, Default)]
pub struct RecordingAdvertiser {
    count: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl RecordingAdvertiser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful advertising starts.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Advertiser for RecordingAdvertiser {
    fn start_advertising(&mut self) -> Result<(), RadioError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RadioError::Advertising("simulated failure".into()));
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Records restart requests instead of restarting.
#[derive(Debug, Clone, Default)]
pub struct RecordingRestarter {
    scheduled: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingRestarter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grace periods of every restart requested so far.
    pub fn scheduled(&self) -> Vec<Duration> {
        lock(&self.scheduled).clone()
    }
}

impl Restarter for RecordingRestarter {
    fn schedule_restart(&mut self, grace: Duration) {
        lock(&self.scheduled).push(grace);
    }
}

/// Records every level written to it.
#[derive(Debug, Clone, Default)]
pub struct RecordingIndicator {
    levels: Arc<Mutex<Vec<bool>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        lock(&self.levels).clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Indicator for RecordingIndicator {
    fn set(&mut self, on: bool) -> IndicatorResult {
        if self.fail.load(Ordering::SeqCst) {
            return Err("simulated indicator failure".into());
        }
        lock(&self.levels).push(on);
        Ok(())
    }
}
