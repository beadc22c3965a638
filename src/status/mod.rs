//! Status indicator.
//!
//! Translates the connectivity flags into one of three patterns on a single
//! output (an LED on the board, a log line on the host):
//!
//! | network | BLE link | pattern      |
//! |---------|----------|--------------|
//! | yes     | any      | steady on    |
//! | no      | yes      | fast pulse   |
//! | no      | no       | slow pulse   |

#[cfg(feature = "esp32")]
mod led;

use crate::clock::Clock;
use crate::config::Timing;
use crate::state::{LinkFlags, SharedState};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "esp32")]
pub use led::LedIndicator;

/// Result of driving an indicator.
pub type IndicatorResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A single on/off output.
pub trait Indicator: Send {
    fn set(&mut self, on: bool) -> IndicatorResult;
}

/// Observable indicator pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPattern {
    /// Nothing connected.
    SlowPulse,
    /// A BLE client is attached, no Wi-Fi yet.
    FastPulse,
    /// Wi-Fi connected.
    SteadyOn,
}

impl StatusPattern {
    /// Pattern for the given flags.
    pub fn from_flags(flags: LinkFlags) -> Self {
        if flags.network_connected {
            Self::SteadyOn
        } else if flags.link_connected {
            Self::FastPulse
        } else {
            Self::SlowPulse
        }
    }
}

/// Periodic, read-only consumer of the shared state.
pub struct StatusReporter<I, C> {
    indicator: I,
    state: Arc<SharedState>,
    clock: C,
    timing: Timing,
    pattern: Option<StatusPattern>,
    level: bool,
    last_log: Option<Duration>,
}

impl<I: Indicator, C: Clock> StatusReporter<I, C> {
    pub fn new(indicator: I, state: Arc<SharedState>, clock: C, timing: Timing) -> Self {
        Self {
            indicator,
            state,
            clock,
            timing,
            pattern: None,
            level: false,
            last_log: None,
        }
    }

    /// Pattern shown by the last tick.
    pub fn pattern(&self) -> Option<StatusPattern> {
        self.pattern
    }

    /// Run forever.
    pub fn run(&mut self) -> ! {
        loop {
            let wait = self.tick();
            self.clock.sleep(wait);
        }
    }

    /// Drive the indicator once and return how long to wait before the next
    /// tick.
    pub fn tick(&mut self) -> Duration {
        let flags = self.state.flags();
        let pattern = StatusPattern::from_flags(flags);

        if self.pattern != Some(pattern) {
            info!("[status] {:?}", pattern);
            self.pattern = Some(pattern);
            // Pulses restart from the lit half
            self.level = false;
        }
        self.log_periodically(flags);

        let (level, wait) = match pattern {
            StatusPattern::SteadyOn => (true, self.timing.steady_poll),
            StatusPattern::FastPulse => (!self.level, self.timing.fast_pulse),
            StatusPattern::SlowPulse => (!self.level, self.timing.slow_pulse),
        };
        self.level = level;
        if let Err(e) = self.indicator.set(level) {
            debug!("[status] Indicator error: {}", e);
        }
        wait
    }

    fn log_periodically(&mut self, flags: LinkFlags) {
        let now = self.clock.now();
        let due = match self.last_log {
            Some(last) => now.saturating_sub(last) >= self.timing.status_log,
            None => true,
        };
        if !due {
            return;
        }
        self.last_log = Some(now);
        if flags.link_connected {
            info!("[ble] Connected");
        } else {
            info!("[ble] Disconnected");
        }
    }
}

/// Host indicator: logs level changes.
#[derive(Debug, Default)]
pub struct LogIndicator {
    level: Option<bool>,
}

impl LogIndicator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) -> IndicatorResult {
        if self.level != Some(on) {
            debug!("[status] LED {}", if on { "on" } else { "off" });
            self.level = Some(on);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualClock, RecordingIndicator};

    fn reporter(
        state: &Arc<SharedState>,
        indicator: &RecordingIndicator,
        clock: &ManualClock,
    ) -> StatusReporter<RecordingIndicator, ManualClock> {
        StatusReporter::new(
            indicator.clone(),
            state.clone(),
            clock.clone(),
            Timing::default(),
        )
    }

    #[test]
    fn test_pattern_mapping() {
        let flags = |link_connected, network_connected| LinkFlags {
            link_connected,
            network_connected,
        };
        assert_eq!(StatusPattern::from_flags(flags(false, false)), StatusPattern::SlowPulse);
        assert_eq!(StatusPattern::from_flags(flags(true, false)), StatusPattern::FastPulse);
        assert_eq!(StatusPattern::from_flags(flags(false, true)), StatusPattern::SteadyOn);
        assert_eq!(StatusPattern::from_flags(flags(true, true)), StatusPattern::SteadyOn);
    }

    #[test]
    fn test_slow_pulse_toggles() {
        let state = Arc::new(SharedState::new());
        let indicator = RecordingIndicator::new();
        let clock = ManualClock::new();
        let mut reporter = reporter(&state, &indicator, &clock);

        let waits: Vec<_> = (0..4).map(|_| reporter.tick()).collect();
        assert_eq!(waits, vec![Duration::from_millis(1000); 4]);
        assert_eq!(indicator.levels(), vec![true, false, true, false]);
        assert_eq!(reporter.pattern(), Some(StatusPattern::SlowPulse));
    }

    #[test]
    fn test_fast_pulse_when_link_connected() {
        let state = Arc::new(SharedState::new());
        state.set_link_connected(true);
        let indicator = RecordingIndicator::new();
        let clock = ManualClock::new();
        let mut reporter = reporter(&state, &indicator, &clock);

        assert_eq!(reporter.tick(), Duration::from_millis(100));
        assert_eq!(reporter.tick(), Duration::from_millis(100));
        assert_eq!(indicator.levels(), vec![true, false]);
        assert_eq!(reporter.pattern(), Some(StatusPattern::FastPulse));
    }

    #[test]
    fn test_steady_on_when_network_connected() {
        let state = Arc::new(SharedState::new());
        state.set_network_connected(true);
        let indicator = RecordingIndicator::new();
        let clock = ManualClock::new();
        let mut reporter = reporter(&state, &indicator, &clock);

        for _ in 0..3 {
            assert_eq!(reporter.tick(), Duration::from_millis(250));
        }
        assert_eq!(indicator.levels(), vec![true, true, true]);
    }

    #[test]
    fn test_pattern_follows_state_changes() {
        let state = Arc::new(SharedState::new());
        let indicator = RecordingIndicator::new();
        let clock = ManualClock::new();
        let mut reporter = reporter(&state, &indicator, &clock);

        reporter.tick();
        assert_eq!(reporter.pattern(), Some(StatusPattern::SlowPulse));
        state.set_link_connected(true);
        reporter.tick();
        assert_eq!(reporter.pattern(), Some(StatusPattern::FastPulse));
        state.set_network_connected(true);
        reporter.tick();
        assert_eq!(reporter.pattern(), Some(StatusPattern::SteadyOn));
        state.set_network_connected(false);
        state.set_link_connected(false);
        reporter.tick();
        assert_eq!(reporter.pattern(), Some(StatusPattern::SlowPulse));
        // New pattern starts lit
        assert_eq!(indicator.levels().last(), Some(&true));
    }

    #[test]
    fn test_indicator_error_is_ignored() {
        let state = Arc::new(SharedState::new());
        let indicator = RecordingIndicator::new();
        indicator.fail(true);
        let clock = ManualClock::new();
        let mut reporter = reporter(&state, &indicator, &clock);
        assert_eq!(reporter.tick(), Duration::from_millis(1000));
    }
}
