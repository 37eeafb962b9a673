// Post-action cooldown

use super::PluginRet;
use crate::clock::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Longest single sleep while waiting out a cooldown, so shutdown stays responsive
const WAIT_SLICE: Duration = Duration::from_secs(1);

/// Longest deadline the gate arms (~136 years); longer delays saturate here
const MAX_COOLDOWN: Duration = Duration::from_secs(u32::MAX as u64);

/// Maps the outcome of a kill attempt to the signal for the plugin chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    delay: Duration,
}

impl Cooldown {
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub const fn after_attempt(&self, killed: bool) -> PluginRet {
        if killed {
            PluginRet::Stop {
                cooldown: self.delay,
            }
        } else {
            PluginRet::Continue
        }
    }
}

/// Deadline before which no new evaluation cycle may start
#[derive(Debug, Clone, Copy, Default)]
pub struct CooldownGate {
    until: Option<Instant>,
}

impl CooldownGate {
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        let Some(until) = now.checked_add(delay.min(MAX_COOLDOWN)) else {
            log::warn!("Cooldown of {}s is not representable, ignoring", delay.as_secs());
            return;
        };
        // Never shorten an already running cooldown
        if self.until.map_or(true, |current| until > current) {
            self.until = Some(until);
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
    }

    pub fn is_active(&self, now: Instant) -> bool {
        !self.remaining(now).is_zero()
    }

    /// Block until the gate opens or `running` is cleared.
    /// Returns true if the full cooldown elapsed.
    pub fn wait(&mut self, clock: &dyn Clock, running: &AtomicBool) -> bool {
        loop {
            let remaining = self.remaining(clock.now());
            if remaining.is_zero() {
                self.until = None;
                return true;
            }
            if !running.load(Ordering::SeqCst) {
                return false;
            }
            clock.sleep(remaining.min(WAIT_SLICE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn test_after_attempt() {
        let cooldown = Cooldown::new(Duration::from_secs(5));
        assert_eq!(
            cooldown.after_attempt(true),
            PluginRet::Stop {
                cooldown: Duration::from_secs(5)
            }
        );
        assert_eq!(cooldown.after_attempt(false), PluginRet::Continue);
    }

    #[test]
    fn test_gate_wait_runs_to_completion() {
        let clock = ManualClock::new();
        let running = AtomicBool::new(true);
        let mut gate = CooldownGate::default();
        assert!(!gate.is_active(clock.now()));

        gate.arm(clock.now(), Duration::from_millis(5500));
        assert!(gate.is_active(clock.now()));
        assert!(gate.wait(&clock, &running));
        assert_eq!(clock.elapsed(), Duration::from_millis(5500));
        assert!(!gate.is_active(clock.now()));
    }

    #[test]
    fn test_gate_wait_interrupted_by_shutdown() {
        let clock = ManualClock::new();
        let running = AtomicBool::new(false);
        let mut gate = CooldownGate::default();

        gate.arm(clock.now(), Duration::from_secs(30));
        assert!(!gate.wait(&clock, &running));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_arm_never_shortens() {
        let clock = ManualClock::new();
        let mut gate = CooldownGate::default();
        gate.arm(clock.now(), Duration::from_secs(10));
        gate.arm(clock.now(), Duration::from_secs(2));
        assert_eq!(gate.remaining(clock.now()), Duration::from_secs(10));
    }

    #[test]
    fn test_huge_delay_saturates() {
        let clock = ManualClock::new();
        let mut gate = CooldownGate::default();
        gate.arm(clock.now(), Duration::from_secs(i64::MAX as u64));
        assert_eq!(gate.remaining(clock.now()), MAX_COOLDOWN);

        gate.arm(clock.now(), Duration::MAX);
        assert_eq!(gate.remaining(clock.now()), MAX_COOLDOWN);
    }

    #[test]
    fn test_zero_delay_gate_is_open() {
        let clock = ManualClock::new();
        let running = AtomicBool::new(true);
        let mut gate = CooldownGate::default();
        gate.arm(clock.now(), Duration::ZERO);
        assert!(!gate.is_active(clock.now()));
        assert!(gate.wait(&clock, &running));
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
