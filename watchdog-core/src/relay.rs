//! Relay arbitration.
//!
//! Two manual sources can hold the relay on. They are OR-combined, and an
//! active alarm overrides both. Every mutation finishes by deriving the
//! physical output from the bookkeeping. [`RelayArbiter::is_on`] reports the
//! last level the pin accepted; a rejected write is retried by the next
//! mutation.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Source {
    Button,
    Remote,
}

impl Source {
    const fn bit(self) -> u8 {
        match self {
            Source::Button => 0b01,
            Source::Remote => 0b10,
        }
    }
}

/// Set of sources currently asking for the relay to be on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Holders(u8);

impl Holders {
    pub const NONE: Holders = Holders(0);

    pub const fn contains(self, source: Source) -> bool {
        self.0 & source.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn insert(&mut self, source: Source) {
        self.0 |= source.bit();
    }

    fn remove(&mut self, source: Source) {
        self.0 &= !source.bit();
    }
}

pub struct RelayArbiter<P: OutputPin> {
    pin: P,
    physical: bool,
    held_by: Holders,
    suppressed: bool,
    button_on_since: Option<Instant>,
    remote_on_since: Option<Instant>,
    button_hold: Duration,
    remote_hold: Duration,
}

impl<P: OutputPin> RelayArbiter<P> {
    /// Takes the relay pin and drives it low.
    pub fn new(mut pin: P, button_hold: Duration, remote_hold: Duration) -> Self {
        // Level unknown if the write failed, so treat it as on until one succeeds
        let physical = pin.set_low().is_err();
        Self {
            pin,
            physical,
            held_by: Holders::NONE,
            suppressed: false,
            button_on_since: None,
            remote_on_since: None,
            button_hold,
            remote_hold,
        }
    }

    /// Record a source's request. Returns whether the physical relay changed.
    ///
    /// While suppressed an "on" is recorded with its hold timer but does not
    /// energise the relay. Asserting "on" again restarts the hold timer.
    pub fn assert(&mut self, source: Source, on: bool, now: Instant) -> bool {
        if on {
            self.held_by.insert(source);
            *self.since_mut(source) = Some(now);
        } else {
            self.held_by.remove(source);
            *self.since_mut(source) = None;
        }
        self.apply()
    }

    /// Alarm override: relay off, every holder dropped. Idempotent.
    pub fn force_off_by_alarm(&mut self) -> bool {
        self.suppressed = true;
        self.held_by = Holders::NONE;
        self.button_on_since = None;
        self.remote_on_since = None;
        self.apply()
    }

    /// Lift the alarm override. Holds that timed out during the alarm are
    /// dropped before the relay is re-evaluated.
    pub fn release_alarm(&mut self, now: Instant) -> bool {
        self.suppressed = false;
        self.drop_expired(now);
        self.apply()
    }

    /// Release every source held for at least its hold timeout. Returns
    /// whether the physical relay changed.
    pub fn expire_holds(&mut self, now: Instant) -> bool {
        self.drop_expired(now);
        self.apply()
    }

    fn drop_expired(&mut self, now: Instant) {
        for source in [Source::Button, Source::Remote] {
            let hold = self.hold_timeout(source);
            let timed_out = self
                .since(source)
                .is_some_and(|since| now.saturating_duration_since(since) >= hold);
            if timed_out {
                self.held_by.remove(source);
                *self.since_mut(source) = None;
            }
        }
    }

    pub fn is_on(&self) -> bool {
        self.physical
    }

    pub fn holders(&self) -> Holders {
        self.held_by
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn since(&self, source: Source) -> Option<Instant> {
        match source {
            Source::Button => self.button_on_since,
            Source::Remote => self.remote_on_since,
        }
    }

    #[cfg(test)]
    fn pin(&self) -> &P {
        &self.pin
    }

    fn since_mut(&mut self, source: Source) -> &mut Option<Instant> {
        match source {
            Source::Button => &mut self.button_on_since,
            Source::Remote => &mut self.remote_on_since,
        }
    }

    fn hold_timeout(&self, source: Source) -> Duration {
        match source {
            Source::Button => self.button_hold,
            Source::Remote => self.remote_hold,
        }
    }

    fn apply(&mut self) -> bool {
        let want = !self.held_by.is_empty() && !self.suppressed;
        if want == self.physical {
            return false;
        }
        let written = if want {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if written.is_err() {
            return false;
        }
        self.physical = want;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    #[derive(Default)]
    struct FakePin {
        high: bool,
        writes: usize,
    }

    impl embedded_hal::digital::ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            self.writes += 1;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            self.writes += 1;
            Ok(())
        }
    }

    /// Rejects every write while `stuck` is set.
    #[derive(Default)]
    struct StuckPin {
        high: bool,
        stuck: bool,
    }

    impl embedded_hal::digital::ErrorType for StuckPin {
        type Error = embedded_hal::digital::ErrorKind;
    }

    impl OutputPin for StuckPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            if self.stuck {
                return Err(embedded_hal::digital::ErrorKind::Other);
            }
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            if self.stuck {
                return Err(embedded_hal::digital::ErrorKind::Other);
            }
            self.high = true;
            Ok(())
        }
    }

    fn arbiter() -> RelayArbiter<FakePin> {
        RelayArbiter::new(
            FakePin::default(),
            Duration::from_secs(120 * 60),
            Duration::from_secs(10 * 60),
        )
    }

    fn at(secs: u64) -> Instant {
        Instant::from_secs(secs)
    }

    #[test]
    fn starts_off() {
        let relay = arbiter();
        assert!(!relay.is_on());
        assert!(!relay.pin().high);
        assert!(relay.holders().is_empty());
    }

    #[test]
    fn sources_are_or_combined() {
        let mut relay = arbiter();
        assert!(relay.assert(Source::Button, true, at(0)));
        assert!(!relay.assert(Source::Remote, true, at(1)));
        assert!(!relay.assert(Source::Button, false, at(2)));
        assert!(relay.is_on());
        assert!(relay.assert(Source::Remote, false, at(3)));
        assert!(!relay.is_on());
        assert!(!relay.pin().high);
    }

    #[test]
    fn releasing_an_idle_source_is_a_no_op() {
        let mut relay = arbiter();
        assert!(!relay.assert(Source::Remote, false, at(0)));
        assert!(!relay.is_on());
    }

    #[test]
    fn force_off_clears_everything_and_is_idempotent() {
        let mut relay = arbiter();
        relay.assert(Source::Button, true, at(0));
        relay.assert(Source::Remote, true, at(0));
        assert!(relay.force_off_by_alarm());
        assert!(!relay.is_on());
        assert!(relay.holders().is_empty());
        assert_eq!(relay.since(Source::Button), None);

        let writes = relay.pin().writes;
        assert!(!relay.force_off_by_alarm());
        assert_eq!(relay.pin().writes, writes);
    }

    #[test]
    fn on_while_suppressed_is_recorded_but_stays_off() {
        let mut relay = arbiter();
        relay.force_off_by_alarm();
        assert!(!relay.assert(Source::Remote, true, at(5)));
        assert!(!relay.is_on());
        assert!(relay.holders().contains(Source::Remote));
        assert_eq!(relay.since(Source::Remote), Some(at(5)));

        assert!(relay.release_alarm(at(6)));
        assert!(relay.is_on());
    }

    #[test]
    fn release_alarm_drops_expired_holds_first() {
        let mut relay = arbiter();
        relay.force_off_by_alarm();
        relay.assert(Source::Remote, true, at(0));
        // Remote hold is 10 minutes
        assert!(!relay.release_alarm(at(600)));
        assert!(!relay.is_on());
        assert!(relay.holders().is_empty());
    }

    #[test]
    fn hold_expires_at_exactly_the_timeout() {
        let mut relay = arbiter();
        relay.assert(Source::Button, true, at(0));
        relay.assert(Source::Remote, true, at(0));
        assert!(!relay.expire_holds(at(599)));
        assert!(relay.holders().contains(Source::Remote));

        // Button still holds, so the relay stays on
        assert!(!relay.expire_holds(at(600)));
        assert!(!relay.holders().contains(Source::Remote));
        assert!(relay.holders().contains(Source::Button));
        assert!(relay.is_on());

        assert!(relay.expire_holds(at(120 * 60)));
        assert!(!relay.is_on());
    }

    #[test]
    fn reasserting_on_restarts_the_hold_timer() {
        let mut relay = arbiter();
        relay.assert(Source::Remote, true, at(0));
        relay.assert(Source::Remote, true, at(300));
        assert!(!relay.expire_holds(at(600)));
        assert!(relay.is_on());
        assert!(relay.expire_holds(at(900)));
    }

    #[test]
    fn failed_write_keeps_reported_level_and_retries() {
        let mut relay = RelayArbiter::new(
            StuckPin::default(),
            Duration::from_secs(120 * 60),
            Duration::from_secs(10 * 60),
        );
        relay.assert(Source::Button, true, at(0));
        assert!(relay.is_on());

        relay.pin.stuck = true;
        assert!(!relay.assert(Source::Button, false, at(1)));
        assert!(relay.is_on());
        assert!(relay.pin().high);

        relay.pin.stuck = false;
        assert!(relay.expire_holds(at(2)));
        assert!(!relay.is_on());
        assert!(!relay.pin().high);
    }

    #[test]
    fn failed_initial_write_is_retried() {
        let pin = StuckPin {
            high: true,
            stuck: true,
        };
        let mut relay = RelayArbiter::new(pin, Duration::from_secs(60), Duration::from_secs(60));
        assert!(relay.is_on());

        relay.pin.stuck = false;
        assert!(relay.expire_holds(at(0)));
        assert!(!relay.is_on());
        assert!(!relay.pin().high);
    }
}
