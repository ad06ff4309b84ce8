//! Watchdog alarm state machine.
//!
//! Two alarm kinds share one suppressive alarm. The first kind raised starts
//! the cooldown; raising another kind while alarmed only adds its bit.

use embassy_time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmKind {
    MaxTime,
    DutyCycle,
}

impl AlarmKind {
    pub const ALL: [AlarmKind; 2] = [AlarmKind::MaxTime, AlarmKind::DutyCycle];

    pub const fn bit(self) -> u8 {
        match self {
            AlarmKind::MaxTime => 0b01,
            AlarmKind::DutyCycle => 0b10,
        }
    }
}

/// Bitmask of alarm kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmKinds(u8);

impl AlarmKinds {
    pub const NONE: AlarmKinds = AlarmKinds(0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, kind: AlarmKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub const fn with(self, kind: AlarmKind) -> Self {
        AlarmKinds(self.0 | kind.bit())
    }

    pub fn iter(self) -> impl Iterator<Item = AlarmKind> {
        AlarmKind::ALL.into_iter().filter(move |kind| self.contains(*kind))
    }
}

impl From<AlarmKind> for AlarmKinds {
    fn from(kind: AlarmKind) -> Self {
        AlarmKinds::NONE.with(kind)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmedState {
    pub raised_at: Instant,
    pub kinds: AlarmKinds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmState {
    Clear,
    Alarmed(AlarmedState),
}

pub struct AlarmMachine {
    state: AlarmState,
    cooldown: Duration,
}

impl AlarmMachine {
    pub const fn new(cooldown: Duration) -> Self {
        Self {
            state: AlarmState::Clear,
            cooldown,
        }
    }

    /// Set `kind`. Returns `true` only when the bit was newly set.
    pub fn raise(&mut self, kind: AlarmKind, now: Instant) -> bool {
        match self.state {
            AlarmState::Clear => {
                self.state = AlarmState::Alarmed(AlarmedState {
                    raised_at: now,
                    kinds: kind.into(),
                });
                true
            }
            AlarmState::Alarmed(ref mut alarmed) => {
                if alarmed.kinds.contains(kind) {
                    return false;
                }
                alarmed.kinds = alarmed.kinds.with(kind);
                true
            }
        }
    }

    /// Clear once the cooldown has fully elapsed, returning the kinds that
    /// were active.
    pub fn try_clear(&mut self, now: Instant) -> Option<AlarmKinds> {
        let AlarmState::Alarmed(alarmed) = self.state else {
            return None;
        };
        if now.saturating_duration_since(alarmed.raised_at) < self.cooldown {
            return None;
        }
        self.state = AlarmState::Clear;
        Some(alarmed.kinds)
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, AlarmState::Alarmed(_))
    }

    pub fn kinds(&self) -> AlarmKinds {
        match self.state {
            AlarmState::Clear => AlarmKinds::NONE,
            AlarmState::Alarmed(alarmed) => alarmed.kinds,
        }
    }
}
