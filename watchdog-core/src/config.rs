//! Watchdog settings snapshot.
//!
//! The snapshot is loaded once at boot and stays fixed for the session.
//! Every field is a small integer in the units the operator edits it in
//! (minutes, percent, raw ADC counts); the helpers below turn them into
//! `embassy_time::Duration`s for the state machines.

use core::fmt;
use core::ops::RangeInclusive;

use embassy_time::Duration;

/// Number of monitored analog channels.
pub const NUM_CHANNELS: usize = 4;

pub const DEFAULT_SENSOR: u8 = 0;
pub const DEFAULT_THRESHOLD: u16 = 500;
pub const DEFAULT_MAX_RUNTIME_MIN: u16 = 20;
pub const DEFAULT_DUTY_CYCLE_PCT: u8 = 50;
pub const DEFAULT_WINDOW_MIN: u16 = 60;
pub const DEFAULT_COOLDOWN_MIN: u16 = 60;
pub const DEFAULT_BUTTON_HOLD_MIN: u16 = 120;
pub const DEFAULT_REMOTE_HOLD_MIN: u16 = 10;
pub const DEFAULT_UPDATE_INTERVAL_MIN: u16 = 5;

/// One editable watchdog setting.
///
/// The discriminant doubles as the offset used by the host register map and
/// the flash key table, so the order must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Setting {
    Sensor = 0,
    Threshold = 1,
    MaxRuntime = 2,
    DutyCycle = 3,
    Window = 4,
    Cooldown = 5,
    ButtonHold = 6,
    RemoteHold = 7,
    UpdateInterval = 8,
}

impl Setting {
    pub const ALL: [Setting; 9] = [
        Setting::Sensor,
        Setting::Threshold,
        Setting::MaxRuntime,
        Setting::DutyCycle,
        Setting::Window,
        Setting::Cooldown,
        Setting::ButtonHold,
        Setting::RemoteHold,
        Setting::UpdateInterval,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Accepted values, inclusive.
    pub const fn range(self) -> RangeInclusive<u16> {
        match self {
            Setting::Sensor => 0..=(NUM_CHANNELS as u16 - 1),
            Setting::Threshold => 1..=4096,
            Setting::MaxRuntime => 1..=120,
            Setting::DutyCycle => 1..=100,
            Setting::Window
            | Setting::Cooldown
            | Setting::ButtonHold
            | Setting::RemoteHold => 1..=480,
            // 0 disables the periodic status refresh
            Setting::UpdateInterval => 0..=240,
        }
    }

    /// Settings that fit in a single byte on the wire.
    pub const fn is_byte(self) -> bool {
        matches!(self, Setting::Sensor | Setting::DutyCycle)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Setting::Sensor => "sensor",
            Setting::Threshold => "threshold",
            Setting::MaxRuntime => "max_runtime",
            Setting::DutyCycle => "duty_cycle",
            Setting::Window => "window",
            Setting::Cooldown => "cooldown",
            Setting::ButtonHold => "button_hold",
            Setting::RemoteHold => "remote_hold",
            Setting::UpdateInterval => "update_interval",
        }
    }

    pub fn check(self, value: u16) -> Result<(), ConfigError> {
        if self.range().contains(&value) {
            return Ok(());
        }
        match self {
            Setting::Sensor => Err(ConfigError::SensorOutOfRange(value)),
            field => Err(ConfigError::ValueOutOfRange { field, value }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The selected sense channel does not exist. Fatal at start-up.
    SensorOutOfRange(u16),
    ValueOutOfRange { field: Setting, value: u16 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::SensorOutOfRange(index) => write!(
                f,
                "sensor channel {} out of range (0..{})",
                index, NUM_CHANNELS
            ),
            ConfigError::ValueOutOfRange { field, value } => {
                let range = field.range();
                write!(
                    f,
                    "{} = {} out of range ({}..={})",
                    field.name(),
                    value,
                    range.start(),
                    range.end()
                )
            }
        }
    }
}

/// Settings snapshot consumed by the control and duty-cycle loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WatchdogConfig {
    /// Channel whose amplitude decides whether the device is running.
    pub sensor: u8,
    /// Averaged amplitude at or above which the device counts as running.
    pub threshold: u16,
    pub max_runtime_min: u16,
    pub duty_cycle_pct: u8,
    pub window_min: u16,
    pub cooldown_min: u16,
    pub button_hold_min: u16,
    pub remote_hold_min: u16,
    pub update_interval_min: u16,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchdogConfig {
    pub const fn new() -> Self {
        Self {
            sensor: DEFAULT_SENSOR,
            threshold: DEFAULT_THRESHOLD,
            max_runtime_min: DEFAULT_MAX_RUNTIME_MIN,
            duty_cycle_pct: DEFAULT_DUTY_CYCLE_PCT,
            window_min: DEFAULT_WINDOW_MIN,
            cooldown_min: DEFAULT_COOLDOWN_MIN,
            button_hold_min: DEFAULT_BUTTON_HOLD_MIN,
            remote_hold_min: DEFAULT_REMOTE_HOLD_MIN,
            update_interval_min: DEFAULT_UPDATE_INTERVAL_MIN,
        }
    }

    pub fn get(&self, setting: Setting) -> u16 {
        match setting {
            Setting::Sensor => self.sensor as u16,
            Setting::Threshold => self.threshold,
            Setting::MaxRuntime => self.max_runtime_min,
            Setting::DutyCycle => self.duty_cycle_pct as u16,
            Setting::Window => self.window_min,
            Setting::Cooldown => self.cooldown_min,
            Setting::ButtonHold => self.button_hold_min,
            Setting::RemoteHold => self.remote_hold_min,
            Setting::UpdateInterval => self.update_interval_min,
        }
    }

    /// Update one setting, rejecting values outside its range.
    pub fn set(&mut self, setting: Setting, value: u16) -> Result<(), ConfigError> {
        setting.check(value)?;
        self.store(setting, value);
        Ok(())
    }

    /// Build a snapshot from stored raw values, using the default for every
    /// setting `stored` has no value for. Nothing is validated here; call
    /// [`WatchdogConfig::validate`] on the result.
    pub fn from_stored(mut stored: impl FnMut(Setting) -> Option<u16>) -> Self {
        let mut config = Self::new();
        for setting in Setting::ALL {
            if let Some(value) = stored(setting) {
                config.store(setting, value);
            }
        }
        config
    }

    fn store(&mut self, setting: Setting, value: u16) {
        // Keep oversized byte values out of range instead of wrapping them
        let byte = u8::try_from(value).unwrap_or(u8::MAX);
        match setting {
            Setting::Sensor => self.sensor = byte,
            Setting::Threshold => self.threshold = value,
            Setting::MaxRuntime => self.max_runtime_min = value,
            Setting::DutyCycle => self.duty_cycle_pct = byte,
            Setting::Window => self.window_min = value,
            Setting::Cooldown => self.cooldown_min = value,
            Setting::ButtonHold => self.button_hold_min = value,
            Setting::RemoteHold => self.remote_hold_min = value,
            Setting::UpdateInterval => self.update_interval_min = value,
        }
    }

    /// Check every field. The firmware refuses to start the control loop
    /// when this fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Setting::ALL
            .iter()
            .try_for_each(|setting| setting.check(self.get(*setting)))
    }

    pub fn sensor_index(&self) -> usize {
        self.sensor as usize
    }

    pub fn max_runtime(&self) -> Duration {
        minutes(self.max_runtime_min)
    }

    pub fn cooldown(&self) -> Duration {
        minutes(self.cooldown_min)
    }

    pub fn button_hold(&self) -> Duration {
        minutes(self.button_hold_min)
    }

    pub fn remote_hold(&self) -> Duration {
        minutes(self.remote_hold_min)
    }

    /// `None` when the periodic status refresh is disabled.
    pub fn update_interval(&self) -> Option<Duration> {
        match self.update_interval_min {
            0 => None,
            min => Some(minutes(min)),
        }
    }
}

fn minutes(min: u16) -> Duration {
    Duration::from_secs(min as u64 * 60)
}
