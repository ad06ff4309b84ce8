//! Duty-cycle sliding window.
//!
//! The control loop marks [`MinuteActivity`] whenever it sees the device
//! running. Once a minute the duty-cycle loop takes the flag, appends it to
//! the window and checks the running count against the budget.

use alloc::vec;
use alloc::vec::Vec;

use portable_atomic::{AtomicBool, Ordering};

/// "Device ran during the current minute", set by the control loop and
/// consumed by the duty-cycle loop.
pub struct MinuteActivity {
    ran: AtomicBool,
}

impl Default for MinuteActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl MinuteActivity {
    pub const fn new() -> Self {
        Self {
            ran: AtomicBool::new(false),
        }
    }

    pub fn mark(&self) {
        self.ran.store(true, Ordering::Relaxed);
    }

    /// Read and reset the flag.
    pub fn take(&self) -> bool {
        self.ran.swap(false, Ordering::Relaxed)
    }
}

/// Ring of per-minute running flags, one slot per minute of the window.
pub struct DutyCycleWindow {
    slots: Vec<bool>,
    next: usize,
}

impl DutyCycleWindow {
    pub fn new(minutes: u16) -> Self {
        Self {
            slots: vec![false; minutes.max(1) as usize],
            next: 0,
        }
    }

    /// Overwrite the oldest minute.
    pub fn record(&mut self, ran: bool) {
        self.slots[self.next] = ran;
        self.next = (self.next + 1) % self.slots.len();
    }

    pub fn running_minutes(&self) -> u16 {
        self.slots.iter().filter(|ran| **ran).count() as u16
    }

    pub fn len(&self) -> u16 {
        self.slots.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

pub struct DutyCycleMonitor {
    window: DutyCycleWindow,
    percent: u8,
}

impl DutyCycleMonitor {
    pub fn new(window_min: u16, percent: u8) -> Self {
        Self {
            window: DutyCycleWindow::new(window_min),
            percent,
        }
    }

    /// Running minutes the window tolerates before the alarm.
    pub fn limit(&self) -> u32 {
        self.percent as u32 * self.window.len() as u32 / 100
    }

    /// Close one minute. Returns `true` when the running count now exceeds
    /// the budget.
    pub fn minute_elapsed(&mut self, ran: bool) -> bool {
        self.window.record(ran);
        self.window.running_minutes() as u32 > self.limit()
    }

    pub fn window(&self) -> &DutyCycleWindow {
        &self.window
    }
}
