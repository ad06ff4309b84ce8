//! Peak-to-peak amplitude extraction.
//!
//! [`Sampler::record`] is called from the high-priority sampling context with
//! one raw reading per channel. After a full line cycle worth of readings it
//! pushes `max - min` of every channel into the shared [`SensorBank`] and
//! starts a new cycle. It does no allocation, takes no lock and never waits.

use crate::ring::SensorBank;

/// 12-bit ADC; every raw reading is below this.
pub const ADC_FULL_SCALE: u16 = 4096;

/// Readings per AC line cycle at the firmware's sampling period
/// (50 x 333 us, one 60 Hz cycle).
pub const SAMPLES_PER_CYCLE: u16 = 50;

/// Running min/max of one channel during the current line cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleAccumulator {
    min: u16,
    max: u16,
}

impl Default for CycleAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleAccumulator {
    pub const fn new() -> Self {
        Self {
            min: ADC_FULL_SCALE,
            max: 0,
        }
    }

    pub fn record(&mut self, raw: u16) {
        if raw > self.max {
            self.max = raw;
        }
        if raw < self.min {
            self.min = raw;
        }
    }

    /// Peak-to-peak swing seen so far; zero before the first reading.
    pub fn amplitude(&self) -> u16 {
        self.max.saturating_sub(self.min)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Sole writer of a [`SensorBank`].
pub struct Sampler<'a, const CH: usize, const N: usize> {
    bank: &'a SensorBank<CH, N>,
    accumulators: [CycleAccumulator; CH],
    samples_per_cycle: u16,
    sample_count: u16,
    write_pos: usize,
}

impl<'a, const CH: usize, const N: usize> Sampler<'a, CH, N> {
    pub fn new(bank: &'a SensorBank<CH, N>, samples_per_cycle: u16) -> Self {
        Self {
            bank,
            accumulators: [CycleAccumulator::new(); CH],
            samples_per_cycle: samples_per_cycle.max(1),
            sample_count: 0,
            write_pos: 0,
        }
    }

    /// Fold one reading per channel into the current cycle.
    ///
    /// Returns `true` when this reading completed a cycle and the amplitudes
    /// were pushed into the rings.
    pub fn record(&mut self, readings: &[u16; CH]) -> bool {
        for (acc, raw) in self.accumulators.iter_mut().zip(readings) {
            acc.record(*raw);
        }

        self.sample_count += 1;
        if self.sample_count < self.samples_per_cycle {
            return false;
        }
        self.sample_count = 0;

        let amplitudes: [u16; CH] = core::array::from_fn(|ch| self.accumulators[ch].amplitude());
        self.bank.store(self.write_pos, &amplitudes);
        self.accumulators.iter_mut().for_each(CycleAccumulator::reset);

        self.write_pos += 1;
        if self.write_pos >= N {
            self.write_pos = 0;
        }
        true
    }

    /// Ring slot the next completed cycle will be written to.
    pub fn write_position(&self) -> usize {
        self.write_pos
    }
}
