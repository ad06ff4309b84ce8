//! Per-channel amplitude rings.
//!
//! The sampler is the only writer; tasks read the rings concurrently to
//! compute moving averages. Each slot is a single atomic half-word, so a
//! reader can observe a slot from the previous cycle but never a torn value.
//! No lock is taken on either side.

use portable_atomic::{AtomicU16, Ordering};

use crate::config::NUM_CHANNELS;

/// Number of line cycles averaged per channel.
pub const RING_SIZE: usize = 32;

/// The bank used by the firmware: one ring per monitored channel.
pub type Sensors = SensorBank<NUM_CHANNELS, RING_SIZE>;

pub struct AmplitudeRing<const N: usize> {
    slots: [AtomicU16; N],
}

impl<const N: usize> Default for AmplitudeRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> AmplitudeRing<N> {
    /// All slots start at zero. Until the ring has been filled once the
    /// average under-reports the real amplitude.
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU16::new(0) }; N],
        }
    }

    pub(crate) fn store(&self, index: usize, amplitude: u16) {
        self.slots[index % N].store(amplitude, Ordering::Relaxed);
    }

    pub fn get(&self, index: usize) -> u16 {
        self.slots[index % N].load(Ordering::Relaxed)
    }

    /// Arithmetic mean over every slot, truncated.
    pub fn average(&self) -> u16 {
        if N == 0 {
            return 0;
        }
        let sum: u32 = self
            .slots
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed) as u32)
            .sum();
        (sum / N as u32) as u16
    }
}

/// One ring per channel, sharing a write position owned by the sampler.
pub struct SensorBank<const CH: usize, const N: usize> {
    rings: [AmplitudeRing<N>; CH],
}

impl<const CH: usize, const N: usize> Default for SensorBank<CH, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CH: usize, const N: usize> SensorBank<CH, N> {
    pub const fn new() -> Self {
        Self {
            rings: [const { AmplitudeRing::<N>::new() }; CH],
        }
    }

    pub fn ring(&self, channel: usize) -> Option<&AmplitudeRing<N>> {
        self.rings.get(channel)
    }

    /// Moving average of one channel, `None` for a channel that does not exist.
    pub fn average(&self, channel: usize) -> Option<u16> {
        self.ring(channel).map(AmplitudeRing::average)
    }

    /// Live averages of every channel, for diagnostics.
    pub fn read_sensors(&self) -> [u16; CH] {
        core::array::from_fn(|channel| self.rings[channel].average())
    }

    pub(crate) fn store(&self, index: usize, amplitudes: &[u16; CH]) {
        for (ring, amplitude) in self.rings.iter().zip(amplitudes) {
            ring.store(index, *amplitude);
        }
    }
}
