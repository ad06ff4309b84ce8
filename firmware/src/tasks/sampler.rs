//! Current sampling on the high-priority executor.
//!
//! Runs every `SAMPLE_PERIOD_US` and preempts every thread-mode task. Each
//! pass reads the four CT channels with blocking single conversions and feeds
//! them to the [`Sampler`], which publishes one amplitude per channel per line
//! cycle into [`SENSORS`]. Nothing in here locks or awaits anything but the
//! ticker.

use defmt::{info, trace, warn};
use embassy_executor::task;
use embassy_rp::adc::{Adc, Channel, Config};
use embassy_rp::gpio::Pull;
use embassy_time::{Duration, Ticker};
use watchdog_core::NUM_CHANNELS;
use watchdog_core::ring::Sensors;
use watchdog_core::sampler::{SAMPLES_PER_CYCLE, Sampler};

use crate::config::SAMPLE_PERIOD_US;
use crate::config_resources::SensorResources;

/// Amplitude rings for every channel. Written only by `sampler_task`.
pub static SENSORS: Sensors = Sensors::new();

#[task]
pub async fn sampler_task(r: SensorResources) {
    info!("Starting sampler task");

    let mut adc = Adc::new_blocking(r.adc, Config::default());
    let mut channels = [
        Channel::new_pin(r.ct0, Pull::None),
        Channel::new_pin(r.ct1, Pull::None),
        Channel::new_pin(r.ct2, Pull::None),
        Channel::new_pin(r.ct3, Pull::None),
    ];

    let mut sampler = Sampler::new(&SENSORS, SAMPLES_PER_CYCLE);
    let mut readings = [0u16; NUM_CHANNELS];
    let mut read_errors: u32 = 0;

    let mut ticker = Ticker::every(Duration::from_micros(SAMPLE_PERIOD_US));

    info!("Sampler task initialized");

    loop {
        ticker.next().await;

        for (reading, channel) in readings.iter_mut().zip(channels.iter_mut()) {
            // A failed conversion reads as a flat signal
            *reading = match adc.blocking_read(channel) {
                Ok(value) => value,
                Err(_) => {
                    read_errors = read_errors.wrapping_add(1);
                    0
                }
            };
        }

        if sampler.record(&readings) {
            trace!("Cycle complete, next slot {}", sampler.write_position());
            if read_errors > 0 {
                warn!("{} ADC conversions failed in the last cycle", read_errors);
                read_errors = 0;
            }
        }
    }
}
