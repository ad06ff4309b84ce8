use defmt::{debug, info, warn};
use embassy_executor::task;
use embassy_time::{Duration, Ticker};
use watchdog_core::duty_cycle::DutyCycleMonitor;
use watchdog_core::{Command, WatchdogConfig};

use crate::config::DUTY_CYCLE_TICK_S;
use crate::tasks::control_loop::{CONTROL_COMMAND_CHANNEL, MINUTE_ACTIVITY};

/// Closes one window slot per minute and reports an exceeded budget to the
/// control loop, which owns the alarm and only raises it while running.
#[task]
pub async fn duty_cycle_task(config: WatchdogConfig) {
    info!("Starting duty cycle task");

    let mut monitor = DutyCycleMonitor::new(config.window_min, config.duty_cycle_pct);
    let mut ticker = Ticker::every(Duration::from_secs(DUTY_CYCLE_TICK_S));

    info!(
        "Duty cycle budget: {} of {} minutes",
        monitor.limit(),
        monitor.window().len()
    );

    loop {
        ticker.next().await;

        let ran = MINUTE_ACTIVITY.take();
        let exceeded = monitor.minute_elapsed(ran);
        debug!(
            "Duty cycle: ran={} running_minutes={}",
            ran,
            monitor.window().running_minutes()
        );

        if exceeded {
            warn!("Duty cycle budget exceeded");
            CONTROL_COMMAND_CHANNEL
                .send(Command::DutyCycleExceeded)
                .await;
        }
    }
}
