use defmt::{info, trace};
use embassy_executor::task;
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Ticker};
use watchdog_core::duty_cycle::MinuteActivity;
use watchdog_core::{ButtonPoller, Command, Controller, ControllerStatus, WatchdogConfig};

use crate::config::{COMMAND_QUEUE_DEPTH, CONTROL_TICK_MS};
use crate::config_resources::ControlResources;
use crate::tasks::sampler::SENSORS;
use crate::tasks::status_events::StatusQueue;

pub type ControlCommandChannelType =
    channel::Channel<CriticalSectionRawMutex, Command, COMMAND_QUEUE_DEPTH>;
pub static CONTROL_COMMAND_CHANNEL: ControlCommandChannelType = channel::Channel::new();

/// Latest controller state, published once per tick for other tasks to read.
pub static STATUS: Mutex<CriticalSectionRawMutex, ControllerStatus> =
    Mutex::new(ControllerStatus::new());

/// Set while the device runs, drained once a minute by the duty cycle task.
pub static MINUTE_ACTIVITY: MinuteActivity = MinuteActivity::new();

#[task]
pub async fn control_loop_task(r: ControlResources, config: WatchdogConfig) {
    info!("Starting control loop task");

    // Relay starts de-energised
    let relay = Output::new(r.relay, Level::Low);
    let on_button = Input::new(r.on_button, Pull::Up);
    let off_button = Input::new(r.off_button, Pull::Up);

    let mut controller = Controller::new(&config, relay, &MINUTE_ACTIVITY);
    let mut buttons = ButtonPoller::new();
    let mut queue = StatusQueue;
    let sensor = config.sensor_index();

    let receiver = CONTROL_COMMAND_CHANNEL.receiver();
    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_TICK_MS));

    info!("Control loop task initialized, watching channel {}", sensor);

    loop {
        ticker.next().await;
        let now = Instant::now();

        let amplitude = SENSORS.average(sensor).unwrap_or(0);
        // Buttons are active low
        let edges = buttons.poll(on_button.is_low(), off_button.is_low());
        controller.tick(now, amplitude, edges.into_iter().flatten(), &mut queue);

        while let Ok(command) = receiver.try_receive() {
            info!("Control command: {:?}", command);
            controller.handle(command, now, &mut queue);
        }

        let status = controller.status();
        trace!("amplitude={} status={:?}", amplitude, status);
        *STATUS.lock().await = status;
    }
}
