use defmt::{info, warn};
use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{self, TrySendError};
use embassy_time::{Duration, Ticker};
use watchdog_core::{StatusEvent, StatusSink, Subtopic};

use crate::config::STATUS_QUEUE_DEPTH;
use crate::tasks::control_loop::STATUS;

pub type StatusEventChannelType =
    channel::Channel<CriticalSectionRawMutex, StatusEvent, STATUS_QUEUE_DEPTH>;

/// Status events waiting to be drained by the host over I2C.
pub static STATUS_EVENT_CHANNEL: StatusEventChannelType = channel::Channel::new();

/// [`StatusSink`] feeding [`STATUS_EVENT_CHANNEL`]. Never blocks: when the
/// host falls behind the oldest queued event is discarded.
pub struct StatusQueue;

impl StatusSink for StatusQueue {
    fn publish(&mut self, event: StatusEvent) {
        info!("{} = {}", event.subtopic.as_str(), event.value);

        if let Err(TrySendError::Full(event)) = STATUS_EVENT_CHANNEL.try_send(event) {
            if let Ok(dropped) = STATUS_EVENT_CHANNEL.try_receive() {
                warn!("Status queue full, dropped {:?}", dropped);
            }
            if STATUS_EVENT_CHANNEL.try_send(event).is_err() {
                warn!("Status queue full, dropped {:?}", event);
            }
        }
    }
}

/// Republish the current state every `interval` so the host can resync
/// after missing events.
#[task]
pub async fn status_refresh_task(interval: Duration) {
    info!("Starting status refresh task");

    let mut queue = StatusQueue;
    let mut ticker = Ticker::every(interval);

    loop {
        ticker.next().await;

        let status = *STATUS.lock().await;
        queue.publish(StatusEvent::flag(Subtopic::Power, status.relay_on));
        queue.publish(StatusEvent::flag(Subtopic::Running, status.running));
        queue.publish(StatusEvent::new(Subtopic::Alarm, status.alarm.bits()));
    }
}
