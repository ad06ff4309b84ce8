//! Control loop orchestration.
//!
//! [`Controller`] owns the relay arbiter, the alarm machine and the running
//! detector. The firmware's control task calls [`Controller::tick`] on a fixed
//! period and forwards queued [`Command`]s to [`Controller::handle`]; nothing
//! else mutates this state. Every transition is reported to a [`StatusSink`]
//! in the order it happens.

use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;

use crate::alarm::{AlarmKind, AlarmKinds, AlarmMachine};
use crate::config::WatchdogConfig;
use crate::duty_cycle::MinuteActivity;
use crate::relay::{RelayArbiter, Source};
use crate::running::{RunningDetector, RunningEdge};
use crate::status::{StatusEvent, StatusSink, Subtopic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonEdge {
    pub which: Button,
    pub pressed: bool,
}

/// Edge detector over the two raw button levels.
#[derive(Debug, Default)]
pub struct ButtonPoller {
    on: bool,
    off: bool,
}

impl ButtonPoller {
    pub const fn new() -> Self {
        Self {
            on: false,
            off: false,
        }
    }

    /// Feed the current levels (`true` = pressed) and get back any edges.
    pub fn poll(&mut self, on_pressed: bool, off_pressed: bool) -> [Option<ButtonEdge>; 2] {
        [
            edge(&mut self.on, on_pressed, Button::On),
            edge(&mut self.off, off_pressed, Button::Off),
        ]
    }
}

fn edge(last: &mut bool, now: bool, which: Button) -> Option<ButtonEdge> {
    if *last == now {
        return None;
    }
    *last = now;
    Some(ButtonEdge {
        which,
        pressed: now,
    })
}

/// Requests queued for the control loop by other tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Remote power command from the host.
    Remote { on: bool },
    /// The duty-cycle loop found the window over budget. Only raises the
    /// alarm while the device is running.
    DutyCycleExceeded,
}

/// Snapshot published for readers outside the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerStatus {
    pub relay_on: bool,
    pub running: bool,
    pub alarm: AlarmKinds,
}

impl ControllerStatus {
    pub const fn new() -> Self {
        Self {
            relay_on: false,
            running: false,
            alarm: AlarmKinds::NONE,
        }
    }
}

impl Default for ControllerStatus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Controller<'a, P: OutputPin> {
    relay: RelayArbiter<P>,
    alarm: AlarmMachine,
    running: RunningDetector,
    max_runtime: Duration,
    activity: &'a MinuteActivity,
}

impl<'a, P: OutputPin> Controller<'a, P> {
    pub fn new(config: &WatchdogConfig, relay_pin: P, activity: &'a MinuteActivity) -> Self {
        Self {
            relay: RelayArbiter::new(relay_pin, config.button_hold(), config.remote_hold()),
            alarm: AlarmMachine::new(config.cooldown()),
            running: RunningDetector::new(config.threshold),
            max_runtime: config.max_runtime(),
            activity,
        }
    }

    /// One control period.
    ///
    /// `amplitude` is the current moving average of the selected channel.
    pub fn tick<S, E>(&mut self, now: Instant, amplitude: u16, edges: E, sink: &mut S)
    where
        S: StatusSink,
        E: IntoIterator<Item = ButtonEdge>,
    {
        if let Some(cleared) = self.alarm.try_clear(now) {
            sink.publish(StatusEvent::new(Subtopic::Alarm, 0));
            for kind in cleared.iter() {
                sink.publish(StatusEvent::flag(alarm_subtopic(kind), false));
            }
            let changed = self.relay.release_alarm(now);
            self.power_changed(changed, sink);
        }

        // Only presses act, releases are ignored
        for edge in edges.into_iter().filter(|edge| edge.pressed) {
            let on = edge.which == Button::On;
            let changed = self.relay.assert(Source::Button, on, now);
            self.power_changed(changed, sink);
        }

        let changed = self.relay.expire_holds(now);
        self.power_changed(changed, sink);

        if let Some(edge) = self.running.update(amplitude, now) {
            let started = edge == RunningEdge::Started;
            sink.publish(StatusEvent::flag(Subtopic::Running, started));
        }

        let over_time = self
            .running
            .run_time(now)
            .is_some_and(|run_time| run_time >= self.max_runtime);
        if over_time {
            self.raise(AlarmKind::MaxTime, now, sink);
        }

        if self.running.is_running() {
            self.activity.mark();
        }
    }

    pub fn handle<S: StatusSink>(&mut self, command: Command, now: Instant, sink: &mut S) {
        match command {
            Command::Remote { on } => {
                let changed = self.relay.assert(Source::Remote, on, now);
                self.power_changed(changed, sink);
            }
            Command::DutyCycleExceeded => {
                if self.running.is_running() {
                    self.raise(AlarmKind::DutyCycle, now, sink);
                }
            }
        }
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            relay_on: self.relay.is_on(),
            running: self.running.is_running(),
            alarm: self.alarm.kinds(),
        }
    }

    pub fn relay(&self) -> &RelayArbiter<P> {
        &self.relay
    }

    pub fn alarm(&self) -> &AlarmMachine {
        &self.alarm
    }

    fn raise<S: StatusSink>(&mut self, kind: AlarmKind, now: Instant, sink: &mut S) {
        if !self.alarm.raise(kind, now) {
            return;
        }
        let changed = self.relay.force_off_by_alarm();
        self.power_changed(changed, sink);
        sink.publish(StatusEvent::new(Subtopic::Alarm, self.alarm.kinds().bits()));
        sink.publish(StatusEvent::flag(alarm_subtopic(kind), true));
    }

    fn power_changed<S: StatusSink>(&self, changed: bool, sink: &mut S) {
        if changed {
            sink.publish(StatusEvent::flag(Subtopic::Power, self.relay.is_on()));
        }
    }
}

fn alarm_subtopic(kind: AlarmKind) -> Subtopic {
    match kind {
        AlarmKind::MaxTime => Subtopic::AlarmMaxTime,
        AlarmKind::DutyCycle => Subtopic::AlarmDutyCycle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use core::convert::Infallible;

    struct NullPin;

    impl embedded_hal::digital::ErrorType for NullPin {
        type Error = Infallible;
    }

    impl OutputPin for NullPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    const NO_EDGES: Option<ButtonEdge> = None;

    fn press(which: Button) -> Option<ButtonEdge> {
        Some(ButtonEdge {
            which,
            pressed: true,
        })
    }

    #[test]
    fn poller_reports_edges_only() {
        let mut poller = ButtonPoller::new();
        assert_eq!(poller.poll(false, false), [None, None]);
        assert_eq!(poller.poll(true, false), [press(Button::On), None]);
        assert_eq!(poller.poll(true, false), [None, None]);
        assert_eq!(
            poller.poll(false, true),
            [
                Some(ButtonEdge {
                    which: Button::On,
                    pressed: false
                }),
                press(Button::Off)
            ]
        );
    }

    #[test]
    fn button_press_toggles_power_and_emits_event() {
        let activity = MinuteActivity::new();
        let mut controller = Controller::new(&WatchdogConfig::default(), NullPin, &activity);
        let mut events = Vec::new();

        controller.tick(Instant::from_secs(0), 0, press(Button::On), &mut events);
        assert_eq!(events, [StatusEvent::flag(Subtopic::Power, true)]);
        assert!(controller.status().relay_on);

        events.clear();
        controller.tick(Instant::from_secs(1), 0, press(Button::Off), &mut events);
        assert_eq!(events, [StatusEvent::flag(Subtopic::Power, false)]);
    }

    #[test]
    fn button_release_is_ignored() {
        let activity = MinuteActivity::new();
        let mut controller = Controller::new(&WatchdogConfig::default(), NullPin, &activity);
        let mut events = Vec::new();
        controller.tick(Instant::from_secs(0), 0, press(Button::On), &mut events);
        events.clear();

        let release = Some(ButtonEdge {
            which: Button::On,
            pressed: false,
        });
        controller.tick(Instant::from_secs(1), 0, release, &mut events);
        assert!(events.is_empty());
        assert!(controller.status().relay_on);
    }

    #[test]
    fn running_marks_the_minute() {
        let activity = MinuteActivity::new();
        let mut controller = Controller::new(&WatchdogConfig::default(), NullPin, &activity);
        let mut events = Vec::new();

        controller.tick(Instant::from_secs(0), 100, NO_EDGES, &mut events);
        assert!(!activity.take());

        controller.tick(Instant::from_secs(1), 600, NO_EDGES, &mut events);
        assert_eq!(events, [StatusEvent::flag(Subtopic::Running, true)]);
        assert!(activity.take());
    }

    #[test]
    fn duty_cycle_command_raises_and_forces_off() {
        let activity = MinuteActivity::new();
        let mut controller = Controller::new(&WatchdogConfig::default(), NullPin, &activity);
        let mut events = Vec::new();
        controller.handle(Command::Remote { on: true }, Instant::from_secs(0), &mut events);
        controller.tick(Instant::from_secs(1), 600, NO_EDGES, &mut events);
        events.clear();

        controller.handle(Command::DutyCycleExceeded, Instant::from_secs(5), &mut events);
        assert_eq!(
            events,
            [
                StatusEvent::flag(Subtopic::Power, false),
                StatusEvent::new(Subtopic::Alarm, AlarmKind::DutyCycle.bit()),
                StatusEvent::flag(Subtopic::AlarmDutyCycle, true),
            ]
        );

        events.clear();
        controller.handle(Command::DutyCycleExceeded, Instant::from_secs(6), &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn duty_cycle_command_is_ignored_while_idle() {
        let activity = MinuteActivity::new();
        let mut controller = Controller::new(&WatchdogConfig::default(), NullPin, &activity);
        let mut events = Vec::new();
        controller.handle(Command::Remote { on: true }, Instant::from_secs(0), &mut events);
        events.clear();

        controller.handle(Command::DutyCycleExceeded, Instant::from_secs(5), &mut events);
        assert!(events.is_empty());
        assert!(!controller.alarm().is_active());
        assert!(controller.status().relay_on);
    }
}
