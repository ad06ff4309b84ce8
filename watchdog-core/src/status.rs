use alloc::vec::Vec;

/// Topic suffix of a status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Subtopic {
    Power = 0,
    Running = 1,
    Alarm = 2,
    AlarmMaxTime = 3,
    AlarmDutyCycle = 4,
}

impl Subtopic {
    pub const fn as_str(self) -> &'static str {
        match self {
            Subtopic::Power => "POWER",
            Subtopic::Running => "RUNNING",
            Subtopic::Alarm => "ALARM",
            Subtopic::AlarmMaxTime => "ALARM-MAXTIME",
            Subtopic::AlarmDutyCycle => "ALARM-DUTYCYCLE",
        }
    }

    /// Wire id used by the host link.
    pub const fn id(self) -> u8 {
        self as u8
    }
}

/// A state transition for the messaging side to publish.
///
/// `value` is 0/1 for every subtopic except [`Subtopic::Alarm`], which
/// carries the active alarm kind mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusEvent {
    pub subtopic: Subtopic,
    pub value: u8,
}

impl StatusEvent {
    pub const fn new(subtopic: Subtopic, value: u8) -> Self {
        Self { subtopic, value }
    }

    pub const fn flag(subtopic: Subtopic, on: bool) -> Self {
        Self::new(subtopic, on as u8)
    }

    pub const fn to_bytes(self) -> [u8; 2] {
        [self.subtopic.id(), self.value]
    }
}

/// Receiver of the controller's status events.
pub trait StatusSink {
    fn publish(&mut self, event: StatusEvent);
}

impl StatusSink for Vec<StatusEvent> {
    fn publish(&mut self, event: StatusEvent) {
        self.push(event);
    }
}
