use embassy_time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunningEdge {
    Started,
    Stopped,
}

/// Running / not-running from the selected channel's averaged amplitude.
pub struct RunningDetector {
    threshold: u16,
    running: bool,
    started_at: Option<Instant>,
}

impl RunningDetector {
    pub const fn new(threshold: u16) -> Self {
        Self {
            threshold,
            running: false,
            started_at: None,
        }
    }

    /// Compare one averaged amplitude against the threshold (inclusive).
    /// A rising edge records `now` as the run start.
    pub fn update(&mut self, amplitude: u16, now: Instant) -> Option<RunningEdge> {
        let running = amplitude >= self.threshold;
        if running == self.running {
            return None;
        }
        self.running = running;
        if running {
            self.started_at = Some(now);
            Some(RunningEdge::Started)
        } else {
            self.started_at = None;
            Some(RunningEdge::Stopped)
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Continuous run time so far, `None` when stopped.
    pub fn run_time(&self, now: Instant) -> Option<Duration> {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
    }
}
