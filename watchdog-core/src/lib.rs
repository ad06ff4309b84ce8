//! Board-agnostic core of the appliance watchdog.
//!
//! Everything in here runs without touching peripherals:
//!
//! - amplitude sampling and the per-channel sample rings ([`sampler`], [`ring`])
//! - relay arbitration between the button and the remote host ([`relay`])
//! - the max-runtime and duty-cycle alarms ([`alarm`], [`duty_cycle`])
//! - running detection ([`running`])
//! - the per-tick orchestration used by the control loop ([`controller`])
//!
//! The firmware crate owns the hardware and drives these types from its tasks.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod alarm;
pub mod config;
pub mod controller;
pub mod duty_cycle;
pub mod relay;
pub mod ring;
pub mod running;
pub mod sampler;
pub mod status;

pub use config::{ConfigError, Setting, WatchdogConfig, NUM_CHANNELS};
pub use controller::{Button, ButtonEdge, ButtonPoller, Command, Controller, ControllerStatus};
pub use status::{StatusEvent, StatusSink, Subtopic};
