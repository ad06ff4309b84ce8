pub(crate) mod config_manager;
pub(crate) mod control_loop;
pub(crate) mod duty_cycle;
pub(crate) mod i2c_secondary;
pub(crate) mod sampler;
pub(crate) mod status_events;
