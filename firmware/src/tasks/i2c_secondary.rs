use defmt::{debug, error, info};
use embassy_executor::task;
use embassy_rp::peripherals::I2C1;
use embassy_rp::{bind_interrupts, i2c, i2c_slave};
use watchdog_core::{Command, NUM_CHANNELS, Setting};

use crate::config::{FW_VERSION, I2C_ADDR};
use crate::config_resources::I2CSecondaryResources;
use crate::tasks::config_manager::{get_stored_setting, set_stored_setting};
use crate::tasks::control_loop::{CONTROL_COMMAND_CHANNEL, STATUS};
use crate::tasks::sampler::SENSORS;
use crate::tasks::status_events::STATUS_EVENT_CHANNEL;

// Following commands are supported by the I2C secondary interface:
// - Read 0x01: Query firmware version
// - Read 0x10: Query relay state
// - Write 0x10 0x00: Remote power off
// - Write 0x10 0x01: Remote power on
// - Read 0x11: Query running state
// - Read 0x12: Query active alarm kinds (bit 0 max runtime, bit 1 duty cycle)
// - Read 0x18: Query number of queued status events
// - Read 0x19: Pop the oldest status event as [subtopic, value], [0xff, 0x00] if none
// - Read 0x20..0x23: Query averaged amplitude of channel 0..3 (u16)
// - Read 0x40..0x48: Query stored setting
// - Write 0x40..0x48 [NN..]: Store setting, applied at next boot
//
// Settings registers, in order: sensor, threshold, max runtime, duty cycle,
// window, cooldown, button hold, remote hold, update interval. Sensor and
// duty cycle are a single byte, the rest are big-endian u16.

const SETTINGS_BASE: u8 = 0x40;
const SENSORS_BASE: u8 = 0x20;
const NO_EVENT: [u8; 2] = [0xff, 0x00];

bind_interrupts!(struct Irqs {
    I2C1_IRQ => i2c::InterruptHandler<I2C1>;
});

async fn respond(device: &mut i2c_slave::I2cSlave<'_, I2C1>, data: &[u8]) {
    if let Err(e) = device.respond_and_fill(data, 0x00).await {
        error!("error while responding {}", e)
    }
}

fn setting_register(register: u8) -> Option<Setting> {
    register
        .checked_sub(SETTINGS_BASE)
        .and_then(Setting::from_index)
}

fn sensor_register(register: u8) -> Option<usize> {
    register
        .checked_sub(SENSORS_BASE)
        .map(usize::from)
        .filter(|channel| *channel < NUM_CHANNELS)
}

async fn write_setting(setting: Setting, payload: &[u8]) {
    let value = match (setting.is_byte(), payload) {
        (true, [value]) => *value as u16,
        (false, [msb, lsb]) => u16::from_be_bytes([*msb, *lsb]),
        _ => {
            error!(
                "Invalid {} write length: {}",
                setting.name(),
                payload.len()
            );
            return;
        }
    };

    match set_stored_setting(setting, value).await {
        Ok(()) => info!("Setting {} to {}", setting.name(), value),
        Err(e) => error!("Rejected setting: {}", defmt::Display2Format(&e)),
    }
}

#[task]
pub async fn i2c_secondary_task(r: I2CSecondaryResources) {
    info!("Starting I2C secondary task");
    let mut config = i2c_slave::Config::default();
    config.addr = I2C_ADDR as u16;
    let mut device = i2c_slave::I2cSlave::new(r.i2c, r.scl, r.sda, Irqs, config);

    info!("I2C secondary task initialized");

    loop {
        let mut buf = [0u8; 16];
        match device.listen(&mut buf).await {
            Ok(i2c_slave::Command::GeneralCall(len)) => {
                error!("General call write received: {}", buf[..len]);
            }
            Ok(i2c_slave::Command::Read) => loop {
                match device.respond_to_read(&[0x00]).await {
                    Ok(x) => match x {
                        i2c_slave::ReadStatus::Done => break,
                        i2c_slave::ReadStatus::NeedMoreBytes => (),
                        i2c_slave::ReadStatus::LeftoverBytes(x) => {
                            info!("Left over bytes: {:?}", x);
                            break;
                        }
                    },
                    Err(e) => {
                        error!("Error responding to read: {:?}", e);
                        break;
                    }
                }
            },
            Ok(i2c_slave::Command::Write(len)) => {
                if len < 2 {
                    error!("Write command too short");
                    continue;
                }

                match buf[0] {
                    // Remote power command
                    0x10 => match buf[1] {
                        state @ (0x00 | 0x01) => {
                            let on = state == 0x01;
                            info!("Remote power {}", if on { "on" } else { "off" });
                            CONTROL_COMMAND_CHANNEL.send(Command::Remote { on }).await;
                        }
                        x => error!("Invalid power state: {}", x),
                    },
                    register => match setting_register(register) {
                        Some(setting) => write_setting(setting, &buf[1..len]).await,
                        None => error!("Invalid Write command: {:02x}", register),
                    },
                }
            }
            Ok(i2c_slave::Command::WriteRead(len)) => {
                if len < 1 {
                    error!("Write Read command too short");
                    continue;
                }
                match buf[0] {
                    // Query firmware version
                    0x01 => respond(&mut device, &FW_VERSION).await,
                    // Query relay state
                    0x10 => {
                        let relay_on = STATUS.lock().await.relay_on;
                        respond(&mut device, &[relay_on as u8]).await
                    }
                    // Query running state
                    0x11 => {
                        let running = STATUS.lock().await.running;
                        respond(&mut device, &[running as u8]).await
                    }
                    // Query alarm kinds
                    0x12 => {
                        let alarm = STATUS.lock().await.alarm;
                        respond(&mut device, &[alarm.bits()]).await
                    }
                    // Query queued status events
                    0x18 => {
                        let queued = STATUS_EVENT_CHANNEL.len() as u8;
                        respond(&mut device, &[queued]).await
                    }
                    // Pop a status event
                    0x19 => {
                        let event = STATUS_EVENT_CHANNEL
                            .try_receive()
                            .map(|event| event.to_bytes())
                            .unwrap_or(NO_EVENT);
                        debug!("Popped status event {:?}", event);
                        respond(&mut device, &event).await
                    }
                    register => {
                        if let Some(channel) = sensor_register(register) {
                            let average = SENSORS.average(channel).unwrap_or(0);
                            respond(&mut device, &average.to_be_bytes()).await
                        } else if let Some(setting) = setting_register(register) {
                            let value = get_stored_setting(setting).await;
                            if setting.is_byte() {
                                respond(&mut device, &[value as u8]).await
                            } else {
                                respond(&mut device, &value.to_be_bytes()).await
                            }
                        } else {
                            error!("Invalid Write Read command: 0x{:02x}", register)
                        }
                    }
                }
            }
            Err(e) => error!("{}", e),
        }
    }
}
