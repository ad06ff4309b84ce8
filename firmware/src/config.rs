pub const I2C_ADDR: u8 = 0x6d; // I2C address for the host link secondary interface

pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

// Settings are stored under SETTINGS_CONFIG_KEY_BASE + Setting::index()
pub const SETTINGS_CONFIG_KEY_BASE: u16 = 0x2000;

// Sampler period. 50 samples of 333 us cover one 60 Hz line cycle, see
// watchdog_core::sampler::SAMPLES_PER_CYCLE.
pub const SAMPLE_PERIOD_US: u64 = 333;

pub const CONTROL_TICK_MS: u64 = 100; // Control loop period
pub const DUTY_CYCLE_TICK_S: u64 = 60; // One duty-cycle window slot per minute

pub const COMMAND_QUEUE_DEPTH: usize = 8;
// Status events not yet drained by the host; the oldest is dropped when full
pub const STATUS_QUEUE_DEPTH: usize = 16;
pub const MAX_FLASH_WRITE_QUEUE_DEPTH: usize = 4;

pub const HW_WATCHDOG_TIMEOUT_S: u64 = 8;
pub const HW_WATCHDOG_FEED_INTERVAL_S: u64 = 1;

pub const HEAP_SIZE: usize = 16 * 1024;

pub const FW_VERSION_STR: &str = "1.0.0-a1";

// The version format is [major, minor, patch, alpha], where alpha is 0xff
// for stable releases and a running number for alpha releases.
const fn parse_version(ver: &str) -> [u8; 4] {
    let bytes = ver.as_bytes();
    let mut parts = [0u8, 0, 0, 0xff];
    let mut part = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'.' => part += 1,
            b'-' => {
                part = 3;
                parts[3] = 0;
            }
            b'a' => {}
            digit => parts[part] = parts[part] * 10 + (digit - b'0'),
        }
        i += 1;
    }
    parts
}

pub const FW_VERSION: [u8; 4] = parse_version(FW_VERSION_STR);
