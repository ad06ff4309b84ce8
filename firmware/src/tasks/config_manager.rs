use defmt::{debug, error, info, warn};
use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel;
use embassy_sync::mutex::Mutex;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{SerializationError, fetch_item, store_item};
use serde::{Deserialize, Serialize};
use watchdog_core::{ConfigError, Setting, WatchdogConfig};

use crate::MFlashType;
use crate::config::{MAX_FLASH_WRITE_QUEUE_DEPTH, SETTINGS_CONFIG_KEY_BASE};
use crate::flash_layout::get_config_range;

#[derive(Debug)]
pub enum ConfigStoreError {
    // Flash operation errors
    Flash(embassy_rp::flash::Error),
    // Other storage errors
    Storage,
}

impl From<embassy_rp::flash::Error> for ConfigStoreError {
    fn from(error: embassy_rp::flash::Error) -> Self {
        ConfigStoreError::Flash(error)
    }
}

impl From<sequential_storage::Error<embassy_rp::flash::Error>> for ConfigStoreError {
    fn from(error: sequential_storage::Error<embassy_rp::flash::Error>) -> Self {
        match error {
            sequential_storage::Error::Storage { value, .. } => ConfigStoreError::Flash(value),
            _ => ConfigStoreError::Storage,
        }
    }
}

impl From<SerializationError> for ConfigStoreError {
    fn from(_: SerializationError) -> Self {
        ConfigStoreError::Storage
    }
}

/// A validated setting waiting to be written to flash.
#[derive(defmt::Format)]
pub struct SettingWrite {
    pub setting: Setting,
    pub value: u16,
}

pub type ConfigWriteChannelType =
    channel::Channel<CriticalSectionRawMutex, SettingWrite, MAX_FLASH_WRITE_QUEUE_DEPTH>;
pub static CONFIG_WRITE_CHANNEL: ConfigWriteChannelType = channel::Channel::new();

const fn config_key(setting: Setting) -> u16 {
    SETTINGS_CONFIG_KEY_BASE + setting.index() as u16
}

// Configuration manager using sequential-storage
pub struct ConfigManager {
    flash: &'static MFlashType<'static>,
    data_buffer: [u8; 128],
}

impl ConfigManager {
    pub fn new(flash: &'static MFlashType<'static>) -> Self {
        Self {
            flash,
            data_buffer: [0u8; 128],
        }
    }

    /// Store a serializable value
    pub async fn set<T>(&mut self, key: u16, value: &T) -> Result<(), ConfigStoreError>
    where
        T: for<'de> Deserialize<'de> + Serialize + for<'b> sequential_storage::map::Value<'b>,
    {
        debug!("Storing item with key: {}", key);

        let mut flash = self.flash.lock().await;

        store_item(
            &mut *flash,
            get_config_range(),
            &mut NoCache::new(),
            &mut self.data_buffer,
            &key,
            value,
        )
        .await
        .map_err(|e| {
            error!(
                "Failed to store item with key: {}: {}",
                key,
                defmt::Debug2Format(&e)
            );
            ConfigStoreError::from(e)
        })
    }

    // Retrieve a value or None if not found
    pub async fn get<T>(&mut self, key: u16) -> Result<Option<T>, ConfigStoreError>
    where
        T: for<'de> Deserialize<'de> + Serialize + for<'b> sequential_storage::map::Value<'b>,
    {
        debug!("Fetching item with key: {}", key);

        let mut flash = self.flash.lock().await;

        fetch_item(
            &mut *flash,
            get_config_range(),
            &mut NoCache::new(),
            &mut self.data_buffer,
            &key,
        )
        .await
        .map_err(|e| {
            error!(
                "Failed to fetch item with key: {}: {}",
                key,
                defmt::Debug2Format(&e)
            );
            ConfigStoreError::from(e)
        })
    }

    /// Read every stored setting into a snapshot. Missing or unreadable keys
    /// fall back to their defaults; the result is not validated.
    pub async fn load_snapshot(&mut self) -> WatchdogConfig {
        let mut stored = [None; Setting::ALL.len()];
        for setting in Setting::ALL {
            stored[setting.index() as usize] = match self.get::<u16>(config_key(setting)).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        "Using default for {}: {}",
                        setting.name(),
                        defmt::Debug2Format(&e)
                    );
                    None
                }
            };
        }
        WatchdogConfig::from_stored(|setting| stored[setting.index() as usize])
    }
}

/// Settings as they will be after the next boot. Host reads of the settings
/// registers see these values; the running session keeps the snapshot it
/// booted with.
static STORED_CONFIG: Mutex<CriticalSectionRawMutex, WatchdogConfig> =
    Mutex::new(WatchdogConfig::new());

pub async fn init_stored_config(snapshot: WatchdogConfig) {
    *STORED_CONFIG.lock().await = snapshot;
}

pub async fn get_stored_setting(setting: Setting) -> u16 {
    STORED_CONFIG.lock().await.get(setting)
}

/// Validate and queue a setting for writing. Takes effect at the next boot.
pub async fn set_stored_setting(setting: Setting, value: u16) -> Result<(), ConfigError> {
    STORED_CONFIG.lock().await.set(setting, value)?;
    CONFIG_WRITE_CHANNEL
        .send(SettingWrite { setting, value })
        .await;
    Ok(())
}

#[task]
pub async fn config_store_task(mut config_manager: ConfigManager) {
    info!("Starting config store task");

    let receiver = CONFIG_WRITE_CHANNEL.receiver();

    loop {
        let write = receiver.receive().await;
        debug!("Received setting write: {:?}", write);

        match config_manager
            .set(config_key(write.setting), &write.value)
            .await
        {
            Ok(()) => info!(
                "Stored {} = {} (applies after reboot)",
                write.setting.name(),
                write.value
            ),
            Err(e) => error!(
                "Failed to store {}: {}",
                write.setting.name(),
                defmt::Debug2Format(&e)
            ),
        }
    }
}
