#![no_std]
#![no_main]

extern crate alloc;

use config::{FLASH_SIZE, HEAP_SIZE};
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::flash::Async;
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::watchdog::Watchdog;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_alloc::LlffHeap as Heap;
use static_cell::StaticCell;

#[global_allocator]
static HEAP: Heap = Heap::empty();

use defmt::{debug, error, info};
use embassy_time::{Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

mod config;
mod config_resources;
mod flash_layout;
mod tasks;

use crate::config_resources::{
    AssignedResources, ControlResources, I2CSecondaryResources, SensorResources,
};
use crate::tasks::config_manager::{ConfigManager, init_stored_config};

pub type FlashType<'a> =
    embassy_rp::flash::Flash<'a, embassy_rp::peripherals::FLASH, Async, FLASH_SIZE>;
pub type MFlashType<'a> = Mutex<NoopRawMutex, FlashType<'a>>;
static FLASH: StaticCell<MFlashType<'static>> = StaticCell::new();

// Runs the sampler above every thread-mode task
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // Initialize the allocator BEFORE you use it
    {
        use core::mem::MaybeUninit;
        static mut HEAP_MEM: [MaybeUninit<u8>; HEAP_SIZE] = [MaybeUninit::uninit(); HEAP_SIZE];
        unsafe { HEAP.init(&raw mut HEAP_MEM as usize, HEAP_SIZE) }
    }

    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    info!("Starting up...");

    let flash = embassy_rp::flash::Flash::<embassy_rp::peripherals::FLASH, Async, FLASH_SIZE>::new(
        p.FLASH, p.DMA_CH1,
    );
    let flash: &'static MFlashType = FLASH.init(Mutex::<NoopRawMutex, _>::new(flash));

    info!("Loading settings...");

    let mut config_manager = ConfigManager::new(flash);
    let settings = config_manager.load_snapshot().await;
    if let Err(e) = settings.validate() {
        error!("Invalid settings: {}", defmt::Display2Format(&e));
        panic!("Refusing to start with invalid settings");
    }
    info!("Settings: {:?}", settings);
    init_stored_config(settings).await;

    // Started only once the settings are known good, so a bad snapshot halts
    // instead of looping through resets
    let mut watchdog = Watchdog::new(p.WATCHDOG);
    watchdog.start(Duration::from_secs(config::HW_WATCHDOG_TIMEOUT_S));

    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    high_spawner
        .spawn(tasks::sampler::sampler_task(r.sensors))
        .unwrap();

    spawner
        .spawn(tasks::control_loop::control_loop_task(r.controls, settings))
        .unwrap();

    spawner
        .spawn(tasks::duty_cycle::duty_cycle_task(settings))
        .unwrap();

    match settings.update_interval() {
        Some(interval) => spawner
            .spawn(tasks::status_events::status_refresh_task(interval))
            .unwrap(),
        None => info!("Periodic status refresh disabled"),
    }

    spawner
        .spawn(tasks::config_manager::config_store_task(config_manager))
        .unwrap();

    spawner
        .spawn(tasks::i2c_secondary::i2c_secondary_task(r.i2cs))
        .unwrap();

    loop {
        Timer::after(Duration::from_secs(config::HW_WATCHDOG_FEED_INTERVAL_S)).await;

        watchdog.feed();

        let sensors = tasks::sampler::SENSORS.read_sensors();
        let status = *tasks::control_loop::STATUS.lock().await;
        debug!(
            "ct: {:?} | relay: {:?} | running: {:?} | alarm: {:?}",
            sensors, status.relay_on, status.running, status.alarm
        );
    }
}
