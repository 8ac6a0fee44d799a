#![no_std]
#![no_main]

mod peripherals;
mod system;

// Panic handler and debugging
use defmt::unwrap;

use defmt_rtt as _;
use panic_probe as _;

// Device
use core::cell::RefCell;
use embassy_embedded_hal::shared_bus::blocking::spi::SpiDevice;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_nrf::{
    bind_interrupts,
    gpio::{AnyPin, Input, Level, Output, OutputDrive, Pin, Pull},
    interrupt,
    interrupt::{InterruptExt, Priority},
    peripherals::SPI2,
    pwm::SimplePwm,
    spim::{self, Spim},
};
use embassy_sync::{
    blocking_mutex::{
        raw::{CriticalSectionRawMutex, NoopRawMutex},
        Mutex,
    },
    signal::Signal,
};
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    SPIM2_SPIS2_SPI2 => spim::InterruptHandler<SPI2>;
});

// Crate
use lightswitch::{persist_levels, restore_level, Controller, DimMode, Edge, FlashLevelStore};
use peripherals::{button::Button, light::Light, spi_flash::Flash};
use system::config::{self, SystemConfig, DIM_CONFIG};

type SpiBus = Mutex<NoopRawMutex, RefCell<Spim<'static, SPI2>>>;
type LevelFlash = FlashLevelStore<Flash<SpiDevice<'static, NoopRawMutex, Spim<'static, SPI2>, Output<'static, AnyPin>>>>;

// Communication channels
static PENDING_LEVEL: Signal<CriticalSectionRawMutex, u8> = Signal::new();

static SPI_BUS: StaticCell<SpiBus> = StaticCell::new();

/// Runs the light switch above the thread mode executor, so a blocking flash
/// erase never delays button handling
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI0_EGU0() {
    EXECUTOR_HIGH.on_interrupt()
}

/// Turn button edges into light output.
#[embassy_executor::task(pool_size = 1)]
async fn switch_light(
    mut controller: Controller<'static, CriticalSectionRawMutex, Light<'static>>,
    mut button: Button,
) {
    controller.run(&mut button).await
}

/// Write dim levels to flash as they change.
#[embassy_executor::task(pool_size = 1)]
async fn persist(mut store: LevelFlash) {
    persist_levels(&PENDING_LEVEL, &mut store).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_nrf::init(SystemConfig::new());
    defmt::info!("Initializing");

    // Initialize SPI
    let mut spim_config = spim::Config::default();
    // Use SPI at 8MHz (the fastest clock available on the nRF52832)
    spim_config.frequency = spim::Frequency::M8;
    // SPI must be used in mode 3. Mode 0 (the default) won't work.
    spim_config.mode = spim::MODE_3;

    let spim = Spim::new(p.SPI2, Irqs, p.P0_02, p.P0_04, p.P0_03, spim_config);
    let spi_bus = SPI_BUS.init(Mutex::new(RefCell::new(spim)));

    // Initialize flash
    let flash_cs = Output::new(p.P0_05.degrade(), Level::High, OutputDrive::Standard);
    let mut flash = Flash::init(SpiDevice::new(spi_bus, flash_cs));
    match flash.wake_and_read_id() {
        Ok(id) => defmt::info!("SPI flash id {=u8:#x}", id),
        Err(_) => defmt::warn!("SPI flash not responding"),
    }

    let mut store = match FlashLevelStore::new(flash, config::LEVEL_SECTOR) {
        Ok(store) => Some(store),
        Err(error) => {
            defmt::warn!("Dim level will not be stored: {}", error);
            None
        }
    };
    let restored = match (&mut store, DIM_CONFIG.dim_mode) {
        (Some(store), DimMode::Hold) => restore_level(store),
        _ => 0,
    };

    // Initialize light
    let light = Light::init(
        SimplePwm::new_1ch(p.PWM0, p.P0_14),
        config::PWM_MAX_DUTY,
        config::LIGHT_ACTIVE_LOW,
    );

    // Initialize button
    let pull = match DIM_CONFIG.pull.internal_pull() {
        Some(true) => Pull::Up,
        Some(false) => Pull::Down,
        None => Pull::None,
    };
    let button = Button::init(
        Input::new(p.P0_13.degrade(), pull),
        Output::new(p.P0_15.degrade(), Level::Low, OutputDrive::Standard),
        DIM_CONFIG.pull.pressed_edge() == Edge::Falling,
    );

    let controller = match Controller::new(&DIM_CONFIG, restored, light, &PENDING_LEVEL) {
        Ok(controller) => controller,
        Err(error) => {
            defmt::error!("Invalid light switch configuration: {}", error);
            return;
        }
    };

    defmt::info!("Initialization finished");

    // Schedule tasks
    interrupt::SWI0_EGU0.set_priority(Priority::P6);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::SWI0_EGU0);
    unwrap!(high_spawner.spawn(switch_light(controller, button)));
    if let Some(store) = store {
        unwrap!(spawner.spawn(persist(store)));
    }
}
