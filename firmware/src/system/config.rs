//! General system configuration

use embassy_nrf::{
    config::{Config, Debug, HfclkSource, LfclkSource},
    interrupt::Priority,
};
use embassy_time::Duration;
use lightswitch::{DimConfig, DimMode, Direction, EventPolicy, PullMode};

/// Light switch behaviour
pub const DIM_CONFIG: DimConfig = DimConfig {
    dim_mode: DimMode::Hold,
    level_count: 7,
    direction: Direction::Up,
    long_press_threshold: Duration::from_millis(1500),
    brightness_exponent: Some(2.2),
    // Edges from the button sampler are already debounced
    bounce_window: Duration::from_ticks(0),
    event_policy: EventPolicy::Press,
    // The side button drives the pin high when pressed
    pull: PullMode::DownExternal,
};

/// Start of the SPI flash sector holding the last dim level (last 4 KiB
/// sector of the 4 MiB XT25F32B)
pub const LEVEL_SECTOR: u32 = 0x003F_F000;

/// PWM counts per period, 16 kHz at the undivided 16 MHz clock
pub const PWM_MAX_DUTY: u16 = 1_000;

/// The light is switched by a P-FET and lights up while the pin is low
pub const LIGHT_ACTIVE_LOW: bool = true;

pub struct SystemConfig {}

impl SystemConfig {
    /// Create new system configuration
    pub fn new() -> Config {
        // Generate default config, required because Config is set as
        // `non_exhaustive`
        let mut config = Config::default();

        // Set high-frequency and low-frequency clock sources to external
        config.hfclk_source = HfclkSource::ExternalXtal;
        config.lfclk_source = LfclkSource::ExternalXtal;

        // Enable DC/DC regulator to massively reduce runtime current consumption
        config.dcdc.reg1 = true;

        // Button polling and the hold timer must preempt the flash writer
        config.gpiote_interrupt_priority = Priority::P2;
        config.time_interrupt_priority = Priority::P2;

        // Allow debugging
        config.debug = Debug::Allowed;

        config
    }
}
