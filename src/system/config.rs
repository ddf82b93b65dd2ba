//! Board configuration for the firmware

use embassy_nrf::{
    config::{Config, Debug, HfclkSource, LfclkSource},
    interrupt::Priority,
};

/// Backlight level used while the face is shown (0–7)
pub const BACKLIGHT_LEVEL: u8 = 3;

/// Interval between two step counter samples
pub const STEP_SAMPLE_SECS: u64 = 60;

/// Priority of the TWIM and SPIM interrupts.
///
/// Priorities 0, 1 and 4 belong to the SoftDevice.
pub const PERIPHERAL_PRIORITY: Priority = Priority::P3;

/// Chip configuration handed to `embassy_nrf::init`
pub fn chip_config() -> Config {
    // Config is `non_exhaustive`, start from the defaults
    let mut config = Config::default();

    // The PineTime has both a 32 MHz and a 32.768 kHz crystal
    config.hfclk_source = HfclkSource::ExternalXtal;
    config.lfclk_source = LfclkSource::ExternalXtal;

    // DC/DC regulator cuts runtime current consumption
    config.dcdc.reg1 = true;

    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;

    config.debug = Debug::Allowed;

    config
}
