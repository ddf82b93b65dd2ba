//! Accelerometer module for PineTime
//!
//! The PineTime carries a BMA421 on the shared I2C bus. Only its step counter
//! is used.

use embassy_time::Delay;
use embedded_hal::i2c::ErrorType;
use pinetime_weather::bma421::{Bma421, Error};

use crate::SharedI2c;

/// Vendor feature engine config, empty unless `BMA421_CONFIG` was set at build time
static FEATURE_CONFIG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/bma421_config.bin"));

pub type Accelerometer = Bma421<SharedI2c>;

type BusError = <SharedI2c as ErrorType>::Error;

/// Bring up the step counter
pub fn init(i2c: SharedI2c) -> Result<Accelerometer, Error<BusError>> {
    if FEATURE_CONFIG.is_empty() {
        defmt::debug!("No BMA421 feature config bundled");
    }
    Bma421::init(i2c, &mut Delay, FEATURE_CONFIG)
}
