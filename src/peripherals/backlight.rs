//! Backlight control
//!
//! Implementation based upon https://github.com/dbrgn/pinetime-rtic/blob/master/pinetime-rtic/src/backlight.rs
//! and https://wiki.pine64.org/wiki/PineTime.

use embassy_nrf::gpio::{AnyPin, Output};

/// Control the backlight.
///
/// There are three active-low backlight pins, each connected to a FET that
/// toggles backlight power through a resistor.
///
/// - Low: 2.2 kΩ
/// - Mid: 100 Ω
/// - High: 30 Ω
///
/// Through combinations of these pins, 7 brightness levels (+ off) can be
/// configured.
pub struct Backlight<'a> {
    low: Output<'a, AnyPin>,
    mid: Output<'a, AnyPin>,
    high: Output<'a, AnyPin>,
}

impl<'a> Backlight<'a> {
    /// Initialize the backlight switched off.
    pub fn init(low: Output<'a, AnyPin>, mid: Output<'a, AnyPin>, high: Output<'a, AnyPin>) -> Self {
        let mut backlight = Self { low, mid, high };
        backlight.off();
        backlight
    }

    /// Set the brightness level between 0 (off) and 7 (max brightness).
    pub fn set(&mut self, brightness: u8) -> Result<(), Error> {
        if brightness > 7 {
            return Err(Error::OutOfBounds);
        }
        defmt::debug!("Setting backlight brightness to {}", brightness);

        Self::drive(&mut self.low, brightness & 0x01 > 0);
        Self::drive(&mut self.mid, brightness & 0x02 > 0);
        Self::drive(&mut self.high, brightness & 0x04 > 0);

        Ok(())
    }

    // Pins are active low
    fn drive(pin: &mut Output<'a, AnyPin>, on: bool) {
        if on {
            pin.set_low();
        } else {
            pin.set_high();
        }
    }

    /// Turn off the backlight.
    pub fn off(&mut self) {
        Self::drive(&mut self.low, false);
        Self::drive(&mut self.mid, false);
        Self::drive(&mut self.high, false);
    }
}

#[derive(Debug, defmt::Format)]
pub enum Error {
    OutOfBounds,
}
