//! Touch controler module for PineTime

use cst816s::{TouchGesture, CST816S};
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_nrf::{
    gpio::{Input, Output},
    peripherals::{P0_10, P0_28},
    twim::{self, Twim},
};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

pub struct TouchController<TWI>
where
    TWI: twim::Instance,
{
    /// Touchpad instance
    touchpad: CST816S<
        I2cDevice<'static, NoopRawMutex, Twim<'static, TWI>>,
        Input<'static, P0_28>,
        Output<'static, P0_10>,
    >,
}

impl<TWI> TouchController<TWI>
where
    TWI: twim::Instance,
{
    /// Configure touch controller on boot
    pub fn init(
        twi: I2cDevice<'static, NoopRawMutex, Twim<'static, TWI>>,
        interrupt_pin: Input<'static, P0_28>,
        reset_pin: Output<'static, P0_10>,
    ) -> Self {
        Self {
            touchpad: CST816S::new(twi, interrupt_pin, reset_pin),
        }
    }

    /// Check for a new tap on the screen
    pub fn try_tap(&mut self) -> bool {
        match self.touchpad.read_one_touch_event(true) {
            Some(event) => matches!(
                event.gesture,
                TouchGesture::SingleClick | TouchGesture::DoubleClick
            ),
            None => false,
        }
    }
}
