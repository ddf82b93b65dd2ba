//! Display control module for PineTime

use embassy_nrf::{
    gpio::Output,
    peripherals::{P0_18, P0_25, P0_26},
    spim::{self, Spim},
};

use display_interface_spi::SPIInterface;
use embassy_time::Delay;
use mipidsi::{models::ST7789, Builder, Orientation};

use pinetime_weather::{
    app::FaceState,
    ui::{WatchFace, LCD_H, LCD_W},
};

use super::backlight::{self, Backlight};

type Lcd<'a, SPI> = mipidsi::Display<
    SPIInterface<Spim<'a, SPI>, Output<'a, P0_18>, Output<'a, P0_25>>,
    ST7789,
    Output<'a, P0_26>,
>;

pub struct Display<SPI>
where
    SPI: spim::Instance,
{
    /// LCD driver
    lcd: Lcd<'static, SPI>,
    /// Backlight pins
    backlight: Backlight<'static>,
}

impl<SPI> Display<SPI>
where
    SPI: spim::Instance,
{
    /// Configure display settings on boot
    pub fn init(
        spim: Spim<'static, SPI>,
        cs_pin: Output<'static, P0_25>,
        dc_pin: Output<'static, P0_18>,
        rst_pin: Output<'static, P0_26>,
        backlight: Backlight<'static>,
    ) -> Result<Self, mipidsi::Error> {
        let lcd = Builder::st7789(SPIInterface::new(spim, dc_pin, cs_pin))
            .with_display_size(LCD_W as u16, LCD_H as u16)
            .with_orientation(Orientation::Portrait(false))
            .init(&mut Delay, Some(rst_pin))?;

        Ok(Self { lcd, backlight })
    }

    /// Set the backlight brightness (0–7)
    pub fn set_brightness(&mut self, level: u8) -> Result<(), backlight::Error> {
        self.backlight.set(level)
    }

    /// Redraw the whole watch face
    pub fn draw<F>(&mut self, face: &F, state: &FaceState) -> Result<(), mipidsi::Error>
    where
        F: WatchFace,
    {
        face.draw(state, &mut self.lcd)
    }
}
