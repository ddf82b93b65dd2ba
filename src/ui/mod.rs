//! UI definitions module
//! Based on: https://github.com/lupyuen/pinetime-watchface/blob/master/src/lib.rs

use embedded_graphics::{draw_target::DrawTarget, pixelcolor::Rgb565};

use crate::app::FaceState;

mod weather_watchface;

pub use weather_watchface::WeatherWatchface;

/// Colour format of the PineTime LCD
pub type ColorMode = Rgb565;

/// Display width in pixels
pub const LCD_W: u32 = 240;
/// Display height in pixels
pub const LCD_H: u32 = 240;

pub trait WatchFace {
    /// Draw the whole face for `state`
    fn draw<D>(&self, state: &FaceState, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = ColorMode>;
}
