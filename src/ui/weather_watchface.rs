//! Weather watchface

use embedded_graphics::{
    geometry::Point,
    mono_font::{
        iso_8859_1::{FONT_10X20, FONT_6X10},
        MonoTextStyle,
    },
    pixelcolor::RgbColor,
    prelude::*,
    primitives::{Line, PrimitiveStyle},
    text::{Alignment, Text},
};
use heapless::String;
use profont::PROFONT_24_POINT;

use super::{ColorMode, WatchFace, LCD_W};
use crate::{
    app::FaceState,
    steps::{DrawCommand, StepProgressRenderer, TrackColor},
};

const BACKGROUND_COLOR: ColorMode = ColorMode::BLACK;
const TEXT_COLOR: ColorMode = ColorMode::WHITE;
const TRACK_BASE_COLOR: ColorMode = ColorMode::new(8, 16, 8);
const TRACK_PROGRESS_COLOR: ColorMode = ColorMode::YELLOW;
const TRACK_SUCCESS_COLOR: ColorMode = ColorMode::GREEN;

const TRACK_Y: i32 = 210;
const TRACK_STROKE: u32 = 3;
const TICK_HALF_HEIGHT: i32 = 6;

/// Marks text cut to the width of the screen
const ELLIPSIS: &str = "...";
/// Room for a full screen line of 4-byte chars
const FITTED_LEN: usize = 160;

/// Cut `text` to `max_chars`, ending the cut text with [`ELLIPSIS`]
fn fit<'a>(text: &'a str, max_chars: usize, buf: &'a mut String<FITTED_LEN>) -> &'a str {
    if text.chars().count() <= max_chars {
        return text;
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let end = text.char_indices().nth(keep).map_or(text.len(), |(i, _)| i);

    buf.clear();
    if buf.push_str(text[..end].trim_end()).is_err() || buf.push_str(ELLIPSIS).is_err() {
        return text;
    }
    buf.as_str()
}

/// Single line of centred text
pub struct Label {
    /// Centre of the text baseline
    position: Point,
    style: MonoTextStyle<'static, ColorMode>,
    /// Glyphs that fit across the screen
    max_chars: usize,
}

impl Label {
    /// Create new label
    fn new(position: Point, style: MonoTextStyle<'static, ColorMode>) -> Self {
        let advance = style.font.character_size.width + style.font.character_spacing;
        Self {
            position,
            style,
            max_chars: (LCD_W / advance) as usize,
        }
    }

    fn draw<D>(&self, text: &str, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = ColorMode>,
    {
        let mut buf = String::new();
        let text = fit(text, self.max_chars, &mut buf);
        Text::with_alignment(text, self.position, self.style, Alignment::Center).draw(target)?;
        Ok(())
    }
}

/// Step track below the weather
pub struct StepTrack {
    /// Left end of the track
    origin: Point,
    renderer: StepProgressRenderer,
    goal_label: Label,
}

impl StepTrack {
    fn new(renderer: StepProgressRenderer) -> Self {
        let left = (LCD_W.saturating_sub(renderer.track_width()) / 2) as i32;
        Self {
            origin: Point::new(left, TRACK_Y),
            renderer,
            goal_label: Label::new(
                Point::new(LCD_W as i32 / 2, TRACK_Y + 20),
                MonoTextStyle::new(&FONT_6X10, TRACK_SUCCESS_COLOR),
            ),
        }
    }

    fn color(color: TrackColor) -> ColorMode {
        match color {
            TrackColor::Base => TRACK_BASE_COLOR,
            TrackColor::Progress => TRACK_PROGRESS_COLOR,
            TrackColor::Success => TRACK_SUCCESS_COLOR,
        }
    }

    fn draw<D>(&self, state: &FaceState, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = ColorMode>,
    {
        let Some(progress) = state.steps else {
            return Ok(());
        };

        for command in self.renderer.render(&progress) {
            match command {
                // A zero length line would still leave a dot
                DrawCommand::Track { to: 0, .. } => {}
                DrawCommand::Track { to, color } => {
                    Line::new(self.origin, self.origin + Point::new(to as i32, 0))
                        .into_styled(PrimitiveStyle::with_stroke(Self::color(color), TRACK_STROKE))
                        .draw(target)?;
                }
                DrawCommand::Tick { x } => {
                    let x = self.origin.x + x as i32;
                    Line::new(
                        Point::new(x, TRACK_Y - TICK_HALF_HEIGHT),
                        Point::new(x, TRACK_Y + TICK_HALF_HEIGHT),
                    )
                    .into_styled(PrimitiveStyle::with_stroke(TEXT_COLOR, 1))
                    .draw(target)?;
                }
                DrawCommand::GoalReached { steps } => {
                    let mut buf = [0u8; 24];
                    match format_no_std::show(&mut buf, format_args!("Goal! {} steps", steps)) {
                        Ok(text) => self.goal_label.draw(text, target)?,
                        Err(_) => warn!("Goal label does not fit"),
                    }
                }
            }
        }

        Ok(())
    }
}

/// Time, date, weather and city with an optional step track
pub struct WeatherWatchface {
    /// Date label
    pub date_label: Label,
    /// Time label
    pub time_label: Label,
    /// Temperature and description label
    pub weather_label: Label,
    /// City label
    pub city_label: Label,
    /// Step progress, only on the step variant
    pub step_track: Option<StepTrack>,
}

impl WeatherWatchface {
    pub fn new(renderer: Option<StepProgressRenderer>) -> Self {
        let centre = LCD_W as i32 / 2;

        Self {
            date_label: Label::new(
                Point::new(centre, 40),
                MonoTextStyle::new(&FONT_10X20, TEXT_COLOR),
            ),
            time_label: Label::new(
                Point::new(centre, 105),
                MonoTextStyle::new(&PROFONT_24_POINT, TEXT_COLOR),
            ),
            weather_label: Label::new(
                Point::new(centre, 155),
                MonoTextStyle::new(&FONT_10X20, TEXT_COLOR),
            ),
            city_label: Label::new(
                Point::new(centre, 180),
                MonoTextStyle::new(&FONT_6X10, TEXT_COLOR),
            ),
            step_track: renderer.map(StepTrack::new),
        }
    }
}

impl WatchFace for WeatherWatchface {
    fn draw<D>(&self, state: &FaceState, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = ColorMode>,
    {
        target.clear(BACKGROUND_COLOR)?;

        self.date_label.draw(&state.date, target)?;
        self.time_label.draw(&state.time, target)?;
        self.weather_label.draw(&state.weather, target)?;
        self.city_label.draw(&state.city, target)?;

        if let Some(track) = &self.step_track {
            track.draw(state, target)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::{steps::StepProgress, ui::LCD_H};
    use core::convert::Infallible;
    use embedded_graphics::{geometry::Size, Pixel};
    use heapless::String;
    use std::{vec, vec::Vec};

    /// Frame buffer for drawing on the host
    struct Frame {
        pixels: Vec<ColorMode>,
    }

    impl Frame {
        fn new() -> Self {
            Self {
                pixels: vec![ColorMode::RED; (LCD_W * LCD_H) as usize],
            }
        }

        fn at(&self, x: i32, y: i32) -> ColorMode {
            self.pixels[(y as u32 * LCD_W + x as u32) as usize]
        }

        fn count(&self, color: ColorMode) -> usize {
            self.pixels.iter().filter(|&&pixel| pixel == color).count()
        }
    }

    impl OriginDimensions for Frame {
        fn size(&self) -> Size {
            Size::new(LCD_W, LCD_H)
        }
    }

    impl DrawTarget for Frame {
        type Color = ColorMode;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(point, color) in pixels {
                if point.x >= 0 && point.y >= 0 && point.x < LCD_W as i32 && point.y < LCD_H as i32
                {
                    self.pixels[(point.y as u32 * LCD_W + point.x as u32) as usize] = color;
                }
            }
            Ok(())
        }
    }

    fn text<const N: usize>(value: &str) -> String<N> {
        String::try_from(value).unwrap()
    }

    fn state(steps: Option<StepProgress>) -> FaceState {
        FaceState {
            time: text("13:05"),
            date: text("Sun 18 Oct"),
            weather: text("12C Rain"),
            city: text("Berlin"),
            steps,
        }
    }

    #[test]
    fn test_fit_keeps_short_text() {
        let mut buf = String::new();
        assert_eq!(fit("12C Rain", 24, &mut buf), "12C Rain");
        assert_eq!(fit("", 24, &mut buf), "");
    }

    #[test]
    fn test_fit_cuts_long_text() {
        let mut buf = String::new();
        let long = "7C Heavy thunderstorm with hail";
        let fitted = fit(long, 24, &mut buf);
        assert_eq!(fitted, "7C Heavy thunderstorm...");
        assert_eq!(fitted.chars().count(), 24);
    }

    #[test]
    fn test_fit_counts_chars_not_bytes() {
        let mut buf = String::new();
        // 24 two-byte chars fit exactly
        let exact: std::string::String = core::iter::repeat('é').take(24).collect();
        assert_eq!(fit(&exact, 24, &mut buf), exact.as_str());

        let long: std::string::String = core::iter::repeat('é').take(30).collect();
        let fitted = fit(&long, 24, &mut buf);
        assert_eq!(fitted.chars().count(), 24);
        assert!(fitted.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_weather_label_fits_the_screen() {
        let face = WeatherWatchface::new(None);
        assert_eq!(face.weather_label.max_chars, 24);
        assert_eq!(face.city_label.max_chars, 40);

        let mut long = state(None);
        long.weather = text("21C Scattered clouds with a chance of light rain in the evening");
        let mut frame = Frame::new();
        face.draw(&long, &mut frame).unwrap();

        let mut cut = state(None);
        cut.weather = text("21C Scattered clouds...");
        let mut expected = Frame::new();
        face.draw(&cut, &mut expected).unwrap();

        assert!(frame.pixels == expected.pixels);
    }

    #[test]
    fn test_draws_text_on_black() {
        let face = WeatherWatchface::new(None);
        let mut frame = Frame::new();
        face.draw(&state(None), &mut frame).unwrap();

        assert_eq!(frame.count(ColorMode::RED), 0);
        assert_eq!(frame.at(0, 0), BACKGROUND_COLOR);
        assert!(frame.count(TEXT_COLOR) > 0);
        // No track on the weather-only face
        assert_eq!(frame.count(TRACK_BASE_COLOR), 0);
    }

    #[test]
    fn test_draws_progress_track() {
        let face = WeatherWatchface::new(Some(StepProgressRenderer::new(10_000, 200)));
        let mut frame = Frame::new();
        let steps = StepProgress {
            current: 5_000,
            average_now: 0,
            average_eod: 0,
        };
        face.draw(&state(Some(steps)), &mut frame).unwrap();

        // Track spans x = 20..=220
        assert_eq!(frame.at(70, TRACK_Y), TRACK_PROGRESS_COLOR);
        assert_eq!(frame.at(170, TRACK_Y), TRACK_BASE_COLOR);
        assert_eq!(frame.count(TRACK_SUCCESS_COLOR), 0);
    }

    #[test]
    fn test_draws_goal_reached() {
        let face = WeatherWatchface::new(Some(StepProgressRenderer::new(10_000, 200)));
        let mut frame = Frame::new();
        let steps = StepProgress {
            current: 12_000,
            average_now: 4_000,
            average_eod: 8_000,
        };
        face.draw(&state(Some(steps)), &mut frame).unwrap();

        assert_eq!(frame.at(170, TRACK_Y), TRACK_SUCCESS_COLOR);
        // No pace ticks once the goal is exceeded
        assert_eq!(frame.at(100, TRACK_Y - TICK_HALF_HEIGHT), BACKGROUND_COLOR);
    }

    #[test]
    fn test_draws_pace_ticks() {
        let face = WeatherWatchface::new(Some(StepProgressRenderer::new(10_000, 200)));
        let mut frame = Frame::new();
        let steps = StepProgress {
            current: 1_000,
            average_now: 4_000,
            average_eod: 8_000,
        };
        face.draw(&state(Some(steps)), &mut frame).unwrap();

        assert_eq!(frame.at(100, TRACK_Y - TICK_HALF_HEIGHT), TEXT_COLOR);
        assert_eq!(frame.at(180, TRACK_Y + TICK_HALF_HEIGHT), TEXT_COLOR);
    }
}
