//! Watch face configuration

use crate::clock::ClockStyle;

/// Daily step goal used when nothing else is configured
pub const DEFAULT_STEP_GOAL: u32 = 10_000;

/// Width of the step track on the 240px wide PineTime display
pub const DEFAULT_TRACK_WIDTH: u32 = 200;

/// User facing settings of the watch face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WatchConfig {
    /// 12 or 24 hour time display
    pub clock_style: ClockStyle,
    /// Offset of local time against UTC in seconds
    pub utc_offset_secs: i32,
    /// Step progress settings, `None` for the weather-only face
    pub steps: Option<StepConfig>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            clock_style: ClockStyle::TwentyFourHour,
            utc_offset_secs: 1 * 3_600,
            steps: Some(StepConfig::default()),
        }
    }
}

impl WatchConfig {
    /// Weather-only face without the step track
    pub fn weather_only() -> Self {
        Self {
            steps: None,
            ..Self::default()
        }
    }
}

/// Step progress track settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepConfig {
    /// Daily step goal
    pub goal: u32,
    /// Track width in pixels
    pub track_width: u32,
    /// Hide the whole track while the step count is unavailable instead of
    /// drawing it with a count of zero
    pub hide_when_unavailable: bool,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            goal: DEFAULT_STEP_GOAL,
            track_width: DEFAULT_TRACK_WIDTH,
            hide_when_unavailable: false,
        }
    }
}
