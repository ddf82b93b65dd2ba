//! Time keeping and clock formatting

use core::fmt::{self, Write};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use heapless::String;

/// Length of the Current Time Service characteristic value
pub const CURRENT_TIME_LEN: usize = 10;

/// Hour display preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockStyle {
    TwentyFourHour,
    TwelveHour,
}

/// Formatted `HH:MM`
pub type TimeText = String<5>;

/// Formatted `Sun 18 Oct`
pub type DateText = String<16>;

/// Format the time as `%H:%M` or `%I:%M`
pub fn format_time(time: &NaiveDateTime, style: ClockStyle) -> TimeText {
    let hour = match style {
        ClockStyle::TwentyFourHour => time.hour(),
        ClockStyle::TwelveHour => time.hour12().1,
    };
    let mut text = TimeText::new();
    // Two two-digit numbers and a colon always fit
    let _ = write!(text, "{:02}:{:02}", hour, time.minute());
    text
}

/// Format the date as `%a %d %b`
pub fn format_date(time: &NaiveDateTime) -> DateText {
    let mut text = DateText::new();
    let _ = write!(
        text,
        "{} {:02} {}",
        time.weekday(),
        time.day(),
        month_abbr(time.month0())
    );
    text
}

fn month_abbr(month0: u32) -> &'static str {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    MONTHS.get(month0 as usize).copied().unwrap_or("")
}

/// Wall clock anchored to the system uptime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeReference {
    /// Clock time
    time: NaiveDateTime,
    /// Uptime in milliseconds at which `time` was valid
    uptime_ms: u64,
}

impl Default for TimeReference {
    fn default() -> Self {
        Self {
            time: NaiveDateTime::UNIX_EPOCH,
            uptime_ms: 0,
        }
    }
}

impl TimeReference {
    /// Create new time reference from a known local time
    pub fn new(time: NaiveDateTime, uptime_ms: u64) -> Self {
        Self { time, uptime_ms }
    }

    /// Create new time reference from a UTC epoch and a UTC offset
    pub fn from_epoch(epoch_secs: i64, utc_offset_secs: i32, uptime_ms: u64) -> Self {
        let time = chrono::DateTime::from_timestamp(epoch_secs + utc_offset_secs as i64, 0)
            .map(|utc| utc.naive_utc())
            .unwrap_or(NaiveDateTime::UNIX_EPOCH);
        Self::new(time, uptime_ms)
    }

    /// Current time for the given uptime
    pub fn now(&self, uptime_ms: u64) -> NaiveDateTime {
        let elapsed = uptime_ms.saturating_sub(self.uptime_ms);
        self.time + Duration::milliseconds(elapsed as i64)
    }
}

/// Errors while reading a Current Time Service value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeError {
    /// Value shorter than the characteristic
    TooShort(usize),
    /// Fields do not form a valid date and time
    InvalidDateTime,
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeError::TooShort(len) => write!(f, "current time of {} bytes", len),
            TimeError::InvalidDateTime => write!(f, "invalid date or time"),
        }
    }
}

/// Read the `Current Time` characteristic (0x2A2B) of the Current Time Service
pub fn parse_current_time(bytes: &[u8]) -> Result<NaiveDateTime, TimeError> {
    if bytes.len() < CURRENT_TIME_LEN {
        return Err(TimeError::TooShort(bytes.len()));
    }

    let year = u16::from_le_bytes([bytes[0], bytes[1]]) as i32;
    let month = bytes[2] as u32;
    let day = bytes[3] as u32;
    let hour = bytes[4] as u32;
    let min = bytes[5] as u32;
    let sec = bytes[6] as u32;
    // bytes[7] is the day of week, implied by the date
    let milli = bytes[8] as u32 * 1000 / 256; // Convert fractions_256 to milliseconds

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_milli_opt(hour, min, sec, milli))
        .ok_or(TimeError::InvalidDateTime)
}
