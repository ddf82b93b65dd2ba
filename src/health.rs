//! Step count history
//!
//! The accelerometer only exposes a cumulative step counter. [`StepLog`]
//! turns periodic counter samples into "steps so far today" and keeps an
//! hourly profile of the last days to answer "how many steps do I usually
//! have by now".

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use heapless::Deque;

/// Number of finished days kept for averages
pub const HISTORY_DAYS: usize = 7;

const HOURS: usize = 24;

/// Point of the day an average refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPoint {
    /// Steps usually taken by this time of day
    At(NaiveTime),
    /// Steps usually taken over the whole day
    EndOfDay,
}

/// Source of activity metrics. `None` means the metric is unavailable.
pub trait HealthService {
    /// Steps taken since midnight
    fn steps_today(&self, now: NaiveDateTime) -> Option<u32>;

    /// Average steps by `point` over the recorded history
    fn average_steps(&self, now: NaiveDateTime, point: DayPoint) -> Option<u32>;
}

/// Cumulative steps at the end of each hour
type DayProfile = [u32; HOURS];

#[derive(Debug, Clone)]
struct Day {
    date: NaiveDate,
    /// Last raw counter value
    counter: u32,
    /// Steps since midnight
    steps: u32,
    /// Last hour a sample was recorded in
    hour: usize,
    profile: DayProfile,
}

impl Day {
    fn start(date: NaiveDate, hour: usize, counter: u32) -> Self {
        Self {
            date,
            counter,
            steps: 0,
            hour,
            profile: [0; HOURS],
        }
    }

    fn record(&mut self, hour: usize, counter: u32) {
        // A counter smaller than the last one means the sensor was reset
        let delta = match counter.checked_sub(self.counter) {
            Some(delta) => delta,
            None => counter,
        };
        self.counter = counter;
        self.steps = self.steps.saturating_add(delta);

        if hour > self.hour {
            let carried = self.profile[self.hour];
            for slot in &mut self.profile[self.hour + 1..hour] {
                *slot = carried;
            }
            self.hour = hour;
        }
        self.profile[self.hour] = self.steps;
    }

    /// Profile with all hours after the last sample filled in
    fn finish(mut self) -> DayProfile {
        let total = self.profile[self.hour];
        for slot in &mut self.profile[self.hour + 1..] {
            *slot = total;
        }
        self.profile
    }
}

/// Step history fed from a cumulative hardware step counter
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    today: Option<Day>,
    history: Deque<DayProfile, HISTORY_DAYS>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw counter sample taken at `now`
    pub fn record(&mut self, now: NaiveDateTime, counter: u32) {
        let date = now.date();
        let hour = now.hour() as usize;

        match self.today.take() {
            Some(mut day) if day.date == date => {
                day.record(hour, counter);
                self.today = Some(day);
            }
            Some(day) if day.date < date => {
                debug!("Archiving {} steps", day.steps);
                self.archive(day.finish());
                self.today = Some(Day::start(date, hour, counter));
            }
            // First sample, or the clock was set back to an earlier day
            _ => self.today = Some(Day::start(date, hour, counter)),
        }
    }

    fn archive(&mut self, profile: DayProfile) {
        if self.history.is_full() {
            self.history.pop_front();
        }
        // Room was made above
        let _ = self.history.push_back(profile);
    }

    /// Number of finished days available for averages
    pub fn days_recorded(&self) -> usize {
        self.history.len()
    }

    fn average_by(&self, value: impl Fn(&DayProfile) -> u32) -> Option<u32> {
        if self.history.is_empty() {
            return None;
        }
        let sum: u64 = self.history.iter().map(|profile| value(profile) as u64).sum();
        Some((sum / self.history.len() as u64) as u32)
    }
}

/// Steps of `profile` by `time`, interpolated inside the hour
fn steps_at(profile: &DayProfile, time: NaiveTime) -> u32 {
    let hour = time.hour() as usize;
    let before = if hour == 0 { 0 } else { profile[hour - 1] };
    let after = profile[hour];
    let secs = (time.minute() * 60 + time.second()) as u64;
    let within = after.saturating_sub(before) as u64 * secs / 3_600;
    before + within as u32
}

impl HealthService for StepLog {
    fn steps_today(&self, now: NaiveDateTime) -> Option<u32> {
        let day = self.today.as_ref()?;
        if day.date == now.date() {
            Some(day.steps)
        } else {
            // No sample since midnight yet
            Some(0)
        }
    }

    fn average_steps(&self, _now: NaiveDateTime, point: DayPoint) -> Option<u32> {
        match point {
            DayPoint::At(time) => self.average_by(|profile| steps_at(profile, time)),
            DayPoint::EndOfDay => self.average_by(|profile| profile[HOURS - 1]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(hour, min, 0)
            .unwrap()
    }

    fn time(hour: u32, min: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, min, 0).unwrap()
    }

    #[test]
    fn test_unavailable_without_samples() {
        let log = StepLog::new();
        assert_eq!(log.steps_today(at(1, 12, 0)), None);
        assert_eq!(log.average_steps(at(1, 12, 0), DayPoint::EndOfDay), None);
    }

    #[test]
    fn test_steps_today_counts_from_first_sample() {
        let mut log = StepLog::new();
        log.record(at(1, 8, 0), 5_000);
        log.record(at(1, 9, 0), 5_400);
        log.record(at(1, 10, 0), 6_000);
        assert_eq!(log.steps_today(at(1, 10, 0)), Some(1_000));
    }

    #[test]
    fn test_sensor_reset_keeps_counting() {
        let mut log = StepLog::new();
        log.record(at(1, 8, 0), 900);
        log.record(at(1, 9, 0), 1_000);
        log.record(at(1, 10, 0), 50);
        assert_eq!(log.steps_today(at(1, 10, 0)), Some(150));
    }

    #[test]
    fn test_new_day_starts_at_zero() {
        let mut log = StepLog::new();
        log.record(at(1, 8, 0), 0);
        log.record(at(1, 20, 0), 8_000);
        assert_eq!(log.steps_today(at(2, 0, 30)), Some(0));

        log.record(at(2, 7, 0), 8_100);
        assert_eq!(log.steps_today(at(2, 7, 0)), Some(0));
        assert_eq!(log.days_recorded(), 1);
        assert_eq!(log.average_steps(at(2, 7, 0), DayPoint::EndOfDay), Some(8_000));
    }

    #[test]
    fn test_average_interpolates_inside_hour() {
        let mut log = StepLog::new();
        // Day 1: 0 by 9:00, 1000 by the end of hour 9
        log.record(at(1, 8, 0), 0);
        log.record(at(1, 9, 59), 1_000);
        // Day 2: 2000 by the end of hour 9
        log.record(at(2, 8, 0), 1_000);
        log.record(at(2, 9, 59), 3_000);
        log.record(at(3, 0, 0), 3_000);

        assert_eq!(log.days_recorded(), 2);
        assert_eq!(
            log.average_steps(at(3, 0, 0), DayPoint::At(time(9, 30))),
            Some(750)
        );
        assert_eq!(
            log.average_steps(at(3, 0, 0), DayPoint::At(time(8, 0))),
            Some(0)
        );
        assert_eq!(
            log.average_steps(at(3, 0, 0), DayPoint::EndOfDay),
            Some(1_500)
        );
    }

    #[test]
    fn test_history_keeps_last_days() {
        let mut log = StepLog::new();
        for day in 1..=10 {
            log.record(at(day, 6, 0), 0);
            log.record(at(day, 22, 0), day * 100);
        }
        assert_eq!(log.days_recorded(), HISTORY_DAYS);
        // Days 3..=9 are archived, day 10 is still running
        assert_eq!(
            log.average_steps(at(10, 23, 0), DayPoint::EndOfDay),
            Some(600)
        );
    }
}
