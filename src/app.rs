//! Watch face application state
//!
//! [`WatchApp`] owns everything the face shows. The event loop hands it one
//! [`Event`] at a time; each call runs to completion and may mark the face
//! dirty or ask for a message to the companion device.

use chrono::{NaiveDateTime, Timelike};
use heapless::Vec;

use crate::{
    clock::{self, DateText, TimeReference, TimeText},
    companion::{
        self, Dictionary, DroppedMessages, TransportError, TupleValue, INBOX_CAPACITY,
        OUTBOX_CAPACITY,
    },
    config::WatchConfig,
    health::{DayPoint, HealthService, StepLog},
    steps::{StepProgress, StepProgressRenderer},
    weather::{FieldText, RenderedLabel, SyncOutput, WeatherField, WeatherSyncState},
};

/// Input of the watch face
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Periodic clock tick
    Tick,
    /// Tap gesture on the watch
    Tap,
    /// Message from the companion device
    Inbox(Vec<u8, INBOX_CAPACITY>),
    /// A message from the companion device was lost
    InboxDropped(TransportError),
    /// New local time from the companion device
    SetTime(NaiveDateTime),
    /// Raw reading of the hardware step counter
    StepCounter(u32),
}

/// Request to the companion device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Ask for a fresh weather push
    RefreshWeather(Vec<u8, OUTBOX_CAPACITY>),
}

/// Texts and values currently on the face
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceState {
    pub time: TimeText,
    pub date: DateText,
    pub weather: RenderedLabel,
    pub city: FieldText,
    /// `None` hides the step track
    pub steps: Option<StepProgress>,
}

/// Watch face application
pub struct WatchApp {
    config: WatchConfig,
    reference: TimeReference,
    weather: WeatherSyncState,
    step_log: StepLog,
    renderer: Option<StepProgressRenderer>,
    face: FaceState,
    /// Minute of the last step refresh
    minute: Option<u32>,
    dirty: bool,
}

/// Step track values from `health`, `None` when the track is hidden
pub fn step_progress(
    health: &impl HealthService,
    now: NaiveDateTime,
    hide_when_unavailable: bool,
) -> Option<StepProgress> {
    let current = match health.steps_today(now) {
        Some(steps) => steps,
        None if hide_when_unavailable => return None,
        None => 0,
    };

    Some(StepProgress {
        current,
        average_now: health
            .average_steps(now, DayPoint::At(now.time()))
            .unwrap_or(0),
        average_eod: health.average_steps(now, DayPoint::EndOfDay).unwrap_or(0),
    })
}

impl WatchApp {
    /// Set up the face and show the current time right away
    pub fn new(config: WatchConfig, reference: TimeReference, uptime_ms: u64) -> Self {
        let renderer = config
            .steps
            .map(|steps| StepProgressRenderer::new(steps.goal, steps.track_width));

        let weather = WeatherSyncState::new();
        let mut app = Self {
            config,
            reference,
            face: FaceState {
                time: TimeText::new(),
                date: DateText::new(),
                // Placeholder until the companion device reports
                weather: weather.label(),
                city: FieldText::new(),
                steps: None,
            },
            weather,
            step_log: StepLog::new(),
            renderer,
            minute: None,
            dirty: true,
        };

        app.update_time(uptime_ms);
        app
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn face(&self) -> &FaceState {
        &self.face
    }

    pub fn weather(&self) -> &WeatherSyncState {
        &self.weather
    }

    /// Current local time
    pub fn now(&self, uptime_ms: u64) -> NaiveDateTime {
        self.reference.now(uptime_ms)
    }

    /// Whether the face changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        core::mem::replace(&mut self.dirty, false)
    }

    /// Turn messages lost on the way in into transport errors
    pub fn drain_dropped(&mut self, dropped: &DroppedMessages, uptime_ms: u64) {
        for _ in 0..dropped.take() {
            self.handle(Event::InboxDropped(TransportError::QueueFull), uptime_ms);
        }
    }

    /// Handle a single event
    pub fn handle(&mut self, event: Event, uptime_ms: u64) -> Option<Outbound> {
        match event {
            Event::Tick => self.update_time(uptime_ms),
            Event::Tap => return self.request_refresh(),
            Event::Inbox(message) => self.receive(&message),
            Event::InboxDropped(error) => self.weather.apply_transport_error(error),
            Event::SetTime(time) => {
                info!("Clock set");
                self.reference = TimeReference::new(time, uptime_ms);
                self.minute = None;
                self.update_time(uptime_ms);
            }
            Event::StepCounter(counter) => {
                let now = self.now(uptime_ms);
                self.step_log.record(now, counter);
                self.update_steps(now);
            }
        }
        None
    }

    fn update_time(&mut self, uptime_ms: u64) {
        let now = self.now(uptime_ms);
        let time = clock::format_time(&now, self.config.clock_style);
        let date = clock::format_date(&now);

        if time != self.face.time || date != self.face.date {
            self.face.time = time;
            self.face.date = date;
            self.dirty = true;
        }

        let minute = now.hour() * 60 + now.minute();
        if self.minute != Some(minute) {
            self.minute = Some(minute);
            self.update_steps(now);
        }
    }

    fn request_refresh(&mut self) -> Option<Outbound> {
        info!("Tap, requesting weather");
        let mut buf = [0u8; OUTBOX_CAPACITY];
        match companion::refresh_request(&mut buf) {
            Ok(message) => Vec::from_slice(message).ok().map(Outbound::RefreshWeather),
            Err(error) => {
                error!("Could not encode refresh request: {}", error);
                None
            }
        }
    }

    fn receive(&mut self, message: &[u8]) {
        if let Err(error) = self.apply_message(message) {
            self.weather.apply_transport_error(error);
        }
    }

    fn apply_message(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let dictionary = Dictionary::parse(message)?;
        debug!("Sync message with {} tuples", dictionary.len());

        for tuple in dictionary.iter() {
            let tuple = tuple?;
            let Some(field) = WeatherField::from_key(tuple.key) else {
                debug!("Ignoring key {}", tuple.key);
                continue;
            };
            let value = match tuple.value {
                TupleValue::CString(value) | TupleValue::Bytes(value) => value,
                _ => return Err(TransportError::UnexpectedType { key: tuple.key }),
            };

            match self.weather.apply_update(field, value) {
                SyncOutput::Weather(label) => self.set_weather(label),
                SyncOutput::City(city) => self.set_city(city),
            }
        }
        Ok(())
    }

    fn set_weather(&mut self, label: RenderedLabel) {
        if label != self.face.weather {
            self.face.weather = label;
            self.dirty = true;
        }
    }

    fn set_city(&mut self, city: FieldText) {
        if city != self.face.city {
            self.face.city = city;
            self.dirty = true;
        }
    }

    fn update_steps(&mut self, now: NaiveDateTime) {
        let Some(config) = self.config.steps else {
            return;
        };
        let steps = step_progress(&self.step_log, now, config.hide_when_unavailable);

        if steps != self.face.steps {
            trace!("Step progress changed");
            self.face.steps = steps;
            self.dirty = true;
        }
    }

    /// Renderer for the step track, `None` for the weather-only face
    pub fn step_renderer(&self) -> Option<&StepProgressRenderer> {
        self.renderer.as_ref()
    }
}
