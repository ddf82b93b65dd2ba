//! Weather watch face for the PineTime
//!
//! Hardware independent part of the firmware: weather sync with the companion
//! device, step progress, clock formatting and drawing. The firmware binary in
//! `main.rs` feeds peripheral events into [`app::WatchApp`] and draws the
//! result with [`ui::WeatherWatchface`].

#![no_std]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod app;
pub mod bma421;
pub mod clock;
pub mod companion;
pub mod config;
pub mod health;
pub mod steps;
pub mod ui;
pub mod weather;
