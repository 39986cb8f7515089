//! Core library for the `weatherflow` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - A client for the WeatherFlow Smart Weather REST API (station lookup, current conditions,
//!   forecast)
//! - Decoding of the vendor's positional observation rows
//! - Rain history: rolling windows, month/year to date and the current wet spell
//!
//! It is used by `weatherflow-cli`, but can also be reused by other binaries or services.

pub mod client;
pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod observation;
pub mod transport;
pub mod units;

#[cfg(test)]
mod testing;

pub use client::{ObservationResult, WeatherFlowClient};
pub use config::Config;
pub use error::WeatherFlowError;
pub use history::HistoryStep;
pub use model::{
    ClientState, CurrentConditions, ForecastSummary, HistoryRecord, StationMeta, WeatherData,
};
pub use observation::{DecodeError, NormalizedObservation, ObservationLayout, decode};
pub use transport::{HttpTransport, Transport};
