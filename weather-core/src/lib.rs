//! Core library for the Seniverse weather service.
//!
//! This crate defines:
//! - Configuration (file + environment) and the error taxonomy
//! - The Seniverse client behind the [`WeatherProvider`] trait
//! - Shared domain models (requests, records)
//!
//! It is used by `weather-server`, but handlers only depend on the trait so
//! they can be exercised against stubs.

pub mod config;
pub mod error;
pub mod model;
pub mod provider;

pub use config::{Config, SeniverseConfig, ServerConfig};
pub use error::WeatherError;
pub use model::{Unit, WeatherRecord, WeatherRequest};
pub use provider::{WeatherProvider, provider_from_config, seniverse::SeniverseProvider};
