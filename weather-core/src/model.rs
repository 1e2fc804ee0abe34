use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "zh-Hans";

/// Temperature unit accepted by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    C,
    F,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::C => "c",
            Unit::F => "f",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "c" => Ok(Unit::C),
            "f" => Ok(Unit::F),
            _ => Err(format!("Unknown unit '{value}'. Supported units: c, f.")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherRequest {
    pub location: String,
    pub language: String,
    pub unit: Unit,
}

impl WeatherRequest {
    /// Request with the default language and unit.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            language: DEFAULT_LANGUAGE.to_string(),
            unit: Unit::default(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }
}

/// Current conditions for one location, built fresh for every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Location exactly as requested.
    pub location: String,
    /// Display name reported by the provider, e.g. "北京".
    pub location_name: String,
    pub temperature: f64,
    pub condition: String,
    pub humidity: Option<f64>,
    /// Wind direction, e.g. "西北".
    pub wind: Option<String>,
    pub wind_speed: Option<f64>,
    pub wind_scale: Option<u8>,
    pub feels_like: Option<f64>,
    pub unit: Unit,
    pub observed_at: DateTime<Utc>,
}
