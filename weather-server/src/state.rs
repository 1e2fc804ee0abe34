//! Application state shared across handlers

use std::sync::Arc;

use weather_core::{SeniverseConfig, Unit, WeatherProvider, WeatherRequest};

use crate::{error::ApiError, subscription::SubscriptionRegistry};

#[derive(Debug, Clone)]
pub struct AppState {
    pub provider: Arc<dyn WeatherProvider>,
    pub subscriptions: SubscriptionRegistry,
    pub defaults: RequestDefaults,
}

impl AppState {
    pub fn new(provider: Arc<dyn WeatherProvider>, config: &SeniverseConfig) -> Self {
        Self {
            provider,
            subscriptions: SubscriptionRegistry::default(),
            defaults: RequestDefaults {
                language: config.default_language.clone(),
                unit: config.default_unit,
            },
        }
    }
}

/// Language and unit applied when a caller leaves them out.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub language: String,
    pub unit: Unit,
}

impl RequestDefaults {
    /// Validate caller input and fill in defaults.
    pub fn build_request(
        &self,
        location: Option<String>,
        language: Option<String>,
        unit: Option<String>,
    ) -> Result<WeatherRequest, ApiError> {
        let location = location
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| ApiError::InvalidParams("`location` is required".to_string()))?;

        let language =
            language.filter(|l| !l.trim().is_empty()).unwrap_or_else(|| self.language.clone());

        let unit = match unit {
            Some(raw) => raw.parse::<Unit>().map_err(ApiError::InvalidParams)?,
            None => self.unit,
        };

        Ok(WeatherRequest { location, language, unit })
    }
}
