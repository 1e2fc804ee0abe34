use crate::{
    SeniverseConfig, WeatherError, WeatherRecord, WeatherRequest,
    provider::seniverse::SeniverseProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod seniverse;

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Current conditions for `request.location`, mapped to a [`WeatherRecord`].
    async fn fetch_current_weather(
        &self,
        request: &WeatherRequest,
    ) -> Result<WeatherRecord, WeatherError>;

    /// The provider's response body, unmapped.
    async fn fetch_raw(&self, request: &WeatherRequest)
    -> Result<serde_json::Value, WeatherError>;
}

/// Construct the Seniverse provider, failing fast when no API key is configured.
pub fn provider_from_config(
    config: &SeniverseConfig,
) -> Result<Arc<dyn WeatherProvider>, WeatherError> {
    Ok(Arc::new(SeniverseProvider::new(config.clone())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = SeniverseConfig::default();
        let err = provider_from_config(&cfg).unwrap_err();
        assert!(matches!(err, WeatherError::Config(_)));
        assert!(err.to_string().contains("No Seniverse API key configured"));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let cfg = SeniverseConfig { api_key: Some("KEY".into()), ..Default::default() };
        assert!(provider_from_config(&cfg).is_ok());
    }
}
