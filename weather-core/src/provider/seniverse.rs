use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::{
    config::SeniverseConfig,
    error::WeatherError,
    model::{WeatherRecord, WeatherRequest},
};

use super::WeatherProvider;

/// Client for the Seniverse weather API (<https://seniverse.com/api>).
#[derive(Debug, Clone)]
pub struct SeniverseProvider {
    api_key: String,
    config: SeniverseConfig,
    http: Client,
}

impl SeniverseProvider {
    pub fn new(config: SeniverseConfig) -> Result<Self, WeatherError> {
        let api_key = config.require_api_key()?.to_owned();

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WeatherError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { api_key, config, http })
    }

    fn now_url(&self) -> String {
        format!("{}/weather/now.json", self.config.base_url.trim_end_matches('/'))
    }

    async fn get_now(&self, request: &WeatherRequest) -> Result<String, WeatherError> {
        let res = self
            .http
            .get(self.now_url())
            .query(&[
                ("key", self.api_key.as_str()),
                ("location", request.location.as_str()),
                ("language", request.language.as_str()),
                ("unit", request.unit.as_str()),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            warn!(%status, "Seniverse request rejected");
            return Err(WeatherError::Upstream(format!(
                "Seniverse request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        Ok(body)
    }
}

#[async_trait]
impl WeatherProvider for SeniverseProvider {
    #[instrument(skip(self, request), fields(location = %request.location, unit = %request.unit))]
    async fn fetch_current_weather(
        &self,
        request: &WeatherRequest,
    ) -> Result<WeatherRecord, WeatherError> {
        let body = self.get_now(request).await?;
        let record = parse_now(&body, request)?;
        debug!(temperature = record.temperature, condition = %record.condition, "Fetched weather");
        Ok(record)
    }

    #[instrument(skip(self, request), fields(location = %request.location))]
    async fn fetch_raw(&self, request: &WeatherRequest) -> Result<Value, WeatherError> {
        let body = self.get_now(request).await?;
        serde_json::from_str(&body)
            .map_err(|e| WeatherError::Parse(format!("Seniverse body is not JSON: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct SnResponse {
    #[serde(default)]
    results: Vec<SnResult>,
}

#[derive(Debug, Deserialize)]
struct SnResult {
    location: Option<SnLocation>,
    now: Option<SnNow>,
    last_update: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnLocation {
    name: Option<String>,
}

/// Seniverse sends numbers as strings ("28"); both shapes are accepted.
#[derive(Debug, Deserialize)]
struct SnNow {
    text: Option<String>,
    temperature: Option<Value>,
    feels_like: Option<Value>,
    humidity: Option<Value>,
    wind_direction: Option<String>,
    wind_speed: Option<Value>,
    wind_scale: Option<Value>,
    last_update: Option<String>,
}

/// Map a `now.json` body onto a [`WeatherRecord`].
fn parse_now(body: &str, request: &WeatherRequest) -> Result<WeatherRecord, WeatherError> {
    let parsed: SnResponse = serde_json::from_str(body)
        .map_err(|e| WeatherError::Parse(format!("Failed to parse Seniverse JSON: {e}")))?;

    let result = parsed
        .results
        .into_iter()
        .next()
        .ok_or_else(|| WeatherError::Parse("Seniverse response contained no results".into()))?;

    let location_name = result
        .location
        .and_then(|l| l.name)
        .ok_or_else(|| WeatherError::Parse("Seniverse response is missing location.name".into()))?;

    let now = result
        .now
        .ok_or_else(|| WeatherError::Parse("Seniverse response is missing now".into()))?;

    let temperature = number_field("temperature", now.temperature.as_ref())?.ok_or_else(|| {
        WeatherError::Parse("Seniverse response is missing now.temperature".into())
    })?;

    let wind_scale = number_field("wind_scale", now.wind_scale.as_ref())?
        .map(|scale| scale.round().clamp(0.0, f64::from(u8::MAX)) as u8);

    let observed_at = result
        .last_update
        .or(now.last_update)
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);

    Ok(WeatherRecord {
        location: request.location.clone(),
        location_name,
        temperature,
        condition: now.text.filter(|t| !t.is_empty()).unwrap_or_else(|| "Unknown".to_string()),
        humidity: number_field("humidity", now.humidity.as_ref())?,
        wind: now.wind_direction.filter(|w| !w.is_empty()),
        wind_speed: number_field("wind_speed", now.wind_speed.as_ref())?,
        wind_scale,
        feels_like: number_field("feels_like", now.feels_like.as_ref())?,
        unit: request.unit,
        observed_at,
    })
}

/// Empty strings and nulls count as absent; anything else must be a finite number.
fn number_field(name: &str, value: Option<&Value>) -> Result<Option<f64>, WeatherError> {
    let invalid = || WeatherError::Parse(format!("Seniverse field now.{name} is not a number"));

    let number = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    number.filter(|n| n.is_finite()).map(Some).ok_or_else(invalid)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Unit;
    use chrono::TimeZone;

    const BODY: &str = r#"{
        "results": [{
            "location": {"id": "WX4FBXXFKE4F", "name": "北京", "country": "CN"},
            "now": {
                "text": "晴",
                "code": "0",
                "temperature": "28",
                "feels_like": "29",
                "humidity": "40",
                "wind_direction": "西北",
                "wind_speed": "10.44",
                "wind_scale": "2"
            },
            "last_update": "2024-01-15T12:00:00+08:00"
        }]
    }"#;

    #[test]
    fn maps_full_body() {
        let req = WeatherRequest::new("beijing");
        let record = parse_now(BODY, &req).expect("body parses");

        assert_eq!(record.location, "beijing");
        assert_eq!(record.location_name, "北京");
        assert_eq!(record.temperature, 28.0);
        assert_eq!(record.condition, "晴");
        assert_eq!(record.humidity, Some(40.0));
        assert_eq!(record.wind.as_deref(), Some("西北"));
        assert_eq!(record.wind_speed, Some(10.44));
        assert_eq!(record.wind_scale, Some(2));
        assert_eq!(record.feels_like, Some(29.0));
        assert_eq!(record.unit, Unit::C);
        assert_eq!(record.observed_at, Utc.with_ymd_and_hms(2024, 1, 15, 4, 0, 0).unwrap());
    }

    #[test]
    fn free_tier_body_leaves_optionals_empty() {
        let body = r#"{"results":[{"location":{"name":"Beijing"},
            "now":{"text":"Sunny","code":"0","temperature":"3"},
            "last_update":"2024-01-15T12:00:00+08:00"}]}"#;
        let record = parse_now(body, &WeatherRequest::new("Beijing")).unwrap();

        assert_eq!(record.temperature, 3.0);
        assert_eq!(record.humidity, None);
        assert_eq!(record.wind, None);
        assert_eq!(record.wind_scale, None);
    }

    #[test]
    fn missing_text_defaults_to_unknown() {
        let body = r#"{"results":[{"location":{"name":"x"},"now":{"temperature":1}}]}"#;
        let record = parse_now(body, &WeatherRequest::new("x")).unwrap();
        assert_eq!(record.condition, "Unknown");
        assert_eq!(record.temperature, 1.0);
    }

    #[test]
    fn empty_results_is_parse_error() {
        let err = parse_now(r#"{"results":[]}"#, &WeatherRequest::new("x")).unwrap_err();
        assert!(matches!(err, WeatherError::Parse(_)));
    }

    #[test]
    fn missing_temperature_is_parse_error() {
        let body = r#"{"results":[{"location":{"name":"x"},"now":{"text":"晴"}}]}"#;
        let err = parse_now(body, &WeatherRequest::new("x")).unwrap_err();
        assert!(err.to_string().contains("now.temperature"));
    }

    #[test]
    fn non_numeric_humidity_is_parse_error() {
        let body =
            r#"{"results":[{"location":{"name":"x"},"now":{"temperature":"1","humidity":"wet"}}]}"#;
        let err = parse_now(body, &WeatherRequest::new("x")).unwrap_err();
        assert!(err.to_string().contains("now.humidity"));
    }

    #[test]
    fn non_finite_temperature_is_parse_error() {
        for value in ["NaN", "inf", "-infinity"] {
            let body = format!(
                r#"{{"results":[{{"location":{{"name":"x"}},"now":{{"temperature":"{value}"}}}}]}}"#
            );
            let err = parse_now(&body, &WeatherRequest::new("x")).unwrap_err();
            assert!(err.to_string().contains("now.temperature"), "{value}: {err}");
        }
    }

    #[test]
    fn non_json_is_parse_error() {
        let err = parse_now("<html>", &WeatherRequest::new("x")).unwrap_err();
        assert!(matches!(err, WeatherError::Parse(_)));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "北".repeat(300);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn new_requires_api_key() {
        let err = SeniverseProvider::new(SeniverseConfig::default()).unwrap_err();
        assert!(matches!(err, WeatherError::Config(_)));
    }

    #[test]
    fn now_url_tolerates_trailing_slash() {
        let cfg = SeniverseConfig {
            api_key: Some("k".into()),
            base_url: "http://localhost:9/v3/".into(),
            ..Default::default()
        };
        let provider = SeniverseProvider::new(cfg).unwrap();
        assert_eq!(provider.now_url(), "http://localhost:9/v3/weather/now.json");
    }
}
