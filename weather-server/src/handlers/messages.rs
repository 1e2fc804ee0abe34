//! `POST /messages`: `{ method, params }` dispatch.

use std::{fmt, time::Duration};

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState, subscription::StreamMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Current,
    Raw,
    Subscribe,
    Unsubscribe,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Current => "weather.current",
            Method::Raw => "weather.raw",
            Method::Subscribe => "weather.subscribe",
            Method::Unsubscribe => "weather.unsubscribe",
        }
    }

    pub const fn all() -> &'static [Method] {
        &[Method::Current, Method::Raw, Method::Subscribe, Method::Unsubscribe]
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Method {
    type Error = ApiError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Method::all()
            .iter()
            .copied()
            .find(|m| m.as_str() == value)
            .ok_or_else(|| ApiError::MethodNotFound(value.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub result: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeatherParams {
    location: Option<String>,
    language: Option<String>,
    unit: Option<String>,
    subscription_id: Option<Uuid>,
    #[serde(alias = "interval_secs")]
    interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnsubscribeParams {
    subscription_id: Option<Uuid>,
}

pub async fn handle_message(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidParams(e.body_text()))?;
    let result = dispatch(&state, &request.method, request.params).await?;
    Ok(Json(MessageResponse { result }))
}

/// Run one method. Also used by tests without going through HTTP.
#[instrument(skip(state, params))]
pub async fn dispatch(state: &AppState, method: &str, params: Value) -> Result<Value, ApiError> {
    match Method::try_from(method)? {
        Method::Current => current(state, parse_params(params)?).await,
        Method::Raw => raw(state, parse_params(params)?).await,
        Method::Subscribe => subscribe(state, parse_params(params)?),
        Method::Unsubscribe => unsubscribe(state, parse_params(params)?),
    }
}

/// `null` and a missing `params` are treated as `{}`; anything but an object is rejected.
fn parse_params<T>(params: Value) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        Value::Object(_) => params,
        other => {
            return Err(ApiError::InvalidParams(format!(
                "`params` must be an object, got {other}"
            )));
        }
    };
    serde_json::from_value(params).map_err(|e| ApiError::InvalidParams(e.to_string()))
}

async fn current(state: &AppState, params: WeatherParams) -> Result<Value, ApiError> {
    let request = state.defaults.build_request(params.location, params.language, params.unit)?;

    if let Some(id) = params.subscription_id
        && !state.subscriptions.contains(id)
    {
        return Err(ApiError::InvalidParams(format!("Unknown subscription {id}")));
    }

    let record = state.provider.fetch_current_weather(&request).await?;

    // The caller always gets the record; a stream that stopped reading just misses it.
    if let Some(id) = params.subscription_id {
        let update = StreamMessage::Update(Box::new(record.clone()));
        if let Err(e) = state.subscriptions.try_push(id, update) {
            warn!(subscription = %id, error = %e, "Could not push weather update");
        }
    }

    serde_json::to_value(&record)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize weather record: {e}")))
}

async fn raw(state: &AppState, params: WeatherParams) -> Result<Value, ApiError> {
    let request = state.defaults.build_request(params.location, params.language, params.unit)?;
    Ok(state.provider.fetch_raw(&request).await?)
}

/// Attach periodic updates for a location to an already open stream.
fn subscribe(state: &AppState, params: WeatherParams) -> Result<Value, ApiError> {
    let id = params.subscription_id.ok_or_else(|| {
        ApiError::InvalidParams(
            "`subscriptionId` is required; open GET /sse to obtain one".to_string(),
        )
    })?;
    let request = state.defaults.build_request(params.location, params.language, params.unit)?;
    let location = request.location.clone();
    let interval = params.interval_secs.filter(|s| *s > 0).map(Duration::from_secs);

    state
        .subscriptions
        .spawn_producer(id, state.provider.clone(), request, interval)
        .ok_or_else(|| ApiError::InvalidParams(format!("Unknown subscription {id}")))?;

    info!(subscription = %id, %location, ?interval, "Weather updates attached");
    Ok(json!({
        "subscriptionId": id,
        "location": location,
        "intervalSecs": interval.map(|d| d.as_secs()),
        "message": "Subscribed to weather updates",
    }))
}

fn unsubscribe(state: &AppState, params: UnsubscribeParams) -> Result<Value, ApiError> {
    let id = params
        .subscription_id
        .ok_or_else(|| ApiError::InvalidParams("`subscriptionId` is required".to_string()))?;

    if !state.subscriptions.close(id) {
        return Err(ApiError::InvalidParams(format!("Unknown subscription {id}")));
    }

    Ok(json!({ "subscriptionId": id, "message": "Unsubscribed from weather updates" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_as_str_roundtrip() {
        for m in Method::all() {
            let parsed = Method::try_from(m.as_str()).expect("roundtrip should succeed");
            assert_eq!(*m, parsed);
        }
    }

    #[test]
    fn unknown_method_is_not_found() {
        let err = Method::try_from("weather.bogus").unwrap_err();
        assert_eq!(err.code(), "MethodNotFoundError");
    }

    #[test]
    fn null_params_become_empty_object() {
        let params: WeatherParams = parse_params(Value::Null).unwrap();
        assert!(params.location.is_none());
    }

    #[test]
    fn array_params_are_rejected() {
        let err = parse_params::<WeatherParams>(json!(["beijing"])).unwrap_err();
        assert!(matches!(err, ApiError::InvalidParams(_)));
    }

    #[test]
    fn bad_subscription_id_is_rejected() {
        let err = parse_params::<WeatherParams>(json!({"subscriptionId": "nope"})).unwrap_err();
        assert_eq!(err.code(), "InvalidParamsError");
    }

    #[test]
    fn params_accept_snake_case_interval() {
        let params: WeatherParams =
            parse_params(json!({"location": "x", "interval_secs": 30})).unwrap();
        assert_eq!(params.interval_secs, Some(30));
    }

    #[test]
    fn message_request_defaults_params() {
        let req: MessageRequest = serde_json::from_str(r#"{"method": "weather.current"}"#).unwrap();
        assert_eq!(req.method, "weather.current");
        assert!(req.params.is_null());
    }
}
