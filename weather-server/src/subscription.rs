//! Open SSE connections and the tasks that feed them.
//!
//! A subscription is one `/sse` connection. It owns a bounded channel whose
//! receiver is the response body; producers and `/messages` push into the
//! sender. Dropping the body (client gone) or `weather.unsubscribe` removes the
//! entry and cancels its token, which stops every producer attached to it.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::response::sse::Event;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use weather_core::{WeatherProvider, WeatherRecord, WeatherRequest};

use crate::error::{ApiError, ErrorBody};

pub const READY_EVENT: &str = "subscription.ready";
pub const UPDATE_EVENT: &str = "weather.update";
pub const ERROR_EVENT: &str = "weather.error";

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    /// Registered, nothing pushed yet.
    Connected,
    /// At least one `weather.update` delivered.
    Streaming,
    Closed,
}

/// One frame on a subscription stream.
#[derive(Debug, Clone)]
pub enum StreamMessage {
    Ready(Uuid),
    Update(Box<WeatherRecord>),
    Error(ErrorBody),
}

impl StreamMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Ready(_) => READY_EVENT,
            Self::Update(_) => UPDATE_EVENT,
            Self::Error(_) => ERROR_EVENT,
        }
    }

    pub fn into_event(self) -> Event {
        let name = self.event_name();
        let data = match self {
            Self::Ready(id) => serde_json::json!({ "subscriptionId": id }).to_string(),
            Self::Update(record) => match serde_json::to_string(&record) {
                Ok(json) => json,
                Err(e) => {
                    let message = format!("Failed to serialize weather record: {e}");
                    return Self::Error(ApiError::Internal(message).body()).into_event();
                }
            },
            Self::Error(body) => serde_json::json!({ "code": body.code, "message": body.message })
                .to_string(),
        };
        Event::default().event(name).data(data)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PushError {
    #[error("Unknown subscription {0}")]
    Unknown(Uuid),
    #[error("Subscription {0} is closed")]
    Closed(Uuid),
    #[error("Subscription {0} is not reading; update dropped")]
    Full(Uuid),
}

#[derive(Debug)]
struct Entry {
    tx: mpsc::Sender<StreamMessage>,
    cancel: CancellationToken,
    state: SubscriptionState,
}

/// A freshly opened subscription; the caller turns `rx` into the response body.
#[derive(Debug)]
pub struct Opened {
    pub id: Uuid,
    pub rx: mpsc::Receiver<StreamMessage>,
    pub cancel: CancellationToken,
    pub guard: SubscriptionGuard,
}

#[derive(Debug, Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<Mutex<HashMap<Uuid, Entry>>>,
}

impl SubscriptionRegistry {
    pub fn open(&self) -> Opened {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        self.inner.lock().insert(
            id,
            Entry { tx, cancel: cancel.clone(), state: SubscriptionState::Connected },
        );
        info!(subscription = %id, "Subscription opened");

        Opened { id, rx, cancel, guard: SubscriptionGuard { id, registry: self.clone() } }
    }

    /// Deliver a message to one subscription, waiting for channel capacity.
    /// Only producers tied to the subscription's lifetime should wait here.
    pub async fn push(&self, id: Uuid, message: StreamMessage) -> Result<(), PushError> {
        let tx = self.sender(id)?;
        let is_update = matches!(message, StreamMessage::Update(_));
        tx.send(message).await.map_err(|_| PushError::Closed(id))?;
        self.mark_delivered(id, is_update);
        Ok(())
    }

    /// Deliver a message without waiting. A full channel drops the message.
    pub fn try_push(&self, id: Uuid, message: StreamMessage) -> Result<(), PushError> {
        let tx = self.sender(id)?;
        let is_update = matches!(message, StreamMessage::Update(_));
        tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Full(id),
            TrySendError::Closed(_) => PushError::Closed(id),
        })?;
        self.mark_delivered(id, is_update);
        Ok(())
    }

    fn sender(&self, id: Uuid) -> Result<mpsc::Sender<StreamMessage>, PushError> {
        self.inner.lock().get(&id).map(|e| e.tx.clone()).ok_or(PushError::Unknown(id))
    }

    fn mark_delivered(&self, id: Uuid, is_update: bool) {
        if !is_update {
            return;
        }
        if let Some(entry) = self.inner.lock().get_mut(&id) {
            entry.state = SubscriptionState::Streaming;
        }
    }

    /// Remove and cancel a subscription. Returns false when it was not open.
    pub fn close(&self, id: Uuid) -> bool {
        let removed = self.inner.lock().remove(&id);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                info!(subscription = %id, "Subscription closed");
                true
            }
            None => false,
        }
    }

    /// Close every open subscription, e.g. on shutdown.
    pub fn close_all(&self) {
        let drained: Vec<(Uuid, Entry)> = self.inner.lock().drain().collect();
        for (id, entry) in drained {
            entry.cancel.cancel();
            debug!(subscription = %id, "Subscription closed on shutdown");
        }
    }

    pub fn state(&self, id: Uuid) -> SubscriptionState {
        self.inner.lock().get(&id).map_or(SubscriptionState::Closed, |e| e.state)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.inner.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Attach a producer that fetches `request` now and then every `interval`.
    /// Returns `None` when the subscription is not open.
    pub fn spawn_producer(
        &self,
        id: Uuid,
        provider: Arc<dyn WeatherProvider>,
        request: WeatherRequest,
        interval: Option<Duration>,
    ) -> Option<JoinHandle<()>> {
        let cancel = self.inner.lock().get(&id)?.cancel.clone();
        let registry = self.clone();
        Some(tokio::spawn(produce_updates(registry, id, cancel, provider, request, interval)))
    }
}

async fn produce_updates(
    registry: SubscriptionRegistry,
    id: Uuid,
    cancel: CancellationToken,
    provider: Arc<dyn WeatherProvider>,
    request: WeatherRequest,
    interval: Option<Duration>,
) {
    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = provider.fetch_current_weather(&request) => match result {
                Ok(record) => StreamMessage::Update(Box::new(record)),
                Err(err) => {
                    warn!(subscription = %id, error = %err, "Weather fetch for stream failed");
                    StreamMessage::Error(ApiError::from(err).body())
                }
            },
        };

        if let Err(e) = registry.push(id, message).await {
            debug!(subscription = %id, error = %e, "Stopping producer");
            break;
        }

        let Some(period) = interval else { break };
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(period) => {}
        }
    }
    debug!(subscription = %id, location = %request.location, "Producer finished");
}

/// Closes its subscription when dropped, i.e. when the response body goes away.
#[derive(Debug)]
pub struct SubscriptionGuard {
    id: Uuid,
    registry: SubscriptionRegistry,
}

impl SubscriptionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.registry.close(self.id);
    }
}
