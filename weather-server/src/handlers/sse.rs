//! `GET /sse`: one subscription per connection.

use std::{convert::Infallible, time::Duration};

use axum::{
    extract::{Query, State, rejection::QueryRejection},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tracing::instrument;

use crate::{
    error::ApiError,
    state::AppState,
    subscription::{Opened, StreamMessage},
};

const KEEP_ALIVE_SECS: u64 = 15;

#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    pub location: Option<String>,
    pub language: Option<String>,
    pub unit: Option<String>,
    /// Refresh period; absent or zero means a single fetch on connect.
    pub interval_secs: Option<u64>,
}

/// Open an event stream. With `location` the first `weather.update` is fetched
/// immediately; without it the stream waits for pushes from `/messages`.
#[instrument(skip(state, query))]
pub async fn subscribe(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::InvalidParams(e.body_text()))?;

    let request = match query.location {
        Some(location) => Some(state.defaults.build_request(
            Some(location),
            query.language,
            query.unit,
        )?),
        None => None,
    };
    let interval = query.interval_secs.filter(|s| *s > 0).map(Duration::from_secs);

    let Opened { id, rx, cancel, guard } = state.subscriptions.open();

    if let Some(request) = request {
        state.subscriptions.spawn_producer(id, state.provider.clone(), request, interval);
    }

    let stream = stream::once(async move { StreamMessage::Ready(id) })
        .chain(ReceiverStream::new(rx))
        .take_until(cancel.cancelled_owned())
        .map(move |message| {
            // The guard lives as long as the body; dropping it closes the subscription.
            let _guard = &guard;
            Ok::<_, Infallible>(message.into_event())
        });

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS)).text("keep-alive"),
    ))
}
