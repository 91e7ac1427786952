//! Live Channel Handlers
//!
//! `GET /events/{client_id}` streams SSE frames named after the channel,
//! each carrying a [`LiveEvent`] as JSON. Admin writes publish through the
//! hub so every connected viewer hears about them.

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use tokio_stream::wrappers::ReceiverStream;

use storefront_core::{Channel, LiveEvent, LiveSnapshot};

use crate::auth::Admin;
use crate::error::ServerError;
use crate::hub::PublishReport;
use crate::state::AppState;

/// Push stream for one client; replaces its previous stream
pub async fn events(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let subscription = state.hub.connect(&client_id);

    let stream = futures::stream::iter(subscription.initial)
        .chain(ReceiverStream::new(subscription.events))
        .map(|event| sse_frame(&event));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn sse_frame(event: &LiveEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.channel.as_str()).json_data(event)
}

pub async fn snapshot(State(state): State<AppState>) -> Json<LiveSnapshot> {
    Json(state.hub.snapshot())
}

pub async fn get_channel(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let channel: Channel = channel.parse()?;
    state
        .hub
        .get(channel)
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("nothing published on {channel} yet")))
}

fn current_or_empty(state: &AppState, channel: Channel) -> Json<Value> {
    Json(state.hub.get(channel).unwrap_or_else(|| json!({})))
}

pub async fn get_schedule(State(state): State<AppState>) -> Json<Value> {
    current_or_empty(&state, Channel::Schedule)
}

pub async fn get_about(State(state): State<AppState>) -> Json<Value> {
    current_or_empty(&state, Channel::Content)
}

pub async fn get_theme(State(state): State<AppState>) -> Json<Value> {
    current_or_empty(&state, Channel::Theme)
}

/// Publish any channel
pub async fn publish_channel(
    _admin: Admin,
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<PublishReport>, ServerError> {
    let channel: Channel = channel.parse()?;
    Ok(Json(state.hub.publish(channel, payload)))
}

pub async fn put_about(
    _admin: Admin,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<PublishReport> {
    Json(state.hub.publish(Channel::Content, payload))
}

pub async fn put_schedule(
    _admin: Admin,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<PublishReport> {
    Json(state.hub.publish(Channel::Schedule, payload))
}

pub async fn put_theme(
    _admin: Admin,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Json<PublishReport> {
    Json(state.hub.publish(Channel::Theme, payload))
}
