use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use bridge_api::{DeltaRecord, EventFilter, Page, RelayBatch, StoredEvent};
use bridge_relay::RelaySummary;

use super::AppState;
use crate::error::ApiError;

// ═══════════════════════════════════════════════════════════════
//  REST: /api/events
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredEvent>, ApiError> {
    match state.gateway.get_event(&id).await? {
        Some(event) => Ok(Json(event)),
        None => Err(ApiError::NotFound(format!("event '{id}'"))),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListParams {
    topic: Option<String>,
    start_time: Option<i64>,
    end_time: Option<i64>,
    key: Option<String>,
    limit: Option<usize>,
    next_token: Option<String>,
}

pub(crate) async fn handle_list_events(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<StoredEvent>>, ApiError> {
    let filter = EventFilter {
        topic: params.topic,
        start_time: params.start_time,
        end_time: params.end_time,
        key: params.key,
    };
    let page = state
        .gateway
        .list_events(&filter, params.limit, params.next_token.as_deref())
        .await?;
    Ok(Json(page))
}

#[derive(Deserialize)]
pub(crate) struct CreateEventRequest {
    topic: String,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    data: serde_json::Value,
}

pub(crate) async fn handle_create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = state
        .gateway
        .create_event(&req.topic, req.key, req.data)
        .await?;
    Ok((StatusCode::CREATED, Json(event)))
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/topics/{topic}/events?startTime=&endTime=&limit=&nextToken=
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TopicParams {
    start_time: Option<i64>,
    end_time: Option<i64>,
    limit: Option<usize>,
    next_token: Option<String>,
}

pub(crate) async fn handle_query_topic(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(params): Query<TopicParams>,
) -> Result<Json<Page<StoredEvent>>, ApiError> {
    if let (Some(start), Some(end)) = (params.start_time, params.end_time) {
        if start > end {
            return Err(ApiError::BadRequest(format!("startTime {start} is after endTime {end}")));
        }
    }

    let page = state
        .gateway
        .query_events_by_topic(
            &topic,
            params.start_time,
            params.end_time,
            params.limit,
            params.next_token.as_deref(),
        )
        .await?;
    Ok(Json(page))
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/sync?lastSync=&limit=&nextToken=
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SyncParams {
    last_sync: Option<i64>,
    limit: Option<usize>,
    next_token: Option<String>,
}

pub(crate) async fn handle_sync(
    State(state): State<AppState>,
    Query(params): Query<SyncParams>,
) -> Result<Json<Page<DeltaRecord>>, ApiError> {
    let page = state
        .gateway
        .sync_events(params.last_sync, params.limit, params.next_token.as_deref())
        .await?;
    Ok(Json(page))
}

// ═══════════════════════════════════════════════════════════════
//  REST: GET /api/latest?topic=&limit=
// ═══════════════════════════════════════════════════════════════

#[derive(Deserialize)]
pub(crate) struct LatestParams {
    topic: Option<String>,
    limit: Option<usize>,
}

pub(crate) async fn handle_latest(
    State(state): State<AppState>,
    Query(params): Query<LatestParams>,
) -> Result<Json<Page<StoredEvent>>, ApiError> {
    let page = state
        .gateway
        .latest_events(params.topic.as_deref(), params.limit)
        .await?;
    Ok(Json(page))
}

// ═══════════════════════════════════════════════════════════════
//  REST: POST /api/relay
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_relay(
    State(state): State<AppState>,
    Json(batch): Json<RelayBatch>,
) -> Json<RelaySummary> {
    Json(state.relay.handle(&batch).await)
}
