//! Read-only HTTP surface over the connection status and the cached views.

use anyhow::Result;
use axum::{
    extract::{Path, Query as AxumQuery, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::sync::watch;

use crate::cache::CacheHandle;
use crate::connection::{ConnState, ConnStatus};
use crate::model::{
    EventEntry, FollowEdge, MyRsvpRow, MyRsvpStatusRow, NotificationPage, ParticipantRow,
};

#[derive(Clone)]
struct HttpState {
    cache: CacheHandle,
    status: watch::Receiver<ConnStatus>,
}

/// Response body for the `/healthz` endpoint.
#[derive(Serialize, Deserialize)]
struct Health {
    /// Always "ok" when the server is running.
    status: String,
    connection: ConnState,
}

/// Response body for the `/state` endpoint.
#[derive(Serialize)]
struct DaemonState {
    connection: ConnStatus,
    unread_count: Option<u64>,
}

/// Start the status server. Serves until `shutdown` resolves.
pub async fn serve_http(
    addr: SocketAddr,
    cache: CacheHandle,
    status: watch::Receiver<ConnStatus>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let state = Arc::new(HttpState { cache, status });
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/state", get(daemon_state))
        .route("/cache/unread-count", get(unread_count))
        .route("/cache/notifications", get(notifications))
        .route("/cache/follow-requests", get(follow_requests))
        .route("/cache/following", get(following))
        .route("/cache/my-rsvps", get(my_rsvps))
        .route("/cache/events/{event_id}", get(event_entry))
        .route("/cache/events/{event_id}/participants", get(participants))
        .route("/cache/events/{event_id}/my-rsvp", get(my_rsvp_status))
        .with_state(state);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn healthz(State(state): State<Arc<HttpState>>) -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
        connection: state.status.borrow().state,
    })
}

async fn daemon_state(State(state): State<Arc<HttpState>>) -> Json<DaemonState> {
    let unread_count = state.cache.read().await.unread_count;
    Json(DaemonState {
        connection: *state.status.borrow(),
        unread_count,
    })
}

async fn unread_count(State(state): State<Arc<HttpState>>) -> Json<Option<u64>> {
    Json(state.cache.read().await.unread_count)
}

/// URL parameters for `/cache/notifications`.
#[derive(Deserialize)]
struct NotificationParams {
    #[serde(default)]
    unread_only: bool,
}

async fn notifications(
    State(state): State<Arc<HttpState>>,
    AxumQuery(params): AxumQuery<NotificationParams>,
) -> Json<Option<NotificationPage>> {
    let cache = state.cache.read().await;
    let page = if params.unread_only {
        &cache.notifications_unread
    } else {
        &cache.notifications_all
    };
    Json(page.clone())
}

async fn follow_requests(State(state): State<Arc<HttpState>>) -> Json<Option<Vec<FollowEdge>>> {
    Json(state.cache.read().await.follow_requests.clone())
}

async fn following(State(state): State<Arc<HttpState>>) -> Json<Option<Vec<FollowEdge>>> {
    Json(state.cache.read().await.following.clone())
}

/// URL parameters for `/cache/my-rsvps`.
#[derive(Deserialize)]
struct MyRsvpParams {
    #[serde(default)]
    include_cancelled: bool,
}

async fn my_rsvps(
    State(state): State<Arc<HttpState>>,
    AxumQuery(params): AxumQuery<MyRsvpParams>,
) -> Json<Option<Vec<MyRsvpRow>>> {
    Json(
        state
            .cache
            .read()
            .await
            .my_rsvps(params.include_cancelled)
            .cloned(),
    )
}

async fn event_entry(
    State(state): State<Arc<HttpState>>,
    Path(event_id): Path<String>,
) -> Json<Option<EventEntry>> {
    Json(state.cache.read().await.event_details.get(&event_id).cloned())
}

async fn participants(
    State(state): State<Arc<HttpState>>,
    Path(event_id): Path<String>,
) -> Json<Option<Vec<ParticipantRow>>> {
    Json(
        state
            .cache
            .read()
            .await
            .event_participants
            .get(&event_id)
            .cloned(),
    )
}

async fn my_rsvp_status(
    State(state): State<Arc<HttpState>>,
    Path(event_id): Path<String>,
) -> Json<Option<MyRsvpStatusRow>> {
    Json(state.cache.read().await.my_rsvp_status.get(&event_id).cloned())
}
