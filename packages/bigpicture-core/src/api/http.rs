//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to the playback mirror.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    extract::{Query, State},
    http::Method,
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    routing::get,
    Json, Router,
};
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::AppState;
use crate::error::{MirrorError, MirrorResult};
use crate::events::DiffEvent;

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PollParams {
    #[serde(default)]
    full: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS]);

    Router::new()
        .route("/health", get(health_check))
        .route("/playback", get(poll_playback))
        .route("/events", get(subscribe_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Liveness probe with subscriber count.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "subscribers": state.mirror.subscriber_count(),
        "deployTime": state.deploy_time,
    }))
}

/// Computes a diff (or, with `full=true`, a full snapshot) on demand.
async fn poll_playback(
    State(state): State<AppState>,
    Query(params): Query<PollParams>,
) -> MirrorResult<Json<DiffEvent>> {
    if state.cancel_token.is_cancelled() {
        return Err(MirrorError::ShuttingDown);
    }
    Ok(Json(state.mirror.poll(params.full).await))
}

/// Opens a push stream: one full snapshot, then diffs and heartbeats.
async fn subscribe_events(
    State(state): State<AppState>,
) -> MirrorResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if state.cancel_token.is_cancelled() {
        return Err(MirrorError::ShuttingDown);
    }

    let mut subscription = state.mirror.subscribe().await;
    let closed = subscription.cancel_token().clone();
    let shutdown = state.cancel_token.clone();
    log::debug!("[Server] Push stream opened for subscriber {}", subscription.id());

    // Dropping the stream drops the subscription, which unregisters it.
    let stream = stream! {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = closed.cancelled() => break,
                event = subscription.recv() => event,
            };
            let Some(event) = event else {
                log::debug!("[Server] Subscriber {} was dropped by the hub", subscription.id());
                break;
            };
            match Event::default().event(event.name()).json_data(&*event) {
                Ok(sse) => yield Ok::<_, Infallible>(sse),
                Err(e) => log::warn!("[Server] Failed to encode {} event: {}", event.name(), e),
            }
        }
    };

    Ok(Sse::new(stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{mirror, track_playback, MockPlaybackApi, DEPLOY_TIME};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use futures::StreamExt;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    fn state(api: Arc<MockPlaybackApi>) -> AppState {
        AppState {
            mirror: mirror(api),
            config: Arc::new(crate::state::Config::default()),
            cancel_token: CancellationToken::new(),
            deploy_time: DEPLOY_TIME,
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn full_poll_returns_snapshot() {
        let app = create_router(state(MockPlaybackApi::new(Some(track_playback("t1", 0)))));

        let (status, json) = get_json(app, "/playback?full=true").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "DATA");
        assert_eq!(json["full"], true);
        assert_eq!(json["id"], "t1");
        assert_eq!(json["device"], "Living Room");
    }

    #[tokio::test]
    async fn repeated_poll_is_empty() {
        let state = state(MockPlaybackApi::new(Some(track_playback("t1", 0))));
        let (_, first) = get_json(create_router(state.clone()), "/playback").await;
        assert_eq!(first["type"], "DATA");

        let (_, second) = get_json(create_router(state), "/playback").await;
        assert_eq!(second, json!({ "type": "EMPTY" }));
    }

    #[tokio::test]
    async fn poll_during_shutdown_is_unavailable() {
        let state = state(MockPlaybackApi::new(None));
        state.cancel_token.cancel();

        let (status, json) = get_json(create_router(state), "/playback").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "shutting_down");
    }

    #[tokio::test]
    async fn health_reports_deploy_time() {
        let app = create_router(state(MockPlaybackApi::new(None)));
        let (status, json) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["deployTime"], DEPLOY_TIME);
        assert_eq!(json["subscribers"], 0);
    }

    #[tokio::test]
    async fn push_stream_starts_with_full_snapshot() {
        let state = state(MockPlaybackApi::new(Some(track_playback("t1", 0))));
        let app = create_router(state.clone());

        let response = app
            .oneshot(Request::get("/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.mirror.subscriber_count(), 1);

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        let text = String::from_utf8(first.to_vec()).unwrap();
        assert!(text.contains("event: DATA"));
        assert!(text.contains("\"full\":true"));

        drop(body);
        assert_eq!(state.mirror.subscriber_count(), 0);
    }
}
