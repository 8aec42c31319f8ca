// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the bridge REST API.
//!
//! Handles GET /health, GET /conversations, GET /messages/{sender_id},
//! POST /send.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use courier_core::CourierError;
use courier_store::queries::{conversations, messages};

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status string.
    pub status: String,
    /// Seconds since the service started.
    pub uptime_secs: u64,
    /// Live WebSocket subscriber count.
    pub subscribers: usize,
}

/// Machine-readable error payload.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable error kind, e.g. `adapter_timeout`.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

/// Error response body: `{"error": {"kind": ..., "message": ...}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl ErrorResponse {
    fn new(kind: &str, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                kind: kind.to_string(),
                message: message.into(),
            },
        }
    }
}

/// Request body for POST /send.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Phone number, email, or chat identifier.
    pub recipient: String,
    /// Message text; may be empty when attachments are present.
    #[serde(default)]
    pub body: String,
    /// Paths of files to attach.
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Query parameters for GET /messages/{sender_id}.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Map an internal error onto a status code and stable kind.
fn error_response(e: &CourierError) -> Response {
    let (status, kind) = match e {
        CourierError::AdapterUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "adapter_unavailable")
        }
        CourierError::AdapterTimeout { .. } => (StatusCode::SERVICE_UNAVAILABLE, "adapter_timeout"),
        CourierError::SendRejected { .. } => (StatusCode::BAD_GATEWAY, "send_rejected"),
        CourierError::StoreCorruption { .. } => (StatusCode::SERVICE_UNAVAILABLE, "store_corruption"),
        CourierError::Storage { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (status, Json(ErrorResponse::new(kind, e.to_string()))).into_response()
}

/// GET /health
///
/// 200 while the service is ingesting; 503 once the store write path has
/// failed or shutdown has begun.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    if state.health.store_failed() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(
                "store_corruption",
                "message store reported a write failure",
            )),
        )
            .into_response();
    }

    if state.cancel.is_cancelled() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("shutting_down", "service is shutting down")),
        )
            .into_response();
    }

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            uptime_secs: state.start_time.elapsed().as_secs(),
            subscribers: state.hub.subscriber_count(),
        }),
    )
        .into_response()
}

/// GET /conversations
///
/// All conversations, most recently active first.
pub async fn get_conversations(State(state): State<GatewayState>) -> Response {
    match conversations::list_conversations(&state.db).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /messages/{sender_id}?limit=N
///
/// The last N messages of one conversation in insertion order. N defaults
/// to the configured page limit and is capped by it.
pub async fn get_messages(
    State(state): State<GatewayState>,
    Path(sender_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    match conversations::get_conversation(&state.db, &sender_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new(
                    "unknown_sender",
                    format!("no conversation with {sender_id}"),
                )),
            )
                .into_response();
        }
        Err(e) => return error_response(&e),
    }

    let limit = params
        .limit
        .unwrap_or(state.history_page_limit)
        .clamp(1, state.history_page_limit);

    match messages::messages_for_conversation(&state.db, &sender_id, limit).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST /send
///
/// Delivers through the adapter first; only an accepted send is recorded
/// and broadcast. The response is the stored message, sequence number
/// included.
pub async fn post_send(
    State(state): State<GatewayState>,
    Json(body): Json<SendRequest>,
) -> Response {
    if body.recipient.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("malformed", "recipient must not be empty")),
        )
            .into_response();
    }
    if body.body.is_empty() && body.attachments.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "malformed",
                "message body or attachments required",
            )),
        )
            .into_response();
    }

    let timeout = Duration::from_secs_f64(state.send_timeout_secs);
    let send = state
        .adapter
        .send(&body.recipient, &body.body, &body.attachments);

    let native_id = match tokio::time::timeout(timeout, send).await {
        Ok(Ok(native_id)) => native_id,
        Ok(Err(e)) => {
            warn!(recipient = %body.recipient, error = %e, "adapter send failed");
            return error_response(&e);
        }
        Err(_) => {
            warn!(recipient = %body.recipient, "adapter send timed out");
            return error_response(&CourierError::AdapterTimeout { duration: timeout });
        }
    };

    match state
        .bridge
        .record_outbound(&body.recipient, &body.body, body.attachments, native_id)
        .await
    {
        Ok(message) => (StatusCode::OK, Json(message)).into_response(),
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::GatewayState;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use courier_bridge::{BridgeEngine, BridgeHealth, EventHub};
    use courier_core::{HealthStatus, Message, NativeStore, RawNativeMessage};
    use courier_store::Database;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    enum SendBehavior {
        Accept(Option<String>),
        Reject,
        Unavailable,
        Hang,
    }

    struct FakeAdapter {
        behavior: SendBehavior,
    }

    #[async_trait]
    impl NativeStore for FakeAdapter {
        fn name(&self) -> &str {
            "mock"
        }

        fn version(&self) -> semver::Version {
            semver::Version::new(0, 0, 0)
        }

        async fn health_check(&self) -> Result<HealthStatus, CourierError> {
            Ok(HealthStatus::Healthy)
        }

        async fn fetch_since(&self, _watermark: f64) -> Result<Vec<RawNativeMessage>, CourierError> {
            Ok(Vec::new())
        }

        async fn send(
            &self,
            _recipient: &str,
            _body: &str,
            _attachments: &[String],
        ) -> Result<Option<String>, CourierError> {
            match &self.behavior {
                SendBehavior::Accept(native_id) => Ok(native_id.clone()),
                SendBehavior::Reject => Err(CourierError::SendRejected {
                    message: "Messages.app refused".to_string(),
                }),
                SendBehavior::Unavailable => Err(CourierError::AdapterUnavailable {
                    message: "osascript missing".to_string(),
                }),
                SendBehavior::Hang => std::future::pending().await,
            }
        }

        async fn shutdown(&self) -> Result<(), CourierError> {
            Ok(())
        }
    }

    struct TestContext {
        state: GatewayState,
        db: Database,
        _dir: tempfile::TempDir,
    }

    async fn context_with(behavior: SendBehavior, send_timeout_secs: f64) -> TestContext {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        let hub = Arc::new(EventHub::new(16));
        let health = Arc::new(BridgeHealth::new());
        let engine = BridgeEngine::new(db.clone(), hub.clone(), health.clone(), "mock", 300.0)
            .await
            .unwrap();
        let bridge = engine.handle();
        let cancel = CancellationToken::new();
        tokio::spawn(engine.run(cancel.clone()));

        let state = GatewayState {
            db: db.clone(),
            hub,
            bridge,
            adapter: Arc::new(FakeAdapter { behavior }),
            health,
            cancel,
            start_time: std::time::Instant::now(),
            history_page_limit: 20,
            replay_backlog: 20,
            send_timeout_secs,
        };
        TestContext {
            state,
            db,
            _dir: dir,
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok_with_subscribers() {
        let ctx = context_with(SendBehavior::Accept(None), 5.0).await;
        let (_id, _rx) = ctx.state.hub.subscribe();

        let response = get_health(State(ctx.state.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["subscribers"], 1);
    }

    #[tokio::test]
    async fn health_degrades_on_store_failure() {
        let ctx = context_with(SendBehavior::Accept(None), 5.0).await;
        ctx.state.health.mark_store_failure();

        let response = get_health(State(ctx.state.clone())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], "store_corruption");
    }

    #[tokio::test]
    async fn health_reports_shutdown() {
        let ctx = context_with(SendBehavior::Accept(None), 5.0).await;
        ctx.state.cancel.cancel();

        let response = get_health(State(ctx.state.clone())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], "shutting_down");
    }

    #[tokio::test]
    async fn messages_for_unknown_sender_is_404() {
        let ctx = context_with(SendBehavior::Accept(None), 5.0).await;

        let response = get_messages(
            State(ctx.state.clone()),
            Path("+19999999999".to_string()),
            Query(HistoryParams { limit: None }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], "unknown_sender");
    }

    #[tokio::test]
    async fn send_rejects_empty_recipient() {
        let ctx = context_with(SendBehavior::Accept(None), 5.0).await;

        let response = post_send(
            State(ctx.state.clone()),
            Json(SendRequest {
                recipient: "   ".to_string(),
                body: "hello".to_string(),
                attachments: Vec::new(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], "malformed");
    }

    #[tokio::test]
    async fn send_rejects_empty_body_without_attachments() {
        let ctx = context_with(SendBehavior::Accept(None), 5.0).await;

        let response = post_send(
            State(ctx.state.clone()),
            Json(SendRequest {
                recipient: "+15550001111".to_string(),
                body: String::new(),
                attachments: Vec::new(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn send_stores_and_returns_message_with_learned_id() {
        let ctx = context_with(SendBehavior::Accept(Some("GUID-1".to_string())), 5.0).await;

        let response = post_send(
            State(ctx.state.clone()),
            Json(SendRequest {
                recipient: "+15550001111".to_string(),
                body: "hello".to_string(),
                attachments: Vec::new(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let message: Message = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(message.id, "mock:GUID-1");
        assert_eq!(message.seq, 1);
        assert!(message.is_delivered);

        assert_eq!(messages::message_count(&ctx.db).await.unwrap(), 1);

        let listed = get_conversations(State(ctx.state.clone())).await;
        let json = body_json(listed).await;
        assert_eq!(json[0]["conversation_id"], "+15550001111");
        assert_eq!(json[0]["unread_count"], 0);
    }

    #[tokio::test]
    async fn send_rejection_maps_to_502_and_stores_nothing() {
        let ctx = context_with(SendBehavior::Reject, 5.0).await;

        let response = post_send(
            State(ctx.state.clone()),
            Json(SendRequest {
                recipient: "+15550001111".to_string(),
                body: "hello".to_string(),
                attachments: Vec::new(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], "send_rejected");
        assert_eq!(messages::message_count(&ctx.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unavailable_adapter_maps_to_503() {
        let ctx = context_with(SendBehavior::Unavailable, 5.0).await;

        let response = post_send(
            State(ctx.state.clone()),
            Json(SendRequest {
                recipient: "+15550001111".to_string(),
                body: "hello".to_string(),
                attachments: Vec::new(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], "adapter_unavailable");
    }

    #[tokio::test]
    async fn hung_adapter_send_times_out_as_503() {
        let ctx = context_with(SendBehavior::Hang, 0.05).await;

        let response = post_send(
            State(ctx.state.clone()),
            Json(SendRequest {
                recipient: "+15550001111".to_string(),
                body: "hello".to_string(),
                attachments: Vec::new(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"]["kind"], "adapter_timeout");
        assert_eq!(messages::message_count(&ctx.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn history_respects_limit_and_order() {
        let ctx = context_with(SendBehavior::Accept(None), 5.0).await;
        for i in 1..=5 {
            ctx.state
                .bridge
                .submit_batch(vec![RawNativeMessage {
                    native_id: format!("g{i}"),
                    sender: "+15550001111".to_string(),
                    body: format!("message {i}"),
                    attachments: Vec::new(),
                    sent_at: 100.0 + i as f64,
                    is_from_me: false,
                    is_delivered: true,
                    is_read: false,
                }])
                .await
                .unwrap();
        }

        let response = get_messages(
            State(ctx.state.clone()),
            Path("+15550001111".to_string()),
            Query(HistoryParams { limit: Some(3) }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let bodies: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["body"].as_str().unwrap())
            .collect();
        assert_eq!(bodies, vec!["message 3", "message 4", "message 5"]);
    }

    #[test]
    fn send_request_deserializes_with_defaults() {
        let json = r#"{"recipient": "+15550001111", "body": "hi"}"#;
        let req: SendRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.recipient, "+15550001111");
        assert_eq!(req.body, "hi");
        assert!(req.attachments.is_empty());
    }

    #[test]
    fn error_response_serializes_nested() {
        let resp = ErrorResponse::new("adapter_timeout", "send did not complete");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"kind\":\"adapter_timeout\""));
        assert!(json.contains("\"message\":\"send did not complete\""));
    }

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok".to_string(),
            uptime_secs: 42,
            subscribers: 2,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"uptime_secs\":42"));
        assert!(json.contains("\"subscribers\":2"));
    }
}
