//! Mishwar HTTP API
//!
//! Axum-based HTTP server exposing the booking chatbot.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a
//! pure inner function. The inner functions are directly testable without
//! axum dispatch machinery.
//!
//! Endpoints:
//! - POST /chatbot — one dialogue turn (creates a session when none given)
//! - GET  /health  — health check with session count
//! - GET  /version — server version info
//!
//! The chatbot endpoint always answers 200 with a structured body; every
//! failure becomes guidance text inside `botMessage`.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use mishwar_core::dialogue::{messages, Opening};
use mishwar_core::{DialogueEngine, MishwarConfig, SessionStore};

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub store: SessionStore,
    pub engine: DialogueEngine,
    pub config: MishwarConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/chatbot", post(chatbot_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    store: SessionStore,
    engine: DialogueEngine,
    config: MishwarConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.service.host, config.service.port);
    let state = Arc::new(HttpState {
        store,
        engine,
        config,
    });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Mishwar HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotRequest {
    pub session_id: Option<String>,
    /// Turn content. `message` is accepted as an alias.
    #[serde(alias = "message")]
    pub user_input: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatbotResponse {
    /// Empty string signals a refused session creation.
    pub session_id: String,
    pub bot_message: String,
    pub done: bool,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner chatbot turn. A missing, malformed, or unknown session id routes
/// into the creation path; a known id locks the session and advances it.
pub async fn chatbot_inner(state: &HttpState, req: ChatbotRequest) -> ChatbotResponse {
    let session_handle = match req
        .session_id
        .as_deref()
        .and_then(|s| Uuid::parse_str(s).ok())
    {
        Some(id) => state.store.get(&id).await,
        None => None,
    };

    let Some(handle) = session_handle else {
        return create_session_inner(state, &req).await;
    };

    let input = req.user_input.unwrap_or_default();
    let mut session = handle.lock().await;
    let bot_message = state.engine.advance(&mut session, &input).await;

    ChatbotResponse {
        session_id: session.id.to_string(),
        bot_message,
        done: session.step.is_terminal(),
    }
}

async fn create_session_inner(state: &HttpState, req: &ChatbotRequest) -> ChatbotResponse {
    let (Some(lat), Some(lng)) = (req.lat, req.lng) else {
        return ChatbotResponse {
            session_id: String::new(),
            bot_message: messages::NEED_COORDINATES.to_string(),
            done: false,
        };
    };

    match state.engine.open_session(lat, lng).await {
        Opening::Accepted { session, greeting } => {
            let id = state.store.insert(session).await;
            ChatbotResponse {
                session_id: id.to_string(),
                bot_message: greeting,
                done: false,
            }
        }
        Opening::Declined { message } => ChatbotResponse {
            session_id: String::new(),
            bot_message: message,
            done: false,
        },
    }
}

/// Inner health check — reports session count and region mode.
pub async fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "sessions": state.store.len().await,
            "region_restricted": state.config.region.restricted,
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "mishwar/1",
    })
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn chatbot_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ChatbotRequest>,
) -> impl IntoResponse {
    let body = chatbot_inner(&state, req).await;
    (StatusCode::OK, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mishwar_core::config::{
        LlmConfig, MapsConfig, RegionConfig, ServiceConfig, SessionConfig,
    };
    use mishwar_core::{ExtractError, GeocodeError, LocationResolver, PlaceExtractor, RegionFilter};

    struct StubResolver {
        reverse: Option<String>,
    }

    #[async_trait]
    impl LocationResolver for StubResolver {
        async fn resolve_forward(
            &self,
            _name: &str,
            _filter: Option<&RegionFilter>,
        ) -> Result<Option<String>, GeocodeError> {
            Ok(self.reverse.clone())
        }

        async fn resolve_reverse(
            &self,
            _lat: f64,
            _lng: f64,
            _filter: Option<&RegionFilter>,
        ) -> Result<Option<String>, GeocodeError> {
            Ok(self.reverse.clone())
        }

        fn name(&self) -> &str {
            "stub-resolver"
        }
    }

    struct StubExtractor;

    #[async_trait]
    impl PlaceExtractor for StubExtractor {
        async fn extract_place_name(&self, _utterance: &str) -> Result<String, ExtractError> {
            Ok("المول".to_string())
        }

        fn name(&self) -> &str {
            "stub-extractor"
        }
    }

    fn test_config(restricted: bool) -> MishwarConfig {
        MishwarConfig {
            service: ServiceConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                log_level: "info".to_string(),
            },
            maps: MapsConfig {
                base_url: "http://localhost".to_string(),
                language: "ar".to_string(),
                region_bias: "SA".to_string(),
                timeout_seconds: 5,
                max_retries: 1,
                retry_delay_ms: 10,
            },
            llm: LlmConfig {
                base_url: "http://localhost".to_string(),
                model: "gpt-3.5-turbo".to_string(),
                timeout_seconds: 5,
                max_retries: 1,
                retry_delay_ms: 10,
            },
            region: RegionConfig {
                restricted,
                ..RegionConfig::default()
            },
            session: SessionConfig::default(),
        }
    }

    fn make_state(restricted: bool, reverse: Option<&str>) -> HttpState {
        let config = test_config(restricted);
        let region = restricted.then(|| RegionFilter::from_config(&config.region));
        let engine = DialogueEngine::new(
            Arc::new(StubResolver {
                reverse: reverse.map(String::from),
            }),
            Arc::new(StubExtractor),
            region,
        );
        HttpState {
            store: SessionStore::new(),
            engine,
            config,
        }
    }

    // ========================================================================
    // TEST 1: version_inner is pure and returns correct fields
    // ========================================================================
    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "mishwar/1", "protocol must be mishwar/1");
    }

    // ========================================================================
    // TEST 2: health_inner reports session count
    // ========================================================================
    #[tokio::test]
    async fn test_health_inner_reports_sessions() {
        let state = make_state(false, Some("الرياض"));
        let (status, body) = health_inner(&state).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["sessions"], 0);
        assert_eq!(body["region_restricted"], false);
    }

    // ========================================================================
    // TEST 3: creation without coordinates yields guidance and no session
    // ========================================================================
    #[tokio::test]
    async fn test_chatbot_creation_requires_coordinates() {
        let state = make_state(false, Some("الرياض"));

        let resp = chatbot_inner(&state, ChatbotRequest::default()).await;

        assert_eq!(resp.session_id, "");
        assert_eq!(resp.bot_message, messages::NEED_COORDINATES);
        assert!(!resp.done);
        assert_eq!(state.store.len().await, 0);
    }

    // ========================================================================
    // TEST 4: creation with coordinates greets and stores the session
    // ========================================================================
    #[tokio::test]
    async fn test_chatbot_creation_with_coordinates() {
        let state = make_state(false, Some("حي العليا، الرياض"));

        let req = ChatbotRequest {
            lat: Some(24.7),
            lng: Some(46.7),
            ..ChatbotRequest::default()
        };
        let resp = chatbot_inner(&state, req).await;

        assert!(!resp.session_id.is_empty());
        assert_eq!(resp.bot_message, messages::GREETING);
        assert!(!resp.done);
        assert_eq!(state.store.len().await, 1);
    }

    // ========================================================================
    // TEST 5: unknown session id falls into the creation path
    // ========================================================================
    #[tokio::test]
    async fn test_chatbot_unknown_session_id_creates() {
        let state = make_state(false, Some("الرياض"));

        let req = ChatbotRequest {
            session_id: Some(Uuid::new_v4().to_string()),
            lat: Some(24.7),
            lng: Some(46.7),
            ..ChatbotRequest::default()
        };
        let resp = chatbot_inner(&state, req).await;

        assert!(!resp.session_id.is_empty());
        assert_eq!(resp.bot_message, messages::GREETING);
    }

    // ========================================================================
    // TEST 6: a turn on an existing session advances the dialogue
    // ========================================================================
    #[tokio::test]
    async fn test_chatbot_turn_advances_dialogue() {
        let state = make_state(false, Some("حي العليا، الرياض"));

        let open = chatbot_inner(
            &state,
            ChatbotRequest {
                lat: Some(24.7),
                lng: Some(46.7),
                ..ChatbotRequest::default()
            },
        )
        .await;

        let turn = chatbot_inner(
            &state,
            ChatbotRequest {
                session_id: Some(open.session_id.clone()),
                user_input: Some("أبغى أروح المول".to_string()),
                ..ChatbotRequest::default()
            },
        )
        .await;

        assert_eq!(turn.session_id, open.session_id);
        assert!(turn.bot_message.contains("حي العليا، الرياض"));
        assert!(!turn.done);
    }

    // ========================================================================
    // TEST 7: region-restricted creation declines out-of-region coordinates
    // ========================================================================
    #[tokio::test]
    async fn test_chatbot_restricted_creation_declines() {
        let state = make_state(true, None);

        let req = ChatbotRequest {
            lat: Some(26.4),
            lng: Some(50.1),
            ..ChatbotRequest::default()
        };
        let resp = chatbot_inner(&state, req).await;

        assert_eq!(resp.session_id, "");
        assert!(resp.bot_message.contains("منطقة الرياض"));
        assert_eq!(state.store.len().await, 0, "no entry for a declined session");
    }

    // ========================================================================
    // TEST 8: `message` is accepted as an alias for `userInput`
    // ========================================================================
    #[test]
    fn test_request_accepts_message_alias() {
        let req: ChatbotRequest =
            serde_json::from_value(serde_json::json!({ "message": "نعم" })).unwrap();
        assert_eq!(req.user_input.as_deref(), Some("نعم"));

        let req: ChatbotRequest =
            serde_json::from_value(serde_json::json!({ "userInput": "لا" })).unwrap();
        assert_eq!(req.user_input.as_deref(), Some("لا"));
    }
}
