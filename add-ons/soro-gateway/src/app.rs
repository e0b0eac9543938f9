//! HTTP surface of one agent process: health, envelope mailbox, synchronous chat.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use soro_agents::ask;
use soro_core::config::AgentRole;
use soro_core::mailbox::{Inbound, MailboxSender};
use soro_core::messages::{ChatMessage, ChatMessageType, ChatResponse, Envelope, Payload};

pub struct AppState {
    pub role: AgentRole,
    pub address: String,
    pub mailbox: MailboxSender,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/submit", post(submit))
        .route("/api/v1/chat", post(chat))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "agent": state.role.name(),
        "name": state.role.display_name(),
        "address": state.address,
    }))
}

/// Accept an envelope into the mailbox. Any reply travels back by relay.
async fn submit(
    State(state): State<Arc<AppState>>,
    Json(envelope): Json<Envelope>,
) -> Result<StatusCode, (StatusCode, String)> {
    if envelope.recipient != state.role.name() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("envelope for '{}' sent to {}", envelope.recipient, state.role.name()),
        ));
    }
    tracing::debug!(from = %envelope.sender, kind = envelope.payload.kind(), "envelope accepted");
    state
        .mailbox
        .send(Inbound::fire_and_forget(envelope))
        .await
        .map_err(|_| (StatusCode::SERVICE_UNAVAILABLE, "agent is shutting down".to_string()))?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default = "default_sender")]
    pub sender: String,
    pub content: String,
    #[serde(default)]
    pub message_type: ChatMessageType,
    #[serde(default)]
    pub session_id: Option<String>,
}

fn default_sender() -> String {
    "user".to_string()
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    if !matches!(state.role, AgentRole::SoroMind | AgentRole::PsnConnect) {
        return Err((StatusCode::NOT_FOUND, format!("{} does not chat", state.role.display_name())));
    }
    if req.content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "content is empty".to_string()));
    }

    let mut message = ChatMessage::text(&req.sender, &req.content, req.session_id.as_deref());
    message.recipient = state.role.name().to_string();
    message.message_type = req.message_type;
    let envelope = Envelope::new(&req.sender, state.role.name(), Payload::Chat(message));

    match ask(&state.mailbox, state.role, envelope).await {
        Ok(Payload::ChatResponse(response)) => Ok(Json(response)),
        Ok(other) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("unexpected reply kind '{}'", other.kind()),
        )),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use soro_agents::responses::GENERAL_LINES;
    use soro_agents::{spawn_agent, AgentContext, PsnConnect};
    use soro_core::relay::{LocalTransport, Relay, RelayPolicy};
    use soro_core::KnowledgeBase;
    use std::time::Duration;
    use tower::ServiceExt;

    fn psn_app() -> Router {
        let kb = Arc::new(KnowledgeBase::builtin().unwrap());
        let ctx = AgentContext::new(
            AgentRole::PsnConnect,
            "agent1test",
            Relay::new("psn_connect", Arc::new(LocalTransport::new()), RelayPolicy::single_attempt()),
        );
        let handle = spawn_agent(ctx, Box::new(PsnConnect::new(kb)), Duration::from_secs(60));
        router(Arc::new(AppState {
            role: AgentRole::PsnConnect,
            address: "agent1test".into(),
            mailbox: handle.mailbox,
        }))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_names_the_agent() {
        let resp = psn_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["agent"], "psn_connect");
    }

    #[tokio::test]
    async fn chat_replies_synchronously() {
        let resp = psn_app()
            .oneshot(post_json("/api/v1/chat", serde_json::json!({ "content": "hi there" })))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let reply: ChatResponse = serde_json::from_slice(&body).unwrap();
        assert!(GENERAL_LINES.contains(&reply.content.as_str()));
        assert_eq!(reply.responder_id, "psn_connect");
    }

    #[tokio::test]
    async fn misaddressed_envelopes_are_rejected() {
        let envelope = Envelope::new(
            "orchestrator",
            "soma_engine",
            Payload::EndSession {
                session_id: "s".into(),
            },
        );
        let resp = psn_app()
            .oneshot(post_json("/submit", serde_json::to_value(&envelope).unwrap()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
