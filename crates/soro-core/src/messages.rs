//! Wire messages exchanged between agents.
//!
//! Every inter-agent send is an [`Envelope`] whose [`Payload`] is tagged by `kind`:
//!
//! ```json
//! { "id": "…", "sender": "agent1…", "recipient": "agent1…", "sent_at": "…",
//!   "payload": { "kind": "intervention_request", "body": { … } } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::models::{GroupSession, PeerRecord, RiskTier, Urgency};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    pub sent_at: DateTime<Utc>,
    pub payload: Payload,
}

impl Envelope {
    pub fn new(sender: &str, recipient: &str, payload: Payload) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            sent_at: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Payload {
    Chat(ChatMessage),
    ChatResponse(ChatResponse),
    EndSession { session_id: String },
    InterventionRequest(InterventionRequest),
    InterventionResponse(InterventionResponse),
    PatternAnalysisRequest(PatternAnalysisRequest),
    PatternAnalysisResponse(PatternAnalysisResponse),
    PeerSupportRecommendation(PeerSupportRecommendation),
    PeerSupportActivation(PeerSupportActivation),
    PeerSupportRequest(PeerSupportRequest),
    PeerMatchResponse(PeerMatchResponse),
    SupportSession(SupportSession),
    MentalStateAlert(MentalStateAlert),
}

impl Payload {
    /// Short kind label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Chat(_) => "chat",
            Payload::ChatResponse(_) => "chat_response",
            Payload::EndSession { .. } => "end_session",
            Payload::InterventionRequest(_) => "intervention_request",
            Payload::InterventionResponse(_) => "intervention_response",
            Payload::PatternAnalysisRequest(_) => "pattern_analysis_request",
            Payload::PatternAnalysisResponse(_) => "pattern_analysis_response",
            Payload::PeerSupportRecommendation(_) => "peer_support_recommendation",
            Payload::PeerSupportActivation(_) => "peer_support_activation",
            Payload::PeerSupportRequest(_) => "peer_support_request",
            Payload::PeerMatchResponse(_) => "peer_match_response",
            Payload::SupportSession(_) => "support_session",
            Payload::MentalStateAlert(_) => "mental_state_alert",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChatMessageType {
    #[default]
    Text,
    SupportRequest,
    Encouragement,
}

/// Inbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    #[serde(default)]
    pub recipient: String,
    pub content: String,
    #[serde(default)]
    pub message_type: ChatMessageType,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatMessage {
    pub fn text(sender: &str, content: &str, session_id: Option<&str>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender: sender.to_string(),
            recipient: String::new(),
            content: content.to_string(),
            message_type: ChatMessageType::Text,
            timestamp: Utc::now(),
            session_id: session_id.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Support,
    Encouragement,
    General,
    Error,
}

/// Outbound chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub original_message_id: String,
    pub content: String,
    pub responder_id: String,
    pub response_type: ResponseType,
    pub timestamp: DateTime<Utc>,
}

impl ChatResponse {
    pub fn reply_to(original: &ChatMessage, responder: &str, response_type: ResponseType, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            original_message_id: original.id.clone(),
            content,
            responder_id: responder.to_string(),
            response_type,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionRequest {
    pub user_id: String,
    pub current_state: String,
    pub detected_patterns: Vec<String>,
    pub risk_level: RiskTier,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_preferences: HashMap<String, Value>,
    #[serde(default)]
    pub session_context: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionResponse {
    pub user_id: String,
    pub recommended_techniques: Vec<String>,
    pub reasoning: String,
    pub confidence: f64,
    pub estimated_duration: u32,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternAnalysisRequest {
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub conversation_history: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternAnalysisResponse {
    pub user_id: String,
    pub patterns: Vec<String>,
    pub confidence: f64,
    pub risk_assessment: RiskTier,
    pub suggested_interventions: Vec<String>,
    /// Set when the deep analyzer failed and keyword analysis stood in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportType {
    PeerSupport,
    Group,
    Professional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSupportRecommendation {
    pub user_id: String,
    pub support_type: SupportType,
    pub urgency: Urgency,
    pub patterns: Vec<String>,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSupportActivation {
    pub session_id: String,
    pub user_id: String,
    pub support_type: SupportType,
    pub matched_peers: Vec<MatchedPeer>,
    pub group_sessions: Vec<GroupSession>,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportRequestType {
    Immediate,
    Scheduled,
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerSupportRequest {
    pub user_id: String,
    pub current_state: String,
    pub support_type: SupportRequestType,
    #[serde(default)]
    pub availability: Vec<String>,
    #[serde(default)]
    pub expertise_areas: Vec<String>,
    #[serde(default)]
    pub urgency: Urgency,
    pub timestamp: DateTime<Utc>,
}

/// A scored peer as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPeer {
    pub peer: PeerRecord,
    pub score: f64,
    pub match_reason: String,
    pub response_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerMatchResponse {
    pub user_id: String,
    pub matched_peers: Vec<MatchedPeer>,
    pub recommended_groups: Vec<GroupSession>,
    pub estimated_wait_time: u32,
    pub match_confidence: f64,
    pub recommended_approach: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportSession {
    pub session_id: String,
    pub user_id: String,
    #[serde(default)]
    pub peer_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    pub session_type: String,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Fan-out alert; no acknowledgement is expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentalStateAlert {
    pub user_id: String,
    pub risk_level: RiskTier,
    pub detected_patterns: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_is_tagged_by_kind() {
        let env = Envelope::new(
            "agent1a",
            "agent1b",
            Payload::EndSession { session_id: "s-1".into() },
        );
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["payload"]["kind"], "end_session");
        assert_eq!(v["payload"]["body"]["session_id"], "s-1");
    }

    #[test]
    fn chat_message_accepts_minimal_json() {
        let raw = r#"{
            "id": "m1",
            "sender": "user-7",
            "content": "I feel anxious",
            "message_type": "support_request",
            "timestamp": "2025-01-01T00:00:00Z"
        }"#;
        let msg: ChatMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.message_type, ChatMessageType::SupportRequest);
        assert!(msg.session_id.is_none());
        assert!(msg.recipient.is_empty());
    }

    #[test]
    fn alert_round_trips_through_envelope() {
        let alert = MentalStateAlert {
            user_id: "u1".into(),
            risk_level: RiskTier::Crisis,
            detected_patterns: vec!["crisis".into()],
            recommended_actions: vec!["Emergency contact".into()],
            timestamp: Utc::now(),
        };
        let env = Envelope::new("a", "b", Payload::MentalStateAlert(alert));
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        match back.payload {
            Payload::MentalStateAlert(a) => assert_eq!(a.risk_level, RiskTier::Crisis),
            other => panic!("unexpected payload {}", other.kind()),
        }
    }
}
