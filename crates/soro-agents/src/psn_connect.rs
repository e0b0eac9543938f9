//! PSN Connect: peer matching, support-session tracking, and peer chat.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use soro_core::config::AgentRole;
use soro_core::knowledge::KnowledgeBase;
use soro_core::messages::{
    ChatMessage, ChatMessageType, ChatResponse, Envelope, Payload, PeerSupportActivation,
    PeerSupportRecommendation, ResponseType, SessionStatus, SupportRequestType, SupportSession,
    SupportType,
};
use soro_core::peers::{PeerMatcher, PeerQuery};

use crate::agent::{Agent, AgentContext};
use crate::responses;

pub struct PsnConnect {
    matcher: PeerMatcher,
    sessions: HashMap<String, SupportSession>,
}

impl PsnConnect {
    pub fn new(kb: Arc<KnowledgeBase>) -> Self {
        Self {
            matcher: PeerMatcher::new(kb),
            sessions: HashMap::new(),
        }
    }

    pub fn session(&self, session_id: &str) -> Option<&SupportSession> {
        self.sessions.get(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Match on the recommendation's patterns and open a session with the best peer, or the
    /// best group when no peer qualifies.
    pub fn activate(&mut self, recommendation: &PeerSupportRecommendation) -> PeerSupportActivation {
        let query = PeerQuery {
            desired_state: recommendation.patterns.join(" "),
            support_type: request_type(recommendation.support_type),
            availability: Vec::new(),
            expertise_areas: recommendation.patterns.clone(),
            urgency: recommendation.urgency,
        };
        let matched_peers = self.matcher.match_peers(&query);
        let group_sessions = self.matcher.match_groups(&query.desired_state, &query.expertise_areas);
        let session_id = format!("session_{}", uuid::Uuid::new_v4().simple());

        let opened = if let Some(top) = matched_peers.first() {
            Some(SupportSession {
                session_id: session_id.clone(),
                user_id: recommendation.user_id.clone(),
                peer_id: Some(top.peer.id.clone()),
                group_id: None,
                session_type: "peer_support".to_string(),
                scheduled_time: (query.support_type == SupportRequestType::Immediate).then(Utc::now),
                status: SessionStatus::Active,
                notes: Some(top.match_reason.clone()),
            })
        } else {
            group_sessions.first().map(|group| SupportSession {
                session_id: session_id.clone(),
                user_id: recommendation.user_id.clone(),
                peer_id: None,
                group_id: Some(group.id.clone()),
                session_type: "group".to_string(),
                scheduled_time: None,
                status: SessionStatus::Active,
                notes: Some(group.schedule.clone()),
            })
        };

        let reason = match &opened {
            Some(session) => {
                self.sessions.insert(session.session_id.clone(), session.clone());
                format!(
                    "Support activated for {} ({} peers, {} groups matched)",
                    recommendation.patterns.join(", "),
                    matched_peers.len(),
                    group_sessions.len()
                )
            }
            None => "No matching peers or groups available; self-guided resources recommended".to_string(),
        };

        tracing::info!(
            user_id = %recommendation.user_id,
            session_id = %session_id,
            opened = opened.is_some(),
            peers = matched_peers.len(),
            groups = group_sessions.len(),
            "peer support recommendation handled"
        );

        PeerSupportActivation {
            session_id,
            user_id: recommendation.user_id.clone(),
            support_type: recommendation.support_type,
            matched_peers,
            group_sessions,
            reason,
        }
    }

    /// Track a status change. Completed and cancelled sessions are dropped.
    pub fn update_session(&mut self, update: SupportSession) {
        match update.status {
            SessionStatus::Completed | SessionStatus::Cancelled => {
                if self.sessions.remove(&update.session_id).is_some() {
                    tracing::info!(session_id = %update.session_id, status = ?update.status, "support session closed");
                }
            }
            SessionStatus::Active => {
                tracing::info!(session_id = %update.session_id, user_id = %update.user_id, "support session active");
                self.sessions.insert(update.session_id.clone(), update);
            }
        }
    }

    pub fn chat_reply(&self, chat: &ChatMessage) -> ChatResponse {
        let response_type = match chat.message_type {
            ChatMessageType::SupportRequest => ResponseType::Support,
            ChatMessageType::Encouragement => ResponseType::Encouragement,
            ChatMessageType::Text => ResponseType::General,
        };
        let responder = AgentRole::PsnConnect.name();
        match responses::peer_line(chat.message_type) {
            Some(line) => ChatResponse::reply_to(chat, responder, response_type, line.to_string()),
            None => ChatResponse::reply_to(chat, responder, ResponseType::Error, responses::CHAT_ERROR.to_string()),
        }
    }
}

fn request_type(support_type: SupportType) -> SupportRequestType {
    match support_type {
        SupportType::PeerSupport => SupportRequestType::Immediate,
        SupportType::Group => SupportRequestType::Group,
        SupportType::Professional => SupportRequestType::Scheduled,
    }
}

#[async_trait]
impl Agent for PsnConnect {
    fn role(&self) -> AgentRole {
        AgentRole::PsnConnect
    }

    async fn handle(&mut self, _ctx: &AgentContext, envelope: Envelope) -> Option<Payload> {
        match envelope.payload {
            Payload::PeerSupportRequest(request) => {
                let response = self.matcher.respond(&request);
                tracing::info!(
                    from = %envelope.sender,
                    user_id = %request.user_id,
                    peers = response.matched_peers.len(),
                    groups = response.recommended_groups.len(),
                    wait_minutes = response.estimated_wait_time,
                    "peer match computed"
                );
                Some(Payload::PeerMatchResponse(response))
            }
            Payload::PeerSupportRecommendation(recommendation) => {
                Some(Payload::PeerSupportActivation(self.activate(&recommendation)))
            }
            Payload::SupportSession(update) => {
                self.update_session(update);
                None
            }
            Payload::Chat(chat) => Some(Payload::ChatResponse(self.chat_reply(&chat))),
            other => {
                tracing::debug!(kind = other.kind(), from = %envelope.sender, "psn connect ignores message");
                None
            }
        }
    }
}
