//! SoroMind: the user-facing chat agent.
//!
//! Every turn is classified, routed, answered, and recorded in the session before any other
//! agent is contacted. Coordination with the orchestrator, SOMA Engine and PSN Connect runs on
//! a detached task after the reply exists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use soro_core::classifier::RiskClassifier;
use soro_core::config::AgentRole;
use soro_core::coordinator::{CoordinationPlan, Coordinator};
use soro_core::interventions::{InterventionSelector, SOROMIND_TOP_K};
use soro_core::knowledge::KnowledgeBase;
use soro_core::messages::{
    ChatMessage, ChatResponse, Envelope, Payload, PeerSupportRequest, ResponseType, SupportRequestType,
};
use soro_core::models::{PatternSet, PatternTag, RiskTier, Urgency};
use soro_core::patterns::{PatternExtractor, CRISIS_INDICATORS, EMOTIONAL_DISTRESS};
use soro_core::routing::{Intent, IntentRouter, TurnEnd, TurnRoute};
use soro_core::session::{MemorySessionStore, SessionStore, Speaker};
use soro_core::SoroResult;

use crate::agent::{Agent, AgentContext};
use crate::responses;

/// User messages forwarded to SOMA as conversation history.
const ANALYSIS_HISTORY: usize = 5;

/// Everything one chat turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: ChatResponse,
    pub route: TurnRoute,
    pub tier: RiskTier,
    pub plan: CoordinationPlan,
    pub end: TurnEnd,
}

pub struct SoroMind {
    kb: Arc<KnowledgeBase>,
    classifier: RiskClassifier,
    router: IntentRouter,
    extractor: PatternExtractor,
    selector: InterventionSelector,
    sessions: MemorySessionStore,
    /// Latest session per user, so late analysis results find their session.
    user_sessions: HashMap<String, String>,
}

impl SoroMind {
    pub fn new(kb: Arc<KnowledgeBase>, session_ttl_secs: u64, history_limit: usize) -> SoroResult<Self> {
        Ok(Self {
            classifier: RiskClassifier::new(&kb)?,
            router: IntentRouter::new(&kb),
            extractor: PatternExtractor::new(&kb),
            selector: InterventionSelector::new(kb.clone()),
            sessions: MemorySessionStore::new(session_ttl_secs, history_limit)?,
            user_sessions: HashMap::new(),
            kb,
        })
    }

    pub fn sessions(&self) -> &MemorySessionStore {
        &self.sessions
    }

    /// Run one turn: classify, route, answer, record. Sends nothing.
    pub fn respond(&mut self, chat: &ChatMessage, now: DateTime<Utc>) -> TurnOutcome {
        let session_id = chat.session_id.clone().unwrap_or_else(|| chat.sender.clone());
        let assessment = self.classifier.classify(&chat.content);
        let route = self.router.route(&chat.content, &assessment);
        let found = self.extractor.extract(&chat.content);

        let session = self.sessions.get_or_create(&session_id, now);
        let history = session.recent_user_messages(ANALYSIS_HISTORY);
        session.record(Speaker::User, &chat.content, now);
        session.merge_patterns(found.iter());
        let accumulated = session.patterns.to_strings();

        let tier = match route {
            TurnRoute::CrisisBypass => RiskTier::Crisis,
            TurnRoute::FullAnalysis if found.contains(CRISIS_INDICATORS) => RiskTier::Crisis,
            _ => assessment.tier.with_accumulated_patterns(accumulated.len()),
        };
        let content = self.compose(route, &chat.content, &found, tier);

        if let Some(session) = self.sessions.get_mut(&session_id) {
            session.record(Speaker::Agent, &content, now);
            session.risk_tier = tier;
        }
        self.user_sessions.insert(chat.sender.clone(), session_id.clone());

        let mut plan = CoordinationPlan::for_turn(route, tier, &chat.sender, &chat.content, history, accumulated);
        if let TurnRoute::IntentMatch(intent) = route {
            if intent.wants_peer_support() {
                let expertise_areas = plan.patterns.clone();
                plan = plan.with_peer_request(PeerSupportRequest {
                    user_id: chat.sender.clone(),
                    current_state: chat.content.clone(),
                    support_type: if intent == Intent::GroupConnection {
                        SupportRequestType::Group
                    } else {
                        SupportRequestType::Immediate
                    },
                    availability: Vec::new(),
                    expertise_areas,
                    urgency: Urgency::for_tier(tier),
                    timestamp: now,
                });
            }
        }

        tracing::info!(
            session_id = %session_id,
            route = ?route,
            tier = %tier,
            patterns = found.len(),
            "turn answered"
        );

        TurnOutcome {
            reply: ChatResponse::reply_to(chat, AgentRole::SoroMind.name(), ResponseType::Support, content),
            route,
            tier,
            plan,
            end: TurnEnd::AwaitNext,
        }
    }

    /// Explicit end of a conversation.
    pub fn end_session(&mut self, session_id: &str) -> TurnEnd {
        if self.sessions.delete(session_id).is_some() {
            tracing::info!(session_id = %session_id, "session ended");
        }
        self.user_sessions.retain(|_, sid| sid != session_id);
        TurnEnd::EndSession
    }

    /// Merge late analysis patterns into the user's live session, if there still is one.
    pub fn merge_analysis(&mut self, user_id: &str, patterns: &[String]) -> bool {
        let Some(session_id) = self.user_sessions.get(user_id) else {
            return false;
        };
        match self.sessions.get_mut(session_id) {
            Some(session) => {
                let tags: Vec<PatternTag> = patterns.iter().map(|p| PatternTag::new(p.as_str())).collect();
                session.merge_patterns(tags.iter());
                true
            }
            None => false,
        }
    }

    fn compose(&self, route: TurnRoute, message: &str, found: &PatternSet, tier: RiskTier) -> String {
        match route {
            TurnRoute::CrisisBypass => responses::crisis(),
            TurnRoute::IntentMatch(intent) => match intent {
                Intent::GroupConnection => responses::groups(&self.kb.groups),
                Intent::PeerConnection => responses::peers(&self.kb.peers),
                Intent::Resources => responses::resources(),
                Intent::BreathingExercise => responses::box_breathing(),
                Intent::CopingStrategies => responses::coping_strategies(),
                Intent::SelfCarePlan => responses::self_care_plan(),
                Intent::AcademicStress => responses::academic_stress(),
                Intent::SleepIssues => responses::sleep_issues(),
                Intent::Overwhelmed => responses::overwhelmed(),
                Intent::Anxiety => responses::anxiety(),
            },
            TurnRoute::FullAnalysis => self.analyzed(message, found, tier),
        }
    }

    fn analyzed(&self, message: &str, found: &PatternSet, tier: RiskTier) -> String {
        if found.contains(CRISIS_INDICATORS) {
            return responses::crisis();
        }
        if found.contains("academic_stress") && found.contains("sleep_issues") {
            return responses::exam_and_sleep();
        }
        // HIGH always goes through selection so the grounding step leads the reply.
        let tags: Vec<PatternTag> = if tier.is_elevated() {
            found.iter().cloned().collect()
        } else {
            found
                .iter()
                .filter(|t| t.as_str() != EMOTIONAL_DISTRESS)
                .cloned()
                .collect()
        };
        if tags.is_empty() && !tier.is_elevated() {
            return responses::general_support(message);
        }
        let selected = self.selector.select(&tags, tier, SOROMIND_TOP_K);
        if let Some(reason) = selected.degraded_reason() {
            tracing::warn!(reason, "using fallback interventions");
        }
        responses::from_plan(selected.value(), tier >= RiskTier::Medium)
            .unwrap_or_else(|| responses::general_support(message))
    }
}

#[async_trait]
impl Agent for SoroMind {
    fn role(&self) -> AgentRole {
        AgentRole::SoroMind
    }

    async fn handle(&mut self, ctx: &AgentContext, envelope: Envelope) -> Option<Payload> {
        match envelope.payload {
            Payload::Chat(chat) => {
                let outcome = self.respond(&chat, Utc::now());
                if !outcome.plan.is_empty() {
                    let coordinator = Coordinator::new(ctx.relay.clone());
                    let plan = outcome.plan;
                    tokio::spawn(async move {
                        coordinator.execute(plan).await;
                    });
                }
                Some(Payload::ChatResponse(outcome.reply))
            }
            Payload::EndSession { session_id } => {
                self.end_session(&session_id);
                None
            }
            Payload::PatternAnalysisResponse(analysis) => {
                let merged = self.merge_analysis(&analysis.user_id, &analysis.patterns);
                tracing::info!(
                    user_id = %analysis.user_id,
                    patterns = analysis.patterns.len(),
                    risk = %analysis.risk_assessment,
                    degraded = analysis.degraded_reason.is_some(),
                    merged,
                    "pattern analysis received"
                );
                None
            }
            Payload::InterventionResponse(response) => {
                tracing::info!(
                    user_id = %response.user_id,
                    techniques = ?response.recommended_techniques,
                    confidence = response.confidence,
                    "intervention recommendation received"
                );
                None
            }
            other => {
                tracing::debug!(kind = other.kind(), from = %envelope.sender, "soromind ignores message");
                None
            }
        }
    }

    fn on_tick(&mut self, now: DateTime<Utc>) {
        let expired = self.sessions.expire(now);
        if expired > 0 {
            let sessions = &self.sessions;
            self.user_sessions.retain(|_, sid| sessions.get(sid).is_some());
            tracing::info!(expired, remaining = self.sessions.len(), "expired idle sessions");
        }
    }
}
