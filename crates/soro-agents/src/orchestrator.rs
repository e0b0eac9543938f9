//! SORO Orchestrator: intervention selection, peer-support escalation, alert ledger.
//!
//! Only `mental_state_alert` messages reach the ledger, so one incident is one entry.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use soro_core::config::AgentRole;
use soro_core::interventions::{crisis_protocol, InterventionSelector, ORCHESTRATOR_TOP_K};
use soro_core::knowledge::KnowledgeBase;
use soro_core::ledger::{AlertEntry, AlertLedger};
use soro_core::messages::{
    Envelope, InterventionRequest, InterventionResponse, MentalStateAlert, Payload,
    PeerSupportRecommendation, SupportType,
};
use soro_core::models::{PatternTag, RiskTier, Urgency};

use crate::agent::{Agent, AgentContext};

const RECOMMENDATION_CONFIDENCE: f64 = 0.8;

pub struct Orchestrator {
    selector: InterventionSelector,
    ledger: AlertLedger,
}

impl Orchestrator {
    pub fn new(kb: Arc<KnowledgeBase>, ledger: AlertLedger) -> Self {
        Self {
            selector: InterventionSelector::new(kb),
            ledger,
        }
    }

    pub fn ledger(&self) -> &AlertLedger {
        &self.ledger
    }

    /// Pick interventions for the request. MEDIUM and HIGH also produce a peer-support
    /// recommendation for PSN Connect.
    pub fn plan(&self, request: &InterventionRequest) -> (InterventionResponse, Option<PeerSupportRecommendation>) {
        let tags: Vec<PatternTag> = request
            .detected_patterns
            .iter()
            .map(|p| PatternTag::new(p.as_str()))
            .collect();
        let selected = self.selector.select(&tags, request.risk_level, ORCHESTRATOR_TOP_K);
        if let Some(reason) = selected.degraded_reason() {
            tracing::warn!(user_id = %request.user_id, reason, "using fallback interventions");
        }
        let plan = selected.into_value();

        let response = InterventionResponse {
            user_id: request.user_id.clone(),
            recommended_techniques: plan.techniques,
            reasoning: plan.reasoning,
            confidence: plan.confidence,
            estimated_duration: plan.duration_minutes,
            resources: plan.resources,
        };

        let recommendation = matches!(request.risk_level, RiskTier::Medium | RiskTier::High).then(|| {
            PeerSupportRecommendation {
                user_id: request.user_id.clone(),
                support_type: SupportType::PeerSupport,
                urgency: Urgency::for_tier(request.risk_level),
                patterns: request.detected_patterns.clone(),
                confidence: RECOMMENDATION_CONFIDENCE,
                timestamp: Utc::now(),
            }
        });
        (response, recommendation)
    }

    /// Append an alert and its protocol to the ledger. Ledger failures are logged, not raised.
    pub fn record_alert(&self, alert: MentalStateAlert, reported_by: &str) {
        let protocol: Vec<String> = crisis_protocol(alert.risk_level)
            .into_iter()
            .map(str::to_string)
            .collect();
        let user_id = alert.user_id.clone();
        let tier = alert.risk_level;
        let entry = AlertEntry {
            alert,
            protocol,
            reported_by: reported_by.to_string(),
        };
        match self.ledger.record_alert(&entry) {
            Ok(key) => tracing::warn!(user_id = %user_id, tier = %tier, from = %reported_by, key = %key, "alert recorded"),
            Err(e) => tracing::error!(user_id = %user_id, tier = %tier, error = %e, "failed to record alert"),
        }
    }
}

#[async_trait]
impl Agent for Orchestrator {
    fn role(&self) -> AgentRole {
        AgentRole::Orchestrator
    }

    async fn handle(&mut self, ctx: &AgentContext, envelope: Envelope) -> Option<Payload> {
        let sender = envelope.sender;
        match envelope.payload {
            Payload::InterventionRequest(request) => {
                let (response, recommendation) = self.plan(&request);
                tracing::info!(
                    from = %sender,
                    user_id = %request.user_id,
                    tier = %request.risk_level,
                    techniques = ?response.recommended_techniques,
                    "interventions selected"
                );

                if let Some(recommendation) = recommendation {
                    let relay = ctx.relay.clone();
                    tokio::spawn(async move {
                        relay
                            .relay(
                                AgentRole::PsnConnect.name(),
                                Payload::PeerSupportRecommendation(recommendation),
                            )
                            .await;
                    });
                }
                Some(Payload::InterventionResponse(response))
            }
            Payload::MentalStateAlert(alert) => {
                self.record_alert(alert, &sender);
                None
            }
            Payload::PeerSupportActivation(activation) => {
                match self.ledger.record_activation(&activation) {
                    Ok(_) => tracing::info!(
                        session_id = %activation.session_id,
                        user_id = %activation.user_id,
                        peers = activation.matched_peers.len(),
                        "peer support activated"
                    ),
                    Err(e) => tracing::error!(session_id = %activation.session_id, error = %e, "failed to record activation"),
                }
                None
            }
            Payload::PatternAnalysisResponse(analysis) => {
                tracing::info!(
                    from = %sender,
                    user_id = %analysis.user_id,
                    patterns = ?analysis.patterns,
                    risk = %analysis.risk_assessment,
                    "pattern analysis received"
                );
                None
            }
            other => {
                tracing::debug!(kind = other.kind(), from = %sender, "orchestrator ignores message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soro_core::relay::{LocalTransport, Relay, RelayPolicy};
    use std::collections::HashMap;

    fn orchestrator() -> Orchestrator {
        let kb = Arc::new(KnowledgeBase::builtin().unwrap());
        Orchestrator::new(kb, AlertLedger::open(None::<&str>).unwrap())
    }

    fn request(tier: RiskTier, patterns: &[&str]) -> InterventionRequest {
        InterventionRequest {
            user_id: "u1".into(),
            current_state: "state".into(),
            detected_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            risk_level: tier,
            timestamp: Utc::now(),
            user_preferences: HashMap::new(),
            session_context: HashMap::new(),
        }
    }

    #[test]
    fn low_tier_uses_top_two_patterns_only() {
        let (response, recommendation) = orchestrator().plan(&request(RiskTier::Low, &["anxiety", "stress", "depression"]));
        assert_eq!(
            response.recommended_techniques,
            vec!["Box Breathing", "Physical Activity", "Mindful Breathing"]
        );
        assert!(recommendation.is_none());
    }

    #[test]
    fn high_tier_recommends_urgent_peer_support() {
        let (response, recommendation) = orchestrator().plan(&request(RiskTier::High, &["anxiety"]));
        assert_eq!(response.recommended_techniques[0], "Immediate grounding exercise");
        assert_eq!(response.estimated_duration, 10);
        let recommendation = recommendation.expect("recommendation");
        assert_eq!(recommendation.urgency, Urgency::High);
        assert_eq!(recommendation.confidence, 0.8);
        assert_eq!(recommendation.support_type, SupportType::PeerSupport);
    }

    #[tokio::test]
    async fn crisis_request_is_answered_with_resources_but_not_ledgered() {
        let mut orch = orchestrator();
        let ctx = AgentContext::new(
            AgentRole::Orchestrator,
            "agent1test",
            Relay::new("orchestrator", Arc::new(LocalTransport::new()), RelayPolicy::single_attempt()),
        );

        let reply = orch
            .handle(
                &ctx,
                Envelope::new("soromind", "orchestrator", Payload::InterventionRequest(request(RiskTier::Crisis, &[]))),
            )
            .await;

        let Some(Payload::InterventionResponse(response)) = reply else {
            panic!("expected an intervention response");
        };
        assert!(response.resources.iter().any(|r| r.contains("988")));
        assert!(orch.ledger().recent_alerts(5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn crisis_turn_is_one_ledger_entry() {
        let mut orch = orchestrator();
        let ctx = AgentContext::new(
            AgentRole::Orchestrator,
            "agent1test",
            Relay::new("orchestrator", Arc::new(LocalTransport::new()), RelayPolicy::single_attempt()),
        );
        let alert = MentalStateAlert {
            user_id: "u1".into(),
            risk_level: RiskTier::Crisis,
            detected_patterns: vec![],
            recommended_actions: crisis_protocol(RiskTier::Crisis).into_iter().map(str::to_string).collect(),
            timestamp: Utc::now(),
        };

        // What SoroMind sends for a crisis turn: the intervention request, then the alert.
        orch.handle(
            &ctx,
            Envelope::new("soromind", "orchestrator", Payload::InterventionRequest(request(RiskTier::Crisis, &[]))),
        )
        .await;
        orch.handle(&ctx, Envelope::new("soromind", "orchestrator", Payload::MentalStateAlert(alert)))
            .await;

        assert_eq!(orch.ledger().count_at_or_above(RiskTier::Crisis).unwrap(), 1);
        let recent = orch.ledger().recent_alerts(5).unwrap();
        assert_eq!(recent[0].reported_by, "soromind");
        assert_eq!(recent[0].protocol[0], "EMERGENCY PROTOCOL ACTIVATION");
    }

    #[tokio::test]
    async fn alerts_are_recorded_without_reply() {
        let mut orch = orchestrator();
        let ctx = AgentContext::new(
            AgentRole::Orchestrator,
            "agent1test",
            Relay::new("orchestrator", Arc::new(LocalTransport::new()), RelayPolicy::single_attempt()),
        );
        let alert = MentalStateAlert {
            user_id: "u2".into(),
            risk_level: RiskTier::High,
            detected_patterns: vec!["anxiety".into()],
            recommended_actions: vec![],
            timestamp: Utc::now(),
        };
        let reply = orch
            .handle(&ctx, Envelope::new("soromind", "orchestrator", Payload::MentalStateAlert(alert)))
            .await;
        assert!(reply.is_none());
        assert_eq!(orch.ledger().count_at_or_above(RiskTier::High).unwrap(), 1);
    }
}
