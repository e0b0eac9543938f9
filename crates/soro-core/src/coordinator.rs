//! Cross-agent coordination after a user-facing reply has been produced.
//!
//! Coordination never blocks or fails the reply. Each send is a [`Relay`] with a typed
//! outcome; exhausted relays are logged and the turn carries on.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;

use crate::config::AgentRole;
use crate::interventions::crisis_protocol;
use crate::messages::{
    InterventionRequest, MentalStateAlert, PatternAnalysisRequest, Payload, PeerSupportRequest,
};
use crate::models::RiskTier;
use crate::relay::{Relay, RelayOutcome};
use crate::routing::TurnRoute;

/// What one turn asks of the other agents.
#[derive(Debug, Clone, Default)]
pub struct CoordinationPlan {
    pub user_id: String,
    pub message: String,
    pub history: Vec<String>,
    pub patterns: Vec<String>,
    pub tier: RiskTier,
    pub pattern_analysis: bool,
    pub intervention: bool,
    pub alert: bool,
    pub peer_request: Option<PeerSupportRequest>,
}

impl CoordinationPlan {
    /// Derive the sends for a routed turn.
    ///
    /// - full analysis: pattern analysis (one attempt) and an intervention request
    /// - HIGH or CRISIS: an intervention request and an alert fan-out
    /// - group or peer intents: a peer-support request to PSN Connect
    pub fn for_turn(
        route: TurnRoute,
        tier: RiskTier,
        user_id: &str,
        message: &str,
        history: Vec<String>,
        patterns: Vec<String>,
    ) -> Self {
        let full = route == TurnRoute::FullAnalysis;
        let elevated = route == TurnRoute::CrisisBypass || tier.is_elevated();
        Self {
            user_id: user_id.to_string(),
            message: message.to_string(),
            history,
            patterns,
            tier,
            pattern_analysis: full,
            intervention: full || elevated,
            alert: elevated,
            peer_request: None,
        }
    }

    pub fn with_peer_request(mut self, request: PeerSupportRequest) -> Self {
        self.peer_request = Some(request);
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.pattern_analysis && !self.intervention && !self.alert && self.peer_request.is_none()
    }
}

/// Outcome of every send attempted for a turn.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinationReport {
    pub pattern_analysis: Option<RelayOutcome>,
    pub intervention: Option<RelayOutcome>,
    pub alerts: Vec<(String, RelayOutcome)>,
    pub peer_request: Option<RelayOutcome>,
}

impl CoordinationReport {
    pub fn alert_attempts(&self) -> u32 {
        self.alerts.iter().map(|(_, o)| o.attempts()).sum()
    }
}

pub struct Coordinator {
    relay: Relay,
}

impl Coordinator {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }

    /// Run every send in the plan. The alert fan-out runs whatever happened before it.
    pub async fn execute(&self, plan: CoordinationPlan) -> CoordinationReport {
        let mut report = CoordinationReport::default();
        let now = Utc::now();

        if plan.pattern_analysis {
            let request = PatternAnalysisRequest {
                user_id: plan.user_id.clone(),
                message: plan.message.clone(),
                conversation_history: plan.history.clone(),
                timestamp: now,
            };
            report.pattern_analysis = Some(
                self.relay
                    .relay_once(
                        AgentRole::SomaEngine.name(),
                        Payload::PatternAnalysisRequest(request),
                    )
                    .await,
            );
        }

        if plan.intervention {
            let request = InterventionRequest {
                user_id: plan.user_id.clone(),
                current_state: plan.message.clone(),
                detected_patterns: plan.patterns.clone(),
                risk_level: plan.tier,
                timestamp: now,
                user_preferences: HashMap::new(),
                session_context: HashMap::from([(
                    "history_len".to_string(),
                    serde_json::json!(plan.history.len()),
                )]),
            };
            report.intervention = Some(
                self.relay
                    .relay(
                        AgentRole::Orchestrator.name(),
                        Payload::InterventionRequest(request),
                    )
                    .await,
            );
        }

        if plan.alert {
            let alert = MentalStateAlert {
                user_id: plan.user_id.clone(),
                risk_level: plan.tier,
                detected_patterns: plan.patterns.clone(),
                recommended_actions: crisis_protocol(plan.tier)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                timestamp: now,
            };
            if report.intervention.as_ref().is_some_and(|o| !o.is_delivered()) {
                tracing::warn!(user_id = %plan.user_id, "intervention relay failed; alert fan-out proceeds");
            }
            for target in [AgentRole::Orchestrator, AgentRole::SomaEngine] {
                let outcome = self
                    .relay
                    .relay(target.name(), Payload::MentalStateAlert(alert.clone()))
                    .await;
                report.alerts.push((target.name().to_string(), outcome));
            }
        }

        if let Some(request) = plan.peer_request {
            report.peer_request = Some(
                self.relay
                    .relay_once(AgentRole::PsnConnect.name(), Payload::PeerSupportRequest(request))
                    .await,
            );
        }

        tracing::info!(
            user_id = %plan.user_id,
            tier = %plan.tier,
            intervention = ?report.intervention.as_ref().map(RelayOutcome::is_delivered),
            alerts = report.alerts.len(),
            "coordination finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SoroError, SoroResult};
    use crate::messages::Envelope;
    use crate::relay::{RelayPolicy, Transport};
    use crate::routing::Intent;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Records every attempt; refuses recipients listed in `down`.
    #[derive(Default)]
    struct RecordingTransport {
        down: Vec<&'static str>,
        attempts: Mutex<Vec<(String, &'static str)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn deliver(&self, envelope: &Envelope) -> SoroResult<()> {
            self.attempts
                .lock()
                .unwrap()
                .push((envelope.recipient.clone(), envelope.payload.kind()));
            if self.down.contains(&envelope.recipient.as_str()) {
                Err(SoroError::Transport(format!("{} unreachable", envelope.recipient)))
            } else {
                Ok(())
            }
        }
    }

    fn coordinator(transport: Arc<RecordingTransport>) -> Coordinator {
        Coordinator::new(Relay::new("soromind", transport, RelayPolicy::default()))
    }

    #[test]
    fn plans_per_route() {
        let full = CoordinationPlan::for_turn(TurnRoute::FullAnalysis, RiskTier::Low, "u", "m", vec![], vec![]);
        assert!(full.pattern_analysis && full.intervention && !full.alert);

        let crisis = CoordinationPlan::for_turn(TurnRoute::CrisisBypass, RiskTier::Crisis, "u", "m", vec![], vec![]);
        assert!(!crisis.pattern_analysis && crisis.intervention && crisis.alert);

        let calm_intent = CoordinationPlan::for_turn(
            TurnRoute::IntentMatch(Intent::AcademicStress),
            RiskTier::Low,
            "u",
            "m",
            vec![],
            vec![],
        );
        assert!(calm_intent.is_empty());

        let high_intent = CoordinationPlan::for_turn(
            TurnRoute::IntentMatch(Intent::Anxiety),
            RiskTier::High,
            "u",
            "m",
            vec![],
            vec![],
        );
        assert!(high_intent.intervention && high_intent.alert);
    }

    #[tokio::test(start_paused = true)]
    async fn crisis_alert_is_sent_even_when_intervention_relay_is_exhausted() {
        let transport = Arc::new(RecordingTransport {
            down: vec!["orchestrator"],
            ..Default::default()
        });
        let plan = CoordinationPlan::for_turn(
            TurnRoute::CrisisBypass,
            RiskTier::Crisis,
            "user-1",
            "I want to kill myself, but I also need help studying for exams",
            vec![],
            vec!["crisis".into()],
        );

        let report = coordinator(transport.clone()).execute(plan).await;

        assert!(!report.intervention.as_ref().unwrap().is_delivered());
        assert_eq!(report.alerts.len(), 2);
        let soma = report.alerts.iter().find(|(t, _)| t == "soma_engine").unwrap();
        assert!(soma.1.is_delivered());

        let attempts = transport.attempts.lock().unwrap();
        let alert_attempts = attempts
            .iter()
            .filter(|(_, kind)| *kind == "mental_state_alert")
            .count();
        // 3 retried attempts at the orchestrator + 1 delivered to SOMA
        assert_eq!(alert_attempts, 4);
        assert_eq!(report.alert_attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn full_analysis_sends_pattern_request_once() {
        let transport = Arc::new(RecordingTransport {
            down: vec!["soma_engine"],
            ..Default::default()
        });
        let plan = CoordinationPlan::for_turn(TurnRoute::FullAnalysis, RiskTier::Low, "u", "m", vec![], vec![]);

        let report = coordinator(transport.clone()).execute(plan).await;

        assert_eq!(report.pattern_analysis.as_ref().map(RelayOutcome::attempts), Some(1));
        assert!(report.intervention.as_ref().unwrap().is_delivered());
        assert!(report.alerts.is_empty());
        let kinds: Vec<&str> = transport.attempts.lock().unwrap().iter().map(|(_, k)| *k).collect();
        assert_eq!(kinds, vec!["pattern_analysis_request", "intervention_request"]);
    }
}
