//! SOMA Engine: pattern analysis and enhanced monitoring.

use async_trait::async_trait;
use std::collections::HashSet;

use soro_core::classifier::{normalize, RiskClassifier};
use soro_core::config::AgentRole;
use soro_core::deep_analysis::{analyze_or_degrade, AsiClient, KeywordAnalyzer, PatternAnalyzer};
use soro_core::knowledge::KnowledgeBase;
use soro_core::messages::{
    Envelope, MentalStateAlert, PatternAnalysisRequest, PatternAnalysisResponse, Payload,
};
use soro_core::models::{PatternSet, RiskTier};
use soro_core::patterns::{cognitive_expansion, PatternExtractor};
use soro_core::SoroResult;

use crate::agent::{Agent, AgentContext};

const MAX_SUGGESTIONS: usize = 5;
const MEDIUM_PATTERN_COUNT: usize = 3;

pub struct SomaEngine {
    classifier: RiskClassifier,
    extractor: PatternExtractor,
    keyword: KeywordAnalyzer,
    analyzer: Option<Box<dyn PatternAnalyzer>>,
    monitored: HashSet<String>,
}

impl SomaEngine {
    pub fn new(kb: &KnowledgeBase, analyzer: Option<Box<dyn PatternAnalyzer>>) -> SoroResult<Self> {
        Ok(Self {
            classifier: RiskClassifier::new(kb)?,
            extractor: PatternExtractor::new(kb),
            keyword: KeywordAnalyzer::new(PatternExtractor::new(kb)),
            analyzer,
            monitored: HashSet::new(),
        })
    }

    /// Engine using `AsiClient` when `ASI_API_KEY` is set, keyword analysis otherwise.
    pub fn from_env(kb: &KnowledgeBase) -> SoroResult<Self> {
        let analyzer = AsiClient::from_env().map(|c| Box::new(c) as Box<dyn PatternAnalyzer>);
        match &analyzer {
            Some(a) => tracing::info!(analyzer = a.name(), "deep analysis enabled"),
            None => tracing::info!("ASI_API_KEY not set; keyword analysis only"),
        }
        Self::new(kb, analyzer)
    }

    pub async fn analyze(&self, request: &PatternAnalysisRequest) -> PatternAnalysisResponse {
        let outcome = analyze_or_degrade(
            self.analyzer.as_deref(),
            &self.keyword,
            &request.message,
            &request.conversation_history,
        )
        .await;
        let degraded_reason = outcome.degraded_reason().map(str::to_string);
        let analysis = outcome.into_value();

        let emotions = self.extractor.emotions(&request.message);
        let mut patterns = analysis.patterns;
        patterns.extend(emotions.iter().cloned());
        patterns.extend(cognitive_expansion(&emotions).iter().cloned());
        patterns.extend(self.extractor.expression_cues(&request.message).iter().cloned());

        let risk = self.assess(&request.message, &patterns);
        PatternAnalysisResponse {
            user_id: request.user_id.clone(),
            suggested_interventions: suggest(&patterns, risk),
            patterns: patterns.to_strings(),
            confidence: analysis.confidence,
            risk_assessment: risk,
            degraded_reason,
        }
    }

    /// SOMA's own tiering: crisis phrases (or any mention of harm), then anxiety with
    /// depression, then pattern volume.
    pub fn assess(&self, message: &str, patterns: &PatternSet) -> RiskTier {
        let mentions_harm = normalize(message)
            .split(' ')
            .any(|w| w.trim_matches(|c: char| !c.is_alphanumeric()) == "harm");
        if self.classifier.classify(message).is_crisis() || mentions_harm {
            RiskTier::Crisis
        } else if patterns.contains("anxiety") && patterns.contains("depression") {
            RiskTier::High
        } else if patterns.len() >= MEDIUM_PATTERN_COUNT {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn is_monitored(&self, user_id: &str) -> bool {
        self.monitored.contains(user_id)
    }

    fn on_alert(&mut self, from: &str, alert: &MentalStateAlert) {
        tracing::warn!(
            from = %from,
            user_id = %alert.user_id,
            tier = %alert.risk_level,
            patterns = ?alert.detected_patterns,
            actions = ?alert.recommended_actions,
            "mental state alert"
        );
        self.monitored.insert(alert.user_id.clone());
        if alert.risk_level.is_elevated() {
            tracing::info!(user_id = %alert.user_id, "enhanced monitoring activated");
        }
    }
}

/// Suggested interventions for the merged patterns, at most five.
pub fn suggest(patterns: &PatternSet, risk: RiskTier) -> Vec<String> {
    let mut out: Vec<&str> = Vec::new();
    if risk == RiskTier::Crisis {
        out.extend(["Immediate crisis intervention", "Emergency contact"]);
    }
    if patterns.contains("anxiety") {
        out.extend(["Breathing exercises", "Grounding techniques", "Mindfulness"]);
    }
    if patterns.contains("depression") {
        out.extend(["Behavioral activation", "Social connection", "Physical activity"]);
    }
    if patterns.contains("loneliness") {
        out.extend(["Peer support groups", "Community engagement"]);
    }
    out.push("Professional consultation");
    out.truncate(MAX_SUGGESTIONS);
    out.into_iter().map(str::to_string).collect()
}

#[async_trait]
impl Agent for SomaEngine {
    fn role(&self) -> AgentRole {
        AgentRole::SomaEngine
    }

    async fn handle(&mut self, _ctx: &AgentContext, envelope: Envelope) -> Option<Payload> {
        match envelope.payload {
            Payload::PatternAnalysisRequest(request) => {
                let response = self.analyze(&request).await;
                tracing::info!(
                    from = %envelope.sender,
                    user_id = %response.user_id,
                    patterns = response.patterns.len(),
                    risk = %response.risk_assessment,
                    degraded = response.degraded_reason.is_some(),
                    "pattern analysis completed"
                );
                Some(Payload::PatternAnalysisResponse(response))
            }
            Payload::MentalStateAlert(alert) => {
                self.on_alert(&envelope.sender, &alert);
                None
            }
            other => {
                tracing::debug!(kind = other.kind(), from = %envelope.sender, "soma engine ignores message");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use soro_core::deep_analysis::DeepAnalysis;
    use soro_core::error::SoroError;
    use soro_core::models::PatternTag;
    use soro_core::relay::{LocalTransport, Relay, RelayPolicy};
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl PatternAnalyzer for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn analyze(&self, _message: &str, _history: &[String]) -> SoroResult<DeepAnalysis> {
            Err(SoroError::Analysis("connection refused".into()))
        }
    }

    fn engine(analyzer: Option<Box<dyn PatternAnalyzer>>) -> SomaEngine {
        SomaEngine::new(&KnowledgeBase::builtin().unwrap(), analyzer).unwrap()
    }

    fn request(message: &str) -> PatternAnalysisRequest {
        PatternAnalysisRequest {
            user_id: "u1".into(),
            message: message.into(),
            conversation_history: vec![],
            timestamp: Utc::now(),
        }
    }

    fn set(tags: &[&str]) -> PatternSet {
        tags.iter().map(|t| PatternTag::new(*t)).collect()
    }

    #[tokio::test]
    async fn keyword_analysis_adds_emotions_and_expansion() {
        let response = engine(None).analyze(&request("I'm so anxious and sad!")).await;

        for tag in ["anxiety", "depression", "anxiety_pattern", "cognitive_depression", "emotional_intensity"] {
            assert!(response.patterns.contains(&tag.to_string()), "missing {tag}");
        }
        assert_eq!(response.risk_assessment, RiskTier::High);
        assert_eq!(response.confidence, 0.6);
        assert!(response.degraded_reason.is_none());
        assert_eq!(
            response.suggested_interventions,
            vec![
                "Breathing exercises",
                "Grounding techniques",
                "Mindfulness",
                "Behavioral activation",
                "Social connection"
            ]
        );
    }

    #[tokio::test]
    async fn failed_analyzer_marks_response_degraded() {
        let response = engine(Some(Box::new(Unreachable))).analyze(&request("I feel so alone")).await;
        assert_eq!(response.degraded_reason.as_deref(), Some("Analysis error: connection refused"));
        assert!(response.patterns.contains(&"loneliness".to_string()));
    }

    #[test]
    fn harm_is_crisis_for_soma() {
        let soma = engine(None);
        assert_eq!(soma.assess("I keep thinking about harm", &PatternSet::new()), RiskTier::Crisis);
        assert_eq!(soma.assess("pharmacy run", &PatternSet::new()), RiskTier::Low);
        assert_eq!(soma.assess("meh", &set(&["a", "b", "c"])), RiskTier::Medium);
    }

    #[test]
    fn crisis_suggestions_lead_and_are_capped() {
        let got = suggest(&set(&["anxiety"]), RiskTier::Crisis);
        assert_eq!(got.len(), 5);
        assert_eq!(got[0], "Immediate crisis intervention");
        assert!(!got.contains(&"Professional consultation".to_string()));
        assert_eq!(suggest(&PatternSet::new(), RiskTier::Low), vec!["Professional consultation"]);
    }

    #[tokio::test]
    async fn alerts_enable_monitoring() {
        let mut soma = engine(None);
        let ctx = AgentContext::new(
            AgentRole::SomaEngine,
            "agent1test",
            Relay::new("soma_engine", Arc::new(LocalTransport::new()), RelayPolicy::single_attempt()),
        );
        let alert = MentalStateAlert {
            user_id: "u9".into(),
            risk_level: RiskTier::Crisis,
            detected_patterns: vec![],
            recommended_actions: vec![],
            timestamp: Utc::now(),
        };
        let reply = soma
            .handle(&ctx, Envelope::new("soromind", "soma_engine", Payload::MentalStateAlert(alert)))
            .await;
        assert!(reply.is_none());
        assert!(soma.is_monitored("u9"));
    }
}
