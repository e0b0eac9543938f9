//! Intervention selector: pattern tags + risk tier to a ranked, tier-truncated plan.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::SoroResult;
use crate::knowledge::KnowledgeBase;
use crate::models::{Intervention, PatternTag, RiskTier};
use crate::outcome::Outcome;

/// Top-K used by SoroMind's full-analysis path.
pub const SOROMIND_TOP_K: usize = 3;
/// Top-K used by the orchestrator when answering intervention requests.
pub const ORCHESTRATOR_TOP_K: usize = 2;

const DEFAULT_CONFIDENCE: f64 = 0.7;
const DEFAULT_DURATION_MINUTES: u32 = 15;
const HIGH_RISK_DURATION_MINUTES: u32 = 10;
const HIGH_RISK_GROUNDING: &str = "Immediate grounding exercise";

pub const CRISIS_TECHNIQUES: &[&str] = &[
    "Crisis protocol activation",
    "Professional crisis support",
    "Immediate human connection",
];

pub const CRISIS_RESOURCES: &[&str] = &[
    "National Suicide Prevention Lifeline: 988",
    "Crisis Text Line: Text HOME to 741741",
    "Emergency Services: 911",
];

/// What the user is offered for this turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionPlan {
    pub techniques: Vec<String>,
    pub reasoning: String,
    pub confidence: f64,
    pub duration_minutes: u32,
    pub resources: Vec<String>,
}

impl InterventionPlan {
    /// Fixed plan used when lookup fails.
    pub fn fallback() -> Self {
        Self {
            techniques: vec!["Mindful breathing".into(), "Grounding exercise".into()],
            reasoning: "Basic stress reduction techniques".into(),
            confidence: DEFAULT_CONFIDENCE,
            duration_minutes: 5,
            resources: vec!["Breathing exercise guide".into(), "Grounding techniques".into()],
        }
    }

    /// Fixed plan for CRISIS; replaces any computed ranking.
    pub fn crisis() -> Self {
        Self {
            techniques: CRISIS_TECHNIQUES.iter().map(|s| s.to_string()).collect(),
            reasoning: "IMMEDIATE PROFESSIONAL SUPPORT REQUIRED".into(),
            confidence: 1.0,
            duration_minutes: 0,
            resources: CRISIS_RESOURCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Where candidate interventions come from. The knowledge base is the production source.
pub trait InterventionSource: Send + Sync {
    fn interventions_for(&self, tag: &PatternTag) -> SoroResult<Vec<Intervention>>;
}

impl InterventionSource for KnowledgeBase {
    fn interventions_for(&self, tag: &PatternTag) -> SoroResult<Vec<Intervention>> {
        Ok(KnowledgeBase::interventions_for(self, tag))
    }
}

pub struct InterventionSelector {
    source: Arc<dyn InterventionSource>,
}

impl InterventionSelector {
    pub fn new(source: Arc<dyn InterventionSource>) -> Self {
        Self { source }
    }

    /// Rank interventions for the first `top_k` tags and shape the plan by tier.
    ///
    /// Never fails: a lookup error yields [`Outcome::Degraded`] carrying
    /// [`InterventionPlan::fallback`].
    pub fn select(&self, tags: &[PatternTag], tier: RiskTier, top_k: usize) -> Outcome<InterventionPlan> {
        if tier == RiskTier::Crisis {
            return Outcome::Complete(InterventionPlan::crisis());
        }
        match self.rank(tags, top_k) {
            Ok(ranked) => Outcome::Complete(shape(ranked, tags, tier, top_k)),
            Err(e) => {
                tracing::warn!(error = %e, tier = %tier, "intervention lookup failed; using fallback plan");
                Outcome::Degraded {
                    fallback: InterventionPlan::fallback(),
                    reason: e.to_string(),
                }
            }
        }
    }

    fn rank(&self, tags: &[PatternTag], top_k: usize) -> SoroResult<Vec<Intervention>> {
        let mut candidates = Vec::new();
        for tag in tags.iter().take(top_k) {
            candidates.extend(self.source.interventions_for(tag)?);
        }
        // sort_by is stable: ties keep table order, then tag order
        candidates.sort_by(|a, b| b.effectiveness.total_cmp(&a.effectiveness));
        Ok(candidates)
    }
}

fn shape(mut ranked: Vec<Intervention>, tags: &[PatternTag], tier: RiskTier, top_k: usize) -> InterventionPlan {
    let keep = match tier {
        RiskTier::Crisis => 1,
        RiskTier::High => 2,
        RiskTier::Medium | RiskTier::Low => 3,
    };
    ranked.truncate(keep);

    let confidence = ranked.first().map(|i| i.effectiveness).unwrap_or(DEFAULT_CONFIDENCE);
    let tag_list = tags
        .iter()
        .take(top_k)
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let mut reasoning = format!(
        "Based on patterns of {}, these evidence-based techniques have shown effectiveness in similar situations (confidence: {:.0}%).",
        if tag_list.is_empty() { "general distress" } else { tag_list.as_str() },
        confidence * 100.0
    );
    let resources = ranked
        .iter()
        .filter_map(|i| i.technique.as_ref().map(|t| format!("{}: {}", i.name, t)))
        .collect();
    let mut techniques: Vec<String> = ranked.into_iter().map(|i| i.name).collect();
    let mut duration_minutes = DEFAULT_DURATION_MINUTES;

    if tier == RiskTier::High {
        techniques.insert(0, HIGH_RISK_GROUNDING.to_string());
        duration_minutes = HIGH_RISK_DURATION_MINUTES;
        reasoning = format!("HIGH RISK - {}", reasoning);
    }

    InterventionPlan {
        techniques,
        reasoning,
        confidence,
        duration_minutes,
        resources,
    }
}

/// Protocol actions the orchestrator records for an elevated tier.
pub fn crisis_protocol(tier: RiskTier) -> Vec<&'static str> {
    match tier {
        RiskTier::Crisis => vec![
            "EMERGENCY PROTOCOL ACTIVATION",
            "Professional crisis support",
            "Immediate human connection",
            "Continuous monitoring",
        ],
        RiskTier::High => vec![
            "Immediate grounding techniques",
            "Crisis resource connection",
            "Safety planning",
            "Support network activation",
        ],
        RiskTier::Medium | RiskTier::Low => vec!["Monitoring and support"],
    }
}
