//! Per-turn routing: RECEIVE → CLASSIFY → (CRISIS_BYPASS | INTENT_MATCH | FULL_ANALYSIS).
//!
//! First match wins. A crisis assessment always bypasses intent matching, so a turn that
//! mentions both self-harm and exams is never treated as an academic request.

use serde::{Deserialize, Serialize};

use crate::classifier::{normalize, RiskAssessment};
use crate::knowledge::{IntentKeywords, KnowledgeBase};

/// Explicit requests and emotional states SoroMind answers with a canned response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    GroupConnection,
    PeerConnection,
    Resources,
    BreathingExercise,
    CopingStrategies,
    SelfCarePlan,
    AcademicStress,
    SleepIssues,
    Overwhelmed,
    Anxiety,
}

impl Intent {
    /// Intents that are served by PSN Connect.
    pub fn wants_peer_support(&self) -> bool {
        matches!(self, Intent::GroupConnection | Intent::PeerConnection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "route", content = "intent")]
pub enum TurnRoute {
    CrisisBypass,
    IntentMatch(Intent),
    FullAnalysis,
}

/// What happens after the reply is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEnd {
    AwaitNext,
    EndSession,
}

pub struct IntentRouter {
    keywords: IntentKeywords,
}

impl IntentRouter {
    pub fn new(kb: &KnowledgeBase) -> Self {
        Self {
            keywords: kb.intents.clone(),
        }
    }

    pub fn route(&self, message: &str, assessment: &RiskAssessment) -> TurnRoute {
        if assessment.is_crisis() {
            return TurnRoute::CrisisBypass;
        }
        match self.intent(message) {
            Some(intent) => TurnRoute::IntentMatch(intent),
            None => TurnRoute::FullAnalysis,
        }
    }

    /// Intent keywords in priority order; `None` sends the turn to full analysis.
    pub fn intent(&self, message: &str) -> Option<Intent> {
        let text = normalize(message);
        let kw = &self.keywords;
        let any = |words: &[String]| words.iter().any(|w| text.contains(w.as_str()));

        if any(&kw.request) {
            return Some(if any(&kw.group) {
                Intent::GroupConnection
            } else if any(&kw.peer) {
                Intent::PeerConnection
            } else {
                Intent::Resources
            });
        }
        if any(&kw.coping) {
            return Some(if any(&kw.breathing) {
                Intent::BreathingExercise
            } else {
                Intent::CopingStrategies
            });
        }
        if any(&kw.self_care) {
            return Some(Intent::SelfCarePlan);
        }
        if any(&kw.academic) {
            return Some(Intent::AcademicStress);
        }
        if any(&kw.sleep) {
            return Some(Intent::SleepIssues);
        }
        if any(&kw.overwhelmed) {
            return Some(Intent::Overwhelmed);
        }
        if any(&kw.anxiety) {
            return Some(Intent::Anxiety);
        }
        None
    }
}
