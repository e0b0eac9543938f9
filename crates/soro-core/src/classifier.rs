//! Risk classifier: lexical crisis and high-risk phrase detection.
//!
//! Purely lexical. There is no negation handling, so "I do NOT want to kill myself" still
//! classifies as CRISIS.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::SoroResult;
use crate::knowledge::KnowledgeBase;
use crate::models::RiskTier;

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub crisis_terms: BTreeSet<String>,
    pub high_risk_terms: BTreeSet<String>,
}

impl RiskAssessment {
    pub fn is_crisis(&self) -> bool {
        self.tier == RiskTier::Crisis
    }
}

struct Phrase {
    text: String,
    pattern: Regex,
}

impl Phrase {
    fn compile(text: &str) -> SoroResult<Self> {
        let normalized = normalize(text);
        let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&normalized)))?;
        Ok(Self {
            text: normalized,
            pattern,
        })
    }
}

/// Compiled crisis and high-risk phrase lists.
pub struct RiskClassifier {
    crisis: Vec<Phrase>,
    high_risk: Vec<Phrase>,
}

impl RiskClassifier {
    pub fn new(kb: &KnowledgeBase) -> SoroResult<Self> {
        let crisis = kb
            .risk
            .crisis_phrases
            .iter()
            .map(|p| Phrase::compile(p))
            .collect::<SoroResult<Vec<_>>>()?;
        let high_risk = kb
            .risk
            .high_risk_phrases
            .iter()
            .map(|p| Phrase::compile(p))
            .collect::<SoroResult<Vec<_>>>()?;
        Ok(Self { crisis, high_risk })
    }

    /// Crisis beats high-risk; both absent is LOW. MEDIUM is never produced here.
    pub fn classify(&self, message: &str) -> RiskAssessment {
        let text = normalize(message);
        let crisis_terms = matched(&self.crisis, &text);
        let high_risk_terms = matched(&self.high_risk, &text);

        let tier = if !crisis_terms.is_empty() {
            RiskTier::Crisis
        } else if !high_risk_terms.is_empty() {
            RiskTier::High
        } else {
            RiskTier::Low
        };

        RiskAssessment {
            tier,
            crisis_terms,
            high_risk_terms,
        }
    }
}

fn matched(phrases: &[Phrase], text: &str) -> BTreeSet<String> {
    phrases
        .iter()
        .filter(|p| p.pattern.is_match(text))
        .map(|p| p.text.clone())
        .collect()
}

/// Lowercase, fold typographic apostrophes, and collapse whitespace runs to one space.
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace(['\u{2019}', '\u{2018}'], "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RiskClassifier {
        RiskClassifier::new(&KnowledgeBase::builtin().unwrap()).unwrap()
    }

    #[test]
    fn crisis_phrase_forces_crisis() {
        let c = classifier();
        for msg in [
            "I want to kill myself",
            "thinking about SUICIDE lately",
            "I might   end   my life",
            "everyone would be better off dead without me",
        ] {
            let r = c.classify(msg);
            assert_eq!(r.tier, RiskTier::Crisis, "{msg}");
            assert!(!r.crisis_terms.is_empty());
        }
    }

    #[test]
    fn crisis_wins_over_high_risk() {
        let r = classifier().classify("I feel hopeless and I want to end it all");
        assert_eq!(r.tier, RiskTier::Crisis);
        assert!(r.crisis_terms.contains("end it all"));
        assert!(r.high_risk_terms.contains("hopeless"));
    }

    #[test]
    fn high_risk_without_crisis() {
        let r = classifier().classify("Everything feels hopeless and I'm worthless");
        assert_eq!(r.tier, RiskTier::High);
        assert!(r.crisis_terms.is_empty());
        assert_eq!(r.high_risk_terms.len(), 2);
    }

    #[test]
    fn neutral_message_is_low() {
        let r = classifier().classify("I have an exam tomorrow and I'm a bit nervous");
        assert_eq!(r.tier, RiskTier::Low);
        assert!(r.crisis_terms.is_empty());
        assert!(r.high_risk_terms.is_empty());
    }

    #[test]
    fn word_boundaries_are_respected() {
        // "suicidewatch" is not the word "suicide"
        assert_eq!(classifier().classify("#suicidewatch trending").tier, RiskTier::Low);
    }

    #[test]
    fn negation_is_not_handled() {
        assert_eq!(
            classifier().classify("I do NOT want to kill myself").tier,
            RiskTier::Crisis
        );
    }

    #[test]
    fn typographic_apostrophe_matches() {
        let r = classifier().classify("I can\u{2019}t take it anymore");
        assert_eq!(r.tier, RiskTier::Crisis);
    }

    #[test]
    fn crisis_precedence_scenario() {
        let r = classifier()
            .classify("I want to kill myself, but I also need help studying for exams");
        assert!(r.is_crisis());
    }
}
