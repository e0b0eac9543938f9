//! Knowledge base: the single versioned document holding every keyword table, the
//! intervention table, the peer roster and the group list.
//!
//! Loaded once at startup. The built-in document is embedded; `SORO__KNOWLEDGE_PATH` (or
//! [`KnowledgeBase::from_path`] in tests) substitutes another file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{SoroError, SoroResult};
use crate::models::{GroupSession, Intervention, PatternTag, PeerRecord};

const BUILTIN_KNOWLEDGE: &str = include_str!("../knowledge/default.toml");

/// Latest document version this build understands.
pub const KNOWLEDGE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPhrases {
    pub crisis_phrases: Vec<String>,
    #[serde(default)]
    pub high_risk_phrases: Vec<String>,
}

/// Tag added when any keyword is present in the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    pub tag: String,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    /// True if any keyword is a substring of the (already lowercased) text.
    pub fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Keyword lists for SoroMind's intent routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntentKeywords {
    #[serde(default)]
    pub request: Vec<String>,
    #[serde(default)]
    pub group: Vec<String>,
    #[serde(default)]
    pub peer: Vec<String>,
    #[serde(default)]
    pub coping: Vec<String>,
    #[serde(default)]
    pub breathing: Vec<String>,
    #[serde(default)]
    pub self_care: Vec<String>,
    #[serde(default)]
    pub academic: Vec<String>,
    #[serde(default)]
    pub sleep: Vec<String>,
    #[serde(default)]
    pub overwhelmed: Vec<String>,
    #[serde(default)]
    pub anxiety: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterventionRule {
    pub pattern: String,
    pub options: Vec<Intervention>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub version: u32,
    pub risk: RiskPhrases,
    #[serde(default)]
    pub patterns: Vec<KeywordRule>,
    #[serde(default)]
    pub emotions: Vec<KeywordRule>,
    #[serde(default)]
    pub intents: IntentKeywords,
    pub default_intervention: Intervention,
    #[serde(default)]
    pub interventions: Vec<InterventionRule>,
    #[serde(default)]
    pub peers: Vec<PeerRecord>,
    #[serde(default)]
    pub groups: Vec<GroupSession>,
}

impl KnowledgeBase {
    /// The document shipped with the crate.
    pub fn builtin() -> SoroResult<Self> {
        Self::from_toml_str(BUILTIN_KNOWLEDGE)
    }

    pub fn from_toml_str(raw: &str) -> SoroResult<Self> {
        let kb: KnowledgeBase = toml::from_str(raw)?;
        kb.validate()?;
        Ok(kb)
    }

    pub fn from_path(path: impl AsRef<Path>) -> SoroResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SoroError::Knowledge(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load from `path` when given, else the built-in document.
    pub fn load(path: Option<&Path>) -> SoroResult<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => Self::builtin(),
        }
    }

    /// Candidate interventions for a pattern in table order; unknown patterns get the default.
    pub fn interventions_for(&self, tag: &PatternTag) -> Vec<Intervention> {
        self.interventions
            .iter()
            .find(|rule| rule.pattern == tag.as_str())
            .map(|rule| rule.options.clone())
            .unwrap_or_else(|| vec![self.default_intervention.clone()])
    }

    pub fn peer(&self, id: &str) -> Option<&PeerRecord> {
        self.peers.iter().find(|p| p.id == id)
    }

    fn validate(&self) -> SoroResult<()> {
        if self.version == 0 || self.version > KNOWLEDGE_VERSION {
            return Err(SoroError::Knowledge(format!(
                "unsupported knowledge version {} (expected 1..={})",
                self.version, KNOWLEDGE_VERSION
            )));
        }
        if self.risk.crisis_phrases.iter().any(|p| p.trim().is_empty()) {
            return Err(SoroError::Knowledge("empty crisis phrase".into()));
        }
        for rule in self.patterns.iter().chain(self.emotions.iter()) {
            if rule.tag.trim().is_empty() {
                return Err(SoroError::Knowledge("keyword rule with empty tag".into()));
            }
        }
        let all_interventions = self
            .interventions
            .iter()
            .flat_map(|r| r.options.iter())
            .chain(std::iter::once(&self.default_intervention));
        for iv in all_interventions {
            if !(0.0..=1.0).contains(&iv.effectiveness) {
                return Err(SoroError::Knowledge(format!(
                    "intervention '{}' has effectiveness {} outside [0,1]",
                    iv.name, iv.effectiveness
                )));
            }
        }
        let mut seen = HashSet::new();
        for peer in &self.peers {
            if !seen.insert(peer.id.as_str()) {
                return Err(SoroError::Knowledge(format!("duplicate peer id {}", peer.id)));
            }
        }
        Ok(())
    }
}
