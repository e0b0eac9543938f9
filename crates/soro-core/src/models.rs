//! Shared domain types: risk tiers, pattern tags, interventions, peer roster records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete risk severity assigned per message. Ordered LOW < MEDIUM < HIGH < CRISIS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
    Crisis,
}

impl RiskTier {
    /// Number of accumulated pattern tags above which a LOW tier becomes MEDIUM.
    pub const MEDIUM_PATTERN_THRESHOLD: usize = 2;

    /// Raise LOW to MEDIUM when more than two pattern tags have accumulated. Never lowers a tier.
    pub fn with_accumulated_patterns(self, pattern_count: usize) -> Self {
        if self == RiskTier::Low && pattern_count > Self::MEDIUM_PATTERN_THRESHOLD {
            RiskTier::Medium
        } else {
            self
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Crisis => "crisis",
        }
    }

    pub fn is_elevated(&self) -> bool {
        *self >= RiskTier::High
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency carried by peer-support requests and recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
}

impl Urgency {
    /// Urgency the orchestrator attaches to a peer-support recommendation for a tier.
    pub fn for_tier(tier: RiskTier) -> Self {
        match tier {
            RiskTier::High | RiskTier::Crisis => Urgency::High,
            RiskTier::Medium => Urgency::Medium,
            RiskTier::Low => Urgency::Low,
        }
    }
}

/// A detected cognitive/emotional theme, e.g. `academic_stress`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternTag(String);

impl PatternTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatternTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatternTag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Deduplicated pattern tags, kept in discovery order so top-K selection is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternSet(Vec<PatternTag>);

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tag; returns false if it was already present.
    pub fn insert(&mut self, tag: PatternTag) -> bool {
        if self.0.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    pub fn extend<I: IntoIterator<Item = PatternTag>>(&mut self, tags: I) {
        for tag in tags {
            self.insert(tag);
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t.as_str() == tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatternTag> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[PatternTag] {
        &self.0
    }

    /// Tag names as plain strings (wire format).
    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|t| t.as_str().to_string()).collect()
    }
}

impl FromIterator<PatternTag> for PatternSet {
    fn from_iter<I: IntoIterator<Item = PatternTag>>(iter: I) -> Self {
        let mut set = PatternSet::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a PatternSet {
    type Item = &'a PatternTag;
    type IntoIter = std::slice::Iter<'a, PatternTag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One evidence-based technique for a pattern. Effectiveness is a fixed constant in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intervention {
    pub name: String,
    pub effectiveness: f64,
    #[serde(default)]
    pub technique: Option<String>,
}

impl Intervention {
    pub fn new(name: &str, effectiveness: f64, technique: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            effectiveness,
            technique: technique.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Peer,
    Trained,
    Experienced,
}

impl ExperienceLevel {
    /// Weight used by the peer score. Unset experience weighs 0.5.
    pub fn weight(level: Option<ExperienceLevel>) -> f64 {
        match level {
            Some(ExperienceLevel::Experienced) => 1.0,
            Some(ExperienceLevel::Trained) => 0.8,
            Some(ExperienceLevel::Peer) => 0.6,
            None => 0.5,
        }
    }

    /// Base response time in minutes. Unset experience uses 30.
    pub fn base_response_minutes(level: Option<ExperienceLevel>) -> u32 {
        match level {
            Some(ExperienceLevel::Experienced) => 15,
            Some(ExperienceLevel::Trained) => 30,
            Some(ExperienceLevel::Peer) => 45,
            None => 30,
        }
    }
}

/// A supporter in the static roster. Read-only at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub expertise: Vec<String>,
    #[serde(default)]
    pub availability: Vec<String>,
    #[serde(default)]
    pub experience_level: Option<ExperienceLevel>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub support_style: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionFormat {
    Virtual,
    InPerson,
}

/// A facilitated group session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSession {
    pub id: String,
    pub name: String,
    pub topic: String,
    pub schedule: String,
    pub facilitator: String,
    pub focus: String,
    pub format: SessionFormat,
    pub duration_minutes: u32,
}

impl GroupSession {
    /// Lowercased "topic focus" text used for keyword relevance.
    pub fn relevance_text(&self) -> String {
        format!("{} {}", self.topic, self.focus).to_lowercase()
    }
}
