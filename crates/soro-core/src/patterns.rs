//! Pattern extractor: keyword tables to pattern tags.

use crate::classifier::normalize;
use crate::knowledge::{KeywordRule, KnowledgeBase};
use crate::models::{PatternSet, PatternTag};

/// Emitted when nothing matched but the message is long enough to carry distress.
pub const EMOTIONAL_DISTRESS: &str = "emotional_distress";

/// Giving-up language the classifier's phrase list does not cover.
pub const CRISIS_INDICATORS: &str = "crisis_indicators";

/// Word count a message must exceed before the distress fallback applies.
const FALLBACK_MIN_WORDS: usize = 3;

/// Character count above which SOMA tags a message as `detailed_expression`.
const DETAILED_EXPRESSION_CHARS: usize = 100;

pub struct PatternExtractor {
    rules: Vec<KeywordRule>,
    emotions: Vec<KeywordRule>,
}

impl PatternExtractor {
    pub fn new(kb: &KnowledgeBase) -> Self {
        Self {
            rules: kb.patterns.clone(),
            emotions: kb.emotions.clone(),
        }
    }

    /// Every rule whose keywords appear in the message, in rule order. Falls back to
    /// `emotional_distress` for unmatched messages of more than three words.
    pub fn extract(&self, message: &str) -> PatternSet {
        let text = normalize(message);
        let mut tags: PatternSet = tags_for(&self.rules, &text).collect();
        if tags.is_empty() && text.split(' ').filter(|w| !w.is_empty()).count() > FALLBACK_MIN_WORDS {
            tags.insert(PatternTag::new(EMOTIONAL_DISTRESS));
        }
        tags
    }

    /// `extract` with prior turns as a hint: tags from recent history are appended after the
    /// current message's own tags.
    pub fn extract_with_history(&self, message: &str, history: &[String]) -> PatternSet {
        let mut tags = self.extract(message);
        for past in history {
            tags.extend(tags_for(&self.rules, &normalize(past)));
        }
        tags
    }

    /// SOMA emotion vocabulary hits.
    pub fn emotions(&self, message: &str) -> PatternSet {
        tags_for(&self.emotions, &normalize(message)).collect()
    }

    /// Structural cues SOMA adds on top of the emotion tags.
    pub fn expression_cues(&self, message: &str) -> PatternSet {
        let mut cues = PatternSet::new();
        if message.chars().count() > DETAILED_EXPRESSION_CHARS {
            cues.insert(PatternTag::new("detailed_expression"));
        }
        if message.contains('?') {
            cues.insert(PatternTag::new("seeking_clarity"));
        }
        if message.contains('!') {
            cues.insert(PatternTag::new("emotional_intensity"));
        }
        cues
    }
}

fn tags_for<'a>(rules: &'a [KeywordRule], text: &'a str) -> impl Iterator<Item = PatternTag> + 'a {
    rules
        .iter()
        .filter(move |rule| rule.matches(text))
        .map(|rule| PatternTag::new(rule.tag.as_str()))
}

/// `{emotion}_pattern` and `cognitive_{emotion}` for each detected emotion.
pub fn cognitive_expansion(emotions: &PatternSet) -> PatternSet {
    emotions
        .iter()
        .flat_map(|e| {
            [
                PatternTag::new(format!("{}_pattern", e)),
                PatternTag::new(format!("cognitive_{}", e)),
            ]
        })
        .collect()
}
