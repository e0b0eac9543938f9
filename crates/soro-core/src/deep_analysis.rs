//! Deep pattern analysis.
//!
//! The production analyzer asks an OpenAI-compatible chat endpoint (ASI:One by default) to
//! name the patterns it sees and string-matches the reply against a fixed vocabulary. When no
//! key is configured or the call fails, keyword analysis stands in and the result is marked
//! degraded.
//!
//! API key: `ASI_API_KEY`. Base URL: `ASI_BASE_URL` (default `https://api.asi1.ai/v1`).
//! Model: `ASI_MODEL` (default `asi1-mini`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::classifier::normalize;
use crate::error::{SoroError, SoroResult};
use crate::models::{PatternSet, PatternTag};
use crate::outcome::Outcome;
use crate::patterns::PatternExtractor;

const ASI_API_BASE: &str = "https://api.asi1.ai/v1";
const DEFAULT_MODEL: &str = "asi1-mini";

/// Patterns the LLM reply is matched against. Anything else it says is ignored.
pub const ANALYSIS_VOCABULARY: &[&str] = &[
    "academic_stress",
    "sleep_issues",
    "feeling_overwhelmed",
    "anxiety",
    "depression",
    "stress",
    "loneliness",
    "anger",
    "fear",
    "perfectionism",
    "catastrophizing",
    "imposter_syndrome",
    "negative_self_talk",
    "rumination",
    "social_withdrawal",
];

const MATCHED_CONFIDENCE: f64 = 0.85;
const UNMATCHED_CONFIDENCE: f64 = 0.5;
const KEYWORD_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepAnalysis {
    pub patterns: PatternSet,
    pub confidence: f64,
}

#[async_trait]
pub trait PatternAnalyzer: Send + Sync {
    fn name(&self) -> &str;
    async fn analyze(&self, message: &str, history: &[String]) -> SoroResult<DeepAnalysis>;
}

/// Offline analyzer over the knowledge base keyword tables.
pub struct KeywordAnalyzer {
    extractor: PatternExtractor,
}

impl KeywordAnalyzer {
    pub fn new(extractor: PatternExtractor) -> Self {
        Self { extractor }
    }

    pub fn analyze_now(&self, message: &str, history: &[String]) -> DeepAnalysis {
        DeepAnalysis {
            patterns: self.extractor.extract_with_history(message, history),
            confidence: KEYWORD_CONFIDENCE,
        }
    }
}

#[async_trait]
impl PatternAnalyzer for KeywordAnalyzer {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn analyze(&self, message: &str, history: &[String]) -> SoroResult<DeepAnalysis> {
        Ok(self.analyze_now(message, history))
    }
}

/// Run `primary` if present; on absence or failure fall back to keyword analysis.
pub async fn analyze_or_degrade(
    primary: Option<&dyn PatternAnalyzer>,
    fallback: &KeywordAnalyzer,
    message: &str,
    history: &[String],
) -> Outcome<DeepAnalysis> {
    let Some(analyzer) = primary else {
        return Outcome::Complete(fallback.analyze_now(message, history));
    };
    match analyzer.analyze(message, history).await {
        Ok(analysis) => Outcome::Complete(analysis),
        Err(e) => {
            tracing::warn!(analyzer = analyzer.name(), error = %e, "deep analysis failed; using keyword analysis");
            Outcome::Degraded {
                fallback: fallback.analyze_now(message, history),
                reason: e.to_string(),
            }
        }
    }
}

/// Vocabulary entries mentioned in free text, in vocabulary order. "academic stress" and
/// "academic_stress" both count.
pub fn match_vocabulary(reply: &str) -> PatternSet {
    let text = normalize(reply).replace(['-', '_'], " ");
    ANALYSIS_VOCABULARY
        .iter()
        .filter(|term| text.contains(&term.replace('_', " ")))
        .map(|term| PatternTag::new(*term))
        .collect()
}

// OpenAI-compatible request/response
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

pub struct AsiClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl AsiClient {
    /// Client from `ASI_API_KEY`; `None` when the key is unset or blank.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("ASI_API_KEY").ok()?.trim().to_string();
        if key.is_empty() {
            return None;
        }
        let mut client = Self::new(key);
        if let Ok(base) = std::env::var("ASI_BASE_URL") {
            client = client.with_base_url(&base);
        }
        if let Ok(model) = std::env::var("ASI_MODEL") {
            client = client.with_model(&model);
        }
        Some(client)
    }

    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key: api_key.trim().to_string(),
            base_url: ASI_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    fn build_request(&self, message: &str, history: &[String]) -> ChatRequest {
        let system = format!(
            "You analyse short messages for cognitive and emotional patterns. \
             Reply with a comma-separated list drawn only from: {}. \
             Reply with 'none' if nothing applies.",
            ANALYSIS_VOCABULARY.join(", ")
        );
        let mut user = String::new();
        if !history.is_empty() {
            user.push_str("Recent messages:\n");
            for past in history {
                user.push_str("- ");
                user.push_str(past);
                user.push('\n');
            }
            user.push('\n');
        }
        user.push_str("Message: ");
        user.push_str(message);

        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            temperature: Some(0.0),
            max_tokens: Some(64),
        }
    }
}

#[async_trait]
impl PatternAnalyzer for AsiClient {
    fn name(&self) -> &str {
        "asi"
    }

    async fn analyze(&self, message: &str, history: &[String]) -> SoroResult<DeepAnalysis> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request(message, history);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SoroError::Analysis(format!("ASI API {}: {}", status, text)));
        }

        let parsed: ChatResponse = resp.json().await?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| SoroError::Analysis("ASI API returned no choices".into()))?;

        let patterns = match_vocabulary(&reply);
        let confidence = if patterns.is_empty() {
            UNMATCHED_CONFIDENCE
        } else {
            MATCHED_CONFIDENCE
        };
        Ok(DeepAnalysis {
            patterns,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBase;

    struct FailingAnalyzer;

    #[async_trait]
    impl PatternAnalyzer for FailingAnalyzer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn analyze(&self, _message: &str, _history: &[String]) -> SoroResult<DeepAnalysis> {
            Err(SoroError::Analysis("upstream 503".into()))
        }
    }

    fn keyword() -> KeywordAnalyzer {
        KeywordAnalyzer::new(PatternExtractor::new(&KnowledgeBase::builtin().unwrap()))
    }

    #[test]
    fn vocabulary_matching_ignores_unknown_words() {
        let got = match_vocabulary("Patterns: Academic Stress, catastrophizing, and general malaise");
        assert_eq!(got.to_strings(), vec!["academic_stress", "stress", "catastrophizing"]);
        assert!(match_vocabulary("none").is_empty());
    }

    #[test]
    fn request_lists_vocabulary_and_history() {
        let client = AsiClient::new("k".into()).with_model("test-model");
        let req = client.build_request("I can't focus", &["exam tomorrow".to_string()]);
        assert_eq!(req.model, "test-model");
        assert!(req.messages[0].content.contains("imposter_syndrome"));
        assert!(req.messages[1].content.contains("- exam tomorrow"));
        assert!(req.messages[1].content.ends_with("Message: I can't focus"));
    }

    #[tokio::test]
    async fn missing_analyzer_is_not_degraded() {
        let out = analyze_or_degrade(None, &keyword(), "I'm so anxious", &[]).await;
        assert!(!out.is_degraded());
        assert!(out.value().patterns.contains("anxiety"));
    }

    #[tokio::test]
    async fn failing_analyzer_degrades_to_keywords() {
        let failing = FailingAnalyzer;
        let out = analyze_or_degrade(Some(&failing as &dyn PatternAnalyzer), &keyword(), "I'm so anxious", &[]).await;
        assert!(out.is_degraded());
        assert_eq!(out.degraded_reason(), Some("Analysis error: upstream 503"));
        assert_eq!(out.value().confidence, 0.6);
    }
}
