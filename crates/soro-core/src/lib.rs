//! soro-core: shared types and the decision pipeline for the SOROverse agents.
//!
//! Risk classification, pattern extraction, intervention selection, peer matching, session
//! state, and best-effort relay between agents. Agent handlers live in `soro-agents`.

pub mod classifier;
pub mod config;
pub mod coordinator;
pub mod deep_analysis;
pub mod error;
pub mod interventions;
pub mod knowledge;
pub mod ledger;
pub mod mailbox;
pub mod messages;
pub mod models;
pub mod outcome;
pub mod patterns;
pub mod peers;
pub mod relay;
pub mod routing;
pub mod session;

pub use classifier::{RiskAssessment, RiskClassifier};
pub use config::{AgentConfig, AgentRole, AgentSettings};
pub use coordinator::{CoordinationPlan, CoordinationReport, Coordinator};
pub use deep_analysis::{analyze_or_degrade, AsiClient, DeepAnalysis, KeywordAnalyzer, PatternAnalyzer};
pub use error::{SoroError, SoroResult};
pub use interventions::{crisis_protocol, InterventionPlan, InterventionSelector, InterventionSource};
pub use knowledge::KnowledgeBase;
pub use ledger::{AlertEntry, AlertLedger};
pub use mailbox::{mailbox, Inbound, MailboxReceiver, MailboxSender};
pub use messages::{Envelope, Payload};
pub use models::{ExperienceLevel, GroupSession, Intervention, PatternSet, PatternTag, PeerRecord, RiskTier, Urgency};
pub use outcome::Outcome;
pub use patterns::PatternExtractor;
pub use peers::{PeerMatcher, PeerQuery};
pub use relay::{HttpTransport, LocalTransport, Relay, RelayOutcome, RelayPolicy, Transport};
pub use routing::{Intent, IntentRouter, TurnEnd, TurnRoute};
pub use session::{MemorySessionStore, Session, SessionStore, Speaker};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
