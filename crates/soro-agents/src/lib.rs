//! soro-agents: the four SOROverse agents and the event loop they run on.
//!
//! - [`SoroMind`]: user-facing chat, crisis bypass, coordination
//! - [`SomaEngine`]: pattern analysis and enhanced monitoring
//! - [`Orchestrator`]: intervention selection and the alert ledger
//! - [`PsnConnect`]: peer matching and support sessions

pub mod agent;
pub mod orchestrator;
pub mod psn_connect;
pub mod responses;
pub mod runtime;
pub mod soma_engine;
pub mod soromind;

use std::sync::Arc;

use soro_core::config::{AgentRole, AgentSettings};
use soro_core::knowledge::KnowledgeBase;
use soro_core::ledger::AlertLedger;
use soro_core::SoroResult;

pub use agent::{Agent, AgentContext};
pub use orchestrator::Orchestrator;
pub use psn_connect::PsnConnect;
pub use runtime::{ask, spawn_agent, AgentHandle, AgentRuntime};
pub use soma_engine::SomaEngine;
pub use soromind::{SoroMind, TurnOutcome};

/// Construct the agent for `role` from loaded settings.
pub fn build_agent(role: AgentRole, kb: Arc<KnowledgeBase>, settings: &AgentSettings) -> SoroResult<Box<dyn Agent>> {
    let agent: Box<dyn Agent> = match role {
        AgentRole::SoroMind => Box::new(SoroMind::new(kb, settings.session_ttl_secs, settings.history_limit)?),
        AgentRole::SomaEngine => Box::new(SomaEngine::from_env(&kb)?),
        AgentRole::Orchestrator => {
            Box::new(Orchestrator::new(kb, AlertLedger::open(settings.ledger_path.as_deref())?))
        }
        AgentRole::PsnConnect => Box::new(PsnConnect::new(kb)),
    };
    Ok(agent)
}
