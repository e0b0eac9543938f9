//! `soro-demo`: all four agents in one process, replaying a student's conversation.
//!
//! Uses the in-process transport, so no seeds, ports or API keys are needed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use soro_agents::{spawn_agent, Agent, AgentContext, AgentHandle, Orchestrator, PsnConnect, SomaEngine, SoroMind};
use soro_core::config::{derive_address, AgentRole};
use soro_core::messages::{ChatMessage, Envelope, Payload};
use soro_core::relay::{LocalTransport, Relay, RelayPolicy};
use soro_core::session::{DEFAULT_HISTORY_LIMIT, DEFAULT_SESSION_TTL_SECS};
use soro_core::{AlertLedger, KnowledgeBase, RiskTier, SoroResult};

const SCRIPT: &[&str] = &[
    "I'm so stressed about my exams, I can't focus",
    "my assignment is due tomorrow and I'm exhausted",
    "teach me a breathing exercise",
    "can you connect me with a peer?",
    "I feel lonely and sad and angry lately",
];

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[soro-demo] .env not loaded: {} (using system environment)", e);
    }
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "demo failed");
        std::process::exit(1);
    }
}

async fn run() -> SoroResult<()> {
    let kb = Arc::new(KnowledgeBase::builtin()?);
    let ledger = AlertLedger::open(None::<&str>)?;
    let local = Arc::new(LocalTransport::new());

    let mut agents: HashMap<AgentRole, AgentHandle> = HashMap::new();
    for role in AgentRole::ALL {
        let agent: Box<dyn Agent> = match role {
            AgentRole::SoroMind => Box::new(SoroMind::new(kb.clone(), DEFAULT_SESSION_TTL_SECS, DEFAULT_HISTORY_LIMIT)?),
            AgentRole::SomaEngine => Box::new(SomaEngine::from_env(&kb)?),
            AgentRole::Orchestrator => Box::new(Orchestrator::new(kb.clone(), ledger.clone())),
            AgentRole::PsnConnect => Box::new(PsnConnect::new(kb.clone())),
        };
        let ctx = AgentContext::new(
            role,
            &derive_address(&format!("soro-demo {}", role.name())),
            Relay::new(role.name(), local.clone(), RelayPolicy::default()),
        );
        let handle = spawn_agent(ctx, agent, Duration::from_secs(60));
        local.register(role.name(), handle.mailbox.clone());
        println!("{:<18} {}", role.display_name(), derive_address(&format!("soro-demo {}", role.name())));
        agents.insert(role, handle);
    }
    println!();

    let soromind = &agents[&AgentRole::SoroMind];
    for line in SCRIPT {
        let chat = ChatMessage::text("demo-student", line, Some("demo-session"));
        let reply = soromind
            .ask(Envelope::new("demo-student", AgentRole::SoroMind.name(), Payload::Chat(chat)))
            .await?;
        println!("> {}", line);
        if let Payload::ChatResponse(reply) = reply {
            println!("{}\n", reply.content);
        }
        // let coordination settle before the next turn
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    soromind
        .submit(Envelope::new(
            "demo-student",
            AgentRole::SoroMind.name(),
            Payload::EndSession {
                session_id: "demo-session".into(),
            },
        ))
        .await?;
    tokio::time::sleep(Duration::from_millis(200)).await;

    println!(
        "ledger: {} alerts at HIGH or above, {} peer activations",
        ledger.count_at_or_above(RiskTier::High)?,
        ledger.activations()?.len()
    );
    ledger.flush()?;
    Ok(())
}
