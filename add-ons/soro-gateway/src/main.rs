//! `soro-agent <role>`: run one SOROverse agent behind its HTTP mailbox.
//!
//! Roles: soromind, soma_engine, psn_connect, orchestrator (or `SORO_ROLE`).

mod app;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use soro_agents::{build_agent, spawn_agent, AgentContext};
use soro_core::config::{AgentConfig, AgentRole};
use soro_core::knowledge::KnowledgeBase;
use soro_core::relay::{HttpTransport, Relay};
use soro_core::{SoroError, SoroResult};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[soro-agent] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let role = match role_from_args() {
        Ok(role) => role,
        Err(e) => {
            tracing::error!(error = %e, "usage: soro-agent <soromind|soma_engine|psn_connect|orchestrator>");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(role).await {
        tracing::error!(agent = role.name(), error = %e, fatal = e.is_fatal(), "agent stopped");
        std::process::exit(1);
    }
}

fn role_from_args() -> SoroResult<AgentRole> {
    let raw = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SORO_ROLE").ok())
        .ok_or_else(|| SoroError::Config("no agent role given".into()))?;
    raw.parse()
}

async fn run(role: AgentRole) -> SoroResult<()> {
    let config = AgentConfig::load(role)?;
    let kb = Arc::new(KnowledgeBase::load(config.settings.knowledge_path.as_deref().map(Path::new))?);

    let transport = Arc::new(HttpTransport::new(config.peer_endpoints()));
    let relay = Relay::new(role.name(), transport, config.relay_policy());
    let ctx = AgentContext::new(role, &config.address, relay);
    let agent = build_agent(role, kb, &config.settings)?;
    let handle = spawn_agent(ctx, agent, Duration::from_secs(config.settings.sweep_interval_secs));

    let state = Arc::new(app::AppState {
        role,
        address: config.address.clone(),
        mailbox: handle.mailbox.clone(),
    });
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(
        agent = role.display_name(),
        address = %config.address,
        endpoint = %config.endpoint(),
        bind = %config.bind_addr(),
        "agent listening"
    );

    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for CTRL-C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("CTRL-C received; shutting down agent");
}
