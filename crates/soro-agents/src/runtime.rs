//! Per-agent event loop: one mailbox, one handler, a sweep timer.
//!
//! Replies go back on the oneshot when the caller is waiting (`/api/v1/chat`), otherwise they
//! are relayed to the envelope's sender with a single attempt.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use soro_core::config::AgentRole;
use soro_core::error::{SoroError, SoroResult};
use soro_core::mailbox::{mailbox, Inbound, MailboxReceiver, MailboxSender, DEFAULT_MAILBOX_CAPACITY};
use soro_core::messages::{Envelope, Payload};

use crate::agent::{Agent, AgentContext};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct AgentRuntime {
    ctx: AgentContext,
    agent: Box<dyn Agent>,
    inbox: MailboxReceiver,
    sweep_interval: Duration,
}

impl AgentRuntime {
    pub fn new(ctx: AgentContext, agent: Box<dyn Agent>, inbox: MailboxReceiver) -> Self {
        Self {
            ctx,
            agent,
            inbox,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.max(Duration::from_millis(10));
        self
    }

    /// Run until every mailbox sender is dropped.
    pub async fn run(mut self) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick fires immediately
        sweep.tick().await;

        tracing::info!(agent = self.ctx.name(), address = %self.ctx.address, "agent event loop started");
        loop {
            tokio::select! {
                inbound = self.inbox.recv() => {
                    let Some(inbound) = inbound else { break };
                    self.dispatch(inbound).await;
                }
                _ = sweep.tick() => {
                    self.agent.on_tick(Utc::now());
                }
            }
        }
        tracing::info!(agent = self.ctx.name(), "agent event loop stopped");
    }

    async fn dispatch(&mut self, inbound: Inbound) {
        let Inbound { envelope, reply } = inbound;
        let sender = envelope.sender.clone();
        let kind = envelope.payload.kind();
        tracing::debug!(agent = self.ctx.name(), from = %sender, kind, "envelope received");

        let response = self.agent.handle(&self.ctx, envelope).await;
        match (response, reply) {
            (Some(payload), Some(waiting)) => {
                if waiting.send(payload).is_err() {
                    tracing::debug!(agent = self.ctx.name(), kind, "caller stopped waiting for reply");
                }
            }
            (Some(payload), None) => {
                let Ok(target) = sender.parse::<AgentRole>() else {
                    tracing::debug!(agent = self.ctx.name(), from = %sender, "reply has no agent to go back to");
                    return;
                };
                let relay = self.ctx.relay.clone();
                tokio::spawn(async move {
                    relay.relay_once(target.name(), payload).await;
                });
            }
            (None, _) => {}
        }
    }
}

/// A running agent: its mailbox and its task.
pub struct AgentHandle {
    pub role: AgentRole,
    pub mailbox: MailboxSender,
    pub task: JoinHandle<()>,
}

impl AgentHandle {
    /// Enqueue an envelope without waiting for the handler.
    pub async fn submit(&self, envelope: Envelope) -> SoroResult<()> {
        self.mailbox
            .send(Inbound::fire_and_forget(envelope))
            .await
            .map_err(|_| closed(self.role))
    }

    /// Enqueue an envelope and wait for the handler's reply.
    pub async fn ask(&self, envelope: Envelope) -> SoroResult<Payload> {
        ask(&self.mailbox, self.role, envelope).await
    }
}

/// Send on `mailbox` and wait for the handler's reply.
pub async fn ask(mailbox: &MailboxSender, role: AgentRole, envelope: Envelope) -> SoroResult<Payload> {
    let (inbound, reply): (Inbound, oneshot::Receiver<Payload>) = Inbound::awaiting_reply(envelope);
    mailbox.send(inbound).await.map_err(|_| closed(role))?;
    reply
        .await
        .map_err(|_| SoroError::Transport(format!("{} produced no reply", role.name())))
}

fn closed(role: AgentRole) -> SoroError {
    SoroError::Transport(format!("mailbox '{}' closed", role.name()))
}

/// Start `agent` on its own task.
pub fn spawn_agent(ctx: AgentContext, agent: Box<dyn Agent>, sweep_interval: Duration) -> AgentHandle {
    let (tx, rx) = mailbox(DEFAULT_MAILBOX_CAPACITY);
    let role = ctx.role;
    let runtime = AgentRuntime::new(ctx, agent, rx).with_sweep_interval(sweep_interval);
    AgentHandle {
        role,
        mailbox: tx,
        task: tokio::spawn(runtime.run()),
    }
}
