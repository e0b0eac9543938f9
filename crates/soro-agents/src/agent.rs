//! The agent abstraction every SOROverse role implements.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use soro_core::config::AgentRole;
use soro_core::messages::{Envelope, Payload};
use soro_core::relay::Relay;

/// What a handler can see about the agent it runs inside.
#[derive(Clone)]
pub struct AgentContext {
    pub role: AgentRole,
    /// Seed-derived identity address.
    pub address: String,
    /// Outbound relay; its sender name is the role name.
    pub relay: Relay,
}

impl AgentContext {
    pub fn new(role: AgentRole, address: &str, relay: Relay) -> Self {
        Self {
            role,
            address: address.to_string(),
            relay,
        }
    }

    pub fn name(&self) -> &'static str {
        self.role.name()
    }
}

/// One agent's message handling. Handlers run on the agent's own event loop, one envelope at
/// a time, so `&mut self` state needs no locking.
#[async_trait]
pub trait Agent: Send {
    fn role(&self) -> AgentRole;

    /// Handle one envelope. A returned payload is the reply to the envelope's sender.
    async fn handle(&mut self, ctx: &AgentContext, envelope: Envelope) -> Option<Payload>;

    /// Periodic housekeeping (session expiry).
    fn on_tick(&mut self, _now: DateTime<Utc>) {}
}
