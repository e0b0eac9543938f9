//! Best-effort delivery between agents.
//!
//! A relay makes at most `max_attempts` delivery attempts with a fixed pause between them and
//! reports a typed [`RelayOutcome`]. It never returns an error to the caller.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{SoroError, SoroResult};
use crate::mailbox::{Inbound, MailboxSender};
use crate::messages::{Envelope, Payload};

/// Moves one envelope to `envelope.recipient`. One call is one attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, envelope: &Envelope) -> SoroResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPolicy {
    pub max_attempts: u32,
    pub pause: Duration,
}

impl RelayPolicy {
    /// Used for pattern-analysis requests: one try, no pause.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            pause: Duration::ZERO,
        }
    }
}

impl Default for RelayPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RelayOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

impl RelayOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, RelayOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RelayOutcome::Delivered { attempts } | RelayOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// Sends payloads on behalf of one agent.
#[derive(Clone)]
pub struct Relay {
    sender: String,
    transport: Arc<dyn Transport>,
    policy: RelayPolicy,
}

impl Relay {
    pub fn new(sender: &str, transport: Arc<dyn Transport>, policy: RelayPolicy) -> Self {
        Self {
            sender: sender.to_string(),
            transport,
            policy,
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn policy(&self) -> RelayPolicy {
        self.policy
    }

    /// Deliver with the agent's retry policy.
    pub async fn relay(&self, target: &str, payload: Payload) -> RelayOutcome {
        self.relay_with(self.policy, target, payload).await
    }

    /// Deliver with exactly one attempt.
    pub async fn relay_once(&self, target: &str, payload: Payload) -> RelayOutcome {
        self.relay_with(RelayPolicy::single_attempt(), target, payload).await
    }

    pub async fn relay_with(&self, policy: RelayPolicy, target: &str, payload: Payload) -> RelayOutcome {
        let envelope = Envelope::new(&self.sender, target, payload);
        let kind = envelope.payload.kind();
        let max_attempts = policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match self.transport.deliver(&envelope).await {
                Ok(()) => {
                    tracing::debug!(recipient = %target, kind, attempt, "relay delivered");
                    return RelayOutcome::Delivered { attempts: attempt };
                }
                Err(e) => {
                    tracing::debug!(recipient = %target, kind, attempt, error = %e, "relay attempt failed");
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        tokio::time::sleep(policy.pause).await;
                    }
                }
            }
        }

        tracing::warn!(
            recipient = %target,
            kind,
            attempts = max_attempts,
            error = %last_error,
            "relay exhausted; continuing without coordination"
        );
        RelayOutcome::Exhausted {
            attempts: max_attempts,
            last_error,
        }
    }
}

/// POSTs envelopes as JSON to `{endpoint}/submit`.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl HttpTransport {
    pub fn new(endpoints: HashMap<String, String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, endpoints }
    }

    fn submit_url(&self, recipient: &str) -> SoroResult<String> {
        self.endpoints
            .get(recipient)
            .map(|base| format!("{}/submit", base.trim_end_matches('/')))
            .ok_or_else(|| SoroError::Transport(format!("no route to '{}'", recipient)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, envelope: &Envelope) -> SoroResult<()> {
        let url = self.submit_url(&envelope.recipient)?;
        self.client
            .post(&url)
            .json(envelope)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Routes envelopes to agents running in the same process.
#[derive(Default)]
pub struct LocalTransport {
    routes: DashMap<String, MailboxSender>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, mailbox: MailboxSender) {
        self.routes.insert(name.to_string(), mailbox);
    }

    pub fn unregister(&self, name: &str) {
        self.routes.remove(name);
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn deliver(&self, envelope: &Envelope) -> SoroResult<()> {
        // clone the sender so no map guard is held across the await
        let mailbox = self
            .routes
            .get(&envelope.recipient)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SoroError::Transport(format!("no route to '{}'", envelope.recipient)))?;
        mailbox
            .send(Inbound::fire_and_forget(envelope.clone()))
            .await
            .map_err(|_| SoroError::Transport(format!("mailbox '{}' closed", envelope.recipient)))
    }
}
