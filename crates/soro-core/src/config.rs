//! Per-agent process configuration.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | `<ROLE>_SEED` / `AGENT_SEED_PHRASE` | required | Identity seed. Missing seed is a fatal startup error. |
//! | SORO_CONFIG | `config/soro.toml` | Optional TOML file layered under the environment. |
//! | SORO__HOST | 127.0.0.1 | Bind host for the agent mailbox. |
//! | SORO__PORT | role default (8001-8004) | Listen port. |
//! | SORO__ENDPOINT | `http://{host}:{port}` | Public mailbox endpoint advertised to peers. |
//! | SORO__PEERS__<ROLE> | `http://127.0.0.1:{role port}` | Mailbox endpoint of another agent. |
//! | SORO__SESSION_TTL_SECS | 1800 | Idle session expiry. |
//! | SORO__HISTORY_LIMIT | 20 | Turns kept per session. |
//! | SORO__SWEEP_INTERVAL_SECS | 60 | How often idle sessions are swept. |
//! | SORO__RELAY__MAX_ATTEMPTS | 3 | Delivery attempts per relay. |
//! | SORO__RELAY__PAUSE_MS | 1000 | Pause between attempts. |
//! | SORO__LEDGER_PATH | unset | Sled path for the orchestrator's alert ledger (temporary when unset). |
//! | SORO__KNOWLEDGE_PATH | unset | Knowledge base TOML replacing the built-in document. |

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{SoroError, SoroResult};
use crate::relay::RelayPolicy;
use crate::session::{DEFAULT_HISTORY_LIMIT, DEFAULT_SESSION_TTL_SECS};

const SHARED_SEED_VAR: &str = "AGENT_SEED_PHRASE";
const DEFAULT_CONFIG_PATH: &str = "config/soro.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentRole {
    #[serde(rename = "soromind")]
    SoroMind,
    #[serde(rename = "soma_engine")]
    SomaEngine,
    #[serde(rename = "psn_connect")]
    PsnConnect,
    #[serde(rename = "orchestrator")]
    Orchestrator,
}

impl AgentRole {
    pub const ALL: [AgentRole; 4] = [
        AgentRole::SoroMind,
        AgentRole::SomaEngine,
        AgentRole::PsnConnect,
        AgentRole::Orchestrator,
    ];

    /// Routing name used as envelope sender/recipient.
    pub fn name(&self) -> &'static str {
        match self {
            AgentRole::SoroMind => "soromind",
            AgentRole::SomaEngine => "soma_engine",
            AgentRole::PsnConnect => "psn_connect",
            AgentRole::Orchestrator => "orchestrator",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentRole::SoroMind => "SoroMind",
            AgentRole::SomaEngine => "SOMA Engine",
            AgentRole::PsnConnect => "PSN Connect",
            AgentRole::Orchestrator => "SORO Orchestrator",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            AgentRole::SoroMind => 8001,
            AgentRole::SomaEngine => 8002,
            AgentRole::PsnConnect => 8003,
            AgentRole::Orchestrator => 8004,
        }
    }

    pub fn seed_var(&self) -> &'static str {
        match self {
            AgentRole::SoroMind => "SOROMIND_SEED",
            AgentRole::SomaEngine => "SOMA_ENGINE_SEED",
            AgentRole::PsnConnect => "PSN_CONNECT_SEED",
            AgentRole::Orchestrator => "SORO_ORCHESTRATOR_SEED",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AgentRole {
    type Err = SoroError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "soromind" | "soro_mind" => Ok(AgentRole::SoroMind),
            "soma" | "soma_engine" => Ok(AgentRole::SomaEngine),
            "psn" | "psn_connect" => Ok(AgentRole::PsnConnect),
            "orchestrator" | "soro_orchestrator" => Ok(AgentRole::Orchestrator),
            other => Err(SoroError::Config(format!("unknown agent role '{}'", other))),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_pause_ms() -> u64 {
    1000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            pause_ms: default_pause_ms(),
        }
    }
}

/// Layered settings (defaults < file < `SORO__*` environment).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub peers: HashMap<String, String>,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub ledger_path: Option<String>,
    #[serde(default)]
    pub knowledge_path: Option<String>,
}

fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl AgentSettings {
    /// Settings with no file or environment layer; what `load` starts from.
    pub fn defaults(role: AgentRole) -> Self {
        Self {
            host: default_host(),
            port: role.default_port(),
            endpoint: None,
            peers: HashMap::new(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            sweep_interval_secs: default_sweep_interval_secs(),
            relay: RelaySettings::default(),
            ledger_path: None,
            knowledge_path: None,
        }
    }

    pub fn load(role: AgentRole) -> SoroResult<Self> {
        let config_path =
            std::env::var("SORO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let builder = config::Config::builder()
            .set_default("host", default_host())?
            .set_default("port", role.default_port() as i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("SORO").separator("__"))
            .build()?;

        Ok(built.try_deserialize()?)
    }
}

/// Everything an agent process needs to start.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub role: AgentRole,
    pub seed: String,
    /// Stable identity derived from the seed.
    pub address: String,
    pub settings: AgentSettings,
}

impl AgentConfig {
    /// Load settings and the required identity seed. A missing seed is fatal.
    pub fn load(role: AgentRole) -> SoroResult<Self> {
        let seed = std::env::var(role.seed_var())
            .or_else(|_| std::env::var(SHARED_SEED_VAR))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SoroError::MissingEnv(format!("{} (or {})", role.seed_var(), SHARED_SEED_VAR))
            })?;
        Ok(Self::with_settings(role, &seed, AgentSettings::load(role)?))
    }

    pub fn with_settings(role: AgentRole, seed: &str, settings: AgentSettings) -> Self {
        Self {
            role,
            seed: seed.to_string(),
            address: derive_address(seed),
            settings,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.settings.host, self.settings.port)
    }

    pub fn endpoint(&self) -> String {
        self.settings
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.settings.host, self.settings.port))
    }

    /// Mailbox endpoint for every other role, configured or defaulted to localhost.
    pub fn peer_endpoints(&self) -> HashMap<String, String> {
        AgentRole::ALL
            .iter()
            .filter(|r| **r != self.role)
            .map(|r| {
                let url = self
                    .settings
                    .peers
                    .get(r.name())
                    .cloned()
                    .unwrap_or_else(|| format!("http://127.0.0.1:{}", r.default_port()));
                (r.name().to_string(), url)
            })
            .collect()
    }

    pub fn relay_policy(&self) -> RelayPolicy {
        RelayPolicy {
            max_attempts: self.settings.relay.max_attempts.max(1),
            pause: Duration::from_millis(self.settings.relay.pause_ms),
        }
    }
}

/// `agent1` + UUIDv5 of the seed. Same seed, same address.
pub fn derive_address(seed: &str) -> String {
    let id = uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, seed.as_bytes());
    format!("agent1{}", id.simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_from_cli_names() {
        assert_eq!("soromind".parse::<AgentRole>().unwrap(), AgentRole::SoroMind);
        assert_eq!("soma-engine".parse::<AgentRole>().unwrap(), AgentRole::SomaEngine);
        assert_eq!("PSN".parse::<AgentRole>().unwrap(), AgentRole::PsnConnect);
        assert_eq!("orchestrator".parse::<AgentRole>().unwrap(), AgentRole::Orchestrator);
        assert!("unknown".parse::<AgentRole>().is_err());
    }

    #[test]
    fn address_is_stable_per_seed() {
        assert_eq!(derive_address("seed-a"), derive_address("seed-a"));
        assert_ne!(derive_address("seed-a"), derive_address("seed-b"));
        assert!(derive_address("seed-a").starts_with("agent1"));
    }

    #[test]
    fn peer_endpoints_default_to_role_ports() {
        let cfg = AgentConfig::with_settings(
            AgentRole::SoroMind,
            "seed",
            AgentSettings::defaults(AgentRole::SoroMind),
        );
        let peers = cfg.peer_endpoints();
        assert_eq!(peers.len(), 3);
        assert_eq!(peers["soma_engine"], "http://127.0.0.1:8002");
        assert_eq!(peers["orchestrator"], "http://127.0.0.1:8004");
        assert!(!peers.contains_key("soromind"));
        assert_eq!(cfg.endpoint(), "http://127.0.0.1:8001");
    }

    #[test]
    fn configured_peer_overrides_default() {
        let mut settings = AgentSettings::defaults(AgentRole::Orchestrator);
        settings
            .peers
            .insert("psn_connect".into(), "http://psn.internal:9000".into());
        let cfg = AgentConfig::with_settings(AgentRole::Orchestrator, "seed", settings);
        assert_eq!(cfg.peer_endpoints()["psn_connect"], "http://psn.internal:9000");
    }

    #[test]
    fn relay_policy_from_settings() {
        let mut settings = AgentSettings::defaults(AgentRole::SoroMind);
        settings.relay.pause_ms = 250;
        let policy = AgentConfig::with_settings(AgentRole::SoroMind, "s", settings).relay_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.pause, Duration::from_millis(250));
    }
}
