//! Startup configuration. Environment is process-global, so every case lives in one test.

use soro_core::{AgentConfig, AgentRole, SoroError};

#[test]
fn seed_and_environment_layers() {
    std::env::remove_var("SOROMIND_SEED");
    std::env::remove_var("AGENT_SEED_PHRASE");
    std::env::remove_var("SORO__PORT");

    let err = AgentConfig::load(AgentRole::SoroMind).expect_err("seed is required");
    assert!(matches!(err, SoroError::MissingEnv(ref var) if var.contains("SOROMIND_SEED")));
    assert!(err.is_fatal());

    std::env::set_var("AGENT_SEED_PHRASE", "shared phrase");
    let shared = AgentConfig::load(AgentRole::SoroMind).expect("shared seed");
    assert_eq!(shared.seed, "shared phrase");
    assert_eq!(shared.settings.port, 8001);

    std::env::set_var("SOROMIND_SEED", "  soromind phrase  ");
    std::env::set_var("SORO__PORT", "9101");
    let cfg = AgentConfig::load(AgentRole::SoroMind).expect("role seed");
    assert_eq!(cfg.seed, "soromind phrase");
    assert_eq!(cfg.settings.port, 9101);
    assert!(cfg.address.starts_with("agent1"));
    assert_eq!(cfg.address.len(), "agent1".len() + 32);
    assert_ne!(cfg.address, shared.address);

    let again = AgentConfig::load(AgentRole::SoroMind).expect("reload");
    assert_eq!(again.address, cfg.address);

    std::env::remove_var("SOROMIND_SEED");
    std::env::remove_var("AGENT_SEED_PHRASE");
    std::env::remove_var("SORO__PORT");
}
