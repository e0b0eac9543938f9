//! Alert ledger: sled-backed audit trail of alerts, crisis protocols and peer activations.
//! Written by the orchestrator only. Keys sort by time within each prefix.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::SoroResult;
use crate::messages::{MentalStateAlert, PeerSupportActivation};
use crate::models::RiskTier;

const ALERT_PREFIX: &str = "alert_";
const ACTIVATION_PREFIX: &str = "activation_";

/// One alert plus the protocol actions taken for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEntry {
    pub alert: MentalStateAlert,
    pub protocol: Vec<String>,
    pub reported_by: String,
}

#[derive(Clone)]
pub struct AlertLedger {
    db: sled::Db,
}

impl AlertLedger {
    /// Open at `path`, or a temporary in-memory database when `None`.
    pub fn open(path: Option<impl AsRef<Path>>) -> SoroResult<Self> {
        let db = match path {
            Some(p) => sled::open(p)?,
            None => sled::Config::new().temporary(true).open()?,
        };
        Ok(Self { db })
    }

    pub fn record_alert(&self, entry: &AlertEntry) -> SoroResult<String> {
        let key = entry_key(ALERT_PREFIX);
        self.db.insert(key.as_bytes(), serde_json::to_vec(entry)?)?;
        Ok(key)
    }

    pub fn record_activation(&self, activation: &PeerSupportActivation) -> SoroResult<String> {
        let key = entry_key(ACTIVATION_PREFIX);
        self.db.insert(key.as_bytes(), serde_json::to_vec(activation)?)?;
        Ok(key)
    }

    /// Most recent alerts first.
    pub fn recent_alerts(&self, limit: usize) -> SoroResult<Vec<AlertEntry>> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(ALERT_PREFIX.as_bytes()).rev() {
            if out.len() == limit {
                break;
            }
            let (_, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }

    pub fn activations(&self) -> SoroResult<Vec<PeerSupportActivation>> {
        self.db
            .scan_prefix(ACTIVATION_PREFIX.as_bytes())
            .map(|item| -> SoroResult<PeerSupportActivation> {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }

    pub fn count_at_or_above(&self, tier: RiskTier) -> SoroResult<usize> {
        let mut n = 0;
        for item in self.db.scan_prefix(ALERT_PREFIX.as_bytes()) {
            let (_, value) = item?;
            let entry: AlertEntry = serde_json::from_slice(&value)?;
            if entry.alert.risk_level >= tier {
                n += 1;
            }
        }
        Ok(n)
    }

    pub fn flush(&self) -> SoroResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// `{prefix}{millis:013}_{uuid}`: zero-padded so lexical order is time order.
fn entry_key(prefix: &str) -> String {
    format!(
        "{}{:013}_{}",
        prefix,
        chrono::Utc::now().timestamp_millis().max(0),
        uuid::Uuid::new_v4().simple()
    )
}
