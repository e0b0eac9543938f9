//! Conversation sessions.
//!
//! A store is owned by exactly one agent event loop; nothing else reads or writes it, so the
//! in-memory implementation is a plain map without locks. Sessions are not durable: they end
//! on an explicit end-session signal, on TTL expiry, or with the process.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::error::{SoroError, SoroResult};
use crate::models::{PatternSet, PatternTag, RiskTier};

pub const DEFAULT_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    history: VecDeque<Turn>,
    history_limit: usize,
    pub patterns: PatternSet,
    pub risk_tier: RiskTier,
}

impl Session {
    pub fn new(id: &str, now: DateTime<Utc>, history_limit: usize) -> Self {
        Self {
            id: id.to_string(),
            created_at: now,
            last_active: now,
            history: VecDeque::with_capacity(history_limit),
            history_limit: history_limit.max(1),
            patterns: PatternSet::new(),
            risk_tier: RiskTier::Low,
        }
    }

    /// Append a turn, dropping the oldest beyond the history limit.
    pub fn record(&mut self, speaker: Speaker, text: &str, now: DateTime<Utc>) {
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(Turn {
            speaker,
            text: text.to_string(),
            at: now,
        });
        self.last_active = now;
    }

    pub fn merge_patterns<'a, I: IntoIterator<Item = &'a PatternTag>>(&mut self, tags: I) {
        self.patterns.extend(tags.into_iter().cloned());
    }

    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Last `n` user messages, oldest first.
    pub fn recent_user_messages(&self, n: usize) -> Vec<String> {
        let mut recent: Vec<String> = self
            .history
            .iter()
            .rev()
            .filter(|t| t.speaker == Speaker::User)
            .take(n)
            .map(|t| t.text.clone())
            .collect();
        recent.reverse();
        recent
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_active > ttl
    }
}

/// Session lifecycle operations.
pub trait SessionStore {
    fn get(&self, id: &str) -> Option<&Session>;
    fn get_mut(&mut self, id: &str) -> Option<&mut Session>;
    /// Existing session, or a fresh one created at `now`.
    fn get_or_create(&mut self, id: &str, now: DateTime<Utc>) -> &mut Session;
    fn put(&mut self, session: Session);
    fn delete(&mut self, id: &str) -> Option<Session>;
    /// Drop sessions idle longer than the TTL; returns how many were removed.
    fn expire(&mut self, now: DateTime<Utc>) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct MemorySessionStore {
    sessions: HashMap<String, Session>,
    ttl: Duration,
    history_limit: usize,
}

impl MemorySessionStore {
    /// Fails with [`SoroError::Config`] when the TTL does not fit a chrono duration.
    pub fn new(ttl_secs: u64, history_limit: usize) -> SoroResult<Self> {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| SoroError::Config(format!("session_ttl_secs {} is out of range", ttl_secs)))?;
        Ok(Self::with_ttl(ttl, history_limit))
    }

    fn with_ttl(ttl: Duration, history_limit: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
            history_limit,
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_SESSION_TTL_SECS as i64), DEFAULT_HISTORY_LIMIT)
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    fn get_or_create(&mut self, id: &str, now: DateTime<Utc>) -> &mut Session {
        let limit = self.history_limit;
        self.sessions.entry(id.to_string()).or_insert_with(|| {
            tracing::debug!(session_id = %id, "session created");
            Session::new(id, now, limit)
        })
    }

    fn put(&mut self, session: Session) {
        self.sessions.insert(session.id.clone(), session);
    }

    fn delete(&mut self, id: &str) -> Option<Session> {
        self.sessions.remove(id)
    }

    fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired(now, ttl));
        before - self.sessions.len()
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let now = Utc::now();
        let mut s = Session::new("s1", now, 20);
        for i in 0..25 {
            s.record(Speaker::User, &format!("msg {i}"), now);
        }
        assert_eq!(s.history_len(), 20);
        assert_eq!(s.history().next().map(|t| t.text.as_str()), Some("msg 5"));
    }

    #[test]
    fn recent_user_messages_skip_agent_turns() {
        let now = Utc::now();
        let mut s = Session::new("s1", now, 20);
        s.record(Speaker::User, "one", now);
        s.record(Speaker::Agent, "reply", now);
        s.record(Speaker::User, "two", now);
        s.record(Speaker::User, "three", now);
        assert_eq!(s.recent_user_messages(2), vec!["two", "three"]);
    }

    #[test]
    fn patterns_accumulate_without_duplicates() {
        let now = Utc::now();
        let mut s = Session::new("s1", now, 20);
        let a = vec![PatternTag::new("anxiety"), PatternTag::new("stress")];
        let b = vec![PatternTag::new("stress"), PatternTag::new("loneliness")];
        s.merge_patterns(&a);
        s.merge_patterns(&b);
        assert_eq!(s.patterns.to_strings(), vec!["anxiety", "stress", "loneliness"]);
    }

    #[test]
    fn store_lifecycle() {
        let now = Utc::now();
        let mut store = MemorySessionStore::new(60, 20).unwrap();
        store.get_or_create("a", now).record(Speaker::User, "hi", now);
        store.get_or_create("a", now).record(Speaker::User, "again", now);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a").map(Session::history_len), Some(2));

        store.put(Session::new("b", now, 20));
        assert_eq!(store.len(), 2);
        assert!(store.delete("b").is_some());
        assert!(store.delete("b").is_none());
        assert!(store.get("b").is_none());
    }

    #[test]
    fn out_of_range_ttl_is_a_config_error() {
        for ttl in [u64::MAX, i64::MAX as u64] {
            let err = MemorySessionStore::new(ttl, 20).err().expect("ttl should be rejected");
            assert!(matches!(err, SoroError::Config(_)));
            assert!(err.is_fatal());
        }
        assert!(MemorySessionStore::new(DEFAULT_SESSION_TTL_SECS, DEFAULT_HISTORY_LIMIT).is_ok());
    }

    #[test]
    fn expire_drops_idle_sessions_only() {
        let start = Utc::now();
        let mut store = MemorySessionStore::new(60, 20).unwrap();
        store.get_or_create("idle", start);
        store.get_or_create("busy", start);
        let later = start + Duration::seconds(90);
        if let Some(s) = store.get_mut("busy") {
            s.record(Speaker::User, "still here", later);
        }

        assert_eq!(store.expire(later), 1);
        assert!(store.get("idle").is_none());
        assert!(store.get("busy").is_some());
    }
}
