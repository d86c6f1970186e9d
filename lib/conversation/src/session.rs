//! Conversation sessions and the keyed session store.
//!
//! A session holds at most `window` turns. Expiry is lazy: a session whose
//! last activity is older than the TTL reads as empty and is reset on the
//! next write. Nothing is swept in the background unless the owner calls
//! [`SessionStore::purge_expired`].
//!
//! Locking is two-level. The outer map lock is held only long enough to find
//! or insert a key's slot; each slot has its own async mutex, so writers to
//! different keys never wait on each other while writers to one key are
//! serialized.

use crate::message::{Turn, TurnRole};
use chrono::{DateTime, Duration, Utc};
use muaddib_core::{Clock, ConversationKey, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::debug;

/// Default number of turns kept per conversation.
pub const DEFAULT_WINDOW: usize = 10;

/// Default idle time after which a conversation starts over.
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// Limits applied to every session in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum number of turns retained.
    pub window: usize,
    /// Idle time after which history is discarded; `None` disables expiry.
    pub ttl: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            ttl: Some(Duration::minutes(DEFAULT_TTL_MINUTES)),
        }
    }
}

/// The memory of one conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    turns: VecDeque<Turn>,
    display_name: Option<String>,
    last_active_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Returns the retained turns, oldest first.
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Returns the number of retained turns.
    #[must_use]
    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Returns the best-effort display name of the speaker.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns when a turn was last appended, or when a name-only session
    /// was created.
    #[must_use]
    pub fn last_active_at(&self) -> Option<DateTime<Utc>> {
        self.last_active_at
    }

    /// Returns true if the session has been idle longer than `ttl`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        match (ttl, self.last_active_at) {
            (Some(ttl), Some(last)) => now - last > ttl,
            _ => false,
        }
    }

    fn append(&mut self, turn: Turn, window: usize) {
        self.turns.push_back(turn);
        while self.turns.len() > window {
            self.turns.pop_front();
        }
    }
}

type Slot = Arc<Mutex<Session>>;

/// In-memory store of sessions keyed by [`ConversationKey`].
pub struct SessionStore {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    sessions: RwLock<HashMap<ConversationKey, Slot>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("config", &self.config)
            .field("sessions", &self.len())
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionStore {
    /// Creates a store that reads the wall clock.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a store with an explicit time source.
    #[must_use]
    pub fn with_clock(config: SessionConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the store's limits.
    #[must_use]
    pub fn config(&self) -> SessionConfig {
        self.config
    }

    /// Returns the number of tracked conversations, expired ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns true if no conversation is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the history for `key`, oldest first.
    ///
    /// Absent and expired sessions read as empty.
    pub async fn read(&self, key: &ConversationKey) -> Vec<Turn> {
        let Some(slot) = self.slot(key) else {
            return Vec::new();
        };
        let session = slot.lock().await;
        if session.is_expired(self.clock.now(), self.config.ttl) {
            return Vec::new();
        }
        session.turns.iter().cloned().collect()
    }

    /// Appends one turn to the history for `key`.
    pub async fn append(&self, key: &ConversationKey, role: TurnRole, text: impl Into<String>) {
        self.append_turns(key, [Turn::new(role, text)]).await;
    }

    /// Appends a user turn and the assistant's answer as one atomic update.
    pub async fn append_exchange(
        &self,
        key: &ConversationKey,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) {
        self.append_turns(key, [Turn::user(user_text), Turn::assistant(assistant_text)])
            .await;
    }

    /// Returns the display name recorded for `key`.
    pub async fn display_name(&self, key: &ConversationKey) -> Option<String> {
        let slot = self.slot(key)?;
        let session = slot.lock().await;
        session.display_name.clone()
    }

    /// Records the speaker's display name, creating the session if needed.
    ///
    /// History is left untouched. A session created here is stamped as
    /// active so that it ages out like any other.
    pub async fn record_display_name(&self, key: &ConversationKey, name: impl Into<String>) {
        let slot = self.slot_or_insert(key);
        let mut session = slot.lock().await;
        session.display_name = Some(name.into());
        if session.last_active_at.is_none() {
            session.last_active_at = Some(self.clock.now());
        }
    }

    /// Drops sessions whose TTL has lapsed and that nobody is using.
    ///
    /// Returns the number of sessions removed.
    pub fn purge_expired(&self) -> usize {
        let Some(ttl) = self.config.ttl else {
            return 0;
        };
        let now = self.clock.now();
        let mut sessions = self
            .sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = sessions.len();
        sessions.retain(|_, slot| {
            // A slot is only cloned under the map lock, so a count of one
            // means no task is between lookup and write.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(session) => !session.is_expired(now, Some(ttl)),
                Err(_) => true,
            }
        });
        before - sessions.len()
    }

    async fn append_turns<const N: usize>(&self, key: &ConversationKey, turns: [Turn; N]) {
        let slot = self.slot_or_insert(key);
        let mut session = slot.lock().await;
        let now = self.clock.now();
        if session.is_expired(now, self.config.ttl) {
            debug!(key = %key, "session expired, starting fresh history");
            session.turns.clear();
        }
        for turn in turns {
            session.append(turn, self.config.window);
        }
        session.last_active_at = Some(now);
    }

    fn slot(&self, key: &ConversationKey) -> Option<Slot> {
        self.sessions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    fn slot_or_insert(&self, key: &ConversationKey) -> Slot {
        if let Some(slot) = self.slot(key) {
            return slot;
        }
        self.sessions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key.clone())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muaddib_core::{ManualClock, SourceKind};

    fn key(user: &str) -> ConversationKey {
        ConversationKey::resolve(user, SourceKind::Individual, None)
    }

    fn store_with_clock(window: usize) -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = SessionStore::with_clock(
            SessionConfig {
                window,
                ttl: Some(Duration::minutes(30)),
            },
            clock.clone(),
        );
        (store, clock)
    }

    #[tokio::test]
    async fn read_of_unknown_key_is_empty() {
        let store = SessionStore::default();
        assert!(store.read(&key("nobody")).await.is_empty());
        assert!(store.display_name(&key("nobody")).await.is_none());
    }

    #[tokio::test]
    async fn history_keeps_most_recent_window_in_order() {
        let (store, _clock) = store_with_clock(4);
        let k = key("U1");

        for n in 0usize..7 {
            store.append(&k, TurnRole::User, format!("m{n}")).await;
            let history = store.read(&k).await;
            let expected: Vec<String> = (0..=n)
                .skip((n + 1).saturating_sub(4))
                .map(|i| format!("m{i}"))
                .collect();
            let actual: Vec<String> = history.iter().map(|t| t.content().to_string()).collect();
            assert!(history.len() <= 4);
            assert_eq!(actual, expected);
        }
    }

    #[tokio::test]
    async fn exchange_appends_user_then_assistant() {
        let store = SessionStore::default();
        let k = key("U1");

        store.append_exchange(&k, "What's the weather?", "Sunny.").await;

        let history = store.read(&k).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], Turn::user("What's the weather?"));
        assert_eq!(history[1], Turn::assistant("Sunny."));
    }

    #[tokio::test]
    async fn expired_session_restarts_on_append() {
        let (store, clock) = store_with_clock(10);
        let k = key("U1");

        store.append_exchange(&k, "old question", "old answer").await;
        clock.advance(Duration::minutes(31));

        assert!(store.read(&k).await.is_empty());

        store.append(&k, TurnRole::User, "new question").await;
        let history = store.read(&k).await;
        assert_eq!(history, vec![Turn::user("new question")]);
    }

    #[tokio::test]
    async fn activity_within_ttl_keeps_history() {
        let (store, clock) = store_with_clock(10);
        let k = key("U1");

        store.append(&k, TurnRole::User, "first").await;
        clock.advance(Duration::minutes(29));
        store.append(&k, TurnRole::User, "second").await;
        clock.advance(Duration::minutes(29));

        assert_eq!(store.read(&k).await.len(), 2);
    }

    #[tokio::test]
    async fn ttl_can_be_disabled() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = SessionStore::with_clock(
            SessionConfig {
                window: 10,
                ttl: None,
            },
            clock.clone(),
        );
        let k = key("U1");

        store.append(&k, TurnRole::User, "kept").await;
        clock.advance(Duration::days(3));

        assert_eq!(store.read(&k).await.len(), 1);
        assert_eq!(store.purge_expired(), 0);
    }

    #[tokio::test]
    async fn display_name_does_not_touch_history() {
        let store = SessionStore::default();
        let k = key("U1");

        store.record_display_name(&k, "Alice").await;

        assert_eq!(store.display_name(&k).await.as_deref(), Some("Alice"));
        assert!(store.read(&k).await.is_empty());
    }

    #[tokio::test]
    async fn name_only_sessions_are_purged_after_ttl() {
        let (store, clock) = store_with_clock(10);

        store.record_display_name(&key("U1"), "Alice").await;
        assert_eq!(store.purge_expired(), 0);

        clock.advance(Duration::days(365));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn recording_a_name_does_not_extend_an_active_session() {
        let (store, clock) = store_with_clock(10);
        let k = key("U1");

        store.append(&k, TurnRole::User, "hi").await;
        clock.advance(Duration::minutes(20));
        store.record_display_name(&k, "Alice").await;
        clock.advance(Duration::minutes(20));

        assert!(store.read(&k).await.is_empty());
        assert_eq!(store.purge_expired(), 1);
    }

    #[tokio::test]
    async fn keys_are_isolated() {
        let store = SessionStore::default();
        let a = ConversationKey::resolve("U1", SourceKind::Group, Some("G1"));
        let b = ConversationKey::resolve("U2", SourceKind::Group, Some("G1"));

        store.append(&a, TurnRole::User, "from U1").await;

        assert_eq!(store.read(&a).await.len(), 1);
        assert!(store.read(&b).await.is_empty());
    }

    #[tokio::test]
    async fn purge_removes_only_expired_sessions() {
        let (store, clock) = store_with_clock(10);

        store.append(&key("stale"), TurnRole::User, "hi").await;
        clock.advance(Duration::minutes(31));
        store.append(&key("fresh"), TurnRole::User, "hi").await;

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.read(&key("fresh")).await.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_exchanges_on_one_key_never_interleave() {
        let store = Arc::new(SessionStore::new(SessionConfig {
            window: 1000,
            ttl: None,
        }));
        let k = key("U1");

        let mut handles = Vec::new();
        for n in 0..50 {
            let store = store.clone();
            let k = k.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append_exchange(&k, format!("q{n}"), format!("a{n}"))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.expect("task should finish");
        }

        let history = store.read(&k).await;
        assert_eq!(history.len(), 100);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role(), TurnRole::User);
            assert_eq!(pair[1].role(), TurnRole::Assistant);
            assert_eq!(&pair[0].content()[1..], &pair[1].content()[1..]);
        }
    }
}
