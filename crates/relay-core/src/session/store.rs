//! In-memory session store with sliding expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::TimeDelta;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{DEFAULT_SESSION_TTL, Session, SessionState, SessionUpdate};
use crate::domain::{ChatRequest, ProviderConfig};
use crate::ids::SessionId;
use crate::ports::{Clock, SystemClock};

/// Keyed, TTL-expiring map of suspended conversations.
///
/// Every operation takes the lock exactly once, so each is atomic with
/// respect to concurrent callers. Expired entries are evicted lazily on
/// lookup and periodically by [`SessionStore::spawn_sweeper`].
#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    /// Create a store on the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a store reading time from `clock`.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = TimeDelta::from_std(ttl).unwrap_or_else(|_| {
            TimeDelta::from_std(DEFAULT_SESSION_TTL).unwrap_or(TimeDelta::zero())
        });
        Self {
            sessions: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a new session and return a snapshot of it.
    pub fn create(
        &self,
        provider: ProviderConfig,
        request: ChatRequest,
        initial: SessionState,
    ) -> Session {
        let now = self.clock.now();
        let session = Session {
            id: SessionId::generate(),
            created_at: now,
            expires_at: now + self.ttl,
            provider,
            request,
            state: initial,
        };

        let mut sessions = self.lock();
        sessions.insert(session.id.clone(), session.clone());
        info!(
            session_id = %session.id,
            provider = %session.provider.provider,
            pending_tool_calls = session.state.pending_tool_calls.len(),
            live_sessions = sessions.len(),
            "Session created"
        );
        session
    }

    /// Look up a live session, evicting it if it has expired.
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        let now = self.clock.now();
        let mut sessions = self.lock();
        match sessions.get(id) {
            Some(session) if session.expires_at > now => Some(session.clone()),
            Some(_) => {
                sessions.remove(id);
                debug!(session_id = %id, "Evicted expired session on lookup");
                None
            }
            None => None,
        }
    }

    /// Merge `update` into a live session and restart its expiry clock.
    ///
    /// Returns `None` if the session is absent or expired.
    pub fn update(&self, id: &SessionId, update: SessionUpdate) -> Option<Session> {
        let now = self.clock.now();
        let mut sessions = self.lock();

        let expired = sessions.get(id)?.expires_at <= now;
        if expired {
            sessions.remove(id);
            debug!(session_id = %id, "Evicted expired session on update");
            return None;
        }

        let session = sessions.get_mut(id)?;
        update.apply(session);
        session.expires_at = now + self.ttl;
        Some(session.clone())
    }

    /// Remove a session. Removing an absent session is not an error.
    pub fn delete(&self, id: &SessionId) {
        if self.lock().remove(id).is_some() {
            info!(session_id = %id, "Session deleted");
        }
    }

    /// Number of stored sessions, expired or not.
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    /// Drop every expired session, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        before - sessions.len()
    }

    /// Run [`SessionStore::sweep_expired`] every `interval` until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Session sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = store.sweep_expired();
                        if removed > 0 {
                            info!(removed, remaining = store.count(), "Swept expired sessions");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, Provider, ToolCall, Usage};
    use crate::testing::ManualClock;

    const TTL: Duration = Duration::from_secs(300);

    fn store() -> (SessionStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (SessionStore::with_clock(TTL, clock.clone()), clock)
    }

    fn provider() -> ProviderConfig {
        ProviderConfig::new(Provider::OpenAi, None)
    }

    fn request() -> ChatRequest {
        ChatRequest::new("gpt-4o-mini", vec![Message::user("hi")])
    }

    fn state_with_call() -> SessionState {
        SessionState {
            pending_tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "lookup".into(),
                input: serde_json::json!({}),
            }],
            usage: Usage::new(10, 5),
            ..SessionState::default()
        }
    }

    #[test]
    fn test_create_sets_expiry_from_ttl() {
        let (store, _clock) = store();
        let session = store.create(provider(), request(), state_with_call());

        assert!(session.id.as_str().starts_with(SessionId::PREFIX));
        assert_eq!(session.expires_at - session.created_at, TimeDelta::seconds(300));
        assert_eq!(store.count(), 1);
        assert_eq!(store.get(&session.id), Some(session));
    }

    #[test]
    fn test_lookup_after_ttl_evicts() {
        let (store, clock) = store();
        let session = store.create(provider(), request(), SessionState::default());

        clock.advance(TTL + Duration::from_millis(1));

        assert!(store.get(&session.id).is_none());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_lookup_exactly_at_expiry_is_not_found() {
        let (store, clock) = store();
        let session = store.create(provider(), request(), SessionState::default());

        clock.advance(TTL);
        assert!(store.get(&session.id).is_none());
    }

    #[test]
    fn test_get_does_not_extend_expiry() {
        let (store, clock) = store();
        let session = store.create(provider(), request(), SessionState::default());

        clock.advance(Duration::from_secs(200));
        assert!(store.get(&session.id).is_some());
        clock.advance(Duration::from_secs(101));
        assert!(store.get(&session.id).is_none());
    }

    #[test]
    fn test_update_slides_expiry_window() {
        let (store, clock) = store();
        let session = store.create(provider(), request(), state_with_call());
        let original_expiry = session.expires_at;

        clock.advance(Duration::from_secs(200));
        let updated = store
            .update(
                &session.id,
                SessionUpdate {
                    raw_assistant_text: Some("partial".into()),
                    ..SessionUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.expires_at, clock.now() + TimeDelta::seconds(300));

        // Past the original expiry, still alive thanks to the update.
        clock.advance(Duration::from_secs(150));
        assert!(clock.now() > original_expiry);
        let live = store.get(&session.id).unwrap();
        assert_eq!(live.state.raw_assistant_text, "partial");
        assert_eq!(live.state.pending_tool_calls.len(), 1);
    }

    #[test]
    fn test_update_leaves_unset_fields() {
        let (store, _clock) = store();
        let session = store.create(provider(), request(), state_with_call());

        let updated = store
            .update(
                &session.id,
                SessionUpdate {
                    usage: Some(Usage::new(13, 7)),
                    ..SessionUpdate::default()
                },
            )
            .unwrap();

        assert_eq!(updated.state.usage, Usage::new(13, 7));
        assert_eq!(updated.state.pending_tool_calls, session.state.pending_tool_calls);
        assert_eq!(updated.request, session.request);
    }

    #[test]
    fn test_update_missing_or_expired_is_none() {
        let (store, clock) = store();
        assert!(
            store
                .update(&SessionId::from("sess_missing"), SessionUpdate::default())
                .is_none()
        );

        let session = store.create(provider(), request(), SessionState::default());
        clock.advance(TTL + Duration::from_secs(1));
        assert!(store.update(&session.id, SessionUpdate::default()).is_none());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (store, _clock) = store();
        let session = store.create(provider(), request(), SessionState::default());

        store.delete(&session.id);
        store.delete(&session.id);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_count_does_not_evict() {
        let (store, clock) = store();
        store.create(provider(), request(), SessionState::default());
        clock.advance(TTL * 2);
        assert_eq!(store.count(), 1);
        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_sweep_keeps_live_sessions() {
        let (store, clock) = store();
        let old = store.create(provider(), request(), SessionState::default());
        clock.advance(Duration::from_secs(200));
        let fresh = store.create(provider(), request(), SessionState::default());
        clock.advance(Duration::from_secs(150));

        assert_eq!(store.sweep_expired(), 1);
        assert!(store.get(&old.id).is_none());
        assert!(store.get(&fresh.id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_removes_expired_sessions_on_interval() {
        let clock = Arc::new(ManualClock::new());
        let store = Arc::new(SessionStore::with_clock(TTL, clock.clone()));
        store.create(provider(), request(), SessionState::default());

        let cancel = CancellationToken::new();
        let handle = store.spawn_sweeper(Duration::from_secs(60), cancel.clone());

        clock.advance(TTL + Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(store.count(), 0);

        cancel.cancel();
        tokio_test::assert_ok!(handle.await);
    }
}
