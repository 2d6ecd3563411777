//! Pending search sessions
//!
//! A session marks that the next image a user sends is a search request.
//! Each session carries a cancellable timer; the image listener and the
//! timeout task race for the session and exactly one of them wins.
//! Transport-agnostic: keyed by whatever identifies a user.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SEARCH_SESSION_TIMEOUT_SECS;

/// Bounds shared by every session key type.
pub trait SessionKey: Hash + Eq + Clone + Send + Sync + Debug + 'static {}

impl<T: Hash + Eq + Clone + Send + Sync + Debug + 'static> SessionKey for T {}

/// One pending search
#[derive(Debug, Clone)]
pub struct Session {
    /// Identifies this session instance, so a stale timer never removes a newer one
    pub id: Uuid,
    /// When the search command was issued
    pub created_at: Instant,
    cancel: CancellationToken,
}

impl Session {
    /// Create a session stamped with the current time
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Instant::now(),
            cancel: CancellationToken::new(),
        }
    }

    /// Time since the session was opened
    #[must_use]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Stop the session's timer without waiting for the deadline
    pub fn cancel_timer(&self) {
        self.cancel.cancel();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Storage for pending sessions
///
/// `take` must be an atomic check-and-remove: two callers racing for the
/// same entry never both receive it.
#[async_trait]
pub trait SessionStore<Id: SessionKey>: Send + Sync {
    /// Store a session, returning the one it replaced
    async fn insert(&self, id: Id, session: Session) -> Option<Session>;
    /// Whether a session is pending for `id`
    async fn contains(&self, id: &Id) -> bool;
    /// Remove and return the session for `id`.
    ///
    /// With `expected` set, only removes the entry if it is that session instance.
    async fn take(&self, id: &Id, expected: Option<Uuid>) -> Option<Session>;
    /// Number of pending sessions
    async fn len(&self) -> usize;
}

/// Process-local session store
pub struct InMemorySessionStore<Id: SessionKey> {
    sessions: RwLock<HashMap<Id, Session>>,
}

impl<Id: SessionKey> Default for InMemorySessionStore<Id> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id: SessionKey> InMemorySessionStore<Id> {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<Id: SessionKey> SessionStore<Id> for InMemorySessionStore<Id> {
    async fn insert(&self, id: Id, session: Session) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, session)
    }

    async fn contains(&self, id: &Id) -> bool {
        let sessions = self.sessions.read().await;
        sessions.contains_key(id)
    }

    async fn take(&self, id: &Id, expected: Option<Uuid>) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let matches = sessions
            .get(id)
            .is_some_and(|current| expected.is_none_or(|expected| current.id == expected));
        if matches {
            sessions.remove(id)
        } else {
            None
        }
    }

    async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }
}

/// Handle returned by [`SessionTracker::begin_session`], consumed by the timeout task
#[derive(Debug)]
pub struct ArmedSession<Id> {
    /// User the session belongs to
    pub user_id: Id,
    /// Session instance the timer was armed for
    pub session_id: Uuid,
    deadline: Instant,
    cancel: CancellationToken,
}

impl<Id> ArmedSession<Id> {
    /// When the session expires if no image arrives
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// How an armed session left the pending state, from the timer's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExpiry {
    /// The deadline passed and this timer removed the session: notify the user
    Expired,
    /// Someone else closed the session first (image received, cancelled or replaced)
    Resolved,
}

/// Tracks pending searches and arms their timeouts
pub struct SessionTracker<Id: SessionKey, S: SessionStore<Id> = InMemorySessionStore<Id>> {
    store: S,
    timeout: Duration,
    _key: PhantomData<fn() -> Id>,
}

impl<Id: SessionKey> SessionTracker<Id> {
    /// Tracker backed by an in-memory store
    #[must_use]
    pub fn in_memory(timeout: Duration) -> Self {
        Self::with_store(InMemorySessionStore::new(), timeout)
    }
}

impl<Id: SessionKey> Default for SessionTracker<Id> {
    fn default() -> Self {
        Self::in_memory(Duration::from_secs(SEARCH_SESSION_TIMEOUT_SECS))
    }
}

impl<Id: SessionKey, S: SessionStore<Id>> SessionTracker<Id, S> {
    /// Tracker over an arbitrary store
    #[must_use]
    pub const fn with_store(store: S, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            _key: PhantomData,
        }
    }

    /// Configured wait window
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Open a session for `user_id`, replacing (and disarming) any pending one.
    ///
    /// Re-issuing the command therefore restarts the wait window.
    pub async fn begin_session(&self, user_id: Id) -> ArmedSession<Id> {
        let session = Session::new();
        let armed = ArmedSession {
            user_id: user_id.clone(),
            session_id: session.id,
            deadline: session.created_at + self.timeout,
            cancel: session.cancel.clone(),
        };

        if let Some(previous) = self.store.insert(user_id.clone(), session).await {
            debug!(user_id = ?user_id, age = ?previous.age(), "Replacing pending search session");
            previous.cancel_timer();
        }

        info!(user_id = ?user_id, timeout = ?self.timeout, "Search session started");
        armed
    }

    /// Whether `user_id` has a pending session
    pub async fn has_session(&self, user_id: &Id) -> bool {
        self.store.contains(user_id).await
    }

    /// Close the pending session of `user_id`, if any.
    ///
    /// Returns `true` only for the caller that actually removed it, so the
    /// result decides who may act on the session. Calling it again is a no-op.
    pub async fn end_session(&self, user_id: &Id) -> bool {
        match self.store.take(user_id, None).await {
            Some(session) => {
                session.cancel_timer();
                debug!(user_id = ?user_id, age = ?session.age(), "Search session closed");
                true
            }
            None => false,
        }
    }

    /// Wait until the armed session either expires or is closed by someone else.
    ///
    /// On the deadline the session is removed only if it is still the instance
    /// this timer was armed for; `Expired` means this call removed it.
    pub async fn wait_for_expiry(&self, armed: ArmedSession<Id>) -> SessionExpiry {
        tokio::select! {
            biased;
            () = armed.cancel.cancelled() => SessionExpiry::Resolved,
            () = tokio::time::sleep_until(armed.deadline) => {
                if self
                    .store
                    .take(&armed.user_id, Some(armed.session_id))
                    .await
                    .is_some()
                {
                    info!(user_id = ?armed.user_id, "Search session expired");
                    SessionExpiry::Expired
                } else {
                    SessionExpiry::Resolved
                }
            }
        }
    }

    /// Number of searches currently waiting for an image
    pub async fn active_sessions(&self) -> usize {
        self.store.len().await
    }
}

/// Session tracker keyed by Telegram user ID
pub type TelegramSearchSessions = SessionTracker<i64>;
