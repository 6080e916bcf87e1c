//! The registry of live sessions and the listeners interested in auth changes.

use std::{
    collections::HashMap,
    fmt::Display,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::user::UserId;

/// An opaque identifier for a signed in session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only a prefix, the full ID is a credential.
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "{prefix}…")
    }
}

/// A change to the authentication state of a user.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthEvent {
    /// A user logged in or registered.
    SignedIn {
        /// The user that signed in.
        user_id: UserId,
        /// The session that was started.
        session_id: SessionId,
    },
    /// A user logged out.
    SignedOut {
        /// The user that signed out.
        user_id: UserId,
        /// The session that was ended.
        session_id: SessionId,
    },
    /// A user changed their profile.
    ProfileUpdated {
        /// The user whose profile changed.
        user_id: UserId,
    },
    /// A user deleted their account, all of their sessions have ended.
    AccountDeleted {
        /// The user that was deleted.
        user_id: UserId,
    },
}

/// A handle for removing a listener with [SessionRegistry::unsubscribe].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

type Listener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Session {
    user_id: UserId,
    expires_at: OffsetDateTime,
}

/// Owns the live sessions and notifies subscribers when they change.
///
/// Listeners are called after the registry's locks are released, so a
/// listener may call back into the registry.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Session>>,
    listeners: Mutex<Vec<(Subscription, Listener)>>,
    next_subscription: AtomicU64,
    issued_sessions: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `listener` with every future [AuthEvent] until unsubscribed.
    pub fn subscribe(&self, listener: impl Fn(&AuthEvent) + Send + Sync + 'static) -> Subscription {
        let subscription = Subscription(self.next_subscription.fetch_add(1, Ordering::Relaxed));

        lock(&self.listeners).push((subscription, Arc::new(listener)));

        subscription
    }

    /// Stop notifying the listener registered with `subscription`.
    ///
    /// Returns `false` if the subscription was already removed.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = lock(&self.listeners);
        let count_before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);

        listeners.len() != count_before
    }

    /// Notify every listener of `event`.
    pub fn publish(&self, event: AuthEvent) {
        let listeners: Vec<Listener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&event);
        }
    }

    /// Start a session for `user_id` that lasts until `expires_at`.
    pub fn start(&self, user_id: UserId, expires_at: OffsetDateTime) -> SessionId {
        let session_id = self.new_session_id(user_id);

        lock(&self.sessions).insert(
            session_id.clone(),
            Session {
                user_id,
                expires_at,
            },
        );

        self.publish(AuthEvent::SignedIn {
            user_id,
            session_id: session_id.clone(),
        });

        session_id
    }

    /// Get the user of a live session.
    ///
    /// Returns `None` if the session never existed, was ended or has expired
    /// at `now`. Expired sessions are removed.
    pub fn resolve(&self, session_id: &SessionId, now: OffsetDateTime) -> Option<UserId> {
        let mut sessions = lock(&self.sessions);
        let session = *sessions.get(session_id)?;

        if session.expires_at <= now {
            sessions.remove(session_id);
            return None;
        }

        Some(session.user_id)
    }

    /// Whether `session_id` has not been ended.
    pub fn is_live(&self, session_id: &SessionId) -> bool {
        lock(&self.sessions).contains_key(session_id)
    }

    /// Move the expiry of a live session to `expires_at`.
    pub fn extend(&self, session_id: &SessionId, expires_at: OffsetDateTime) {
        if let Some(session) = lock(&self.sessions).get_mut(session_id) {
            session.expires_at = expires_at;
        }
    }

    /// End a session, returning its user if it was live.
    pub fn end(&self, session_id: &SessionId) -> Option<UserId> {
        let session = lock(&self.sessions).remove(session_id)?;

        self.publish(AuthEvent::SignedOut {
            user_id: session.user_id,
            session_id: session_id.clone(),
        });

        Some(session.user_id)
    }

    /// End every session of `user_id` without notifying listeners, returning how many were ended.
    pub fn end_all_for_user(&self, user_id: UserId) -> usize {
        let mut sessions = lock(&self.sessions);
        let count_before = sessions.len();
        sessions.retain(|_, session| session.user_id != user_id);

        count_before - sessions.len()
    }

    /// Remove every session that has expired at `now`, returning how many were removed.
    pub fn prune_expired(&self, now: OffsetDateTime) -> usize {
        let mut sessions = lock(&self.sessions);
        let count_before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);

        count_before - sessions.len()
    }

    /// The number of sessions that have not been ended or pruned.
    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    /// Whether there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn new_session_id(&self, user_id: UserId) -> SessionId {
        let counter = self.issued_sessions.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(user_id.as_i64().to_le_bytes());
        hasher.update(OffsetDateTime::now_utc().unix_timestamp_nanos().to_le_bytes());
        hasher.update(counter.to_le_bytes());

        SessionId(format!("{:x}", hasher.finalize()))
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .field("listeners", &lock(&self.listeners).len())
            .finish()
    }
}

/// A panicking listener must not lock everyone out.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
