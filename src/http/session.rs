//! Per-visitor session state.
//!
//! # Responsibilities
//! - Hold the signed-in user, pending flash messages and the CSRF token
//! - Keep sessions in memory keyed by the session cookie
//! - Expire idle sessions after the configured lifetime
//!
//! # Design Decisions
//! - Requests sharing a session id are serialized on that session
//! - Session ids are random UUIDs, never derived from user data
//! - The id is replaced whenever the signed-in user changes
//! - CSRF tokens are compared in constant time

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of generated CSRF and reset tokens.
pub const TOKEN_LENGTH: usize = 32;

/// Back-office roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Partner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Partner => "partner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            "partner" => Ok(Role::Partner),
            other => Err(format!("unknown role `{}`", other)),
        }
    }
}

/// The authenticated user attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionUser {
    pub id: u64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub partner_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
    Info,
    Warning,
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    #[serde(rename = "type")]
    pub kind: FlashKind,
    pub message: String,
}

/// Generate a random alphanumeric token.
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Compare two strings without short-circuiting on the first difference.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub user: Option<SessionUser>,
    pub flash: Vec<FlashMessage>,
    pub csrf_token: Option<String>,
    /// Extends the lifetime to the remember-me window.
    pub remember: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    pub fn has_role(&self, roles: &[Role]) -> bool {
        self.role().is_some_and(|role| roles.contains(&role))
    }

    pub fn user_id(&self) -> Option<u64> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn flash(&mut self, kind: FlashKind, message: impl Into<String>) {
        self.flash.push(FlashMessage {
            kind,
            message: message.into(),
        });
    }

    /// Drain pending flash messages.
    pub fn take_flash(&mut self) -> Vec<FlashMessage> {
        std::mem::take(&mut self.flash)
    }

    /// Current CSRF token, generated on first use.
    pub fn csrf_token(&mut self) -> String {
        self.csrf_token
            .get_or_insert_with(|| random_token(TOKEN_LENGTH))
            .clone()
    }

    pub fn validate_csrf(&self, submitted: Option<&str>) -> bool {
        match (self.csrf_token.as_deref(), submitted) {
            (Some(expected), Some(given)) if !given.is_empty() => constant_time_eq(expected, given),
            _ => false,
        }
    }

    pub fn login(&mut self, user: SessionUser, remember: bool) {
        self.user = Some(user);
        self.remember = remember;
    }

    pub fn logout(&mut self) {
        self.user = None;
        self.remember = false;
    }
}

/// Stored state behind one session id.
struct SessionSlot {
    session: Session,
    expires_at: Instant,
}

impl SessionSlot {
    fn fresh(lifetime: Duration) -> Self {
        Self {
            session: Session::default(),
            expires_at: Instant::now() + lifetime,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

type SharedSlot = Arc<Mutex<SessionSlot>>;

fn lock(slot: &SharedSlot) -> MutexGuard<'_, SessionSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Result of running one request against a session.
#[derive(Debug)]
pub struct SessionTransaction<R> {
    /// Id the session cookie must carry from now on.
    pub id: String,
    /// Cookie lifetime.
    pub max_age: Duration,
    /// The cookie did not name a live session.
    pub is_new: bool,
    /// The id changed because the signed-in user did.
    pub rotated: bool,
    pub value: R,
}

/// In-memory session storage.
///
/// Requests presenting the same session id run one at a time against that
/// session, so no request overwrites another's changes.
pub struct SessionStore {
    sessions: DashMap<String, SharedSlot>,
    lifetime: Duration,
    remember_lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime: Duration, remember_lifetime: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            lifetime,
            remember_lifetime,
        }
    }

    /// Slot for a cookie value, or a new empty one under a fresh id.
    fn checkout(&self, id: Option<&str>) -> (String, SharedSlot, bool) {
        if let Some(id) = id {
            if let Some(slot) = self.sessions.get(id) {
                return (id.to_string(), slot.value().clone(), false);
            }
        }
        let id = new_session_id();
        let slot = Arc::new(Mutex::new(SessionSlot::fresh(self.lifetime)));
        self.sessions.insert(id.clone(), Arc::clone(&slot));
        (id, slot, true)
    }

    /// Drop `id` if it still maps to `slot`.
    fn detach(&self, id: &str, slot: &SharedSlot) {
        self.sessions.remove_if(id, |_, current| Arc::ptr_eq(current, slot));
    }

    /// Run `f` with exclusive access to the session named by `cookie`.
    ///
    /// A missing, unknown or expired cookie gets a fresh session. When the
    /// signed-in user changes (login, logout) the session moves to a new id
    /// and the old id stops working.
    pub fn transact<R>(
        &self,
        cookie: Option<&str>,
        f: impl FnOnce(Session) -> (Session, R),
    ) -> SessionTransaction<R> {
        let (mut id, mut slot, mut is_new) = self.checkout(cookie);
        let mut guard = lock(&slot);

        if !is_new && !guard.is_live(Instant::now()) {
            // Expired, purged or rotated away while this request waited.
            guard.session = Session::default();
            drop(guard);
            self.detach(&id, &slot);
            tracing::debug!("Session expired");
            (id, slot, is_new) = self.checkout(None);
            guard = lock(&slot);
        }

        let session = std::mem::take(&mut guard.session);
        let user_before = session.user_id();
        let (session, value) = f(session);
        let max_age = self.lifetime_for(&session);
        let rotated = session.user_id() != user_before;

        if rotated {
            guard.expires_at = Instant::now();
            drop(guard);
            self.detach(&id, &slot);

            id = new_session_id();
            let fresh = SessionSlot {
                session,
                expires_at: Instant::now() + max_age,
            };
            self.sessions.insert(id.clone(), Arc::new(Mutex::new(fresh)));
        } else {
            guard.session = session;
            guard.expires_at = Instant::now() + max_age;
        }

        SessionTransaction {
            id,
            max_age,
            is_new,
            rotated,
            value,
        }
    }

    /// Lifetime the cookie should carry for this session.
    pub fn lifetime_for(&self, session: &Session) -> Duration {
        if session.remember {
            self.remember_lifetime
        } else {
            self.lifetime
        }
    }

    /// Drop expired sessions. Returns how many were removed.
    ///
    /// Sessions in use by a request are kept until the next sweep.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.sessions.retain(|_, slot| {
            let live = match slot.try_lock() {
                Ok(stored) => stored.is_live(now),
                Err(TryLockError::WouldBlock) => true,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().is_live(now),
            };
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
