//! Caller credentials and session lookup.
//!
//! Password checks and session issuance live outside the engine. The
//! gateway only needs to ask "is this an admin token?" and "which identity
//! does this user token belong to?", which is what [`SessionLookup`] answers.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use rand::RngCore;
use wagerpot_ingress::RateKey;
use wagerpot_types::Identity;

/// What a caller presents with each request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub admin_session: Option<String>,
    pub user_session: Option<String>,
    pub remote_addr: String,
}

impl Credentials {
    #[must_use]
    pub fn anonymous(remote_addr: impl Into<String>) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn admin(token: impl Into<String>) -> Self {
        Self {
            admin_session: Some(token.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn user(token: impl Into<String>) -> Self {
        Self {
            user_session: Some(token.into()),
            ..Self::default()
        }
    }

    /// Ask `sessions` which of the presented tokens are live.
    #[must_use]
    pub fn verify(&self, sessions: &dyn SessionLookup) -> VerifiedCaller {
        let admin_session = self
            .admin_session
            .as_deref()
            .filter(|token| sessions.is_admin(token))
            .map(str::to_string);
        let user = self
            .user_session
            .as_deref()
            .and_then(|token| sessions.user_identity(token));
        VerifiedCaller {
            admin_session,
            user,
            remote_addr: self.remote_addr.clone(),
        }
    }
}

/// A caller after session lookup. Dead or forged tokens are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCaller {
    pub admin_session: Option<String>,
    pub user: Option<Identity>,
    pub remote_addr: String,
}

impl VerifiedCaller {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.admin_session.is_some()
    }

    /// The admission bucket this caller draws from.
    #[must_use]
    pub fn rate_key(&self) -> RateKey {
        RateKey::resolve(
            self.admin_session.as_deref(),
            self.user.as_ref(),
            &self.remote_addr,
        )
    }
}

/// Session oracle consulted by the gateway.
pub trait SessionLookup: Send + Sync {
    /// Is `token` a live admin session?
    fn is_admin(&self, token: &str) -> bool;

    /// Identity behind a live user session.
    fn user_identity(&self, token: &str) -> Option<Identity>;
}

/// Process-local session store.
#[derive(Default)]
pub struct InMemorySessions {
    admins: RwLock<HashSet<String>>,
    users: RwLock<HashMap<String, Identity>>,
}

impl InMemorySessions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh admin token.
    pub fn issue_admin(&self) -> String {
        let token = new_token();
        self.admins.write().insert(token.clone());
        token
    }

    /// Issue a fresh user token bound to `identity`.
    pub fn issue_user(&self, identity: Identity) -> String {
        let token = new_token();
        self.users.write().insert(token.clone(), identity);
        token
    }

    /// Revoke a token of either kind. Returns whether anything was removed.
    pub fn revoke(&self, token: &str) -> bool {
        let admin = self.admins.write().remove(token);
        let user = self.users.write().remove(token).is_some();
        admin || user
    }
}

impl SessionLookup for InMemorySessions {
    fn is_admin(&self, token: &str) -> bool {
        self.admins.read().contains(token)
    }

    fn user_identity(&self, token: &str) -> Option<Identity> {
        self.users.read().get(token).cloned()
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
