//! Authentication session and persisted client state.

use serde::{Deserialize, Serialize};
use vicino_shared::{Role, User};

use crate::storage::Storage;

const SESSION_KEY: &str = "vicino_session";
const ACTIVE_SEARCH_KEY: &str = "vicino_active_search";

/// Stored session data
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Persists the bearer token and logged-in user across restarts.
///
/// The realtime connection reads the token from here at every (re)connect,
/// and the API client attaches it to every request.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    storage: Storage,
}

impl CredentialStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn save_session(&self, session: &AuthSession) -> bool {
        self.storage.save(SESSION_KEY, session)
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.storage.load(SESSION_KEY)
    }

    pub fn token(&self) -> Option<String> {
        self.session().map(|s| s.token)
    }

    pub fn user(&self) -> Option<User> {
        self.session().map(|s| s.user)
    }

    pub fn role(&self) -> Option<Role> {
        self.user().map(|u| u.role)
    }

    /// Logout: drop the stored session.
    pub fn clear(&self) {
        self.storage.remove(SESSION_KEY);
    }
}

/// Persists the customer's in-progress search id so it survives an app
/// restart.
#[derive(Debug, Clone)]
pub struct ActiveSearchStore {
    storage: Storage,
}

impl ActiveSearchStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn set(&self, search_id: &str) -> bool {
        self.storage.save(ACTIVE_SEARCH_KEY, &search_id.to_string())
    }

    pub fn get(&self) -> Option<String> {
        self.storage.load(ACTIVE_SEARCH_KEY)
    }

    pub fn clear(&self) {
        self.storage.remove(ACTIVE_SEARCH_KEY);
    }
}
