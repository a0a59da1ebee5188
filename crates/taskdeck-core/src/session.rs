use std::fmt;
use std::sync::Arc;

use taskdeck_shared::{Session, User};
use tracing::{debug, error, info, instrument};

use crate::storage::{KeyValueStorage, TOKEN_STORAGE_KEY};

/// Authentication state: anonymous, or a user with a token.
///
/// A token restored from storage at construction is loaded as-is and never
/// validated, so `token().is_some()` does not imply `is_authenticated()`.
pub struct SessionStore {
    storage: Arc<dyn KeyValueStorage>,
    session: Session,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("authenticated", &self.session.is_authenticated())
            .field("has_token", &self.session.token.is_some())
            .finish()
    }
}

impl SessionStore {
    #[instrument(skip_all)]
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        let token = match storage.get_item(TOKEN_STORAGE_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(err) => {
                error!(error = %err, "failed reading stored token");
                None
            }
        };
        debug!(restored = token.is_some(), "session store initialized");

        Self {
            storage,
            session: Session { user: None, token },
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.session.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.session.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn snapshot(&self) -> Session {
        self.session.clone()
    }

    /// Persists the token, or removes the stored entry for `None`. Does not
    /// change whether the session is authenticated.
    #[instrument(skip(self, token), fields(present = token.is_some()))]
    pub fn set_token(&mut self, token: Option<String>) {
        let token = token.filter(|t| !t.is_empty());
        match token.as_deref() {
            Some(value) => {
                if let Err(err) = self.storage.set_item(TOKEN_STORAGE_KEY, value) {
                    error!(error = %err, "failed persisting token");
                }
            }
            None => self.clear_stored_token(),
        }
        self.session.token = token;
    }

    #[instrument(skip(self, user), fields(user_id = ?user.as_ref().map(|u| u.id)))]
    pub fn set_user(&mut self, user: Option<User>) {
        self.session.user = user;
        debug!(authenticated = self.session.is_authenticated(), "session user set");
    }

    /// Clears user, token and the stored token in one call.
    #[instrument(skip(self))]
    pub fn logout(&mut self) {
        self.session = Session::default();
        self.clear_stored_token();
        info!("logged out");
    }

    fn clear_stored_token(&self) {
        if let Err(err) = self.storage.remove_item(TOKEN_STORAGE_KEY) {
            error!(error = %err, "failed removing stored token");
        }
    }
}
