//! Session and identity state.
//!
//! One `SessionState` is shared (via `Arc`) by the fetch coordinator, the
//! navigation machine and the facade. The session id is created lazily,
//! persisted, and stays stable across restarts until [`SessionState::reset_session`].
//! The user id is persisted and sticky. The analytics context lives in
//! memory only.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use onboardkit_store::{LocalStore, LocalStoreExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::Result;
use crate::storage_keys;

/// Who the SDK is acting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<String>,
    pub session_id: String,
}

impl Identity {
    pub fn new(user_id: Option<String>, session_id: impl Into<String>) -> Self {
        Self {
            user_id,
            session_id: session_id.into(),
        }
    }

    /// Known, non-empty user id.
    pub fn user(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|u| !u.is_empty())
    }

    /// Storage identity: the user id when known, else the session id.
    pub fn key(&self) -> &str {
        self.user().unwrap_or(&self.session_id)
    }
}

/// Flow and experiment attribution attached to every analytics event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsContext {
    pub flow_id: Option<String>,
    pub flow_version_id: Option<String>,
    pub experiment_id: Option<String>,
    pub variant_id: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    session_id: Option<String>,
    /// `None` until loaded from the store.
    user_id: Option<Option<String>>,
    context: AnalyticsContext,
}

/// Process-wide identity state, shared by handle.
pub struct SessionState {
    store: Arc<dyn LocalStore>,
    inner: Mutex<Inner>,
}

impl SessionState {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Current session id, creating and persisting one on first access.
    pub fn session_id(&self) -> String {
        let mut inner = self.lock();
        if let Some(id) = &inner.session_id {
            return id.clone();
        }

        let id = match self.store.get_json::<String>(storage_keys::SESSION_ID) {
            Ok(Some(id)) if !id.is_empty() => id,
            Ok(_) => self.create_session_id(),
            Err(e) => {
                warn!(error = %e, "stored session id unreadable, starting a new session");
                self.create_session_id()
            }
        };
        inner.session_id = Some(id.clone());
        id
    }

    /// Discard the current session id and start a new one.
    pub fn reset_session(&self) -> String {
        let mut inner = self.lock();
        if let Err(e) = self.store.delete(storage_keys::SESSION_ID) {
            warn!(error = %e, "failed to delete session id");
        }
        let id = self.create_session_id();
        inner.session_id = Some(id.clone());
        id
    }

    /// Current user id, if one was ever set.
    pub fn user_id(&self) -> Option<String> {
        let mut inner = self.lock();
        if let Some(user) = &inner.user_id {
            return user.clone();
        }
        let loaded = match self.store.get_json::<String>(storage_keys::USER_ID) {
            Ok(user) => user.filter(|u| !u.is_empty()),
            Err(e) => {
                warn!(error = %e, "stored user id unreadable");
                None
            }
        };
        inner.user_id = Some(loaded.clone());
        loaded
    }

    /// Set or clear the user id. Persisted before returning.
    pub fn set_user_id(&self, user_id: Option<String>) -> Result<()> {
        let user_id = user_id.filter(|u| !u.is_empty());
        let mut inner = self.lock();
        match &user_id {
            Some(user) => self.store.set_json(storage_keys::USER_ID, user)?,
            None => self.store.delete(storage_keys::USER_ID)?,
        }
        debug!(has_user = user_id.is_some(), "user id updated");
        inner.user_id = Some(user_id);
        Ok(())
    }

    pub fn identity(&self) -> Identity {
        Identity::new(self.user_id(), self.session_id())
    }

    pub fn set_context(&self, context: AnalyticsContext) {
        self.lock().context = context;
    }

    pub fn context(&self) -> AnalyticsContext {
        self.lock().context.clone()
    }

    /// Drop experiment attribution and the flow it belonged to.
    pub fn clear_context(&self) {
        self.lock().context = AnalyticsContext::default();
    }

    fn create_session_id(&self) -> String {
        let id = Uuid::new_v4().to_string();
        if let Err(e) = self.store.set_json(storage_keys::SESSION_ID, &id) {
            warn!(error = %e, "failed to persist session id");
        }
        id
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
