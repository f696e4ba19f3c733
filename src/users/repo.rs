use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::error::UserStoreError;
use super::ids::{new_session_token, new_user_id};
use super::repo_types::{NewUser, UserRecord, USERS_DB_KEY};
use crate::storage::KvBackend;

/// User accounts kept as one JSON array under [`USERS_DB_KEY`].
///
/// Every operation reloads the whole collection from the backend, scans it in
/// insertion order (first match wins) and writes the whole collection back
/// when it changed. Nothing is cached between calls.
///
/// By default load/mutate/save sequences are not isolated from each other:
/// two concurrent writers can both load the same snapshot and the later save
/// silently drops the earlier change. [`UserStore::serialized`] puts an
/// in-process mutex around each write sequence to close that window.
#[derive(Clone)]
pub struct UserStore {
    backend: Option<Arc<dyn KvBackend>>,
    write_lock: Option<Arc<Mutex<()>>>,
}

impl UserStore {
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend: Some(backend),
            write_lock: None,
        }
    }

    /// A store with no persistence medium: reads are empty, writes vanish.
    pub fn detached() -> Self {
        Self {
            backend: None,
            write_lock: None,
        }
    }

    /// Serialize every load/mutate/save sequence through one mutex.
    pub fn serialized(mut self) -> Self {
        self.write_lock = Some(Arc::new(Mutex::new(())));
        self
    }

    pub fn is_detached(&self) -> bool {
        self.backend.is_none()
    }

    async fn load(&self) -> Vec<UserRecord> {
        let Some(backend) = &self.backend else {
            return Vec::new();
        };
        let raw = match backend.get(USERS_DB_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "users_db read failed; treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<UserRecord>>(&raw) {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "users_db blob is corrupt; treating as empty");
                Vec::new()
            }
        }
    }

    async fn save(&self, users: &[UserRecord]) {
        let Some(backend) = &self.backend else {
            return;
        };
        let raw = match serde_json::to_string(users) {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "users_db serialize failed");
                return;
            }
        };
        if let Err(e) = backend.set(USERS_DB_KEY, raw).await {
            error!(error = %e, "users_db write failed");
            return;
        }
        debug!(count = users.len(), "users_db saved");
    }

    /// Load, apply `op`, and save only if `op` reports a change.
    async fn mutate<T, F>(&self, op: F) -> Option<T>
    where
        F: FnOnce(&mut Vec<UserRecord>) -> Option<T>,
    {
        let _guard = match &self.write_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };
        let mut users = self.load().await;
        let out = op(&mut users)?;
        self.save(&users).await;
        Some(out)
    }

    async fn find_first<P>(&self, pred: P) -> Option<UserRecord>
    where
        P: Fn(&UserRecord) -> bool,
    {
        self.load().await.into_iter().find(|u| pred(u))
    }

    #[instrument(skip(self))]
    pub async fn find_by_username(&self, username: &str) -> Option<UserRecord> {
        self.find_first(|u| u.username == username).await
    }

    #[instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        self.find_first(|u| u.email == email).await
    }

    /// The record [`UserStore::verify_email_code`] would act on.
    #[instrument(skip(self, code))]
    pub async fn find_by_email_code(&self, email: &str, code: &str) -> Option<UserRecord> {
        self.find_first(|u| u.email == email && u.codigo_verificacion == code)
            .await
    }

    #[instrument(skip_all)]
    pub async fn find_by_token(&self, token: &str) -> Option<UserRecord> {
        self.find_first(|u| u.token_sesion.as_deref() == Some(token))
            .await
    }

    /// Appends a new unverified account. Duplicate usernames or emails are
    /// not rejected.
    #[instrument(skip_all, fields(username = %new_user.username))]
    pub async fn create_user(&self, new_user: NewUser) {
        let id = self
            .mutate(|users| {
                let id = new_user_id();
                users.push(new_user.into_record(id.clone()));
                Some(id)
            })
            .await;
        if let Some(id) = id {
            info!(user_id = %id, "user created");
        }
    }

    /// Marks the first account matching both `email` and `code` as verified.
    /// Does nothing when there is no such account.
    #[instrument(skip(self, code))]
    pub async fn verify_email_code(&self, email: &str, code: &str) {
        let hit = self
            .mutate(|users| {
                let user = users
                    .iter_mut()
                    .find(|u| u.email == email && u.codigo_verificacion == code)?;
                user.email_verificado = true;
                Some(user.id.clone())
            })
            .await;
        match hit {
            Some(id) => info!(user_id = %id, "email verified"),
            None => debug!("no account matches email and code"),
        }
    }

    /// Replaces the code of the first account with `email`. Does nothing when
    /// there is no such account.
    #[instrument(skip(self, new_code))]
    pub async fn rotate_verification_code(&self, email: &str, new_code: &str) {
        let hit = self
            .mutate(|users| {
                let user = users.iter_mut().find(|u| u.email == email)?;
                user.codigo_verificacion = new_code.to_string();
                Some(user.id.clone())
            })
            .await;
        match hit {
            Some(id) => info!(user_id = %id, "verification code rotated"),
            None => debug!("no account for email"),
        }
    }

    /// Returns `current_token` untouched when present and non-empty. Otherwise
    /// issues a fresh token for `user_id`, persists it and returns it.
    #[instrument(skip(self, current_token))]
    pub async fn assign_token_if_missing(
        &self,
        user_id: &str,
        current_token: Option<&str>,
    ) -> Result<String, UserStoreError> {
        if let Some(token) = current_token.filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }
        let token = self
            .mutate(|users| {
                let user = users.iter_mut().find(|u| u.id == user_id)?;
                let token = new_session_token();
                user.token_sesion = Some(token.clone());
                Some(token)
            })
            .await;
        match token {
            Some(token) => {
                info!("session token issued");
                Ok(token)
            }
            None => {
                warn!("token requested for unknown user");
                Err(UserStoreError::UserNotFound)
            }
        }
    }

    /// Drops the session of the first account holding `token`. Does nothing
    /// for an unknown token.
    #[instrument(skip_all)]
    pub async fn clear_token(&self, token: &str) {
        let hit = self
            .mutate(|users| {
                let user = users
                    .iter_mut()
                    .find(|u| u.token_sesion.as_deref() == Some(token))?;
                user.token_sesion = None;
                Some(user.id.clone())
            })
            .await;
        if let Some(id) = hit {
            info!(user_id = %id, "session cleared");
        }
    }
}
