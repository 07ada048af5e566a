use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::domain::{SessionState, Teacher};
use super::errors::SessionError;
use super::gateway::AuthGateway;
use crate::api::Credentials;
use crate::storage::{Storage, StorageError, TEACHER_KEY, TOKEN_KEY};

/// Holds the authenticated teacher and drives login/logout.
///
/// The token itself lives in the gateway; this store only ever touches it
/// through `AuthGateway::set_token`/`clear_token`.
pub struct SessionStore<G: AuthGateway> {
    gateway: Arc<G>,
    storage: Arc<dyn Storage>,
    teacher: RwLock<Option<Teacher>>,
    login_in_flight: AtomicBool,
    /// Bumped by every logout; a login started under an older value is void.
    logout_epoch: AtomicU64,
}

/// Resets the in-flight flag even if the login future is dropped midway.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<G: AuthGateway> SessionStore<G> {
    /// An unauthenticated store; nothing is read from storage.
    pub fn new(gateway: Arc<G>, storage: Arc<dyn Storage>) -> Self {
        Self {
            gateway,
            storage,
            teacher: RwLock::new(None),
            login_in_flight: AtomicBool::new(false),
            logout_epoch: AtomicU64::new(0),
        }
    }

    /// Build the store and restore a persisted session.
    ///
    /// Restores only when both the teacher and the token are stored and the
    /// teacher parses. Any other combination is discarded from storage and
    /// the gateway, leaving the store unauthenticated.
    ///
    /// # Examples
    /// ```
    /// use service::session::{SessionStore, gateway::mock::MockAuthGateway};
    /// use service::storage::MemoryStorage;
    /// use std::sync::Arc;
    /// let storage = Arc::new(MemoryStorage::with_entries([
    ///     ("teacher", r#"{"id":"1","username":"teacher","name":"Ms. Johnson"}"#),
    ///     ("access_token", "abc123"),
    /// ]));
    /// let gateway = Arc::new(MockAuthGateway::new());
    /// let store = tokio_test::block_on(SessionStore::restore(gateway.clone(), storage));
    /// assert!(tokio_test::block_on(store.is_authenticated()));
    /// assert_eq!(service::session::AuthGateway::token(gateway.as_ref()).as_deref(), Some("abc123"));
    /// ```
    pub async fn restore(gateway: Arc<G>, storage: Arc<dyn Storage>) -> Self {
        let store = Self::new(gateway, storage);
        store.restore_persisted().await;
        store
    }

    async fn restore_persisted(&self) {
        let stored_teacher = self.storage.get(TEACHER_KEY).await;
        let stored_token = self.storage.get(TOKEN_KEY).await;

        let (raw_teacher, token) = match (stored_teacher, stored_token) {
            (Ok(Some(teacher)), Ok(Some(token))) if !token.is_empty() => (teacher, token),
            (Ok(None), Ok(None)) => {
                debug!("no persisted session");
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "cannot read persisted session; starting logged out");
                self.discard_persisted().await;
                return;
            }
            _ => {
                warn!("persisted session is incomplete; discarding it");
                self.discard_persisted().await;
                return;
            }
        };

        let teacher: Teacher = match serde_json::from_str(&raw_teacher) {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, "persisted teacher is unreadable; discarding session");
                self.discard_persisted().await;
                return;
            }
        };

        if let Err(e) = self.gateway.set_token(&token).await {
            warn!(error = %e, "cannot install persisted token; discarding session");
            self.discard_persisted().await;
            return;
        }
        info!(teacher_id = %teacher.id, username = %teacher.username, "session restored");
        *self.teacher.write().await = Some(teacher);
    }

    async fn discard_persisted(&self) {
        if let Err(e) = self.gateway.clear_token().await {
            warn!(error = %e, "failed to clear token");
        }
        if let Err(e) = self.storage.remove(TEACHER_KEY).await {
            warn!(error = %e, "failed to remove persisted teacher");
        }
    }

    pub async fn state(&self) -> SessionState {
        match self.teacher.read().await.clone() {
            Some(t) => SessionState::Authenticated(t),
            None => SessionState::Unauthenticated,
        }
    }

    pub async fn teacher(&self) -> Option<Teacher> {
        self.teacher.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.teacher.read().await.is_some()
    }

    /// Log in and report why it failed, if it did.
    ///
    /// A second call while one is pending fails with `LoginInProgress`
    /// without reaching the backend. On failure the previous session,
    /// including its token, is left as it was; if the previous token cannot
    /// be put back, the store ends up logged out instead. A `logout` that
    /// lands while the login is pending wins and the login fails with
    /// `LoginCancelled`.
    ///
    /// # Examples
    /// ```
    /// use service::session::{SessionStore, gateway::mock::MockAuthGateway};
    /// use service::storage::MemoryStorage;
    /// use std::sync::Arc;
    /// let gateway = Arc::new(MockAuthGateway::new().with_teacher("teacher", "password123", "abc123", "1", "Ms. Johnson"));
    /// let store = SessionStore::new(gateway, Arc::new(MemoryStorage::new()));
    /// let teacher = tokio_test::block_on(store.try_login("teacher", "password123")).unwrap();
    /// assert_eq!(teacher.name, "Ms. Johnson");
    /// ```
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn try_login(&self, username: &str, password: &str) -> Result<Teacher, SessionError> {
        if self
            .login_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("login already in progress; rejecting overlapping attempt");
            return Err(SessionError::LoginInProgress);
        }
        let _in_flight = InFlight(&self.login_in_flight);

        let epoch = self.logout_epoch.load(Ordering::Acquire);
        let previous_token = self.gateway.token();
        let response = self.gateway.authenticate(&Credentials::new(username, password)).await?;
        let teacher = Teacher::from_login(response.teacher.as_ref(), username);

        if let Err(e) = self.persist_teacher(&teacher).await {
            if !self.rollback_token(previous_token).await {
                warn!("previous token could not be restored; dropping session");
                self.teacher.write().await.take();
                self.discard_persisted().await;
            }
            return Err(e);
        }

        // checked under the write lock; logout bumps the epoch before taking it
        let mut current = self.teacher.write().await;
        if self.logout_epoch.load(Ordering::Acquire) != epoch {
            drop(current);
            warn!("logout happened while login was pending; discarding login");
            self.discard_persisted().await;
            return Err(SessionError::LoginCancelled);
        }
        *current = Some(teacher.clone());
        drop(current);
        info!(teacher_id = %teacher.id, name = %teacher.name, "teacher logged in");
        Ok(teacher)
    }

    /// Boolean form of `try_login`: failures are logged, never raised.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        match self.try_login(username, password).await {
            Ok(_) => true,
            Err(e) => {
                warn!(code = e.code(), error = %e, "login failed");
                false
            }
        }
    }

    /// Always succeeds; calling it while logged out is a no-op.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        self.logout_epoch.fetch_add(1, Ordering::AcqRel);
        let previous = self.teacher.write().await.take();
        if let Err(e) = self.gateway.clear_token().await {
            warn!(error = %e, "failed to clear token during logout");
        }
        if let Err(e) = self.storage.remove(TEACHER_KEY).await {
            warn!(error = %e, "failed to remove persisted teacher during logout");
        }
        match previous {
            Some(t) => info!(teacher_id = %t.id, "teacher logged out"),
            None => debug!("logout while already logged out"),
        }
    }

    async fn persist_teacher(&self, teacher: &Teacher) -> Result<(), SessionError> {
        let json = serde_json::to_string(teacher).map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.storage.set(TEACHER_KEY, &json).await?;
        Ok(())
    }

    /// Put the pre-login token back; `false` if that failed.
    async fn rollback_token(&self, previous: Option<String>) -> bool {
        let res = match previous {
            Some(token) => self.gateway.set_token(&token).await,
            None => self.gateway.clear_token().await,
        };
        match res {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "failed to roll back token after login failure");
                false
            }
        }
    }
}
