use async_trait::async_trait;

use crate::api::{ApiClient, ApiError, Credentials, LoginResponse};

/// The slice of the API client the session store depends on.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchange credentials; on success the token is already installed.
    async fn authenticate(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;
    async fn set_token(&self, token: &str) -> Result<(), ApiError>;
    async fn clear_token(&self) -> Result<(), ApiError>;
    fn token(&self) -> Option<String>;
}

#[async_trait]
impl AuthGateway for ApiClient {
    async fn authenticate(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        ApiClient::authenticate(self, credentials).await
    }

    async fn set_token(&self, token: &str) -> Result<(), ApiError> {
        ApiClient::set_token(self, token).await
    }

    async fn clear_token(&self) -> Result<(), ApiError> {
        ApiClient::clear_token(self).await
    }

    fn token(&self) -> Option<String> {
        ApiClient::token(self)
    }
}

/// Simple in-memory mock gateway for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::api::TeacherPayload;

    #[derive(Default)]
    pub struct MockAuthGateway {
        accounts: Mutex<HashMap<String, (String, LoginResponse)>>, // key: username
        token: Mutex<Option<String>>,
        unreachable: AtomicBool,
        reject_token_writes: AtomicBool,
        delay: Mutex<Option<Duration>>,
        calls: AtomicUsize,
    }

    impl MockAuthGateway {
        pub fn new() -> Self { Self::default() }

        /// Register an account answering with `response` for the right password.
        pub fn with_account(self, username: &str, password: &str, response: LoginResponse) -> Self {
            self.accounts
                .lock()
                .unwrap()
                .insert(username.to_string(), (password.to_string(), response));
            self
        }

        /// Register an account whose response carries `token` and a full teacher block.
        pub fn with_teacher(self, username: &str, password: &str, token: &str, id: &str, name: &str) -> Self {
            let response = LoginResponse {
                access_token: token.to_string(),
                token_type: "bearer".to_string(),
                teacher: Some(TeacherPayload {
                    id: Some(id.to_string()),
                    username: Some(username.to_string()),
                    name: Some(name.to_string()),
                }),
            };
            self.with_account(username, password, response)
        }

        pub fn with_token(self, token: &str) -> Self {
            *self.token.lock().unwrap() = Some(token.to_string());
            self
        }

        /// Hold every authenticate call for `delay` before answering.
        pub fn with_delay(self, delay: Duration) -> Self {
            *self.delay.lock().unwrap() = Some(delay);
            self
        }

        pub fn set_unreachable(&self, unreachable: bool) {
            self.unreachable.store(unreachable, Ordering::SeqCst);
        }

        /// Make `set_token` fail, as a client whose storage is broken would.
        pub fn set_reject_token_writes(&self, reject: bool) {
            self.reject_token_writes.store(reject, Ordering::SeqCst);
        }

        pub fn authenticate_calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthGateway for MockAuthGateway {
        async fn authenticate(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(ApiError::NetworkUnreachable {
                    base_url: "mock://gateway".into(),
                    message: "connection refused".into(),
                });
            }
            let found = self.accounts.lock().unwrap().get(&credentials.username).cloned();
            match found {
                Some((password, response)) if password == credentials.password => {
                    *self.token.lock().unwrap() = Some(response.access_token.clone());
                    Ok(response)
                }
                _ => Err(ApiError::InvalidCredentials),
            }
        }

        async fn set_token(&self, token: &str) -> Result<(), ApiError> {
            if self.reject_token_writes.load(Ordering::SeqCst) {
                return Err(ApiError::Storage(crate::storage::StorageError::Io("read-only storage".into())));
            }
            *self.token.lock().unwrap() = Some(token.to_string());
            Ok(())
        }

        async fn clear_token(&self) -> Result<(), ApiError> {
            *self.token.lock().unwrap() = None;
            Ok(())
        }

        fn token(&self) -> Option<String> {
            self.token.lock().unwrap().clone()
        }
    }
}
