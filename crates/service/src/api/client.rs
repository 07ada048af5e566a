use std::num::NonZeroU32;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use configs::ApiConfig;

use super::domain::{AttendanceRecord, Credentials, LoginResponse, RecordPatch};
use super::errors::ApiError;
use crate::storage::{Storage, TOKEN_KEY};

/// Window used by `fetch_attendance_trends` when the caller gives none.
pub const DEFAULT_TREND_DAYS: u32 = 7;

/// HTTP client for the attendance backend.
///
/// Owns the single bearer-token slot. The slot is loaded from storage at
/// construction and mirrored back on every `set_token`/`clear_token`.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: ArcSwapOption<String>,
    storage: Arc<dyn Storage>,
}

impl ApiClient {
    pub async fn new(config: &ApiConfig, storage: Arc<dyn Storage>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| ApiError::NetworkUnreachable {
            base_url: config.base_url.clone(),
            message: format!("cannot build http client: {e}"),
        })?;

        let stored = storage.get(TOKEN_KEY).await?.filter(|t| !t.is_empty());
        debug!(base_url = %config.base_url, has_token = stored.is_some(), "api client initialised");

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: ArcSwapOption::new(stored.map(Arc::new)),
            storage,
        })
    }

    /// Client for `base_url` with no timeout, as the defaults would build it.
    pub async fn with_base_url(base_url: impl Into<String>, storage: Arc<dyn Storage>) -> Result<Self, ApiError> {
        let config = ApiConfig { base_url: base_url.into(), request_timeout_secs: None };
        Self::new(&config, storage).await
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    pub fn token(&self) -> Option<String> {
        self.token.load_full().map(|t| t.as_ref().clone())
    }

    pub fn has_token(&self) -> bool { self.token.load().is_some() }

    /// Persist the token, then install it. A storage failure leaves the slot untouched.
    pub async fn set_token(&self, token: &str) -> Result<(), ApiError> {
        self.storage.set(TOKEN_KEY, token).await?;
        self.token.store(Some(Arc::new(token.to_string())));
        debug!("bearer token installed");
        Ok(())
    }

    /// Empty the slot and drop the durable copy. The in-memory slot is
    /// always cleared, even if storage fails.
    pub async fn clear_token(&self) -> Result<(), ApiError> {
        self.token.store(None);
        self.storage.remove(TOKEN_KEY).await?;
        debug!("bearer token cleared");
        Ok(())
    }

    /// Exchange credentials for a token at `POST /token`.
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let url = format!("{}/token", self.base_url);
        debug!(%url, "attempting login");

        let resp = self
            .http
            .post(&url)
            .form(credentials)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %body, "login rejected");
            return Err(match status {
                StatusCode::UNPROCESSABLE_ENTITY => ApiError::InvalidInputFormat,
                StatusCode::UNAUTHORIZED => ApiError::InvalidCredentials,
                other => ApiError::server(other, body),
            });
        }

        let payload: LoginResponse = self.decode(resp).await?;
        if payload.access_token.trim().is_empty() {
            return Err(ApiError::DecodeFailure("token response carries an empty access_token".into()));
        }
        self.set_token(&payload.access_token).await?;
        info!(token_type = %payload.token_type, "login succeeded");
        Ok(payload)
    }

    #[instrument(skip(self))]
    pub async fn fetch_attendance_records(&self) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.get_json("/attendance/").await
    }

    #[instrument(skip(self))]
    pub async fn fetch_today_attendance(&self) -> Result<Vec<AttendanceRecord>, ApiError> {
        self.get_json("/attendance/today").await
    }

    /// Errors from the backend (including 404 for an already-removed id) are not masked.
    #[instrument(skip(self))]
    pub async fn delete_attendance_record(&self, id: i64) -> Result<(), ApiError> {
        let req = self.request(Method::DELETE, &format!("/attendance/{id}"));
        // body is ignored; backends answer with nothing, null or a message
        self.execute(req).await?;
        info!(id, "attendance record deleted");
        Ok(())
    }

    /// Sends only the fields present in `patch`; returns the backend's full record.
    #[instrument(skip(self, patch))]
    pub async fn update_attendance_record(&self, id: i64, patch: &RecordPatch) -> Result<AttendanceRecord, ApiError> {
        let req = self.request(Method::PUT, &format!("/attendance/{id}")).json(patch);
        let resp = self.execute(req).await?;
        let record: AttendanceRecord = self.decode(resp).await?;
        info!(id = record.id, "attendance record updated");
        Ok(record)
    }

    #[instrument(skip(self))]
    pub async fn fetch_attendance_stats(&self) -> Result<Value, ApiError> {
        self.get_json("/attendance/stats").await
    }

    #[instrument(skip(self))]
    pub async fn fetch_attendance_trends(&self, days: Option<NonZeroU32>) -> Result<Value, ApiError> {
        let days = days.map_or(DEFAULT_TREND_DAYS, NonZeroU32::get);
        let req = self.request(Method::GET, "/attendance/trends").query(&[("days", days)]);
        let resp = self.execute(req).await?;
        self.decode(resp).await
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%method, %url, "making request");
        let mut req = self.http.request(method, url).header(CONTENT_TYPE, "application/json");
        if let Some(token) = self.token.load_full() {
            req = req.bearer_auth(token.as_str());
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let resp = self.execute(self.request(Method::GET, endpoint)).await?;
        self.decode(resp).await
    }

    async fn execute(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let resp = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let url = resp.url().to_string();
        let body = resp.text().await.unwrap_or_default();
        if status.is_server_error() {
            error!(status = status.as_u16(), %url, %body, "api error response");
        } else {
            warn!(status = status.as_u16(), %url, %body, "api error response");
        }
        Err(ApiError::server(status, body))
    }

    async fn decode<T: DeserializeOwned>(&self, resp: Response) -> Result<T, ApiError> {
        let bytes = resp.bytes().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::DecodeFailure(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        warn!(base_url = %self.base_url, error = %err, "transport failure");
        ApiError::NetworkUnreachable { base_url: self.base_url.clone(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn token_slot_loads_from_storage() -> Result<(), ApiError> {
        let storage = Arc::new(MemoryStorage::with_entries([(TOKEN_KEY, "persisted")]));
        let client = ApiClient::with_base_url("http://localhost:8000/", storage).await?;
        assert_eq!(client.token().as_deref(), Some("persisted"));
        assert_eq!(client.base_url(), "http://localhost:8000");
        Ok(())
    }

    #[tokio::test]
    async fn empty_stored_token_counts_as_none() -> Result<(), ApiError> {
        let storage = Arc::new(MemoryStorage::with_entries([(TOKEN_KEY, "")]));
        let client = ApiClient::with_base_url("http://localhost:8000", storage).await?;
        assert!(!client.has_token());
        Ok(())
    }

    #[tokio::test]
    async fn set_and_clear_token_mirror_storage() -> Result<(), ApiError> {
        let storage = Arc::new(MemoryStorage::new());
        let client = ApiClient::with_base_url("http://localhost:8000", storage.clone()).await?;

        client.set_token("one").await?;
        client.set_token("two").await?;
        assert_eq!(client.token().as_deref(), Some("two"));
        assert_eq!(storage.get(TOKEN_KEY).await?.as_deref(), Some("two"));

        client.clear_token().await?;
        client.clear_token().await?;
        assert!(client.token().is_none());
        assert_eq!(storage.get(TOKEN_KEY).await?, None);
        Ok(())
    }
}
