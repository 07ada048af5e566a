//! Fake attendance backend served by axum on an ephemeral port.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Default)]
pub struct Backend {
    pub records: Mutex<Vec<Value>>,
    pub today: Mutex<Vec<Value>>,
    /// `Authorization` header of every non-auth request, in arrival order.
    pub auth_headers: Mutex<Vec<Option<String>>>,
    pub content_types: Mutex<Vec<Option<String>>>,
    pub login_forms: Mutex<Vec<HashMap<String, String>>>,
    pub put_bodies: Mutex<Vec<Value>>,
    pub trend_days: Mutex<Vec<String>>,
}

impl Backend {
    pub fn with_records(records: Vec<Value>) -> Arc<Self> {
        let backend = Backend::default();
        *backend.today.lock().unwrap() = records.clone();
        *backend.records.lock().unwrap() = records;
        Arc::new(backend)
    }

    fn note_headers(&self, headers: &HeaderMap) {
        let auth = headers.get("authorization").and_then(|v| v.to_str().ok()).map(str::to_string);
        let ct = headers.get("content-type").and_then(|v| v.to_str().ok()).map(str::to_string);
        self.auth_headers.lock().unwrap().push(auth);
        self.content_types.lock().unwrap().push(ct);
    }

    pub fn last_auth_header(&self) -> Option<String> {
        self.auth_headers.lock().unwrap().last().cloned().flatten()
    }
}

pub fn record(id: i64, name: &str, timestamp: &str) -> Value {
    json!({"id": id, "name": name, "timestamp": timestamp})
}

async fn token(State(b): State<Arc<Backend>>, Form(form): Form<HashMap<String, String>>) -> Response {
    b.login_forms.lock().unwrap().push(form.clone());
    let username = form.get("username").cloned().unwrap_or_default();
    let password = form.get("password").cloned().unwrap_or_default();
    match (username.as_str(), password.as_str()) {
        ("teacher", "password123") => Json(json!({
            "access_token": "abc123",
            "token_type": "bearer",
            "teacher": {"id": "1", "username": "teacher", "name": "Ms. Johnson"}
        }))
        .into_response(),
        ("numeric", "password123") => Json(json!({
            "access_token": "num-token",
            "token_type": "bearer",
            "teacher": {"id": 42, "username": "numeric", "name": "Mr. Number"}
        }))
        .into_response(),
        ("sparse", "password123") => Json(json!({"access_token": "sparse-token"})).into_response(),
        ("empty-token", _) => Json(json!({"access_token": "", "token_type": "bearer"})).into_response(),
        ("garbled", _) => (StatusCode::OK, "<html>oops</html>").into_response(),
        ("", _) | (_, "") => (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"detail": "field required"}))).into_response(),
        ("crash", _) => (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Incorrect username or password"}))).into_response(),
    }
}

async fn list(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Json<Value> {
    b.note_headers(&headers);
    Json(Value::Array(b.records.lock().unwrap().clone()))
}

async fn today(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Json<Value> {
    b.note_headers(&headers);
    Json(Value::Array(b.today.lock().unwrap().clone()))
}

async fn delete_record(State(b): State<Arc<Backend>>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    b.note_headers(&headers);
    let mut records = b.records.lock().unwrap();
    let before = records.len();
    records.retain(|r| r["id"] != json!(id));
    if records.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))).into_response();
    }
    Json(json!({"message": "deleted"})).into_response()
}

async fn update_record(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    b.note_headers(&headers);
    b.put_bodies.lock().unwrap().push(body.clone());
    let mut records = b.records.lock().unwrap();
    let Some(existing) = records.iter_mut().find(|r| r["id"] == json!(id)) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))).into_response();
    };
    if let (Some(target), Some(patch)) = (existing.as_object_mut(), body.as_object()) {
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
    Json(existing.clone()).into_response()
}

async fn stats(State(b): State<Arc<Backend>>, headers: HeaderMap) -> Json<Value> {
    b.note_headers(&headers);
    Json(json!({"total_students": 30, "average_attendance": 92.1}))
}

async fn trends(
    State(b): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(q): Query<HashMap<String, String>>,
) -> Json<Value> {
    b.note_headers(&headers);
    let days = q.get("days").cloned().unwrap_or_default();
    b.trend_days.lock().unwrap().push(days.clone());
    Json(json!({"days": days, "points": []}))
}

pub fn router(backend: Arc<Backend>) -> Router {
    Router::new()
        .route("/token", post(token))
        .route("/attendance/", get(list))
        .route("/attendance/today", get(today))
        .route("/attendance/stats", get(stats))
        .route("/attendance/trends", get(trends))
        .route("/attendance/:id", put(update_record).delete(delete_record))
        .with_state(backend)
}

/// Serve `app` on 127.0.0.1:<ephemeral> and return its base URL.
pub async fn serve(app: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("fake backend error: {}", e);
        }
    });
    Ok(format!("http://{}:{}", addr.ip(), addr.port()))
}

pub async fn start(backend: Arc<Backend>) -> anyhow::Result<String> {
    serve(router(backend)).await
}

/// A base URL nobody listens on.
pub async fn dead_base_url() -> anyhow::Result<String> {
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{}:{}", addr.ip(), addr.port()))
}
