//! In-memory stores and a stub disk client for router-level tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, SET_COOKIE},
        Request,
    },
    response::Response,
    Router,
};
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    auth::{
        repo::{SessionStore, StoreError, UniqueField, UserStore},
        repo_types::{Session, User},
    },
    config::{AppConfig, SessionConfig, YandexConfig},
    state::AppState,
    yandex::{DiskClient, DiskError},
};

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.username == username) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }
        if rows.iter().any(|u| u.email == email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        let user = User {
            id: rows.len() as i64 + 1,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(user.clone());
        Ok(user)
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    rows: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, user_id: i64, expires_at: OffsetDateTime) -> Result<Session, StoreError> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            expires_at,
        };
        self.rows.lock().unwrap().insert(session.id, session.clone());
        Ok(session)
    }

    async fn find(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.rows.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn purge_expired(&self, now: OffsetDateTime) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|_, s| !s.is_expired(now));
        Ok((before - rows.len()) as u64)
    }
}

enum StubReply {
    Ok(Value),
    Status(u16, String),
}

struct StubInner {
    reply: StubReply,
    calls: AtomicUsize,
    last: Mutex<Option<(String, String)>>,
}

/// Disk client that answers every call with a canned reply and records it.
#[derive(Clone)]
pub struct StubDisk(Arc<StubInner>);

impl StubDisk {
    fn with(reply: StubReply) -> Self {
        Self(Arc::new(StubInner {
            reply,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }))
    }

    pub fn ok(listing: Value) -> Self {
        Self::with(StubReply::Ok(listing))
    }

    pub fn failing(status: u16, body: &str) -> Self {
        Self::with(StubReply::Status(status, body.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.0.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(String, String)> {
        self.0.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiskClient for StubDisk {
    async fn fetch_listing(&self, public_key: &str, path: &str) -> Result<Value, DiskError> {
        self.0.calls.fetch_add(1, Ordering::SeqCst);
        *self.0.last.lock().unwrap() = Some((public_key.to_string(), path.to_string()));
        match &self.0.reply {
            StubReply::Ok(v) => Ok(v.clone()),
            StubReply::Status(status, body) => Err(DiskError::Status {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

pub struct MemoryHandles {
    pub users: Arc<MemoryUserStore>,
    pub sessions: Arc<MemorySessionStore>,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        session: SessionConfig {
            secret: "test-secret".into(),
            issuer: "test".into(),
            audience: "test".into(),
            ttl_minutes: 30,
            cookie_secure: false,
        },
        yandex: YandexConfig {
            base_url: "http://127.0.0.1:9/unused".into(),
            oauth_token: None,
            max_concurrent_requests: 1,
            timeout_secs: 1,
            debug_dump_path: None,
        },
    }
}

pub fn test_state(disk: StubDisk) -> (AppState, MemoryHandles) {
    let users = Arc::new(MemoryUserStore::default());
    let sessions = Arc::new(MemorySessionStore::default());
    let state = AppState::from_parts(
        Arc::new(test_config()),
        users.clone(),
        sessions.clone(),
        Arc::new(disk),
    );
    (state, MemoryHandles { users, sessions })
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    form: Option<&str>,
    cookie: Option<&str>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    let body = match form {
        Some(form) => {
            builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
            Body::from(form.to_string())
        }
        None => Body::empty(),
    };
    app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn body_text(resp: Response) -> String {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Value of a cookie the response sets, ignoring removals.
pub fn cookie_from(resp: &Response, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    resp.headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|c| c.strip_prefix(prefix.as_str()))
        .filter_map(|c| c.split(';').next())
        .find(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Registers and logs in a fixed user, returning a `Cookie` header value.
pub async fn login_cookie(app: &Router) -> String {
    send(
        app,
        "POST",
        "/register",
        Some("username=tester&email=tester%40example.com&password=secret1&confirm_password=secret1"),
        None,
    )
    .await;
    let resp = send(
        app,
        "POST",
        "/login",
        Some("email=tester%40example.com&password=secret1"),
        None,
    )
    .await;
    let token = cookie_from(&resp, "session").expect("login should set a session cookie");
    format!("session={token}")
}
