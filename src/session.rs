//! Server-side sessions.
//!
//! The client only ever holds a signed token naming an opaque session id; who is
//! logged in and which flash messages are pending lives in a `SessionStore` on the
//! server. The in-memory store lives as long as the process and never expires
//! entries on its own.

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{config::AppConfig, error::AppError};

/// Lifetime of a session token. The server-side entry itself is never expired.
pub const SESSION_TTL_SECS: i64 = 60 * 60 * 24 * 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Info,
    Warning,
}

impl FlashLevel {
    /// Bootstrap alert modifier.
    pub fn css_class(&self) -> &'static str {
        match self {
            FlashLevel::Info => "info",
            FlashLevel::Warning => "warning",
        }
    }
}

/// A one-time notice shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// SessionData
///
/// What the server remembers about one client.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub user_id: Option<i64>,
    pub flashes: Vec<Flash>,
}

/// SessionStore
///
/// Storage contract for session entries, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: Uuid) -> Option<SessionData>;
    async fn save(&self, id: Uuid, data: SessionData);
    async fn remove(&self, id: Uuid);
}

pub type SessionStoreState = Arc<dyn SessionStore>;

/// MemorySessionStore
///
/// Process-wide session map. One entry per active client.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, SessionData>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: Uuid) -> Option<SessionData> {
        self.sessions.read().await.get(&id).cloned()
    }

    async fn save(&self, id: Uuid, data: SessionData) {
        self.sessions.write().await.insert(id, data);
    }

    async fn remove(&self, id: Uuid) {
        self.sessions.write().await.remove(&id);
    }
}

/// SessionClaims
///
/// Payload of the signed session token stored in the cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// The opaque server-side session id.
    pub sid: Uuid,
    pub iat: usize,
    pub exp: usize,
}

struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Sessions
///
/// The session/auth manager shared through the application state. All methods take
/// the request's `CookieJar` and, when the cookie has to change, hand back the jar
/// the handler must include in its response.
#[derive(Clone)]
pub struct Sessions {
    store: SessionStoreState,
    keys: Arc<SessionKeys>,
    cookie_name: String,
    secure: bool,
}

impl Sessions {
    pub fn new(store: SessionStoreState, config: &AppConfig) -> Self {
        let secret = config.secret_key.as_bytes();
        Self {
            store,
            keys: Arc::new(SessionKeys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
            }),
            cookie_name: config.session_cookie.clone(),
            secure: config.secure_cookies(),
        }
    }

    /// sign
    ///
    /// Produces the signed token for a session id.
    pub fn sign(&self, sid: Uuid) -> Result<String, AppError> {
        let now = chrono::Utc::now().timestamp();
        let claims = SessionClaims {
            sid,
            iat: now as usize,
            exp: (now + SESSION_TTL_SECS) as usize,
        };

        encode(&Header::default(), &claims, &self.keys.encoding)
            .map_err(|e| AppError::Session(e.to_string()))
    }

    /// verify
    ///
    /// Returns the session id if the token carries a valid signature and has not expired.
    /// Anything else is treated as "no session".
    pub fn verify(&self, token: &str) -> Option<Uuid> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        match decode::<SessionClaims>(token, &self.keys.decoding, &validation) {
            Ok(data) => Some(data.claims.sid),
            Err(e) => {
                tracing::debug!(error = %e, "rejected session token");
                None
            }
        }
    }

    fn session_id(&self, jar: &CookieJar) -> Option<Uuid> {
        jar.get(&self.cookie_name)
            .and_then(|cookie| self.verify(cookie.value()))
    }

    fn attach(&self, jar: CookieJar, sid: Uuid) -> Result<CookieJar, AppError> {
        let token = self.sign(sid)?;
        let cookie = Cookie::build((self.cookie_name.clone(), token))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .path("/");
        Ok(jar.add(cookie))
    }

    /// user_id
    ///
    /// The id of the logged-in user for this client, if any.
    pub async fn user_id(&self, jar: &CookieJar) -> Option<i64> {
        let sid = self.session_id(jar)?;
        self.store.load(sid).await?.user_id
    }

    /// login
    ///
    /// Binds `user_id` to a brand-new session id. The previous session (if any) is
    /// dropped, but its pending flash messages carry over.
    pub async fn login(&self, jar: CookieJar, user_id: i64) -> Result<CookieJar, AppError> {
        let mut data = SessionData::default();
        if let Some(old) = self.session_id(&jar) {
            if let Some(previous) = self.store.load(old).await {
                data.flashes = previous.flashes;
            }
            self.store.remove(old).await;
        }
        data.user_id = Some(user_id);

        let sid = Uuid::new_v4();
        self.store.save(sid, data).await;
        self.attach(jar, sid)
    }

    /// logout
    ///
    /// Forgets the session on the server and expires the cookie. Safe to call
    /// without a session.
    pub async fn logout(&self, jar: CookieJar) -> CookieJar {
        if let Some(sid) = self.session_id(&jar) {
            self.store.remove(sid).await;
        }
        jar.remove(Cookie::build((self.cookie_name.clone(), "")).path("/"))
    }

    /// flash
    ///
    /// Queues a message for the next rendered page. Anonymous clients without a
    /// session get one.
    pub async fn flash(
        &self,
        jar: CookieJar,
        level: FlashLevel,
        message: impl Into<String>,
    ) -> Result<CookieJar, AppError> {
        let flash = Flash {
            level,
            message: message.into(),
        };

        if let Some(sid) = self.session_id(&jar) {
            let mut data = self.store.load(sid).await.unwrap_or_default();
            data.flashes.push(flash);
            self.store.save(sid, data).await;
            return Ok(jar);
        }

        let sid = Uuid::new_v4();
        let data = SessionData {
            user_id: None,
            flashes: vec![flash],
        };
        self.store.save(sid, data).await;
        self.attach(jar, sid)
    }

    /// take_flashes
    ///
    /// Returns the pending messages and clears them.
    pub async fn take_flashes(&self, jar: &CookieJar) -> Vec<Flash> {
        let Some(sid) = self.session_id(jar) else {
            return Vec::new();
        };
        let Some(mut data) = self.store.load(sid).await else {
            return Vec::new();
        };
        if data.flashes.is_empty() {
            return Vec::new();
        }

        let flashes = std::mem::take(&mut data.flashes);
        self.store.save(sid, data).await;
        flashes
    }
}
