//! Browser session identity
//!
//! Every browser gets an opaque session id (UUID v4) in the `session_id`
//! cookie. When a `SECRET_KEY` is configured the cookie carries
//! `<id>.<hex HMAC-SHA256(SECRET_KEY, id)>` and values that fail verification are
//! treated as if no cookie was sent.

use actix_web::cookie::{Cookie, SameSite};
use actix_web::HttpRequest;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::util::env_flag;

pub const SESSION_COOKIE: &str = "session_id";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Default)]
pub struct SessionKeys {
    /// HMAC keyed with SECRET_KEY, cloned per signature
    key: Option<HmacSha256>,
    secure_cookies: bool,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("signed", &self.key.is_some())
            .field("secure_cookies", &self.secure_cookies)
            .finish()
    }
}

impl SessionKeys {
    pub fn new(secret: Option<String>) -> Self {
        Self {
            key: secret
                .filter(|s| !s.is_empty())
                .and_then(|s| HmacSha256::new_from_slice(s.as_bytes()).ok()),
            secure_cookies: false,
        }
    }

    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    /// SECRET_KEY enables signing; OLLAMA_CHAT_SECURE_COOKIES = 1|true|yes|on sets `Secure`.
    pub fn from_env() -> Self {
        let secret = std::env::var("SECRET_KEY").ok();
        if secret.as_deref().map(str::is_empty).unwrap_or(true) {
            tracing::warn!("SECRET_KEY not set; session cookies are unsigned");
        }
        Self::new(secret).with_secure_cookies(env_flag("OLLAMA_CHAT_SECURE_COOKIES", false))
    }

    /// Fresh session identifier
    pub fn issue(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Cookie value for a session id
    pub fn encode(&self, session_id: &str) -> String {
        match &self.key {
            Some(key) => {
                let mut mac = key.clone();
                mac.update(session_id.as_bytes());
                format!("{}.{}", session_id, hex::encode(mac.finalize().into_bytes()))
            }
            None => session_id.to_string(),
        }
    }

    /// Session id carried by a cookie value, if it is well-formed and verifies
    pub fn decode(&self, value: &str) -> Option<String> {
        let value = value.trim();
        let session_id = match &self.key {
            Some(key) => {
                let (id, sig_hex) = value.rsplit_once('.')?;
                let sig = hex::decode(sig_hex).ok()?;
                let mut mac = key.clone();
                mac.update(id.as_bytes());
                mac.verify_slice(&sig).ok()?;
                id
            }
            None => value,
        };
        Uuid::parse_str(session_id).ok()?;
        Some(session_id.to_string())
    }

    /// Session id of the calling browser, if any
    pub fn session_id(&self, req: &HttpRequest) -> Option<String> {
        req.cookie(SESSION_COOKIE)
            .and_then(|cookie| self.decode(cookie.value()))
    }

    pub fn cookie(&self, session_id: &str) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, self.encode(session_id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .finish()
    }
}
