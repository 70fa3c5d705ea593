//! Signed cookies
//!
//! Two cookies are used:
//! - `sid` carries the session token as `{token}.{signature}`
//! - `flash` carries notices for callers without a session, as a signed
//!   base64url JSON array that lives for one minute
//!
//! Signatures are base64url(HMAC-SHA256(secret, value)). A cookie whose
//! signature does not verify is treated as absent.

use crate::models::Notices;
use anyhow::{anyhow, Result};
use axum::http::{header, HeaderMap};
use data_encoding::BASE64URL_NOPAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "sid";
pub const FLASH_COOKIE: &str = "flash";
pub const FLASH_MAX_AGE_SECS: i64 = 60;

/// Signs and verifies cookie values with a keyed HMAC.
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    pub fn new(secret: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| anyhow!("invalid cookie signing key: {}", e))?;
        Ok(Self { mac })
    }

    fn signature(&self, value: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// `value` with its signature appended
    pub fn sign(&self, value: &str) -> String {
        format!("{}.{}", value, BASE64URL_NOPAD.encode(&self.signature(value)))
    }

    /// The original value if the signature matches
    pub fn verify(&self, signed: &str) -> Option<String> {
        let (value, signature) = signed.rsplit_once('.')?;
        let signature = BASE64URL_NOPAD.decode(signature.as_bytes()).ok()?;
        let mut mac = self.mac.clone();
        mac.update(value.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(value.to_string())
    }

    /// `Set-Cookie` value for a freshly issued session
    pub fn session_cookie(&self, token: &str, max_age_secs: i64) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            self.sign(token),
            max_age_secs
        )
    }

    /// Session token from the request, if present and correctly signed
    pub fn session_token(&self, headers: &HeaderMap) -> Option<String> {
        read_cookie(headers, SESSION_COOKIE).and_then(|raw| self.verify(&raw))
    }

    /// `Set-Cookie` value carrying notices, or `None` if there are none
    pub fn flash_cookie(&self, notices: &Notices) -> Option<String> {
        if notices.is_empty() {
            return None;
        }
        let json = serde_json::to_vec(notices).ok()?;
        Some(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            FLASH_COOKIE,
            self.sign(&BASE64URL_NOPAD.encode(&json)),
            FLASH_MAX_AGE_SECS
        ))
    }

    /// Notices carried by the request's `flash` cookie.
    ///
    /// Returns `None` when there is no cookie at all, and empty notices when
    /// the cookie is present but forged or unreadable.
    pub fn read_flash(&self, headers: &HeaderMap) -> Option<Notices> {
        let raw = read_cookie(headers, FLASH_COOKIE)?;
        let decoded = self
            .verify(&raw)
            .and_then(|payload| BASE64URL_NOPAD.decode(payload.as_bytes()).ok())
            .and_then(|json| serde_json::from_slice(&json).ok());
        Some(decoded.unwrap_or_default())
    }
}

pub fn clear_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}

pub fn clear_flash_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", FLASH_COOKIE)
}

/// Value of the first cookie called `name` across all `Cookie` headers
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
