//! Signed session cookie carrying the internal user id between OAuth visits.

use axum::http::{HeaderMap, header};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const COOKIE_NAME: &str = "slackoverload-auth";

type HmacSha256 = Hmac<Sha256>;

/// Signs and verifies `{user_id}.{hex hmac}` cookie values.
#[derive(Clone)]
pub struct SessionKey {
    key: Vec<u8>,
}

impl SessionKey {
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Option<HmacSha256> {
        HmacSha256::new_from_slice(&self.key).ok()
    }

    fn sign(&self, user_id: &str) -> Option<String> {
        let mut mac = self.mac()?;
        mac.update(user_id.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }

    /// A `Set-Cookie` value remembering `user_id`.
    pub fn cookie(&self, user_id: &str) -> Option<String> {
        let signature = self.sign(user_id)?;
        Some(format!(
            "{COOKIE_NAME}={user_id}.{signature}; HttpOnly; Secure; SameSite=Lax; Path=/"
        ))
    }

    /// The user id from a validly signed session cookie, if there is one.
    pub fn user_id(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == COOKIE_NAME)
            .find_map(|(_, value)| self.verify(value))
    }

    fn verify(&self, value: &str) -> Option<String> {
        let (user_id, signature) = value.rsplit_once('.')?;
        if user_id.is_empty() {
            return None;
        }
        let expected = hex::decode(signature).ok()?;
        let mut mac = self.mac()?;
        mac.update(user_id.as_bytes());
        mac.verify_slice(&expected).ok()?;
        Some(user_id.to_string())
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    fn cookie_value(set_cookie: &str) -> &str {
        set_cookie
            .split(';')
            .next()
            .and_then(|pair| pair.split_once('='))
            .map(|(_, value)| value)
            .unwrap()
    }

    #[test]
    fn signed_cookie_round_trips() {
        let key = SessionKey::new("s3cret");
        let set_cookie = key.cookie("0b7c7e0e-8d3a").unwrap();

        assert!(set_cookie.starts_with("slackoverload-auth=0b7c7e0e-8d3a."));
        assert!(set_cookie.ends_with("; HttpOnly; Secure; SameSite=Lax; Path=/"));

        let headers = headers_with(&format!("theme=dark; {COOKIE_NAME}={}", cookie_value(&set_cookie)));
        assert_eq!(key.user_id(&headers).as_deref(), Some("0b7c7e0e-8d3a"));
    }

    #[test]
    fn tampered_cookie_is_ignored() {
        let key = SessionKey::new("s3cret");
        let set_cookie = key.cookie("u1").unwrap();
        let signature = cookie_value(&set_cookie).rsplit_once('.').unwrap().1;

        let headers = headers_with(&format!("{COOKIE_NAME}=u2.{signature}"));
        assert_eq!(key.user_id(&headers), None);
    }

    #[test]
    fn cookie_from_another_key_is_ignored() {
        let other = SessionKey::new("other");
        let set_cookie = other.cookie("u1").unwrap();

        let headers = headers_with(&format!("{COOKIE_NAME}={}", cookie_value(&set_cookie)));
        assert_eq!(SessionKey::new("s3cret").user_id(&headers), None);
    }

    #[test]
    fn missing_or_malformed_cookie_is_ignored() {
        let key = SessionKey::new("s3cret");

        assert_eq!(key.user_id(&HeaderMap::new()), None);
        assert_eq!(key.user_id(&headers_with(&format!("{COOKIE_NAME}=nodot"))), None);
        assert_eq!(key.user_id(&headers_with(&format!("{COOKIE_NAME}=u1.zz"))), None);
    }
}
