//! Demo cookie authentication.
//!
//! Not a real session protocol: the `demo_user` cookie carries a
//! URL-encoded JSON identity `{ "id": ..., "name": ... }` and stands in for
//! login. An absent or unparseable cookie simply means "not authenticated";
//! nothing here is tamper-proof and nothing pretends to be.

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Cookie name holding the demo identity.
pub const DEMO_COOKIE: &str = "demo_user";

const COOKIE_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60;

/// The identity carried by the demo cookie.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DemoUser {
    pub id: String,
    pub name: String,
}

/// Extract the demo user from a `Cookie` request header, if present and valid.
pub fn demo_user_from_cookie(cookie_header: Option<&str>) -> Option<DemoUser> {
    let header = cookie_header?;
    let value = header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == DEMO_COOKIE).then_some(value)
    })?;

    let decoded = percent_decode_str(value).decode_utf8().ok()?;
    let user: DemoUser = serde_json::from_str(&decoded).ok()?;
    if user.id.is_empty() {
        return None;
    }
    Some(user)
}

/// Build the `Set-Cookie` header value for a demo login. 7-day expiry.
pub fn serialize_demo_cookie(user: &DemoUser) -> String {
    let payload = json!({ "id": user.id, "name": user.name }).to_string();
    let value = utf8_percent_encode(&payload, NON_ALPHANUMERIC).to_string();
    format!("{}={}; Path=/; Max-Age={}", DEMO_COOKIE, value, COOKIE_MAX_AGE_SECS)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_roundtrip() {
        let user = DemoUser { id: "u1".into(), name: "Demo One".into() };
        let set_cookie = serialize_demo_cookie(&user);
        // "demo_user=<value>; Path=/; ..." -> just the pair part.
        let pair = set_cookie.split(';').next().unwrap();

        let parsed = demo_user_from_cookie(Some(pair)).unwrap();
        assert_eq!(parsed, user);
    }

    #[test]
    fn test_cookie_found_among_others() {
        let user = DemoUser { id: "u2".into(), name: "Two".into() };
        let pair = serialize_demo_cookie(&user);
        let pair = pair.split(';').next().unwrap();
        let header = format!("theme=dark; {}; lang=en", pair);

        assert_eq!(demo_user_from_cookie(Some(&header)).unwrap().id, "u2");
    }

    #[test]
    fn test_missing_or_garbage_cookie_is_none() {
        assert!(demo_user_from_cookie(None).is_none());
        assert!(demo_user_from_cookie(Some("")).is_none());
        assert!(demo_user_from_cookie(Some("theme=dark")).is_none());
        assert!(demo_user_from_cookie(Some("demo_user=not-json")).is_none());
        assert!(demo_user_from_cookie(Some("demo_user=%7B%22id%22%3A%22%22%2C%22name%22%3A%22x%22%7D")).is_none());
    }
}
