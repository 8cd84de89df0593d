use chrono::{Duration, Utc};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::cookie::{format_http_date, CookieJar};
use super::AuthError;

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 1;
/// Longest lifetime a browser keeps a cookie for (400 days).
pub const MAX_TOKEN_TTL_HOURS: i64 = 400 * 24;

/// Characters left as-is in stored token values; everything else is percent-encoded so a
/// token can never break out of its cookie entry.
const COOKIE_VALUE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Access token kept in a single named cookie.
#[derive(Debug, Clone)]
pub struct TokenStore<J> {
    jar: J,
    cookie_name: String,
    ttl_hours: i64,
}

impl<J: CookieJar> TokenStore<J> {
    pub fn new(jar: J, cookie_name: impl Into<String>) -> Self {
        Self {
            jar,
            cookie_name: cookie_name.into(),
            ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
        }
    }

    pub fn with_ttl_hours(mut self, hours: i64) -> Self {
        self.ttl_hours = hours;
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn jar(&self) -> &J {
        &self.jar
    }

    /// Stored token, or an empty string when the cookie is absent.
    pub fn get(&self) -> Result<String, AuthError> {
        let header = self.jar.cookie_header()?;
        Ok(find_cookie(&header, &self.cookie_name)
            .map(decode_value)
            .unwrap_or_default())
    }

    /// Store `value` for the configured lifetime.
    pub fn store(&self, value: &str) -> Result<(), AuthError> {
        self.set(value, self.ttl_hours)
    }

    pub fn set(&self, value: &str, expire_hours: i64) -> Result<(), AuthError> {
        let expires = Duration::try_hours(expire_hours)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or(AuthError::InvalidTokenTtl {
                hours: expire_hours,
                max: MAX_TOKEN_TTL_HOURS,
            })?;
        let encoded = utf8_percent_encode(value, COOKIE_VALUE_SET);
        let cookie = format!(
            "{}={encoded}; expires={}",
            self.cookie_name,
            format_http_date(expires)
        );
        self.jar.write_cookie(&cookie)
    }

    /// Overwrite the cookie with an already expired empty value.
    pub fn clear(&self) -> Result<(), AuthError> {
        self.set("", -1)
    }
}

fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|entry| {
        entry
            .trim_start_matches(' ')
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix('='))
    })
}

fn decode_value(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCookieJar;

    fn store() -> TokenStore<MemoryCookieJar> {
        TokenStore::new(MemoryCookieJar::new(), "accessToken")
    }

    #[test]
    fn missing_cookie_reads_empty() {
        let store = store();
        store.jar().write_cookie("other=1").unwrap();
        assert_eq!(store.get().unwrap(), "");
    }

    #[test]
    fn reads_entry_after_other_cookies() {
        let store = store();
        store.jar().write_cookie("theme=dark").unwrap();
        store.jar().write_cookie("accessToken=auth").unwrap();
        assert_eq!(store.get().unwrap(), "auth");
    }

    #[test]
    fn name_must_match_whole_prefix() {
        let store = store();
        store.jar().write_cookie("accessTokenOld=stale").unwrap();
        store.jar().write_cookie("xaccessToken=wrong").unwrap();
        assert_eq!(store.get().unwrap(), "");
    }

    #[test]
    fn set_writes_expiry_one_hour_out() {
        let store = store();
        store.store("777").unwrap();
        assert_eq!(store.jar().cookie_header().unwrap(), "accessToken=777");
        let expires = store.jar().expires_at("accessToken").unwrap();
        let remaining = expires - Utc::now();
        assert!(remaining > Duration::minutes(58));
        assert!(remaining <= Duration::hours(1));
    }

    #[test]
    fn custom_ttl_is_applied() {
        let store = store().with_ttl_hours(24);
        store.store("abc").unwrap();
        let expires = store.jar().expires_at("accessToken").unwrap();
        assert!(expires - Utc::now() > Duration::hours(23));
    }

    #[test]
    fn overflowing_lifetime_is_an_error() {
        let store = store();
        let err = store.set("abc", 10_000_000_000).unwrap_err();
        assert!(matches!(
            err,
            AuthError::InvalidTokenTtl {
                hours: 10_000_000_000,
                ..
            }
        ));
        assert_eq!(store.jar().cookie_header().unwrap(), "");
    }

    #[test]
    fn clear_drops_cookie() {
        let store = store();
        store.store("abc").unwrap();
        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), "");
        assert_eq!(store.jar().cookie_header().unwrap(), "");
    }

    #[test]
    fn delimiters_in_value_do_not_corrupt_neighbours() {
        let store = store();
        store.store("a;b=c d").unwrap();
        store.jar().write_cookie("theme=dark").unwrap();
        assert_eq!(store.get().unwrap(), "a;b=c d");
        assert!(store.jar().cookie_header().unwrap().ends_with("; theme=dark"));
    }
}
