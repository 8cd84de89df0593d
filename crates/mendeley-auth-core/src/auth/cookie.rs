use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AuthError;

/// `expires=` attribute format, as produced by `Date.prototype.toUTCString`.
pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Browsers cap cookie lifetimes at 400 days; later expiries are clamped to it.
pub const MAX_COOKIE_LIFETIME_DAYS: i64 = 400;

/// Browser-style cookie storage.
///
/// Reads return the whole `name=value; name2=value2` header and writes take a single
/// `Set-Cookie`-like line, mirroring how scripts see `document.cookie`.
pub trait CookieJar {
    fn cookie_header(&self) -> Result<String, AuthError>;
    fn write_cookie(&self, cookie: &str) -> Result<(), AuthError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |ts| ts > now)
    }
}

/// Cookie entries in creation order, with the expiry rules a browser applies on write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieEntries {
    entries: Vec<StoredCookie>,
}

impl CookieEntries {
    /// Apply one cookie line. Writing an already expired cookie removes the entry.
    pub fn apply(&mut self, cookie: &str, now: DateTime<Utc>) {
        let mut parts = cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            tracing::debug!(cookie, "ignoring cookie without name=value pair");
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let mut expires_at = None;
        let mut max_age = None;
        for attribute in parts {
            let Some((key, raw)) = attribute.trim().split_once('=') else {
                continue;
            };
            match key.trim().to_ascii_lowercase().as_str() {
                "expires" => expires_at = parse_http_date(raw.trim()),
                "max-age" => max_age = raw.trim().parse::<i64>().ok(),
                _ => {}
            }
        }
        if let Some(seconds) = max_age {
            expires_at = Some(max_age_expiry(now, seconds));
        }
        let latest = now + Duration::days(MAX_COOKIE_LIFETIME_DAYS);
        let expires_at = expires_at.map(|ts| ts.min(latest));

        let stored = StoredCookie {
            name: name.to_owned(),
            value: value.trim().to_owned(),
            expires_at,
        };
        let existing = self.entries.iter().position(|entry| entry.name == stored.name);
        match (existing, stored.is_live(now)) {
            (Some(index), true) => self.entries[index] = stored,
            (Some(index), false) => {
                self.entries.remove(index);
            }
            (None, true) => self.entries.push(stored),
            (None, false) => {}
        }
    }

    /// Render the live entries the way `document.cookie` does.
    pub fn header(&self, now: DateTime<Utc>) -> String {
        self.entries
            .iter()
            .filter(|entry| entry.is_live(now))
            .map(|entry| format!("{}={}", entry.name, entry.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn get(&self, name: &str, now: DateTime<Utc>) -> Option<&StoredCookie> {
        self.entries
            .iter()
            .find(|entry| entry.name == name && entry.is_live(now))
    }
}

/// Zero or negative expires immediately; anything past the lifetime cap is clamped.
fn max_age_expiry(now: DateTime<Utc>, seconds: i64) -> DateTime<Utc> {
    let capped = seconds.clamp(0, MAX_COOKIE_LIFETIME_DAYS * 24 * 60 * 60);
    now + Duration::seconds(capped)
}

pub fn format_http_date(ts: DateTime<Utc>) -> String {
    ts.format(HTTP_DATE_FORMAT).to_string()
}

fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// In-memory jar. Clones share the same entries, so a caller can keep a handle while a
/// session owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieJar {
    inner: Arc<Mutex<CookieEntries>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current expiry of a live cookie, if any.
    pub fn expires_at(&self, name: &str) -> Option<DateTime<Utc>> {
        let entries = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(name, Utc::now()).and_then(|entry| entry.expires_at)
    }
}

impl CookieJar for MemoryCookieJar {
    fn cookie_header(&self) -> Result<String, AuthError> {
        let entries = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.header(Utc::now()))
    }

    fn write_cookie(&self, cookie: &str) -> Result<(), AuthError> {
        let mut entries = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        entries.apply(cookie, Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lists_entries_in_creation_order() {
        let jar = MemoryCookieJar::new();
        jar.write_cookie("theme=dark").unwrap();
        jar.write_cookie("accessToken=abc").unwrap();
        jar.write_cookie("theme=light").unwrap();
        assert_eq!(jar.cookie_header().unwrap(), "theme=light; accessToken=abc");
    }

    #[test]
    fn expired_write_removes_entry() {
        let jar = MemoryCookieJar::new();
        jar.write_cookie("accessToken=abc").unwrap();
        let past = format_http_date(Utc::now() - Duration::hours(1));
        jar.write_cookie(&format!("accessToken=; expires={past}"))
            .unwrap();
        assert_eq!(jar.cookie_header().unwrap(), "");
    }

    #[test]
    fn expires_attribute_is_parsed() {
        let now = Utc::now();
        let mut entries = CookieEntries::default();
        let later = format_http_date(now + Duration::hours(2));
        entries.apply(&format!("accessToken=abc; expires={later}"), now);
        let stored = entries.get("accessToken", now).unwrap();
        let expires = stored.expires_at.unwrap();
        assert!(expires > now + Duration::minutes(119));
        assert!(!entries.header(now + Duration::hours(3)).contains("accessToken"));
    }

    #[test]
    fn max_age_wins_over_expires() {
        let now = Utc::now();
        let mut entries = CookieEntries::default();
        let later = format_http_date(now + Duration::hours(2));
        entries.apply(&format!("sid=1; expires={later}; Max-Age=0"), now);
        assert_eq!(entries.header(now), "");
    }

    #[test]
    fn huge_max_age_is_clamped() {
        let now = Utc::now();
        let mut entries = CookieEntries::default();
        entries.apply(&format!("accessToken=abc; Max-Age={}", i64::MAX), now);
        let stored = entries.get("accessToken", now).unwrap();
        assert_eq!(
            stored.expires_at,
            Some(now + Duration::days(MAX_COOKIE_LIFETIME_DAYS))
        );

        let jar = MemoryCookieJar::new();
        jar.write_cookie(&format!("accessToken=abc; max-age={}", i64::MAX))
            .unwrap();
        assert_eq!(jar.cookie_header().unwrap(), "accessToken=abc");
    }

    #[test]
    fn most_negative_max_age_removes_entry() {
        let jar = MemoryCookieJar::new();
        jar.write_cookie("accessToken=abc").unwrap();
        jar.write_cookie(&format!("accessToken=abc; Max-Age={}", i64::MIN))
            .unwrap();
        assert_eq!(jar.cookie_header().unwrap(), "");
    }

    #[test]
    fn far_future_expires_is_clamped() {
        let now = Utc::now();
        let mut entries = CookieEntries::default();
        entries.apply("accessToken=abc; expires=Fri, 31 Dec 9999 23:59:59 GMT", now);
        let expires = entries.get("accessToken", now).unwrap().expires_at.unwrap();
        assert_eq!(expires, now + Duration::days(MAX_COOKIE_LIFETIME_DAYS));
    }

    #[test]
    fn line_without_pair_is_ignored() {
        let mut entries = CookieEntries::default();
        entries.apply("garbage", Utc::now());
        assert_eq!(entries.header(Utc::now()), "");
    }
}
