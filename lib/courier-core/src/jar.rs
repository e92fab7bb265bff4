//! Cookie jar consulted on every redirect hop.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use http::HeaderValue;
use url::Url;

/// Persistent cookie storage.
///
/// The dispatcher asks the jar for a `Cookie` header before each hop and
/// hands it every `Set-Cookie` header it receives.
pub trait CookieJar: Send + Sync {
    /// Store `Set-Cookie` header values received from `url`.
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url);

    /// `Cookie` header value to send to `url`, if any cookie matches.
    fn cookies(&self, url: &Url) -> Option<HeaderValue>;
}

/// In-memory jar backed by `cookie_store`, honoring domain, path, expiry
/// and secure attributes.
#[derive(Default)]
pub struct MemoryJar {
    store: RwLock<cookie_store::CookieStore>,
}

impl MemoryJar {
    /// Empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every cookie.
    pub fn clear(&self) {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl fmt::Debug for MemoryJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter_any()
            .count();
        f.debug_struct("MemoryJar").field("cookies", &count).finish()
    }
}

impl CookieJar for MemoryJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let cookies: Vec<_> = cookie_headers
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| cookie::Cookie::parse(value.to_string()).ok())
            .collect();
        if cookies.is_empty() {
            return;
        }

        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .store_response_cookies(cookies.into_iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let header = self
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");

        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    #[test]
    fn stores_and_returns_matching_cookies() {
        let jar = MemoryJar::new();
        let headers = [
            HeaderValue::from_static("session=abc; Path=/"),
            HeaderValue::from_static("theme=dark; Path=/settings"),
        ];
        jar.set_cookies(&mut headers.iter(), &url("http://example.test/login"));

        let root = jar.cookies(&url("http://example.test/")).expect("cookie");
        assert_eq!(root, "session=abc");

        let settings = jar
            .cookies(&url("http://example.test/settings/ui"))
            .expect("cookies");
        let settings = settings.to_str().expect("ascii");
        assert!(settings.contains("session=abc"));
        assert!(settings.contains("theme=dark"));
    }

    #[test]
    fn other_hosts_get_nothing() {
        let jar = MemoryJar::new();
        let headers = [HeaderValue::from_static("session=abc")];
        jar.set_cookies(&mut headers.iter(), &url("http://a.test/"));

        assert!(jar.cookies(&url("http://b.test/")).is_none());

        jar.clear();
        assert!(jar.cookies(&url("http://a.test/")).is_none());
    }
}
