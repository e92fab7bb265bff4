//! Redirect policies.
//!
//! A policy is consulted before every redirect hop with the hop about to
//! be made and the URLs already visited (oldest first, the original request
//! included). Returning an error aborts the request with that error;
//! returning [`Error::UseLastResponse`] stops following and hands back the
//! redirect response itself.

use url::Url;

use crate::{Error, Method, Result};

/// Default maximum number of redirects.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// The redirect hop about to be made.
#[derive(Debug, Clone, Copy)]
pub struct NextHop<'a> {
    /// Method of the next request.
    pub method: Method,
    /// Target of the next request.
    pub url: &'a Url,
    /// Status of the response that asked for the redirect.
    pub status: u16,
}

/// Decides whether a redirect hop is followed.
pub trait RedirectPolicy: Send + Sync {
    /// Check the next hop; `via` holds every URL requested so far.
    fn check(&self, next: &NextHop<'_>, via: &[Url]) -> Result<()>;
}

impl<F> RedirectPolicy for F
where
    F: Fn(&NextHop<'_>, &[Url]) -> Result<()> + Send + Sync,
{
    fn check(&self, next: &NextHop<'_>, via: &[Url]) -> Result<()> {
        self(next, via)
    }
}

/// Never follow redirects; the 3xx response is returned as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRedirectPolicy;

impl RedirectPolicy for NoRedirectPolicy {
    fn check(&self, _next: &NextHop<'_>, _via: &[Url]) -> Result<()> {
        Err(Error::UseLastResponse)
    }
}

/// Follow at most `max` redirects.
#[derive(Debug, Clone, Copy)]
pub struct MaxRedirectPolicy(pub usize);

impl Default for MaxRedirectPolicy {
    fn default() -> Self {
        Self(DEFAULT_MAX_REDIRECTS)
    }
}

impl RedirectPolicy for MaxRedirectPolicy {
    fn check(&self, _next: &NextHop<'_>, via: &[Url]) -> Result<()> {
        if via.len() > self.0 {
            return Err(Error::TooManyRedirects {
                count: via.len(),
                max: self.0,
            });
        }
        Ok(())
    }
}

/// Only follow redirects staying on the host of the original request.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameHostRedirectPolicy;

impl RedirectPolicy for SameHostRedirectPolicy {
    fn check(&self, next: &NextHop<'_>, via: &[Url]) -> Result<()> {
        let original = via.first().and_then(Url::host_str);
        if original != next.url.host_str() {
            return Err(Error::redirect(format!(
                "different host {} is not allowed",
                next.url.host_str().unwrap_or_default()
            )));
        }
        Ok(())
    }
}

/// Only follow redirects staying on the registrable domain of the
/// original request (the last two host labels).
#[derive(Debug, Clone, Copy, Default)]
pub struct SameDomainRedirectPolicy;

impl RedirectPolicy for SameDomainRedirectPolicy {
    fn check(&self, next: &NextHop<'_>, via: &[Url]) -> Result<()> {
        let original = via.first().and_then(Url::host_str).map(registrable_domain);
        let target = next.url.host_str().map(registrable_domain);
        if original != target {
            return Err(Error::redirect(format!(
                "different domain {} is not allowed",
                target.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

/// Only follow redirects to one of the listed hosts.
#[derive(Debug, Clone, Default)]
pub struct AllowedHostRedirectPolicy {
    hosts: Vec<String>,
}

impl AllowedHostRedirectPolicy {
    /// Allow the given host names.
    #[must_use]
    pub fn new<S: Into<String>>(hosts: impl IntoIterator<Item = S>) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|host| host.into().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl RedirectPolicy for AllowedHostRedirectPolicy {
    fn check(&self, next: &NextHop<'_>, _via: &[Url]) -> Result<()> {
        let host = next.url.host_str().unwrap_or_default();
        if self.hosts.iter().any(|allowed| allowed == host) {
            return Ok(());
        }
        Err(Error::redirect(format!("redirect host [{host}] is not allowed")))
    }
}

/// Only follow redirects to one of the listed domains or their subdomains.
#[derive(Debug, Clone, Default)]
pub struct AllowedDomainRedirectPolicy {
    domains: Vec<String>,
}

impl AllowedDomainRedirectPolicy {
    /// Allow the given domains.
    #[must_use]
    pub fn new<S: Into<String>>(domains: impl IntoIterator<Item = S>) -> Self {
        Self {
            domains: domains
                .into_iter()
                .map(|domain| domain.into().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl RedirectPolicy for AllowedDomainRedirectPolicy {
    fn check(&self, next: &NextHop<'_>, _via: &[Url]) -> Result<()> {
        let host = next.url.host_str().unwrap_or_default();
        let allowed = self.domains.iter().any(|domain| {
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        });
        if allowed {
            return Ok(());
        }
        Err(Error::redirect(format!(
            "redirect domain [{host}] is not allowed"
        )))
    }
}

fn registrable_domain(host: &str) -> &str {
    let mut dots = host.rmatch_indices('.');
    match (dots.next(), dots.next()) {
        (Some(_), Some((index, _))) => host.get(index + 1..).unwrap_or(host),
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("valid url")
    }

    fn hop(target: &Url) -> NextHop<'_> {
        NextHop {
            method: Method::Get,
            url: target,
            status: 302,
        }
    }

    #[test]
    fn max_redirect_allows_up_to_limit() {
        let policy = MaxRedirectPolicy(2);
        let target = url("http://a.test/next");
        let via = vec![url("http://a.test/0"), url("http://a.test/1")];
        check!(policy.check(&hop(&target), &via).is_ok());

        let via = vec![
            url("http://a.test/0"),
            url("http://a.test/1"),
            url("http://a.test/2"),
        ];
        let_assert!(
            Err(Error::TooManyRedirects { count: 3, max: 2 }) = policy.check(&hop(&target), &via)
        );
    }

    #[test]
    fn no_redirect_uses_last_response() {
        let target = url("http://a.test/next");
        let_assert!(Err(Error::UseLastResponse) = NoRedirectPolicy.check(&hop(&target), &[]));
    }

    #[test]
    fn same_host_and_domain() {
        let via = vec![url("https://api.example.com/start")];

        let same = url("https://api.example.com/other");
        let sibling = url("https://www.example.com/other");
        let foreign = url("https://example.org/");

        check!(SameHostRedirectPolicy.check(&hop(&same), &via).is_ok());
        check!(SameHostRedirectPolicy.check(&hop(&sibling), &via).is_err());
        check!(SameDomainRedirectPolicy.check(&hop(&sibling), &via).is_ok());
        check!(SameDomainRedirectPolicy.check(&hop(&foreign), &via).is_err());
    }

    #[test]
    fn allowed_hosts_and_domains() {
        let hosts = AllowedHostRedirectPolicy::new(["a.test", "B.test"]);
        let domains = AllowedDomainRedirectPolicy::new(["example.com"]);

        check!(hosts.check(&hop(&url("http://b.test/")), &[]).is_ok());
        check!(hosts.check(&hop(&url("http://c.test/")), &[]).is_err());
        check!(domains.check(&hop(&url("http://cdn.example.com/")), &[]).is_ok());
        check!(domains.check(&hop(&url("http://example.com/")), &[]).is_ok());
        check!(domains.check(&hop(&url("http://badexample.com/")), &[]).is_err());
    }

    #[test]
    fn registrable_domain_keeps_last_two_labels() {
        check!(registrable_domain("a.b.example.com") == "example.com");
        check!(registrable_domain("example.com") == "example.com");
        check!(registrable_domain("localhost") == "localhost");
    }
}
