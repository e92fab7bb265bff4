//! Transport configuration types.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use url::Url;

use crate::{Error, Result};

/// Configuration shared by every transport implementation.
#[derive(Clone)]
pub struct TransportConfig {
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
    /// Close connections after every exchange.
    pub disable_keep_alives: bool,
    /// Do not ask for (nor transparently decode) compressed responses.
    pub disable_compression: bool,
    /// TLS material, `None` means webpki roots and no client certificate.
    pub tls: Option<TlsConfig>,
    /// Forward proxy selection, `None` means direct connections.
    pub proxy: Option<Arc<dyn ProxyResolver>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 100,
            pool_idle_timeout: Duration::from_secs(90),
            disable_keep_alives: false,
            disable_compression: false,
            tls: None,
            proxy: None,
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("pool_idle_per_host", &self.pool_idle_per_host)
            .field("pool_idle_timeout", &self.pool_idle_timeout)
            .field("disable_keep_alives", &self.disable_keep_alives)
            .field("disable_compression", &self.disable_compression)
            .field("tls", &self.tls)
            .field("proxy", &self.proxy.is_some())
            .finish()
    }
}

impl TransportConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }

    /// Get or create the TLS configuration.
    pub fn tls_mut(&mut self) -> &mut TlsConfig {
        self.tls.get_or_insert_with(TlsConfig::default)
    }
}

/// Builder for [`TransportConfig`].
#[derive(Clone, Default)]
pub struct TransportConfigBuilder {
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
    disable_keep_alives: Option<bool>,
    disable_compression: Option<bool>,
    tls: Option<TlsConfig>,
    proxy: Option<Arc<dyn ProxyResolver>>,
}

impl TransportConfigBuilder {
    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Close connections after every exchange.
    #[must_use]
    pub const fn disable_keep_alives(mut self, disable: bool) -> Self {
        self.disable_keep_alives = Some(disable);
        self
    }

    /// Do not negotiate compressed responses.
    #[must_use]
    pub const fn disable_compression(mut self, disable: bool) -> Self {
        self.disable_compression = Some(disable);
        self
    }

    /// Set the TLS material.
    #[must_use]
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Route requests through a proxy resolver.
    #[must_use]
    pub fn proxy(mut self, proxy: impl ProxyResolver + 'static) -> Self {
        self.proxy = Some(Arc::new(proxy));
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> TransportConfig {
        let defaults = TransportConfig::default();
        TransportConfig {
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
            disable_keep_alives: self
                .disable_keep_alives
                .unwrap_or(defaults.disable_keep_alives),
            disable_compression: self
                .disable_compression
                .unwrap_or(defaults.disable_compression),
            tls: self.tls,
            proxy: self.proxy,
        }
    }
}

// ============================================================================
// TLS
// ============================================================================

/// Client certificate chain and its private key.
pub struct ClientAuth {
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ClientAuth {
    /// Pair a certificate chain with its key.
    #[must_use]
    pub fn new(certs: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Self {
        Self { certs, key }
    }

    /// Load a PEM certificate chain and a PEM private key from files.
    pub fn from_pem_files(cert_file: impl AsRef<Path>, key_file: impl AsRef<Path>) -> Result<Self> {
        let certs = CertificateDer::pem_file_iter(cert_file.as_ref())
            .and_then(Iterator::collect::<std::result::Result<Vec<_>, _>>)
            .map_err(|err| Error::tls(format!("invalid client certificate: {err}")))?;
        if certs.is_empty() {
            return Err(Error::tls("no certificate found in client certificate file"));
        }
        let key = PrivateKeyDer::from_pem_file(key_file.as_ref())
            .map_err(|err| Error::tls(format!("invalid client key: {err}")))?;
        Ok(Self { certs, key })
    }

    /// Certificate chain.
    #[must_use]
    pub fn certs(&self) -> &[CertificateDer<'static>] {
        &self.certs
    }

    /// Private key.
    #[must_use]
    pub fn key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }
}

impl Clone for ClientAuth {
    fn clone(&self) -> Self {
        Self {
            certs: self.certs.clone(),
            key: self.key.clone_key(),
        }
    }
}

impl fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientAuth")
            .field("certs", &self.certs.len())
            .finish_non_exhaustive()
    }
}

/// TLS material for HTTPS connections.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    root_certs: Vec<CertificateDer<'static>>,
    client_auth: Option<ClientAuth>,
}

impl TlsConfig {
    /// Trust additional root certificates given as PEM text.
    ///
    /// Added roots are trusted alongside the Mozilla roots.
    pub fn add_root_certs_pem(&mut self, pem: &[u8]) -> Result<usize> {
        let certs = CertificateDer::pem_slice_iter(pem)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| Error::tls(format!("invalid root certificate: {err}")))?;
        if certs.is_empty() {
            return Err(Error::tls("no certificate found in PEM data"));
        }
        let count = certs.len();
        self.root_certs.extend(certs);
        Ok(count)
    }

    /// Trust a DER encoded root certificate.
    pub fn add_root_cert(&mut self, cert: CertificateDer<'static>) {
        self.root_certs.push(cert);
    }

    /// Trusted roots added so far.
    #[must_use]
    pub fn root_certs(&self) -> &[CertificateDer<'static>] {
        &self.root_certs
    }

    /// Present a client certificate.
    pub fn set_client_auth(&mut self, auth: ClientAuth) {
        self.client_auth = Some(auth);
    }

    /// Client certificate, if any.
    #[must_use]
    pub fn client_auth(&self) -> Option<&ClientAuth> {
        self.client_auth.as_ref()
    }
}

// ============================================================================
// Proxy
// ============================================================================

/// Picks the forward proxy for a target URL.
pub trait ProxyResolver: Send + Sync {
    /// Proxy URL for `target`, or `None` to connect directly.
    fn proxy_for(&self, target: &Url) -> Option<Url>;
}

impl<F> ProxyResolver for F
where
    F: Fn(&Url) -> Option<Url> + Send + Sync,
{
    fn proxy_for(&self, target: &Url) -> Option<Url> {
        self(target)
    }
}

/// Send every request through the same proxy.
#[derive(Debug, Clone)]
pub struct FixedProxy(Url);

impl FixedProxy {
    /// Proxy everything through `proxy`.
    #[must_use]
    pub const fn new(proxy: Url) -> Self {
        Self(proxy)
    }

    /// Parse the proxy URL.
    pub fn parse(proxy: &str) -> Result<Self> {
        Ok(Self(Url::parse(proxy)?))
    }
}

impl ProxyResolver for FixedProxy {
    fn proxy_for(&self, _target: &Url) -> Option<Url> {
        Some(self.0.clone())
    }
}

/// Proxy taken from `HTTP_PROXY`, `HTTPS_PROXY` and `NO_PROXY` (either
/// case), read once when the resolver is created.
#[derive(Debug, Clone, Default)]
pub struct EnvProxy {
    http: Option<Url>,
    https: Option<Url>,
    no_proxy: Vec<String>,
}

impl EnvProxy {
    /// Read the proxy environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .or_else(|_| std::env::var(name.to_ascii_lowercase()))
                .ok()
                .filter(|value| !value.trim().is_empty())
        };
        Self::new(
            read("HTTP_PROXY").as_deref(),
            read("HTTPS_PROXY").as_deref(),
            read("NO_PROXY").as_deref(),
        )
    }

    /// Build from explicit values, in the environment variable formats.
    #[must_use]
    pub fn new(http: Option<&str>, https: Option<&str>, no_proxy: Option<&str>) -> Self {
        let parse = |value: &str| {
            if value.contains("://") {
                Url::parse(value).ok()
            } else {
                Url::parse(&format!("http://{value}")).ok()
            }
        };
        Self {
            http: http.and_then(parse),
            https: https.and_then(parse),
            no_proxy: no_proxy
                .unwrap_or_default()
                .split(',')
                .map(|entry| entry.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|entry| !entry.is_empty())
                .collect(),
        }
    }

    fn bypass(&self, host: &str) -> bool {
        self.no_proxy.iter().any(|entry| {
            entry == "*"
                || host == entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

impl ProxyResolver for EnvProxy {
    fn proxy_for(&self, target: &Url) -> Option<Url> {
        if self.bypass(target.host_str().unwrap_or_default()) {
            return None;
        }
        match target.scheme() {
            "https" => self.https.clone(),
            _ => self.http.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
        assert_eq!(config.pool_idle_per_host, 100);
        assert!(!config.disable_compression);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn builder_overrides() {
        let config = TransportConfig::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_per_host(16)
            .disable_keep_alives(true)
            .proxy(FixedProxy::parse("http://proxy.test:3128").expect("url"))
            .build();

        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_idle_per_host, 16);
        assert!(config.disable_keep_alives);
        assert!(config.proxy.is_some());
        assert_eq!(config.pool_idle_timeout, Duration::from_secs(90));
    }

    #[test]
    fn invalid_pem_is_rejected() {
        let mut tls = TlsConfig::default();
        assert!(tls.add_root_certs_pem(b"not a certificate").is_err());
        assert!(tls.root_certs().is_empty());
    }

    #[test]
    fn env_proxy_routes_by_scheme_and_no_proxy() {
        let proxy = EnvProxy::new(
            Some("proxy.test:3128"),
            Some("http://secure-proxy.test:3129"),
            Some("localhost, .internal.test"),
        );
        let url = |raw: &str| Url::parse(raw).expect("url");

        let http = proxy.proxy_for(&url("http://example.com/")).expect("proxy");
        assert_eq!(http.as_str(), "http://proxy.test:3128/");

        let https = proxy.proxy_for(&url("https://example.com/")).expect("proxy");
        assert_eq!(https.host_str(), Some("secure-proxy.test"));

        assert!(proxy.proxy_for(&url("http://localhost:8080/")).is_none());
        assert!(proxy.proxy_for(&url("http://api.internal.test/")).is_none());
        assert!(proxy.proxy_for(&url("http://internal.test.evil/")).is_some());
    }
}
