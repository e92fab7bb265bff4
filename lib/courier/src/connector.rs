//! HTTPS connector using rustls, with optional forward-proxy routing.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use courier_core::{Error, ProxyResolver, Result, TransportConfig};
use http::Uri;
use http::uri::Scheme;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use tower_service::Service;
use url::Url;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connector stack used by [`HyperTransport`](crate::HyperTransport).
pub type CourierConnector = HttpsConnector<ProxyConnector<HttpConnector>>;

/// Create an HTTPS connector with rustls from the transport configuration.
///
/// The connector supports both HTTP/1.1 and HTTP/2. Server certificates are
/// checked against the Mozilla roots plus any extra roots from
/// [`TlsConfig`](courier_core::TlsConfig); a client certificate is presented
/// when one is configured.
pub fn https_connector(config: &TransportConfig) -> Result<CourierConnector> {
    let mut root_store: rustls::RootCertStore =
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    let tls = config.tls.as_ref();
    for cert in tls.map(|tls| tls.root_certs()).unwrap_or_default() {
        root_store
            .add(cert.clone())
            .map_err(|err| Error::tls(format!("invalid root certificate: {err}")))?;
    }

    let builder = rustls::ClientConfig::builder().with_root_certificates(root_store);
    let tls_config = match tls.and_then(|tls| tls.client_auth()) {
        Some(auth) => builder
            .with_client_auth_cert(auth.certs().to_vec(), auth.key().clone_key())
            .map_err(|err| Error::tls(format!("invalid client certificate: {err}")))?,
        None => builder.with_no_client_auth(),
    };

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(config.connect_timeout));
    http.set_nodelay(true);

    let proxy = ProxyConnector::new(http, config.proxy.clone());

    Ok(HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(proxy))
}

/// Routes plain `http://` connections through a forward proxy.
///
/// The proxied connection is flagged so hyper writes absolute-form request
/// targets. `https://` targets routed to a proxy are rejected: tunnelling
/// through `CONNECT` is not supported.
#[derive(Clone)]
pub struct ProxyConnector<C> {
    inner: C,
    resolver: Option<Arc<dyn ProxyResolver>>,
}

impl<C> ProxyConnector<C> {
    /// Wrap `inner`; `None` connects directly.
    pub fn new(inner: C, resolver: Option<Arc<dyn ProxyResolver>>) -> Self {
        Self { inner, resolver }
    }

    fn proxy_for(&self, target: &Uri) -> Option<Url> {
        let resolver = self.resolver.as_ref()?;
        let target = Url::parse(&target.to_string()).ok()?;
        resolver.proxy_for(&target)
    }
}

impl<C> Service<Uri> for ProxyConnector<C>
where
    C: Service<Uri> + Clone + Send + 'static,
    C::Response: Send,
    C::Future: Send + 'static,
    C::Error: Into<BoxError>,
{
    type Response = Proxied<C::Response>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), BoxError>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, target: Uri) -> Self::Future {
        let proxy = self.proxy_for(&target);
        // The ready service is the one we hold, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(proxy) = proxy else {
                let io = inner.call(target).await.map_err(Into::into)?;
                return Ok(Proxied::direct(io));
            };

            if target.scheme() == Some(&Scheme::HTTPS) {
                return Err(format!("cannot reach {target} through proxy {proxy}: tunnelling is not supported").into());
            }
            tracing::debug!(%target, %proxy, "connecting through proxy");
            let proxy_uri: Uri = proxy.as_str().parse()?;
            let io = inner.call(proxy_uri).await.map_err(Into::into)?;
            Ok(Proxied::through_proxy(io))
        })
    }
}

/// Connection opened by [`ProxyConnector`].
#[derive(Debug)]
pub struct Proxied<T> {
    inner: T,
    proxied: bool,
}

impl<T> Proxied<T> {
    const fn direct(inner: T) -> Self {
        Self {
            inner,
            proxied: false,
        }
    }

    const fn through_proxy(inner: T) -> Self {
        Self {
            inner,
            proxied: true,
        }
    }
}

impl<T: Connection> Connection for Proxied<T> {
    fn connected(&self) -> Connected {
        let connected = self.inner.connected();
        if self.proxied {
            connected.proxy(true)
        } else {
            connected
        }
    }
}

impl<T: Read + Unpin> Read for Proxied<T> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<T: Write + Unpin> Write for Proxied<T> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }
}

#[cfg(test)]
mod tests {
    use courier_core::FixedProxy;

    use super::*;

    #[test]
    fn creates_connector() {
        let connector = https_connector(&TransportConfig::default());
        assert!(connector.is_ok());
    }

    #[test]
    fn rejects_bad_root_material() {
        let mut config = TransportConfig::default();
        config
            .tls_mut()
            .add_root_cert(rustls::pki_types::CertificateDer::from(vec![1, 2, 3]));

        let err = https_connector(&config).err().expect("should fail");
        assert!(matches!(err, Error::Tls(_)));
    }

    #[test]
    fn picks_proxy_per_target() {
        let resolver: Arc<dyn ProxyResolver> =
            Arc::new(FixedProxy::parse("http://proxy.test:3128").expect("proxy"));
        let connector = ProxyConnector::new(HttpConnector::new(), Some(resolver));

        let target: Uri = "http://api.test/users".parse().expect("uri");
        let proxy = connector.proxy_for(&target).expect("proxied");
        assert_eq!(proxy.as_str(), "http://proxy.test:3128/");

        let direct = ProxyConnector::new(HttpConnector::new(), None);
        assert!(direct.proxy_for(&target).is_none());
    }
}
