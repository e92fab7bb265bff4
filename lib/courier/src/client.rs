//! Client holding the defaults shared by every request.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cookie::Cookie;
use courier_core::{
    ClientAuth, CookieJar, DEFAULT_DUMP_QUEUE_CAPACITY, DisabledLogger, DumpOptions, DumpSink,
    Dumper, FixedProxy, JsonCodec, Logger, Marshal, MaxRedirectPolicy, MemoryJar, ProxyResolver,
    RedirectPolicy, Result, TlsConfig, TracingLogger, Transport, Unmarshal, XmlCodec,
    parse_query_string,
};
use http::HeaderMap;
use http::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};

use crate::config::{AnyContentType, ContentTypeKeywords, ContentTypePredicate, ResponseOptions};
use crate::request::{basic_auth, header_pair, replace_pair};
use crate::stage::{RequestStage, ResponseStage};
use crate::{HyperTransport, Request, Response};

/// Default call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/97.0.4692.71 Safari/537.36";

/// Owned transport; cloning it opens an independent connection pool.
pub(crate) struct TransportSlot(Box<dyn Transport>);

impl TransportSlot {
    pub(crate) fn get(&self) -> &dyn Transport {
        self.0.as_ref()
    }
}

impl Clone for TransportSlot {
    fn clone(&self) -> Self {
        Self(self.0.clone_transport())
    }
}

#[derive(Clone)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct ClientState {
    pub(crate) base_url: String,
    pub(crate) scheme: String,
    pub(crate) path_params: BTreeMap<String, String>,
    pub(crate) query_params: Vec<(String, String)>,
    pub(crate) form_data: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) cookies: Vec<Cookie<'static>>,
    pub(crate) debug_log: bool,
    pub(crate) trace_all: bool,
    pub(crate) allow_get_method_payload: bool,
    pub(crate) disable_auto_read_response: bool,
    pub(crate) output_directory: Option<PathBuf>,
    pub(crate) timeout: Duration,
    pub(crate) response_options: ResponseOptions,
    pub(crate) dump_options: Option<DumpOptions>,
    pub(crate) dump_sink: Option<DumpSink>,
    pub(crate) before_request: Vec<Arc<dyn RequestStage>>,
    pub(crate) after_response: Vec<Arc<dyn ResponseStage>>,
    pub(crate) redirect_policies: Vec<Arc<dyn RedirectPolicy>>,
    pub(crate) json_marshal: Arc<dyn Marshal>,
    pub(crate) json_unmarshal: Arc<dyn Unmarshal>,
    pub(crate) xml_marshal: Arc<dyn Marshal>,
    pub(crate) xml_unmarshal: Arc<dyn Unmarshal>,
    pub(crate) log: Arc<dyn Logger>,
    pub(crate) jar: Option<Arc<dyn CookieJar>>,
    pub(crate) transport: Arc<TransportSlot>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            scheme: String::new(),
            path_params: BTreeMap::new(),
            query_params: Vec::new(),
            form_data: Vec::new(),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
            debug_log: false,
            trace_all: false,
            allow_get_method_payload: false,
            disable_auto_read_response: false,
            output_directory: None,
            timeout: DEFAULT_TIMEOUT,
            response_options: ResponseOptions::default(),
            dump_options: None,
            dump_sink: None,
            before_request: Vec::new(),
            after_response: Vec::new(),
            redirect_policies: vec![Arc::new(MaxRedirectPolicy::default())],
            json_marshal: Arc::new(JsonCodec),
            json_unmarshal: Arc::new(JsonCodec),
            xml_marshal: Arc::new(XmlCodec::default()),
            xml_unmarshal: Arc::new(XmlCodec::default()),
            log: Arc::new(TracingLogger),
            jar: Some(Arc::new(MemoryJar::new())),
            transport: Arc::new(TransportSlot(Box::new(HyperTransport::new()))),
        }
    }
}

/// HTTP client: shared defaults plus the transport.
///
/// Setters take `&mut self` and chain. The state is copy-on-write: a
/// [`Request`] created with [`r`](Self::r) keeps the configuration of that
/// moment, so later setters never affect calls already built or in flight.
/// Share a configured client with `Arc<Client>`.
///
/// Configuration errors (an unparsable proxy URL, a bad header name, invalid
/// PEM material) are reported through the client [`Logger`] and leave the
/// client unchanged.
///
/// Cloning gives a fully independent client: collections are copied, the
/// transport is duplicated with its own connection pool, and dumping starts
/// disabled. Codecs, logger, cookie jar, redirect policies and stage
/// objects are shared.
///
/// # Example
///
/// ```ignore
/// use courier::prelude::*;
///
/// let mut client = Client::new();
/// client
///     .set_base_url("https://api.example.com")
///     .set_common_bearer_auth_token("t0k3n")
///     .set_timeout(Duration::from_secs(10));
///
/// let user: User = client.r().set_path_param("id", "42").get("/users/{id}").await?.json().await?;
/// ```
pub struct Client {
    state: Arc<ClientState>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = &self.state;
        f.debug_struct("Client")
            .field("base_url", &state.base_url)
            .field("headers", &state.headers)
            .field("timeout", &state.timeout)
            .field("debug_log", &state.debug_log)
            .field("trace_all", &state.trace_all)
            .field("before_request", &state.before_request.len())
            .field("after_response", &state.after_response.len())
            .field("dump", &self.is_dump_enabled())
            .finish_non_exhaustive()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Client {
    fn clone(&self) -> Self {
        let mut state = ClientState::clone(&self.state);
        let mut transport = self.state.transport.get().clone_transport();
        transport.set_dumper(None);
        state.transport = Arc::new(TransportSlot(transport));
        state.dump_sink = None;
        Self {
            state: Arc::new(state),
        }
    }
}

impl Client {
    /// Create a client with default settings.
    ///
    /// JSON and XML codecs, the `tracing` logger, an in-memory cookie jar,
    /// at most 10 redirects, a 2 minute timeout and a [`HyperTransport`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(ClientState::default()),
        }
    }

    pub(crate) const fn from_state(state: Arc<ClientState>) -> Self {
        Self { state }
    }

    pub(crate) fn state(&self) -> &ClientState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ClientState {
        Arc::make_mut(&mut self.state)
    }

    fn transport_mut(&mut self) -> &mut (dyn Transport + 'static) {
        Arc::make_mut(&mut self.state_mut().transport).0.as_mut()
    }

    fn warn(&self, what: &str, err: &dyn fmt::Display) {
        self.state.log.warn(format_args!("{what}: {err}"));
    }

    /// Start a request with the current defaults.
    pub fn r(&self) -> Request {
        Request::new(Arc::clone(&self.state))
    }

    /// Alias of [`r`](Self::r).
    pub fn new_request(&self) -> Request {
        self.r()
    }

    // ------------------------------------------------------------------
    // URL
    // ------------------------------------------------------------------

    /// Prefix for relative request URLs; trailing `/` are trimmed.
    pub fn set_base_url(&mut self, base_url: &str) -> &mut Self {
        self.state_mut().base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Scheme used for URLs given without one; a blank value is ignored.
    pub fn set_scheme(&mut self, scheme: &str) -> &mut Self {
        let scheme = scheme.trim();
        if !scheme.is_empty() {
            self.state_mut().scheme = scheme.to_ascii_lowercase();
        }
        self
    }

    /// Set a `{name}` path parameter for every request.
    pub fn set_common_path_param(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.state_mut().path_params.insert(name.into(), value.into());
        self
    }

    /// Set several common path parameters.
    pub fn set_common_path_params<K, V>(
        &mut self,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.state_mut()
            .path_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Set a common query parameter, replacing the values of `key`.
    pub fn set_common_query_param(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        replace_pair(&mut self.state_mut().query_params, key.into(), value.into());
        self
    }

    /// Set several common query parameters.
    pub fn set_common_query_params<K, V>(
        &mut self,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let query_params = &mut self.state_mut().query_params;
        for (key, value) in params {
            replace_pair(query_params, key.into(), value.into());
        }
        self
    }

    /// Add a common query parameter value, keeping existing values.
    pub fn add_common_query_param(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.state_mut()
            .query_params
            .push((key.into(), value.into()));
        self
    }

    /// Set common query parameters from a raw query string.
    pub fn set_common_query_string(&mut self, query: &str) -> &mut Self {
        match parse_query_string(query) {
            Ok(pairs) => {
                self.set_common_query_params(pairs);
            }
            Err(err) => self.warn("invalid common query string", &err),
        }
        self
    }

    // ------------------------------------------------------------------
    // Headers, cookies and form data
    // ------------------------------------------------------------------

    /// Set a header sent with every request.
    pub fn set_common_header(&mut self, name: &str, value: &str) -> &mut Self {
        match header_pair(name, value) {
            Ok((name, value)) => {
                self.state_mut().headers.insert(name, value);
            }
            Err(err) => self.warn("invalid common header", &err),
        }
        self
    }

    /// Set several common headers.
    pub fn set_common_headers<'a>(
        &mut self,
        headers: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> &mut Self {
        for (name, value) in headers {
            self.set_common_header(name, value);
        }
        self
    }

    /// Set the default `Content-Type`.
    pub fn set_common_content_type(&mut self, content_type: &str) -> &mut Self {
        self.set_common_header(CONTENT_TYPE.as_str(), content_type)
    }

    /// Set the `User-Agent`.
    pub fn set_user_agent(&mut self, user_agent: &str) -> &mut Self {
        self.set_common_header(USER_AGENT.as_str(), user_agent)
    }

    /// Authenticate every request with a bearer token.
    pub fn set_common_bearer_auth_token(&mut self, token: &str) -> &mut Self {
        self.set_common_header(AUTHORIZATION.as_str(), &format!("Bearer {token}"))
    }

    /// Authenticate every request with HTTP basic credentials.
    pub fn set_common_basic_auth(&mut self, username: &str, password: &str) -> &mut Self {
        self.set_common_header(AUTHORIZATION.as_str(), &basic_auth(username, password))
    }

    /// Add cookies sent with every request.
    pub fn set_common_cookies(
        &mut self,
        cookies: impl IntoIterator<Item = Cookie<'static>>,
    ) -> &mut Self {
        self.state_mut().cookies.extend(cookies);
        self
    }

    /// Set common form fields, each replacing the values of its key.
    pub fn set_common_form_data<K, V>(
        &mut self,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let form_data = &mut self.state_mut().form_data;
        for (key, value) in fields {
            replace_pair(form_data, key.into(), value.into());
        }
        self
    }

    /// Add a common form field value, keeping existing values.
    pub fn add_common_form_data(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.state_mut().form_data.push((key.into(), value.into()));
        self
    }

    // ------------------------------------------------------------------
    // Behaviour
    // ------------------------------------------------------------------

    /// Log every dispatch and redirect through the client logger.
    pub fn enable_debug_log(&mut self, enable: bool) -> &mut Self {
        self.state_mut().debug_log = enable;
        self
    }

    /// Record timings for every call.
    pub fn enable_trace_all(&mut self, enable: bool) -> &mut Self {
        self.state_mut().trace_all = enable;
        self
    }

    /// Dump everything, log, trace, and pose as a browser.
    pub fn dev_mode(&mut self) -> &mut Self {
        self.enable_dump_all()
            .enable_debug_log(true)
            .enable_trace_all(true)
            .set_user_agent(BROWSER_USER_AGENT)
    }

    /// Let GET requests carry a body.
    pub fn enable_allow_get_method_payload(&mut self, allow: bool) -> &mut Self {
        self.state_mut().allow_get_method_payload = allow;
        self
    }

    /// Return responses with their body unread.
    pub fn disable_auto_read_response(&mut self) -> &mut Self {
        self.state_mut().disable_auto_read_response = true;
        self
    }

    /// Buffer response bodies before returning (the default).
    pub fn enable_auto_read_response(&mut self) -> &mut Self {
        self.state_mut().disable_auto_read_response = false;
        self
    }

    /// Directory for relative download paths.
    pub fn set_output_directory(&mut self, directory: impl Into<PathBuf>) -> &mut Self {
        self.state_mut().output_directory = Some(directory.into());
        self
    }

    /// Deadline of a call, covering the exchange and the body read.
    ///
    /// A zero duration disables the deadline.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.state_mut().timeout = timeout;
        self
    }

    // ------------------------------------------------------------------
    // Response decoding
    // ------------------------------------------------------------------

    /// Decode content types containing one of `keywords`.
    pub fn set_auto_decode_content_type<S: Into<String>>(
        &mut self,
        keywords: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.set_auto_decode_predicate(ContentTypeKeywords::new(keywords))
    }

    /// Decode every content type.
    pub fn set_auto_decode_all_content_type(&mut self) -> &mut Self {
        self.set_auto_decode_predicate(AnyContentType)
    }

    /// Decide per content type with `predicate`.
    pub fn set_auto_decode_predicate(
        &mut self,
        predicate: impl ContentTypePredicate + 'static,
    ) -> &mut Self {
        let options = &mut self.state_mut().response_options;
        options.auto_decode = Arc::new(predicate);
        options.disable_auto_decode = false;
        self
    }

    /// Leave response bodies in their original charset.
    pub fn disable_auto_decode(&mut self, disable: bool) -> &mut Self {
        self.state_mut().response_options.disable_auto_decode = disable;
        self
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Replace the transport; an active dump moves to the new transport.
    pub fn set_transport(&mut self, transport: impl Transport + 'static) -> &mut Self {
        let mut transport: Box<dyn Transport> = Box::new(transport);
        transport.set_dumper(self.transport().dumper().cloned());
        self.state_mut().transport = Arc::new(TransportSlot(transport));
        self
    }

    /// Get or create the TLS configuration of the transport.
    pub fn tls_config_mut(&mut self) -> &mut TlsConfig {
        self.transport_mut().config_mut().tls_mut()
    }

    /// Replace the TLS configuration.
    pub fn set_tls_config(&mut self, tls: TlsConfig) -> &mut Self {
        self.transport_mut().config_mut().tls = Some(tls);
        self
    }

    /// Trust the root certificates of a PEM string.
    pub fn set_root_cert_from_string(&mut self, pem: &str) -> &mut Self {
        self.update_tls("invalid root certificate", |tls| {
            tls.add_root_certs_pem(pem.as_bytes()).map(drop)
        })
    }

    /// Trust the root certificates of PEM files.
    pub fn set_root_certs_from_file<P: AsRef<Path>>(
        &mut self,
        files: impl IntoIterator<Item = P>,
    ) -> &mut Self {
        self.update_tls("invalid root certificate file", |tls| {
            for file in files {
                let pem = std::fs::read(file.as_ref())?;
                tls.add_root_certs_pem(&pem)?;
            }
            Ok(())
        })
    }

    /// Present the client certificate and key of PEM files.
    pub fn set_cert_from_file(
        &mut self,
        cert_file: impl AsRef<Path>,
        key_file: impl AsRef<Path>,
    ) -> &mut Self {
        match ClientAuth::from_pem_files(cert_file, key_file) {
            Ok(auth) => self.set_certs(auth),
            Err(err) => {
                self.warn("invalid client certificate", &err);
                self
            }
        }
    }

    /// Present a client certificate.
    pub fn set_certs(&mut self, auth: ClientAuth) -> &mut Self {
        self.tls_config_mut().set_client_auth(auth);
        self
    }

    /// Apply `update` to a copy of the TLS configuration, keeping it on success.
    fn update_tls(
        &mut self,
        what: &str,
        update: impl FnOnce(&mut TlsConfig) -> Result<()>,
    ) -> &mut Self {
        let mut tls = self.transport().config().tls.clone().unwrap_or_default();
        match update(&mut tls) {
            Ok(()) => self.set_tls_config(tls),
            Err(err) => {
                self.warn(what, &err);
                self
            }
        }
    }

    /// Route connections through proxies picked by `resolver`.
    pub fn set_proxy(&mut self, resolver: impl ProxyResolver + 'static) -> &mut Self {
        self.transport_mut().config_mut().proxy = Some(Arc::new(resolver));
        self
    }

    /// Route every connection through `proxy_url`.
    pub fn set_proxy_url(&mut self, proxy_url: &str) -> &mut Self {
        match FixedProxy::parse(proxy_url) {
            Ok(proxy) => self.set_proxy(proxy),
            Err(err) => {
                self.warn("invalid proxy url", &err);
                self
            }
        }
    }

    /// Close connections after each exchange.
    pub fn disable_keep_alives(&mut self, disable: bool) -> &mut Self {
        self.transport_mut().config_mut().disable_keep_alives = disable;
        self
    }

    /// Stop asking for compressed responses.
    pub fn disable_compression(&mut self, disable: bool) -> &mut Self {
        self.transport_mut().config_mut().disable_compression = disable;
        self
    }

    /// How long an idle pooled connection is kept.
    pub fn set_idle_conn_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.transport_mut().config_mut().pool_idle_timeout = timeout;
        self
    }

    /// Maximum idle pooled connections per host.
    pub fn set_max_idle_conns_per_host(&mut self, count: usize) -> &mut Self {
        self.transport_mut().config_mut().pool_idle_per_host = count;
        self
    }

    /// Connection establishment timeout.
    pub fn set_connect_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.transport_mut().config_mut().connect_timeout = timeout;
        self
    }

    // ------------------------------------------------------------------
    // Redirects, cookie jar, codecs and logger
    // ------------------------------------------------------------------

    /// Replace the redirect policies with `policy`.
    pub fn set_redirect_policy(&mut self, policy: impl RedirectPolicy + 'static) -> &mut Self {
        self.state_mut().redirect_policies = vec![Arc::new(policy)];
        self
    }

    /// Add a redirect policy, checked after the existing ones.
    pub fn add_redirect_policy(&mut self, policy: impl RedirectPolicy + 'static) -> &mut Self {
        self.state_mut().redirect_policies.push(Arc::new(policy));
        self
    }

    /// Use `jar`, or no jar at all.
    pub fn set_cookie_jar(&mut self, jar: Option<Arc<dyn CookieJar>>) -> &mut Self {
        self.state_mut().jar = jar;
        self
    }

    /// Encode JSON bodies with `marshal`.
    pub fn set_json_marshal(&mut self, marshal: impl Marshal + 'static) -> &mut Self {
        self.state_mut().json_marshal = Arc::new(marshal);
        self
    }

    /// Decode JSON bodies with `unmarshal`.
    pub fn set_json_unmarshal(&mut self, unmarshal: impl Unmarshal + 'static) -> &mut Self {
        self.state_mut().json_unmarshal = Arc::new(unmarshal);
        self
    }

    /// Encode XML bodies with `marshal`.
    pub fn set_xml_marshal(&mut self, marshal: impl Marshal + 'static) -> &mut Self {
        self.state_mut().xml_marshal = Arc::new(marshal);
        self
    }

    /// Decode XML bodies with `unmarshal`.
    pub fn set_xml_unmarshal(&mut self, unmarshal: impl Unmarshal + 'static) -> &mut Self {
        self.state_mut().xml_unmarshal = Arc::new(unmarshal);
        self
    }

    /// Use `logger`; `None` silences the client.
    pub fn set_logger(&mut self, logger: Option<Arc<dyn Logger>>) -> &mut Self {
        self.state_mut().log = logger.unwrap_or_else(|| Arc::new(DisabledLogger));
        self
    }

    // ------------------------------------------------------------------
    // Dump
    // ------------------------------------------------------------------

    fn install_dumper(&mut self) -> &mut Self {
        let state = self.state_mut();
        let options = *state.dump_options.get_or_insert_with(DumpOptions::all);
        let sink = state.dump_sink.get_or_insert_with(DumpSink::stdout).clone();
        self.transport_mut()
            .set_dumper(Some(Dumper::new(options, sink)));
        self
    }

    fn enable_dump_with(&mut self, options: DumpOptions) -> &mut Self {
        self.state_mut().dump_options = Some(options);
        self.install_dumper()
    }

    /// Turn the wire dump on (stdout unless a sink was set) or off.
    pub fn enable_dump(&mut self, enable: bool) -> &mut Self {
        if enable {
            self.install_dumper()
        } else {
            self.transport_mut().set_dumper(None);
            self
        }
    }

    /// Dump to `writer`.
    pub fn enable_dump_to(&mut self, writer: impl Write + Send + 'static) -> &mut Self {
        self.state_mut().dump_sink = Some(DumpSink::writer(writer));
        self.install_dumper()
    }

    /// Dump to a file, created or truncated.
    pub fn enable_dump_to_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        match DumpSink::file(path) {
            Ok(sink) => {
                self.state_mut().dump_sink = Some(sink);
                self.install_dumper()
            }
            Err(err) => {
                self.warn("cannot create dump file", &err);
                self
            }
        }
    }

    /// Write the dump from a background thread.
    pub fn enable_dump_async(&mut self) -> &mut Self {
        let state = self.state_mut();
        let sink = state
            .dump_sink
            .take()
            .unwrap_or_else(DumpSink::stdout)
            .into_async(DEFAULT_DUMP_QUEUE_CAPACITY);
        state.dump_sink = Some(sink);
        self.install_dumper()
    }

    /// Dump both directions, heads and bodies.
    pub fn enable_dump_all(&mut self) -> &mut Self {
        self.enable_dump_with(DumpOptions::all())
    }

    /// Dump requests only.
    pub fn enable_dump_only_request(&mut self) -> &mut Self {
        self.enable_dump_with(DumpOptions::only_request())
    }

    /// Dump responses only.
    pub fn enable_dump_only_response(&mut self) -> &mut Self {
        self.enable_dump_with(DumpOptions::only_response())
    }

    /// Dump heads only.
    pub fn enable_dump_only_header(&mut self) -> &mut Self {
        self.enable_dump_with(DumpOptions::only_header())
    }

    /// Dump bodies only.
    pub fn enable_dump_only_body(&mut self) -> &mut Self {
        self.enable_dump_with(DumpOptions::only_body())
    }

    /// Dump everything but request bodies.
    pub fn enable_dump_no_request_body(&mut self) -> &mut Self {
        self.enable_dump_with(DumpOptions::no_request_body())
    }

    /// Dump everything but response bodies.
    pub fn enable_dump_no_response_body(&mut self) -> &mut Self {
        self.enable_dump_with(DumpOptions::no_response_body())
    }

    /// Set what is dumped; an active dump picks the change up.
    pub fn set_dump_options(&mut self, options: DumpOptions) -> &mut Self {
        self.state_mut().dump_options = Some(options);
        if self.is_dump_enabled() {
            self.install_dumper();
        }
        self
    }

    /// Get or create the dump options.
    ///
    /// Changes apply the next time dump is enabled.
    pub fn dump_options_mut(&mut self) -> &mut DumpOptions {
        self.state_mut()
            .dump_options
            .get_or_insert_with(DumpOptions::all)
    }

    // ------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------

    /// Run `stage` on every request before the built-in request stages.
    pub fn on_before_request<F>(&mut self, stage: F) -> &mut Self
    where
        F: Fn(&Self, &mut Request) -> Result<()> + Send + Sync + 'static,
    {
        self.on_before_request_stage(stage)
    }

    /// Register a request stage.
    pub fn on_before_request_stage(&mut self, stage: impl RequestStage + 'static) -> &mut Self {
        self.state_mut().before_request.push(Arc::new(stage));
        self
    }

    /// Run `stage` on every response after the built-in response stages.
    pub fn on_after_response<F>(&mut self, stage: F) -> &mut Self
    where
        F: Fn(&Self, &mut Response) -> Result<()> + Send + Sync + 'static,
    {
        self.on_after_response_stage(stage)
    }

    /// Register a response stage.
    pub fn on_after_response_stage(&mut self, stage: impl ResponseStage + 'static) -> &mut Self {
        self.state_mut().after_response.push(Arc::new(stage));
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.state.base_url
    }

    /// Common headers.
    #[must_use]
    pub fn common_headers(&self) -> &HeaderMap {
        &self.state.headers
    }

    /// Common query parameters.
    #[must_use]
    pub fn common_query_params(&self) -> &[(String, String)] {
        &self.state.query_params
    }

    /// Common path parameters.
    #[must_use]
    pub fn common_path_params(&self) -> &BTreeMap<String, String> {
        &self.state.path_params
    }

    /// Common cookies.
    #[must_use]
    pub fn common_cookies(&self) -> &[Cookie<'static>] {
        &self.state.cookies
    }

    /// Common form fields.
    #[must_use]
    pub fn common_form_data(&self) -> &[(String, String)] {
        &self.state.form_data
    }

    /// Call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.state.timeout
    }

    /// Response decoding options.
    #[must_use]
    pub fn response_options(&self) -> &ResponseOptions {
        &self.state.response_options
    }

    /// Cookie jar, if any.
    #[must_use]
    pub fn cookie_jar(&self) -> Option<&Arc<dyn CookieJar>> {
        self.state.jar.as_ref()
    }

    /// Current transport.
    #[must_use]
    pub fn transport(&self) -> &dyn Transport {
        self.state.transport.get()
    }

    /// Returns `true` if the wire dump is on.
    #[must_use]
    pub fn is_dump_enabled(&self) -> bool {
        self.transport().dumper().is_some()
    }

    /// Dump options, once dump was configured.
    #[must_use]
    pub fn dump_options(&self) -> Option<DumpOptions> {
        self.state.dump_options
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert2::check;
    use courier_core::NoRedirectPolicy;

    use super::*;

    #[derive(Default)]
    struct RecordingLogger(Mutex<Vec<String>>);

    impl Logger for RecordingLogger {
        fn debug(&self, _message: fmt::Arguments<'_>) {}

        fn warn(&self, message: fmt::Arguments<'_>) {
            self.0
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(message.to_string());
        }

        fn error(&self, _message: fmt::Arguments<'_>) {}
    }

    #[test]
    fn defaults() {
        let client = Client::new();
        check!(client.timeout() == DEFAULT_TIMEOUT);
        check!(client.cookie_jar().is_some());
        check!(!client.is_dump_enabled());
        check!(client.state().redirect_policies.len() == 1);
        check!(client.transport().config().pool_idle_per_host == 100);
    }

    #[test]
    fn base_url_and_scheme() {
        let mut client = Client::new();
        client.set_base_url("https://api.test/v1//").set_scheme("  ");
        check!(client.base_url() == "https://api.test/v1");
        check!(client.state().scheme.is_empty());

        client.set_scheme("HTTPS");
        check!(client.state().scheme == "https");
    }

    #[test]
    fn config_errors_are_logged_and_absorbed() {
        let logger = Arc::new(RecordingLogger::default());
        let mut client = Client::new();
        client
            .set_logger(Some(logger.clone()))
            .set_common_header("x-ok", "1")
            .set_common_header("bad header", "x")
            .set_proxy_url("not a url")
            .set_root_cert_from_string("not a pem");

        check!(client.common_headers().len() == 1);
        check!(client.transport().config().proxy.is_none());
        check!(client.transport().config().tls.is_none());

        let warnings = logger.0.lock().expect("lock").clone();
        check!(warnings.len() == 3);
        check!(warnings.first().is_some_and(|w| w.starts_with("invalid common header")));
    }

    #[test]
    fn requests_snapshot_the_state() {
        let mut client = Client::new();
        client.set_common_header("x-a", "1");
        let request = client.r();

        client.set_common_header("x-a", "2").set_timeout(Duration::from_secs(1));

        check!(request.client.headers["x-a"] == "1");
        check!(request.client.timeout == DEFAULT_TIMEOUT);
        check!(client.common_headers()["x-a"] == "2");
    }

    #[test]
    fn transport_is_shared_until_reconfigured() {
        let mut client = Client::new();
        let request = client.r();
        check!(Arc::ptr_eq(&request.client.transport, &client.state().transport));

        client.disable_keep_alives(true);
        check!(!Arc::ptr_eq(&request.client.transport, &client.state().transport));
        check!(!request.client.transport.get().config().disable_keep_alives);
        check!(client.transport().config().disable_keep_alives);
    }

    #[test]
    fn collections_do_not_alias_across_clones() {
        let mut original = Client::new();
        original
            .set_common_header("X-A", "1")
            .set_common_query_param("q", "1")
            .set_common_path_param("owner", "alice")
            .set_common_cookies([Cookie::new("session", "a")])
            .set_common_form_data([("f", "1")])
            .on_before_request(|_client: &Client, _request: &mut Request| Ok(()))
            .on_after_response(|_client: &Client, _response: &mut Response| Ok(()));

        let mut copy = original.clone();
        copy.set_common_header("X-B", "2")
            .add_common_query_param("q", "2")
            .set_common_path_param("repo", "courier")
            .set_common_cookies([Cookie::new("theme", "dark")])
            .add_common_form_data("g", "2")
            .on_before_request(|_client: &Client, _request: &mut Request| Ok(()))
            .on_after_response(|_client: &Client, _response: &mut Response| Ok(()));

        original
            .set_common_header("X-C", "3")
            .set_common_query_param("page", "1")
            .set_common_path_param("owner", "bob")
            .add_common_form_data("h", "3");

        check!(original.common_headers().len() == 2);
        check!(!original.common_headers().contains_key("x-b"));
        check!(
            original.common_query_params()
                == [
                    ("q".to_string(), "1".to_string()),
                    ("page".to_string(), "1".to_string())
                ]
        );
        check!(original.common_path_params().get("owner").map(String::as_str) == Some("bob"));
        check!(!original.common_path_params().contains_key("repo"));
        check!(original.common_cookies().len() == 1);
        check!(original.common_form_data().len() == 2);
        check!(original.state.before_request.len() == 1);
        check!(original.state.after_response.len() == 1);

        check!(copy.common_headers().len() == 2);
        check!(!copy.common_headers().contains_key("x-c"));
        check!(
            copy.common_query_params()
                == [
                    ("q".to_string(), "1".to_string()),
                    ("q".to_string(), "2".to_string())
                ]
        );
        check!(copy.common_path_params().get("owner").map(String::as_str) == Some("alice"));
        check!(copy.common_path_params().get("repo").map(String::as_str) == Some("courier"));
        check!(copy.common_cookies().len() == 2);
        check!(
            copy.common_form_data()
                == [
                    ("f".to_string(), "1".to_string()),
                    ("g".to_string(), "2".to_string())
                ]
        );
        check!(copy.state.before_request.len() == 2);
        check!(copy.state.after_response.len() == 2);
    }

    #[test]
    fn dump_is_idempotent_and_not_cloned() {
        let mut client = Client::new();
        client.enable_dump_to(Vec::new()).enable_dump(true).enable_dump_only_header();
        check!(client.is_dump_enabled());
        check!(client.dump_options() == Some(DumpOptions::only_header()));

        let clone = client.clone();
        check!(!clone.is_dump_enabled());
        check!(clone.dump_options() == Some(DumpOptions::only_header()));
        check!(clone.state().dump_sink.is_none());

        client.enable_dump(false);
        check!(!client.is_dump_enabled());
    }

    #[test]
    fn dev_mode_turns_everything_on() {
        let mut client = Client::new();
        client.dev_mode();
        check!(client.is_dump_enabled());
        check!(client.state().debug_log);
        check!(client.state().trace_all);
        check!(client.common_headers()[USER_AGENT] == BROWSER_USER_AGENT);
    }

    #[test]
    fn redirect_policies_replace_and_add() {
        let mut client = Client::new();
        client
            .set_redirect_policy(NoRedirectPolicy)
            .add_redirect_policy(MaxRedirectPolicy(3));
        check!(client.state().redirect_policies.len() == 2);
    }

    #[test]
    fn tls_config_is_created_lazily() {
        let mut client = Client::new();
        check!(client.transport().config().tls.is_none());
        let _ = client.tls_config_mut();
        check!(client.transport().config().tls.is_some());
    }
}
