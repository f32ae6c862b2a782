use std::sync::Arc;
use std::time::Duration;

use crawl_logging::crawl_debug;
use parking_lot::RwLock;
use reqwest::header::HeaderMap;

use crate::{
    CallArgs, ClientSettings, Cookie, DirectClient, HttpError, Method, ProxiedClient, ProxyConfig,
    Response, TransportClient,
};

/// Floor applied to every request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Optional configuration accepted by [`RequestBuilder::with_options`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: Option<HeaderMap>,
    pub cookie: Option<Cookie>,
    pub timeout: Option<Duration>,
    /// Routes the request through a [`ProxiedClient`] instead of a direct one.
    pub proxy: Option<ProxyConfig>,
    pub query: Vec<(String, String)>,
    pub client_settings: ClientSettings,
}

#[derive(Debug, Default)]
struct RequestState {
    headers: HeaderMap,
    cookie: Option<Cookie>,
    method: Option<Method>,
    timeout: Duration,
    json: String,
    query: Vec<(String, String)>,
}

/// Accumulates the parameters of one outbound call and dispatches it through
/// its bound transport.
///
/// Every setter takes the builder's own lock. Header and timeout setters also
/// forward the value to the transport, which takes its separate lock while the
/// builder lock is still held; the transport never calls back into the builder.
pub struct RequestBuilder {
    url: String,
    state: RwLock<RequestState>,
    client: Arc<dyn TransportClient>,
}

impl RequestBuilder {
    /// Builder bound to a fresh [`DirectClient`].
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        let client = DirectClient::new()?;
        Ok(Self::with_client(url, Arc::new(client)))
    }

    /// Builder bound to a transport the caller may share.
    pub fn with_client(url: impl Into<String>, client: Arc<dyn TransportClient>) -> Self {
        Self {
            url: url.into(),
            state: RwLock::new(RequestState::default()),
            client,
        }
    }

    /// Builder configured from `options`.
    ///
    /// The transport is chosen first so headers and timeout always land on
    /// the client that will carry the request.
    pub fn with_options(url: impl Into<String>, options: RequestOptions) -> Result<Self, HttpError> {
        let client: Arc<dyn TransportClient> = match &options.proxy {
            Some(proxy) => Arc::new(ProxiedClient::with_settings(proxy, &options.client_settings)?),
            None => Arc::new(DirectClient::with_settings(&options.client_settings)?),
        };
        let builder = Self::with_client(url, client);

        if let Some(headers) = options.headers {
            builder.set_header(headers);
        }
        if let Some(cookie) = options.cookie {
            builder.set_cookies(cookie);
        }
        if let Some(timeout) = options.timeout {
            builder.set_timeout(timeout);
        }
        if !options.query.is_empty() {
            builder.set_query(options.query);
        }
        Ok(builder)
    }

    pub fn json(&self, body: impl Into<String>) -> &Self {
        self.state.write().json = body.into();
        self
    }

    pub fn set_method(&self, method: Method) -> &Self {
        self.state.write().method = Some(method);
        self
    }

    pub fn set_timeout(&self, timeout: Duration) -> &Self {
        let mut state = self.state.write();
        state.timeout = timeout;
        self.client.set_timeout(timeout);
        drop(state);
        self
    }

    pub fn set_header(&self, headers: HeaderMap) -> &Self {
        let mut state = self.state.write();
        self.client.set_headers(&headers);
        state.headers = headers;
        drop(state);
        self
    }

    pub fn set_cookies(&self, cookie: Cookie) -> &Self {
        self.state.write().cookie = Some(cookie);
        self
    }

    pub fn set_query(&self, query: Vec<(String, String)>) -> &Self {
        self.state.write().query = query;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn client(&self) -> &Arc<dyn TransportClient> {
        &self.client
    }

    /// Configured method, `None` until set or until the first dispatch.
    pub fn method(&self) -> Option<Method> {
        self.state.read().method
    }

    pub fn headers(&self) -> HeaderMap {
        self.state.read().headers.clone()
    }

    pub fn cookie(&self) -> Option<Cookie> {
        self.state.read().cookie.clone()
    }

    /// Timeout that [`send`](Self::send) will apply: the configured value, but
    /// never less than [`DEFAULT_TIMEOUT`].
    pub fn effective_timeout(&self) -> Duration {
        self.state.read().timeout.max(DEFAULT_TIMEOUT)
    }

    /// Dispatch the request.
    ///
    /// The method defaults to GET. Transport failures are returned unchanged;
    /// `Post` is rejected with [`HttpError::UnsupportedMethod`] before the
    /// transport is touched.
    pub fn send(&self) -> Result<Response, HttpError> {
        let (method, timeout, body, args) = {
            let mut state = self.state.write();
            let method = *state.method.get_or_insert(Method::Get);
            let args = CallArgs {
                query: state.query.clone(),
                cookie: state.cookie.clone(),
            };
            (
                method,
                state.timeout.max(DEFAULT_TIMEOUT),
                state.json.clone(),
                args,
            )
        };

        match method {
            Method::Get => {
                self.apply_timeout(method, timeout);
                self.client.get(&self.url, &args)
            }
            Method::PostJson => {
                self.apply_timeout(method, timeout);
                self.client.post_json(&self.url, &body, &args)
            }
            Method::Post => Err(HttpError::UnsupportedMethod(method)),
        }
    }

    fn apply_timeout(&self, method: Method, timeout: Duration) {
        self.client.set_timeout(timeout);
        crawl_debug!(
            "dispatching {} {} via {:?} transport (timeout {:?})",
            method,
            self.url,
            self.client.kind(),
            timeout
        );
    }
}
