use std::fmt;
use std::time::Duration;

use crawl_logging::{crawl_debug, crawl_warn};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, CONTENT_TYPE, COOKIE};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{CallArgs, HttpError, ProxyConfig, Response};

/// Construction-time settings shared by every transport variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Direct,
    Proxied,
}

/// Performs GET and JSON POST calls while holding persistent header and
/// timeout state.
///
/// Implementations serialize every call on one instance: a request never
/// observes headers or timeout halfway through an update.
pub trait TransportClient: Send + Sync {
    fn get(&self, url: &str, args: &CallArgs) -> Result<Response, HttpError>;

    fn post_json(&self, url: &str, body: &str, args: &CallArgs) -> Result<Response, HttpError>;

    fn set_timeout(&self, timeout: Duration);

    /// Merge `headers` into the persistent set, replacing values of existing keys.
    fn set_headers(&self, headers: &HeaderMap);

    fn kind(&self) -> TransportKind;
}

#[derive(Debug, Default)]
struct ClientState {
    timeout: Option<Duration>,
    headers: HeaderMap,
}

/// Blocking reqwest client plus the lock that guards its mutable state.
#[derive(Debug)]
struct LockedTransport {
    client: reqwest::blocking::Client,
    state: RwLock<ClientState>,
}

impl LockedTransport {
    fn build(settings: &ClientSettings, proxy: Option<reqwest::Proxy>) -> Result<Self, HttpError> {
        let mut builder =
            reqwest::blocking::Client::builder().connect_timeout(settings.connect_timeout);
        if let Some(agent) = settings.user_agent.as_deref() {
            builder = builder.user_agent(agent.to_string());
        }
        if let Some(proxy) = proxy {
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(HttpError::ClientBuild)?;
        Ok(Self {
            client,
            state: RwLock::new(ClientState::default()),
        })
    }

    fn set_timeout(&self, timeout: Duration) {
        let mut state = self.state.write();
        crawl_debug!("transport timeout set to {:?}", timeout);
        state.timeout = Some(timeout);
    }

    fn set_headers(&self, headers: &HeaderMap) {
        let mut state = self.state.write();
        for (name, value) in headers {
            state.headers.insert(name.clone(), value.clone());
        }
        crawl_debug!("transport now carries {} persistent headers", state.headers.len());
    }

    fn execute(
        &self,
        method: reqwest::Method,
        url: &str,
        json_body: Option<&str>,
        args: &CallArgs,
    ) -> Result<Response, HttpError> {
        // Held for the whole exchange, including reading the body.
        let state = self.state.write();

        let target = with_query(url, &args.query)?;
        let mut request = self
            .client
            .request(method.clone(), target.as_str())
            .headers(state.headers.clone());
        if let Some(timeout) = state.timeout {
            request = request.timeout(timeout);
        }
        if let Some(cookie) = &args.cookie {
            request = request.header(COOKIE, cookie.header_value());
        }
        if let Some(body) = json_body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        crawl_debug!("{} {}", method, target);
        let response = request.send().map_err(|err| {
            crawl_warn!("{} {} failed: {}", method, target, err);
            HttpError::Transport(err)
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.bytes().map_err(HttpError::Transport)?.to_vec();
        drop(state);

        crawl_debug!("{} {} -> {} ({} bytes)", method, target, status, body.len());
        Ok(Response {
            status,
            url: final_url,
            headers,
            body,
        })
    }
}

fn with_query(url: &str, query: &[(String, String)]) -> Result<String, HttpError> {
    if query.is_empty() {
        return Ok(url.to_string());
    }
    let mut parsed = Url::parse(url).map_err(|err| HttpError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    })?;
    parsed.query_pairs_mut().extend_pairs(query);
    Ok(parsed.into())
}

/// Transport connecting straight to the target host.
#[derive(Debug)]
pub struct DirectClient {
    inner: LockedTransport,
}

impl DirectClient {
    pub fn new() -> Result<Self, HttpError> {
        Self::with_settings(&ClientSettings::default())
    }

    pub fn with_settings(settings: &ClientSettings) -> Result<Self, HttpError> {
        Ok(Self {
            inner: LockedTransport::build(settings, None)?,
        })
    }
}

impl TransportClient for DirectClient {
    fn get(&self, url: &str, args: &CallArgs) -> Result<Response, HttpError> {
        self.inner.execute(reqwest::Method::GET, url, None, args)
    }

    fn post_json(&self, url: &str, body: &str, args: &CallArgs) -> Result<Response, HttpError> {
        self.inner
            .execute(reqwest::Method::POST, url, Some(body), args)
    }

    fn set_timeout(&self, timeout: Duration) {
        self.inner.set_timeout(timeout);
    }

    fn set_headers(&self, headers: &HeaderMap) {
        self.inner.set_headers(headers);
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Direct
    }
}

/// Transport tunnelling every request through an authenticated proxy.
pub struct ProxiedClient {
    inner: LockedTransport,
    proxy_url: String,
    host: String,
}

impl ProxiedClient {
    pub fn new(proxy: &ProxyConfig) -> Result<Self, HttpError> {
        Self::with_settings(proxy, &ClientSettings::default())
    }

    pub fn with_settings(proxy: &ProxyConfig, settings: &ClientSettings) -> Result<Self, HttpError> {
        let invalid = |reason: String| HttpError::InvalidProxy {
            host: proxy.host.clone(),
            reason,
        };

        let proxy_url = proxy.proxy_url();
        let parsed = Url::parse(&proxy_url).map_err(|err| invalid(err.to_string()))?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing proxy host".to_string()));
        }
        let tunnel = reqwest::Proxy::all(proxy_url.as_str())
            .map_err(|_| invalid("proxy url rejected by http client".to_string()))?;

        Ok(Self {
            inner: LockedTransport::build(settings, Some(tunnel))?,
            proxy_url,
            host: proxy.host.clone(),
        })
    }

    /// The exact connection string requests are tunnelled through.
    pub fn proxy_url(&self) -> &str {
        &self.proxy_url
    }
}

impl fmt::Debug for ProxiedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxiedClient")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl TransportClient for ProxiedClient {
    fn get(&self, url: &str, args: &CallArgs) -> Result<Response, HttpError> {
        self.inner.execute(reqwest::Method::GET, url, None, args)
    }

    fn post_json(&self, url: &str, body: &str, args: &CallArgs) -> Result<Response, HttpError> {
        self.inner
            .execute(reqwest::Method::POST, url, Some(body), args)
    }

    fn set_timeout(&self, timeout: Duration) {
        self.inner.set_timeout(timeout);
    }

    fn set_headers(&self, headers: &HeaderMap) {
        self.inner.set_headers(headers);
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Proxied
    }
}
