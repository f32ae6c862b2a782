use std::fmt;
use std::str::FromStr;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request method understood by [`crate::RequestBuilder::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    Get,
    /// Declared for form posts; dispatching it is rejected.
    Post,
    PostJson,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::PostJson => "post-json",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = HttpError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "post-json" => Ok(Method::PostJson),
            _ => Err(HttpError::UnknownMethod(value.to_string())),
        }
    }
}

/// A single request cookie, sent as a `Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Per-call arguments handed to a transport alongside the url.
///
/// Unlike headers and timeout these never become persistent client state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallArgs {
    pub query: Vec<(String, String)>,
    pub cookie: Option<Cookie>,
}

/// Fully read response returned by a transport call.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    /// Failure reported by the underlying transport, passed through untouched.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("failed to build http client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Credentials are deliberately left out of the message.
    #[error("invalid proxy for host {host}: {reason}")]
    InvalidProxy { host: String, reason: String },
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("request method {0} is not implemented")]
    UnsupportedMethod(Method),
    #[error("unknown request method: {0}")]
    UnknownMethod(String),
}

impl HttpError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Transport(err) if err.is_timeout())
    }
}

/// Build a header map from string pairs; later duplicates replace earlier ones.
pub fn headers_from_pairs<K, V>(pairs: &[(K, V)]) -> Result<HeaderMap, HttpError>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        let name = HeaderName::from_bytes(key.as_ref().as_bytes())
            .map_err(|err| HttpError::InvalidHeader(format!("{}: {}", key.as_ref(), err)))?;
        let value = HeaderValue::from_str(value.as_ref())
            .map_err(|err| HttpError::InvalidHeader(format!("{}: {}", key.as_ref(), err)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
