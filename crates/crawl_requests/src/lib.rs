//! Crawl requests: lockable transports and the per-call request builder.
mod client;
mod proxy;
mod request;
mod types;

pub use client::{ClientSettings, DirectClient, ProxiedClient, TransportClient, TransportKind};
pub use proxy::{ProxyConfig, DEFAULT_PROXY_SCHEME};
pub use request::{RequestBuilder, RequestOptions, DEFAULT_TIMEOUT};
pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use types::{headers_from_pairs, CallArgs, Cookie, HttpError, Method, Response};
