//! HTTP fetcher with URL-keyed response caching.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ghpull_cache::ExpiringCache;
use reqwest::Client;
use tracing::debug;

use crate::config::UpdaterConfig;
use crate::error::{UpdateError, UpdateResult};

/// Accept header for GitHub API requests.
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Performs the network requests of the update pipeline.
///
/// Implementations return `Ok` only for HTTP 200 and map everything else to
/// [`UpdateError::HttpStatus`] or [`UpdateError::Transport`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url`. With `use_cache`, a successful body for the same URL that is
    /// still fresh is returned without a request.
    async fn get(&self, url: &str, use_cache: bool) -> UpdateResult<Bytes>;

    /// POST a JSON body. Never cached.
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> UpdateResult<Bytes>;
}

/// [`Fetcher`] backed by `reqwest`.
pub struct HttpFetcher {
    client: Client,
    cache: ExpiringCache<String, Bytes>,
    allow_insecure_http: bool,
}

impl HttpFetcher {
    /// Create a fetcher from the updater configuration.
    pub fn new(config: &UpdaterConfig) -> UpdateResult<Self> {
        let client = create_http_client(&config.user_agent, config.request_timeout())?;
        Ok(Self {
            client,
            cache: ExpiringCache::new(config.cache_capacity, config.cache_ttl()),
            allow_insecure_http: config.allow_insecure_http,
        })
    }

    /// Number of cached bodies.
    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Drop every cached body.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn check_url(&self, url: &str) -> UpdateResult<()> {
        check_url(url, self.allow_insecure_http)
    }

    async fn read_response(&self, url: &str, response: reqwest::Response) -> UpdateResult<Bytes> {
        let status = response.status();
        if status.as_u16() != 200 {
            let body = response.text().await.unwrap_or_default();
            debug!("{} returned HTTP {}", redact_url(url), status.as_u16());
            return Err(UpdateError::HttpStatus {
                url: redact_url(url),
                status: status.as_u16(),
                body,
            });
        }

        response.bytes().await.map_err(|e| transport_error(url, e))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str, use_cache: bool) -> UpdateResult<Bytes> {
        self.check_url(url)?;

        if use_cache && let Some(body) = self.cache.get(&url.to_string()) {
            debug!("Cache hit for {}", redact_url(url));
            return Ok(body);
        }

        debug!("GET {}", redact_url(url));
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept_for(url))
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let body = self.read_response(url, response).await?;

        if use_cache {
            self.cache.insert(url.to_string(), body.clone());
        }

        Ok(body)
    }

    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &serde_json::Value,
    ) -> UpdateResult<Bytes> {
        self.check_url(url)?;

        debug!("POST {}", redact_url(url));
        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        self.read_response(url, response).await
    }
}

/// Create an HTTP client with proper configuration.
pub fn create_http_client(user_agent: &str, timeout: Duration) -> UpdateResult<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .tcp_nodelay(true)
        .build()
        .map_err(|e| UpdateError::Config {
            message: format!("Failed to build HTTP client: {}", e),
        })
}

/// Reject anything that isn't a well-formed `https` URL (or `http` when
/// explicitly allowed).
pub fn check_url(url: &str, allow_insecure_http: bool) -> UpdateResult<()> {
    let parsed = url::Url::parse(url).map_err(|e| UpdateError::InvalidUrl {
        url: redact_url(url),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if allow_insecure_http => Ok(()),
        scheme => Err(UpdateError::InvalidUrl {
            url: redact_url(url),
            reason: format!("scheme '{scheme}' is not allowed, use https"),
        }),
    }
}

/// Replace the value of any `access_token` query parameter so URLs can be
/// logged and reported.
pub fn redact_url(url: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.query_pairs().any(|(k, _)| k == "access_token") {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "access_token" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.to_string()
}

/// reqwest renders the request URL into its messages; the URL is dropped so
/// query tokens never reach the error text.
fn transport_error(url: &str, err: reqwest::Error) -> UpdateError {
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {}", err.without_url())
    } else {
        err.without_url().to_string()
    };
    UpdateError::Transport {
        url: redact_url(url),
        message,
    }
}

fn accept_for(url: &str) -> &'static str {
    if url.contains("/repos/") {
        GITHUB_ACCEPT
    } else {
        "*/*"
    }
}
