use std::time::Duration;

use anyhow::{Context, Result};
use moka::future::Cache;
use reqwest::{StatusCode, Url};

use crate::config::types::BackendConfig;

use super::error::FetchError;

/// HTTP client for the dashboard backend, with an optional TTL cache for
/// responses that are safe to reuse (repository search, workflow lists).
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    cache: Option<Cache<String, String>>,
}

/// How a single GET should interact with the response cache.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum CacheMode {
    /// Never read or write the cache.
    Bypass,
    /// Serve from the cache when possible.
    Use,
    /// Skip the cached entry but store the fresh response.
    Refresh,
}

impl CacheMode {
    pub(super) fn cached(force: bool) -> Self {
        if force { Self::Refresh } else { Self::Use }
    }
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .with_context(|| format!("parsing backend URL {:?}", config.base_url))?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "backend URL {:?} cannot carry a path",
            config.base_url
        );

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .user_agent(concat!("actions-board/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;

        let cache = (config.cache_ttl_secs > 0).then(|| {
            Cache::builder()
                .max_capacity(500)
                .time_to_live(Duration::from_secs(config.cache_ttl_secs))
                .build()
        });

        Ok(Self {
            http,
            base_url,
            cache,
        })
    }

    /// Build `<base>/<segments...>`, percent-encoding each segment.
    pub(super) fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET `url` and return the body of a 2xx response.
    ///
    /// A 404 maps to `not_found()`; other non-2xx statuses to
    /// `FetchError::Http`; transport timeouts to a `TimedOut` cancellation.
    pub(super) async fn get_text(
        &self,
        url: Url,
        mode: CacheMode,
        not_found: impl FnOnce() -> FetchError,
    ) -> Result<String, FetchError> {
        let cache = self.cache.as_ref().filter(|_| mode != CacheMode::Bypass);
        let key = url.to_string();

        if mode == CacheMode::Use
            && let Some(cache) = cache
            && let Some(hit) = cache.get(&key).await
        {
            tracing::debug!("backend: cache hit {key}");
            return Ok(hit);
        }

        tracing::debug!("backend: GET {key}");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(not_found());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("backend: {key} -> {status}: {body}");
            return Err(FetchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(FetchError::from_transport)?;
        if let Some(cache) = cache {
            cache.insert(key, body.clone()).await;
        }
        Ok(body)
    }
}
