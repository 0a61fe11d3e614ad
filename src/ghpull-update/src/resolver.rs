//! Release resolution against the GitHub REST and GraphQL APIs.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::config::{ResolveStrategy, UpdaterConfig};
use crate::error::{UpdateError, UpdateResult};
use crate::fetch::{Fetcher, redact_url};
use crate::release::{GraphqlResponse, Release, RestRelease};
use crate::source::RepositoryRef;

/// The API a single resolution goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVariant {
    /// `GET /repos/{owner}/{repo}/releases/latest`, token as query parameter
    Rest,
    /// `POST /graphql`, token as bearer header
    Graphql,
}

/// Turns a [`RepositoryRef`] into a [`Release`].
#[derive(Clone)]
pub struct ReleaseResolver {
    fetcher: Arc<dyn Fetcher>,
    api_base: String,
    strategy: ResolveStrategy,
}

impl ReleaseResolver {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &UpdaterConfig) -> Self {
        Self {
            fetcher,
            api_base: config.api_base().to_string(),
            strategy: config.strategy,
        }
    }

    /// Which API `repo` is resolved through.
    pub fn variant_for(&self, repo: &RepositoryRef) -> ApiVariant {
        match self.strategy {
            ResolveStrategy::Rest => ApiVariant::Rest,
            ResolveStrategy::Graphql => ApiVariant::Graphql,
            ResolveStrategy::Auto if repo.has_token() => ApiVariant::Graphql,
            ResolveStrategy::Auto => ApiVariant::Rest,
        }
    }

    /// Resolve the latest release of `repo`.
    ///
    /// A repository without releases yields [`Release::empty`]. Fetcher errors
    /// are returned as-is.
    pub async fn resolve(&self, repo: &RepositoryRef) -> UpdateResult<Release> {
        let release = match self.variant_for(repo) {
            ApiVariant::Rest => self.resolve_rest(repo).await?,
            ApiVariant::Graphql => self.resolve_graphql(repo).await?,
        };

        if release.is_empty() {
            info!("{} has no published release", repo);
        } else {
            info!(
                "Resolved {} to {}{}",
                repo,
                release.tag_name,
                if release.is_prerelease { " (pre-release)" } else { "" }
            );
        }
        Ok(release)
    }

    /// URL of the REST `releases/latest` resource, with the token attached
    /// as a query parameter when present.
    pub fn rest_url(&self, repo: &RepositoryRef) -> UpdateResult<String> {
        let base = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_base,
            repo.owner(),
            repo.name()
        );
        let mut url = url::Url::parse(&base).map_err(|e| UpdateError::InvalidUrl {
            url: base.clone(),
            reason: e.to_string(),
        })?;
        if let Some(token) = repo.access_token() {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        Ok(url.to_string())
    }

    /// URL of the GraphQL endpoint.
    pub fn graphql_url(&self) -> String {
        format!("{}/graphql", self.api_base)
    }

    async fn resolve_rest(&self, repo: &RepositoryRef) -> UpdateResult<Release> {
        let url = self.rest_url(repo)?;
        let body = self.fetcher.get(&url, true).await?;

        let wire: Option<RestRelease> =
            serde_json::from_slice(&body).map_err(|e| malformed(&url, e.to_string(), &body))?;

        match wire {
            Some(wire) if wire.tag_name.is_some() || !wire.assets.is_empty() => {
                Ok(Release::from_rest(repo, wire))
            }
            _ => Ok(Release::empty(repo)),
        }
    }

    async fn resolve_graphql(&self, repo: &RepositoryRef) -> UpdateResult<Release> {
        let token = repo.access_token().ok_or(UpdateError::MissingToken)?;
        let url = self.graphql_url();
        let headers = vec![("Authorization".to_string(), format!("bearer {token}"))];
        let query = serde_json::json!({ "query": latest_release_query(repo) });

        debug!("Querying latest release of {} via GraphQL", repo);
        let body = self.fetcher.post(&url, &headers, &query).await?;

        let response: GraphqlResponse =
            serde_json::from_slice(&body).map_err(|e| malformed(&url, e.to_string(), &body))?;

        let Some(data) = response.data else {
            let message = if response.errors.is_empty() {
                "response has no data".to_string()
            } else {
                response
                    .errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            };
            return Err(malformed(&url, message, &body));
        };

        let Some(repository) = data.repository else {
            return Err(malformed(&url, "repository not found".to_string(), &body));
        };

        match repository.releases.edges.into_iter().next() {
            Some(edge) => Ok(Release::from_graphql(repo, edge.node)),
            None => Ok(Release::empty(repo)),
        }
    }
}

/// GraphQL query for the newest release of `repo` and its newest asset.
pub fn latest_release_query(repo: &RepositoryRef) -> String {
    // serde_json string literals are valid GraphQL string literals
    let owner = serde_json::Value::from(repo.owner()).to_string();
    let name = serde_json::Value::from(repo.name()).to_string();
    format!(
        "query {{ repository(owner: {owner}, name: {name}) {{ \
         releases(first: 1, orderBy: {{field: CREATED_AT, direction: DESC}}) {{ \
         edges {{ node {{ url tagName isPrerelease publishedAt updatedAt descriptionHTML \
         author {{ login url }} \
         releaseAssets(last: 1) {{ nodes {{ url }} }} }} }} }} }} }}"
    )
}

fn malformed(url: &str, message: String, body: &Bytes) -> UpdateError {
    UpdateError::MalformedResponse {
        url: redact_url(url),
        message,
        body: Some(String::from_utf8_lossy(body).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Fetcher returning canned bodies and recording what was requested.
    #[derive(Default)]
    struct CannedFetcher {
        get_body: Option<&'static str>,
        post_body: Option<&'static str>,
        requests: Mutex<Vec<(String, String, Vec<(String, String)>)>>,
    }

    #[async_trait]
    impl Fetcher for CannedFetcher {
        async fn get(&self, url: &str, _use_cache: bool) -> UpdateResult<Bytes> {
            self.requests
                .lock()
                .push(("GET".to_string(), url.to_string(), Vec::new()));
            match self.get_body {
                Some(body) => Ok(Bytes::from_static(body.as_bytes())),
                None => Err(UpdateError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                    body: r#"{"message":"Not Found"}"#.to_string(),
                }),
            }
        }

        async fn post(
            &self,
            url: &str,
            headers: &[(String, String)],
            _body: &serde_json::Value,
        ) -> UpdateResult<Bytes> {
            self.requests
                .lock()
                .push(("POST".to_string(), url.to_string(), headers.to_vec()));
            Ok(Bytes::from_static(self.post_body.unwrap_or("{}").as_bytes()))
        }
    }

    fn resolver(fetcher: Arc<CannedFetcher>, strategy: ResolveStrategy) -> ReleaseResolver {
        let config = UpdaterConfig {
            strategy,
            ..Default::default()
        };
        ReleaseResolver::new(fetcher, &config)
    }

    fn widget() -> RepositoryRef {
        RepositoryRef::new("acme", "widget").unwrap()
    }

    #[test]
    fn test_variant_selection() {
        let auto = resolver(Arc::new(CannedFetcher::default()), ResolveStrategy::Auto);
        assert_eq!(auto.variant_for(&widget()), ApiVariant::Rest);
        assert_eq!(
            auto.variant_for(&widget().with_token(Some("t"))),
            ApiVariant::Graphql
        );

        let rest = resolver(Arc::new(CannedFetcher::default()), ResolveStrategy::Rest);
        assert_eq!(
            rest.variant_for(&widget().with_token(Some("t"))),
            ApiVariant::Rest
        );
    }

    #[test]
    fn test_rest_url_carries_token_as_query() {
        let rest = resolver(Arc::new(CannedFetcher::default()), ResolveStrategy::Rest);
        assert_eq!(
            rest.rest_url(&widget()).unwrap(),
            "https://api.github.com/repos/acme/widget/releases/latest"
        );
        assert_eq!(
            rest.rest_url(&widget().with_token(Some("abc"))).unwrap(),
            "https://api.github.com/repos/acme/widget/releases/latest?access_token=abc"
        );
    }

    #[test]
    fn test_query_names_repository() {
        let query = latest_release_query(&widget());
        assert!(query.contains(r#"repository(owner: "acme", name: "widget")"#));
        assert!(query.contains("releaseAssets(last: 1)"));
        assert!(query.contains("descriptionHTML"));
    }

    #[tokio::test]
    async fn test_rest_null_body_is_empty_release() {
        let fetcher = Arc::new(CannedFetcher {
            get_body: Some("null"),
            ..Default::default()
        });
        let release = resolver(fetcher, ResolveStrategy::Auto)
            .resolve(&widget())
            .await
            .unwrap();
        assert!(release.is_empty());
    }

    #[tokio::test]
    async fn test_rest_garbage_is_malformed() {
        let fetcher = Arc::new(CannedFetcher {
            get_body: Some("<html>rate limited</html>"),
            ..Default::default()
        });
        let err = resolver(fetcher, ResolveStrategy::Auto)
            .resolve(&widget())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::MalformedResponse { .. }));
        assert_eq!(err.raw_body(), Some("<html>rate limited</html>"));
    }

    #[tokio::test]
    async fn test_rest_error_passes_through() {
        let fetcher = Arc::new(CannedFetcher::default());
        let err = resolver(fetcher, ResolveStrategy::Auto)
            .resolve(&widget())
            .await
            .unwrap_err();
        match err {
            UpdateError::HttpStatus { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, r#"{"message":"Not Found"}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_graphql_sends_bearer_header_only() {
        let fetcher = Arc::new(CannedFetcher {
            post_body: Some(r#"{"data":{"repository":{"releases":{"edges":[]}}}}"#),
            ..Default::default()
        });
        let release = resolver(Arc::clone(&fetcher), ResolveStrategy::Auto)
            .resolve(&widget().with_token(Some("ghp_tok")))
            .await
            .unwrap();
        assert!(release.is_empty());

        let requests = fetcher.requests.lock();
        assert_eq!(requests.len(), 1);
        let (method, url, headers) = &requests[0];
        assert_eq!(method, "POST");
        assert_eq!(url, "https://api.github.com/graphql");
        assert!(!url.contains("access_token"));
        assert_eq!(
            headers,
            &vec![("Authorization".to_string(), "bearer ghp_tok".to_string())]
        );
    }

    #[tokio::test]
    async fn test_graphql_errors_are_malformed() {
        let fetcher = Arc::new(CannedFetcher {
            post_body: Some(r#"{"errors":[{"message":"Bad credentials"}]}"#),
            ..Default::default()
        });
        let err = resolver(fetcher, ResolveStrategy::Auto)
            .resolve(&widget().with_token(Some("bad")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Bad credentials"));
    }

    #[tokio::test]
    async fn test_forced_graphql_without_token() {
        let fetcher = Arc::new(CannedFetcher::default());
        let err = resolver(fetcher, ResolveStrategy::Graphql)
            .resolve(&widget())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::MissingToken));
    }
}
