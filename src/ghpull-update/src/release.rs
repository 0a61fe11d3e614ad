//! Canonical release record and the GitHub wire formats it is built from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::source::RepositoryRef;

/// A release normalized from either GitHub API.
///
/// An empty release (see [`Release::is_empty`]) means the repository has no
/// published release; it is not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    /// Repository owner the release belongs to
    pub owner: String,
    /// Repository name the release belongs to
    pub repo: String,
    pub tag_name: String,
    pub html_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_prerelease: bool,
    /// Release notes as delivered by the API (Markdown or HTML)
    pub description_markup: String,
    /// Download URL of the attached asset, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_asset_url: Option<String>,
    /// File name the archive is staged under
    pub download_file_name: String,
    pub author_login: String,
    pub author_url: String,
}

impl Release {
    /// The "no release available" value for a repository.
    pub fn empty(repo: &RepositoryRef) -> Self {
        Self {
            owner: repo.owner().to_string(),
            repo: repo.name().to_string(),
            download_file_name: default_file_name(repo.name()),
            ..Default::default()
        }
    }

    /// True when there is neither a tag nor an asset to download.
    pub fn is_empty(&self) -> bool {
        self.tag_name.is_empty() && self.download_asset_url.is_none()
    }

    pub(crate) fn from_rest(repo: &RepositoryRef, wire: RestRelease) -> Self {
        let download_asset_url = wire
            .assets
            .into_iter()
            .next()
            .map(|asset| asset.browser_download_url)
            .filter(|url| !url.is_empty());

        let download_file_name = download_asset_url
            .as_deref()
            .and_then(file_name_from_url)
            .unwrap_or_else(|| default_file_name(repo.name()));

        let author = wire.author.unwrap_or_default();

        Self {
            owner: repo.owner().to_string(),
            repo: repo.name().to_string(),
            tag_name: wire.tag_name.unwrap_or_default(),
            html_url: wire.html_url.unwrap_or_default(),
            published_at: wire.published_at,
            updated_at: wire.updated_at,
            is_prerelease: wire.prerelease,
            description_markup: wire.body.unwrap_or_default(),
            download_asset_url,
            download_file_name,
            author_login: author.login,
            author_url: author.html_url,
        }
    }

    pub(crate) fn from_graphql(repo: &RepositoryRef, node: GraphqlReleaseNode) -> Self {
        let download_asset_url = node
            .release_assets
            .and_then(|assets| assets.nodes.into_iter().next())
            .map(|asset| asset.url)
            .filter(|url| !url.is_empty());

        let author = node.author.unwrap_or_default();

        Self {
            owner: repo.owner().to_string(),
            repo: repo.name().to_string(),
            tag_name: node.tag_name,
            html_url: node.url,
            published_at: node.published_at,
            updated_at: node.updated_at,
            is_prerelease: node.is_prerelease,
            description_markup: node.description_html.unwrap_or_default(),
            download_asset_url,
            // The GraphQL asset URL is a redirect without a usable file name.
            download_file_name: default_file_name(repo.name()),
            author_login: author.login,
            author_url: author.url,
        }
    }
}

/// `<repo>.zip`
pub(crate) fn default_file_name(repo: &str) -> String {
    format!("{repo}.zip")
}

/// Last path segment of a URL with any query string or fragment removed.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let name = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    let name = urlencoding::decode(name).ok()?;
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return None;
    }
    Some(name.into_owned())
}

// ============================================================================
// REST wire format
// ============================================================================

/// `GET /repos/{owner}/{repo}/releases/latest` response. Does not contain all fields.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RestRelease {
    #[serde(default)]
    pub tag_name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Option<RestAuthor>,
    #[serde(default)]
    pub assets: Vec<RestAsset>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RestAuthor {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RestAsset {
    #[serde(default)]
    pub browser_download_url: String,
}

// ============================================================================
// GraphQL wire format
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<GraphqlData>,
    #[serde(default)]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlError {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlData {
    pub repository: Option<GraphqlRepository>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlRepository {
    pub releases: GraphqlReleases,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlReleases {
    #[serde(default)]
    pub edges: Vec<GraphqlEdge>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlEdge {
    pub node: GraphqlReleaseNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphqlReleaseNode {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tag_name: String,
    #[serde(default)]
    pub is_prerelease: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "descriptionHTML")]
    pub description_html: Option<String>,
    #[serde(default)]
    pub author: Option<GraphqlAuthor>,
    #[serde(default)]
    pub release_assets: Option<GraphqlAssets>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GraphqlAuthor {
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlAssets {
    #[serde(default)]
    pub nodes: Vec<GraphqlAsset>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphqlAsset {
    #[serde(default)]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> RepositoryRef {
        RepositoryRef::new("acme", "widget").unwrap()
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://github.com/acme/widget/releases/download/1.1.0/widget-1.1.0.zip"),
            Some("widget-1.1.0.zip".to_string())
        );
        assert_eq!(
            file_name_from_url("https://objects.example.com/widget.zip?X-Amz-Signature=abc&x=1"),
            Some("widget.zip".to_string())
        );
        assert_eq!(
            file_name_from_url("https://example.com/dl/my%20widget.zip"),
            Some("my widget.zip".to_string())
        );
        assert_eq!(file_name_from_url("https://example.com/"), None);
        assert_eq!(file_name_from_url("not a url"), None);
    }

    #[test]
    fn test_from_rest_maps_fields() {
        let wire: RestRelease = serde_json::from_value(serde_json::json!({
            "tag_name": "1.1.0",
            "html_url": "https://github.com/acme/widget/releases/tag/1.1.0",
            "published_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-02T10:00:00Z",
            "prerelease": false,
            "body": "* Fixed things",
            "author": { "login": "octo", "html_url": "https://github.com/octo" },
            "assets": [
                { "browser_download_url": "https://github.com/acme/widget/releases/download/1.1.0/widget-1.1.0.zip" },
                { "browser_download_url": "https://github.com/acme/widget/releases/download/1.1.0/other.zip" }
            ]
        }))
        .unwrap();

        let release = Release::from_rest(&widget(), wire);
        assert_eq!(release.tag_name, "1.1.0");
        assert_eq!(release.download_file_name, "widget-1.1.0.zip");
        assert_eq!(release.author_login, "octo");
        assert_eq!(release.author_url, "https://github.com/octo");
        assert_eq!(release.description_markup, "* Fixed things");
        assert!(release.published_at.is_some());
        assert!(!release.is_empty());
    }

    #[test]
    fn test_from_rest_without_assets() {
        let wire: RestRelease =
            serde_json::from_value(serde_json::json!({ "tag_name": "2.0.0" })).unwrap();
        let release = Release::from_rest(&widget(), wire);
        assert_eq!(release.download_asset_url, None);
        assert_eq!(release.download_file_name, "widget.zip");
        assert!(!release.is_empty());
    }

    #[test]
    fn test_empty_release() {
        let release = Release::empty(&widget());
        assert!(release.is_empty());
        assert_eq!(release.owner, "acme");
        assert_eq!(release.repo, "widget");
    }

    #[test]
    fn test_from_graphql_uses_repo_file_name() {
        let node: GraphqlReleaseNode = serde_json::from_value(serde_json::json!({
            "url": "https://github.com/acme/widget/releases/tag/v3.0.0",
            "tagName": "v3.0.0",
            "isPrerelease": true,
            "publishedAt": "2024-05-01T00:00:00Z",
            "updatedAt": "2024-05-01T00:00:00Z",
            "descriptionHTML": "<p>notes</p>",
            "author": { "login": "octo", "url": "https://github.com/octo" },
            "releaseAssets": { "nodes": [ { "url": "https://github.com/acme/widget/releases/download/v3.0.0/build.zip" } ] }
        }))
        .unwrap();

        let release = Release::from_graphql(&widget(), node);
        assert_eq!(release.tag_name, "v3.0.0");
        assert!(release.is_prerelease);
        assert_eq!(release.download_file_name, "widget.zip");
        assert_eq!(release.description_markup, "<p>notes</p>");
        assert_eq!(
            release.download_asset_url.as_deref(),
            Some("https://github.com/acme/widget/releases/download/v3.0.0/build.zip")
        );
    }
}
