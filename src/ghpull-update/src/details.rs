//! Information card for a tracked artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kind::{ArtifactKind, InstalledArtifact};
use crate::release::Release;
use crate::source::RepositoryRef;

/// What the host shows when a user opens an artifact's details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDetails {
    pub kind: ArtifactKind,
    pub name: String,
    pub slug: String,
    pub author: String,
    pub author_url: String,
    pub homepage: String,
    /// Latest release tag, empty when the repository has no release
    pub version: String,
    pub release_url: String,
    pub last_updated: Option<DateTime<Utc>>,
    /// Release notes markup
    pub changelog: String,
    /// README contents, when the host has one on disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
    pub download_link: String,
}

impl ArtifactDetails {
    pub(crate) fn new(
        kind: ArtifactKind,
        slug: &str,
        installed: Option<&InstalledArtifact>,
        repo: &RepositoryRef,
        release: &Release,
        web_base: &str,
        download_link: String,
    ) -> Self {
        let name = installed
            .map(|a| a.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| repo.name().to_string());

        let author = if release.author_login.is_empty() {
            repo.owner().to_string()
        } else {
            release.author_login.clone()
        };

        Self {
            kind,
            name,
            slug: slug.to_string(),
            author,
            author_url: release.author_url.clone(),
            homepage: repo.homepage(web_base),
            version: release.tag_name.clone(),
            release_url: release.html_url.clone(),
            last_updated: release.updated_at.or(release.published_at),
            changelog: release.description_markup.clone(),
            readme: None,
            download_link,
        }
    }

    /// Author as HTML, linked when an http(s) profile URL is known.
    ///
    /// Both parts come from the release API and are escaped.
    pub fn author_link(&self) -> String {
        let author = escape_html(&self.author);
        let is_web_url = url::Url::parse(&self.author_url)
            .is_ok_and(|u| matches!(u.scheme(), "http" | "https"));
        if is_web_url {
            format!("<a href=\"{}\">{}</a>", escape_html(&self.author_url), author)
        } else {
            author
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
