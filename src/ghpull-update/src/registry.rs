//! Slug to repository table the host persists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::UpdateResult;
use crate::kind::ArtifactKind;
use crate::source::RepositoryRef;

/// Persisted form of a tracked repository.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRepo {
    pub owner: String,
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl TrackedRepo {
    pub fn to_ref(&self) -> UpdateResult<RepositoryRef> {
        Ok(RepositoryRef::new(&self.owner, &self.repo)?.with_token(self.token.as_deref()))
    }
}

impl From<&RepositoryRef> for TrackedRepo {
    fn from(repo: &RepositoryRef) -> Self {
        Self {
            owner: repo.owner().to_string(),
            repo: repo.name().to_string(),
            token: repo.access_token().map(str::to_string),
        }
    }
}

impl std::fmt::Debug for TrackedRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedRepo")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Which repositories installed plugins and themes update from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedRepos {
    #[serde(default)]
    pub plugins: BTreeMap<String, TrackedRepo>,
    #[serde(default)]
    pub themes: BTreeMap<String, TrackedRepo>,
}

impl TrackedRepos {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: ArtifactKind) -> &BTreeMap<String, TrackedRepo> {
        match kind {
            ArtifactKind::Plugin => &self.plugins,
            ArtifactKind::Theme => &self.themes,
        }
    }

    fn table_mut(&mut self, kind: ArtifactKind) -> &mut BTreeMap<String, TrackedRepo> {
        match kind {
            ArtifactKind::Plugin => &mut self.plugins,
            ArtifactKind::Theme => &mut self.themes,
        }
    }

    /// Track `slug` against `repo`, replacing any previous entry.
    pub fn track(&mut self, kind: ArtifactKind, slug: impl Into<String>, repo: &RepositoryRef) {
        self.table_mut(kind).insert(slug.into(), TrackedRepo::from(repo));
    }

    pub fn untrack(&mut self, kind: ArtifactKind, slug: &str) -> Option<TrackedRepo> {
        self.table_mut(kind).remove(slug)
    }

    /// Repository for `slug`, or `None` if untracked or no longer valid.
    pub fn get(&self, kind: ArtifactKind, slug: &str) -> Option<RepositoryRef> {
        self.table(kind).get(slug).and_then(|t| t.to_ref().ok())
    }

    /// Every valid `(slug, repository)` pair of `kind`.
    pub fn entries(&self, kind: ArtifactKind) -> Vec<(String, RepositoryRef)> {
        self.table(kind)
            .iter()
            .filter_map(|(slug, tracked)| Some((slug.clone(), tracked.to_ref().ok()?)))
            .collect()
    }

    /// Drop entries whose artifact is no longer installed.
    ///
    /// Returns true when anything was removed and the table needs saving.
    pub fn retain_installed(
        &mut self,
        kind: ArtifactKind,
        mut is_installed: impl FnMut(&str) -> bool,
    ) -> bool {
        let table = self.table_mut(kind);
        let before = table.len();
        table.retain(|slug, _| {
            let keep = is_installed(slug);
            if !keep {
                debug!("No longer tracking {} {}", kind, slug);
            }
            keep
        });
        table.len() != before
    }
}
