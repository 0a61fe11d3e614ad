//! Aggregated update decisions for many artifacts.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::UpdateError;
use crate::kind::ArtifactHost;
use crate::orchestrator::{UpdateDecision, UpdateOrchestrator};
use crate::source::RepositoryRef;

/// Pending updates keyed by slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingUpdates {
    updates: BTreeMap<String, UpdateDecision>,
}

impl PendingUpdates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `decision` under its slug, replacing only that slug's entry.
    pub fn merge(&mut self, decision: UpdateDecision) {
        self.updates.insert(decision.slug.clone(), decision);
    }

    pub fn get(&self, slug: &str) -> Option<&UpdateDecision> {
        self.updates.get(slug)
    }

    pub fn remove(&mut self, slug: &str) -> Option<UpdateDecision> {
        self.updates.remove(slug)
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UpdateDecision> {
        self.updates.values()
    }

    /// Keep only updates whose package is served from `web_base`.
    ///
    /// Drops entries another update source added for artifacts that are
    /// tracked on GitHub.
    pub fn retain_from_host(&mut self, web_base: &str) {
        let prefix = format!("{}/", web_base.trim_end_matches('/'));
        self.updates
            .retain(|_, decision| decision.package_url.starts_with(&prefix));
    }
}

/// Result of [`check_all`].
#[derive(Debug, Default)]
pub struct CheckReport {
    pub pending: PendingUpdates,
    /// Failures by slug; a failed check never affects the others
    pub errors: BTreeMap<String, UpdateError>,
}

/// Check every `(slug, repository)` pair concurrently.
pub async fn check_all<H, I>(orchestrator: &UpdateOrchestrator<H>, targets: I) -> CheckReport
where
    H: ArtifactHost,
    I: IntoIterator<Item = (String, RepositoryRef)>,
{
    let checks = targets.into_iter().map(|(slug, repo)| async move {
        let result = orchestrator.check_slug(&repo, &slug).await;
        (slug, result)
    });

    let mut report = CheckReport::default();
    for (slug, result) in join_all(checks).await {
        match result {
            Ok(Some(decision)) => report.pending.merge(decision),
            Ok(None) => {}
            Err(e) => {
                warn!("Update check for {} failed: {}", slug, e);
                report.errors.insert(slug, e);
            }
        }
    }
    report
}
