//! ghpull update - self-updating for plugins and themes hosted on GitHub
//!
//! Resolves the latest release of a repository through the GitHub REST or
//! GraphQL API, compares it against the installed version and stages the
//! release archive for the host to install:
//! - [`HttpFetcher`] performs cached, timed-out HTTP requests
//! - [`ReleaseResolver`] normalizes both APIs into a [`Release`]
//! - [`ArchiveAcquirer`] downloads archives into a working directory
//! - [`UpdateOrchestrator`] ties it together for one [`ArtifactHost`]
//!
//! # Example
//!
//! ```rust,ignore
//! use ghpull_update::{RepositoryRef, UpdateOrchestrator, UpdaterConfig};
//!
//! let orchestrator = UpdateOrchestrator::from_config(host, UpdaterConfig::load())?;
//! let repo = RepositoryRef::parse("acme/widget")?;
//!
//! if let Some(decision) = orchestrator.check_slug(&repo, "widget/widget.php").await? {
//!     println!("Update available: {}", decision.new_version);
//!     orchestrator.acquire_and_install(&repo).await?;
//! }
//! ```

mod acquire;
mod config;
mod details;
mod error;
mod fetch;
mod install;
mod kind;
mod orchestrator;
mod pending;
mod registry;
mod release;
mod resolver;
mod source;
mod version;

pub use acquire::ArchiveAcquirer;
pub use config::{ResolveStrategy, UpdaterConfig};
pub use details::ArtifactDetails;
pub use error::{ErrorCode, UpdateError, UpdateResult};
pub use fetch::{Fetcher, GITHUB_ACCEPT, HttpFetcher, check_url, create_http_client, redact_url};
pub use install::{StagedArchive, normalize_source_dir};
pub use kind::{ArtifactHost, ArtifactKind, InstalledArtifact};
pub use orchestrator::{Phase, UpdateDecision, UpdateOrchestrator};
pub use pending::{CheckReport, PendingUpdates, check_all};
pub use registry::{TrackedRepo, TrackedRepos};
pub use release::{Release, file_name_from_url};
pub use resolver::{ApiVariant, ReleaseResolver, latest_release_query};
pub use source::RepositoryRef;
pub use version::{
    DottedVersion, VersionComparison, classify, compare_versions, is_update_available,
    parse_version,
};

/// Default GitHub API base URL
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default GitHub web base URL
pub const DEFAULT_WEB_BASE: &str = "https://github.com";
