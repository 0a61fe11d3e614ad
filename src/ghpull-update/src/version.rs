//! Version parsing and comparison.
//!
//! Release tags are free-form, so parsing is lenient about a leading `v` and
//! the number of dotted components before handing the result to `semver`.
//! A tag that isn't a dotted number is incomparable and never offered as an
//! update.

use std::cmp::Ordering;

use semver::{Prerelease, Version};

/// Result of comparing two versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComparison {
    /// Current is older than target
    Older,
    /// Current equals target
    Equal,
    /// Current is newer than target
    Newer,
    /// At least one side is not a version
    Incomparable,
}

/// A release tag read as a semantic version.
///
/// Missing components are zero, so `1.2` equals `1.2.0`. Tags with more than
/// three components keep the rest in `extra`, ordered after the patch number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DottedVersion {
    version: Version,
    extra: Vec<u64>,
}

impl DottedVersion {
    pub fn is_prerelease(&self) -> bool {
        !self.version.pre.is_empty()
    }

    /// The first three components and the pre-release as a semver version.
    pub fn semver(&self) -> &Version {
        &self.version
    }

    /// Components past the patch number, without trailing zeros.
    pub fn extra(&self) -> &[u64] {
        &self.extra
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (&self.version, &other.version);
        a.major
            .cmp(&b.major)
            .then(a.minor.cmp(&b.minor))
            .then(a.patch.cmp(&b.patch))
            // trailing zeros are trimmed, so slice order matches zero padding
            .then_with(|| self.extra.cmp(&other.extra))
            .then_with(|| a.pre.cmp(&b.pre))
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parse a version string, returning `None` if it isn't a dotted version.
pub fn parse_version(version: &str) -> Option<DottedVersion> {
    // Remove 'v' prefix if present
    let version = version.trim();
    let version = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);

    // Build metadata never affects ordering
    let version = version.split_once('+').map_or(version, |(v, _)| v);

    // Split by '-' to separate prerelease
    let (core, pre) = match version.split_once('-') {
        Some((_, "")) => return None,
        Some((core, pre)) => (core, Prerelease::new(pre).ok()?),
        None => (version, Prerelease::EMPTY),
    };

    let mut components = core
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse::<u64>().ok()
            }
        })
        .collect::<Option<Vec<_>>>()?;

    let mut extra = components.split_off(components.len().min(3));
    while extra.last() == Some(&0) {
        extra.pop();
    }
    let component = |i: usize| components.get(i).copied().unwrap_or(0);

    let mut version = Version::new(component(0), component(1), component(2));
    version.pre = pre;
    Some(DottedVersion { version, extra })
}

/// Compare two version strings; `None` when either is not a version.
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    Some(parse_version(a)?.cmp(&parse_version(b)?))
}

/// Classify `current` relative to `target`.
pub fn classify(current: &str, target: &str) -> VersionComparison {
    match compare_versions(current, target) {
        Some(Ordering::Less) => VersionComparison::Older,
        Some(Ordering::Equal) => VersionComparison::Equal,
        Some(Ordering::Greater) => VersionComparison::Newer,
        None => VersionComparison::Incomparable,
    }
}

/// True only when both strings are versions and `installed < remote_tag`.
pub fn is_update_available(installed: &str, remote_tag: &str) -> bool {
    let available = classify(installed, remote_tag) == VersionComparison::Older;
    if !available && parse_version(remote_tag).is_none() {
        tracing::debug!("Release tag '{}' is not a version, ignoring", remote_tag);
    }
    available
}
