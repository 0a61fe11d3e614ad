//! Repository references.

use std::fmt;

use crate::error::{UpdateError, UpdateResult};

/// Identifies a GitHub repository whose releases are tracked.
#[derive(Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    owner: String,
    name: String,
    access_token: Option<String>,
}

impl RepositoryRef {
    /// Create a reference from an owner and repository name.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> UpdateResult<Self> {
        let owner = owner.into();
        let name = name.into();
        if !is_valid_segment(&owner) || !is_valid_segment(&name) {
            return Err(UpdateError::InvalidRepository {
                input: format!("{owner}/{name}"),
            });
        }
        Ok(Self {
            owner,
            name,
            access_token: None,
        })
    }

    /// Attach an access token. Empty tokens are treated as absent.
    pub fn with_token(mut self, token: Option<impl Into<String>>) -> Self {
        self.access_token = token
            .map(Into::into)
            .map(|t: String| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }

    /// Parse `owner/name`, `https://github.com/owner/name[/...]` or
    /// `git@github.com:owner/name.git`.
    pub fn parse(input: &str) -> UpdateResult<Self> {
        let trimmed = input.trim();
        let path = trimmed
            .strip_prefix("https://github.com/")
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .or_else(|| trimmed.strip_prefix("git@github.com:"))
            .unwrap_or(trimmed);

        if path.contains("://") {
            return Err(UpdateError::InvalidRepository {
                input: input.to_string(),
            });
        }

        let mut segments = path.split('/');
        let owner = segments.next().unwrap_or_default();
        let name = segments.next().unwrap_or_default();
        let name = name.strip_suffix(".git").unwrap_or(name);

        Self::new(owner, name).map_err(|_| UpdateError::InvalidRepository {
            input: input.to_string(),
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Repository home page on the given web host.
    pub fn homepage(&self, web_base: &str) -> String {
        format!(
            "{}/{}/{}",
            web_base.trim_end_matches('/'),
            self.owner,
            self.name
        )
    }
}

impl fmt::Debug for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryRef")
            .field("owner", &self.owner)
            .field("name", &self.name)
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_form() {
        let repo = RepositoryRef::parse("acme/widget").unwrap();
        assert_eq!(repo.owner(), "acme");
        assert_eq!(repo.name(), "widget");
        assert!(!repo.has_token());
    }

    #[test]
    fn test_parse_web_url_with_extra_path() {
        let repo = RepositoryRef::parse("https://github.com/acme/widget/tree/main").unwrap();
        assert_eq!(repo.full_name(), "acme/widget");
    }

    #[test]
    fn test_parse_ssh_url_strips_git_suffix() {
        let repo = RepositoryRef::parse("git@github.com:acme/widget.git").unwrap();
        assert_eq!(repo.full_name(), "acme/widget");
    }

    #[test]
    fn test_parse_rejects_other_hosts_and_garbage() {
        assert!(RepositoryRef::parse("https://gitlab.com/acme/widget").is_err());
        assert!(RepositoryRef::parse("acme").is_err());
        assert!(RepositoryRef::parse("acme/wid get").is_err());
        assert!(RepositoryRef::parse("../widget").is_err());
        assert!(RepositoryRef::parse("").is_err());
    }

    #[test]
    fn test_empty_token_is_absent() {
        let repo = RepositoryRef::new("acme", "widget")
            .unwrap()
            .with_token(Some("  "));
        assert!(!repo.has_token());

        let repo = repo.with_token(Some("ghp_abc"));
        assert_eq!(repo.access_token(), Some("ghp_abc"));
    }

    #[test]
    fn test_debug_hides_token() {
        let repo = RepositoryRef::new("acme", "widget")
            .unwrap()
            .with_token(Some("ghp_secret"));
        let debug = format!("{repo:?}");
        assert!(!debug.contains("ghp_secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_homepage() {
        let repo = RepositoryRef::new("acme", "widget").unwrap();
        assert_eq!(
            repo.homepage("https://github.com/"),
            "https://github.com/acme/widget"
        );
    }
}
