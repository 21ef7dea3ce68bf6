//! Resolution of template repository URLs into downloadable archive URLs.
//!
//! Source-hosting services export a branch as a zip under
//! `<repo>/archive/refs/heads/<branch>.zip`. The branch is never discovered
//! through the hosting API: callers either name it (`checkout`) or the
//! configured default branch is assumed, so repositories whose default branch
//! differs must be requested with an explicit checkout.

use std::fmt::{Display, Formatter};

use url::Url;

use super::error::DomainError;

const GIT_SUFFIX: &str = ".git";
const ZIP_SUFFIX: &str = ".zip";
const MAX_CHECKOUT_LEN: usize = 255;

/// A validated template location plus an optional branch override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateUrl {
    repository: Url,
    checkout: Option<String>,
}

impl TemplateUrl {
    /// Normalise and validate a repository URL.
    ///
    /// Trailing slashes and a trailing `.git` suffix are removed. Only absolute
    /// `http`/`https` URLs are accepted.
    pub fn parse(raw: &str, checkout: Option<String>) -> Result<Self, DomainError> {
        let normalized = normalize_repository(raw.trim());
        if normalized.is_empty() {
            return Err(DomainError::validation("`template_url` is required"));
        }

        let repository = Url::parse(normalized).map_err(|err| {
            DomainError::validation(format!("`template_url` is not a valid URL: {err}"))
        })?;

        match repository.scheme() {
            "http" | "https" => {}
            other => {
                return Err(DomainError::validation(format!(
                    "`template_url` must use http or https, not `{other}`"
                )));
            }
        }

        if repository.host_str().is_none_or(str::is_empty) {
            return Err(DomainError::validation("`template_url` must include a host"));
        }

        let checkout = checkout.map(validate_checkout).transpose()?;

        Ok(Self {
            repository,
            checkout,
        })
    }

    /// The normalised repository URL.
    pub fn repository(&self) -> &Url {
        &self.repository
    }

    pub fn checkout(&self) -> Option<&str> {
        self.checkout.as_deref()
    }

    /// Whether the URL already points at a zip archive rather than a repository.
    pub fn is_direct_archive(&self) -> bool {
        self.repository.path().ends_with(ZIP_SUFFIX)
    }

    /// Build the archive download URL, falling back to `default_branch` when no
    /// checkout was requested.
    pub fn archive_url(&self, default_branch: &str) -> Url {
        if self.is_direct_archive() {
            return self.repository.clone();
        }

        let branch = self.checkout.as_deref().unwrap_or(default_branch);
        let mut url = self.repository.clone();
        let path = format!(
            "{}/archive/refs/heads/{branch}{ZIP_SUFFIX}",
            url.path().trim_end_matches('/')
        );
        url.set_path(&path);
        url
    }
}

impl Display for TemplateUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.repository.as_str())
    }
}

fn normalize_repository(raw: &str) -> &str {
    let trimmed = raw.trim_end_matches('/');
    trimmed
        .strip_suffix(GIT_SUFFIX)
        .unwrap_or(trimmed)
        .trim_end_matches('/')
}

fn validate_checkout(raw: String) -> Result<String, DomainError> {
    let checkout = raw.trim();
    if checkout.is_empty() {
        return Err(DomainError::validation("`checkout` must not be blank"));
    }
    if checkout.len() > MAX_CHECKOUT_LEN {
        return Err(DomainError::validation(format!(
            "`checkout` must be at most {MAX_CHECKOUT_LEN} characters"
        )));
    }

    let allowed = |ch: char| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '/' | '-');
    if !checkout.chars().all(allowed)
        || checkout.starts_with('/')
        || checkout.ends_with('/')
        || checkout.contains("..")
    {
        return Err(DomainError::validation(format!(
            "`checkout` contains unsupported characters: `{checkout}`"
        )));
    }

    Ok(checkout.to_string())
}
