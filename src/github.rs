//! Resolve the caller's input to a local directory.
//!
//! Local paths are used as given. GitHub URLs are parsed, shallow-cloned
//! into the scratch directory once per repo and branch, and narrowed to the
//! requested subpath, which must stay inside the checkout.

use anyhow::Result;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tokio::process::Command;

use crate::config::CloneConfig;
use crate::error::InputError;

const DEFAULT_BRANCH: &str = "master";

/// A parsed `https://github.com/<owner>/<repo>[/tree/<branch>[/<subpath>]]` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubTarget {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Path inside the repository, without leading or trailing slashes.
    /// Empty for the repository root.
    pub subpath: String,
}

impl GithubTarget {
    pub fn clone_url(&self) -> String {
        format!("https://github.com/{}/{}.git", self.owner, self.repo)
    }
}

/// Inputs starting with `http://` or `https://` are treated as remote.
pub fn is_remote(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn github_url_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^https?://github\.com/([^/]+)/([^/]+?)(?:\.git)?(?:/tree/([^/]+)(?:/(.+?))?)?/?$",
        )
        .ok()
    })
    .as_ref()
}

pub fn parse_github_url(url: &str) -> Result<GithubTarget, InputError> {
    let caps = github_url_regex()
        .and_then(|re| re.captures(url.trim()))
        .ok_or_else(|| InputError::InvalidGithubUrl(url.to_string()))?;

    let subpath = caps
        .get(4)
        .map(|m| m.as_str().trim_matches('/').to_string())
        .unwrap_or_default();
    check_subpath(&subpath)?;

    Ok(GithubTarget {
        owner: caps[1].to_string(),
        repo: caps[2].to_string(),
        branch: caps
            .get(3)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string()),
        subpath,
    })
}

/// Subpaths are relative and may not climb out with `..`.
fn check_subpath(subpath: &str) -> Result<(), InputError> {
    let escapes = Path::new(subpath)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(InputError::SubpathOutsideRepo(subpath.to_string()));
    }
    Ok(())
}

/// Turn the caller's input into a local directory, cloning if it is a URL.
pub async fn resolve_input(input: &str, config: &CloneConfig) -> Result<PathBuf> {
    if is_remote(input) {
        let target = parse_github_url(input)?;
        return clone_and_locate(&target, config).await;
    }

    let path = PathBuf::from(input);
    if !path.exists() {
        return Err(InputError::PathNotFound(path).into());
    }
    Ok(path)
}

/// Shallow-clone `target` into the scratch directory (once per
/// repo/branch) and return the requested subpath inside it.
pub async fn clone_and_locate(target: &GithubTarget, config: &CloneConfig) -> Result<PathBuf> {
    check_subpath(&target.subpath)?;
    let repo_dir = checkout_dir(&config.scratch_dir, target);

    if repo_dir.exists() {
        tracing::info!(repo = %repo_dir.display(), "reusing existing clone");
    } else {
        git_clone(&target.clone_url(), &target.branch, &repo_dir).await?;
        tracing::info!(repo = %repo_dir.display(), "repository cloned");
    }

    let final_path = if target.subpath.is_empty() {
        repo_dir.clone()
    } else {
        repo_dir.join(&target.subpath)
    };

    if !final_path.exists() {
        tracing::warn!(subpath = %target.subpath, "subpath does not exist in repo");
        return Err(InputError::MissingSubpath(target.subpath.clone()).into());
    }

    // Symlinks inside the checkout can still point elsewhere
    let inside = match (final_path.canonicalize(), repo_dir.canonicalize()) {
        (Ok(resolved), Ok(root)) => resolved.starts_with(root),
        _ => false,
    };
    if !inside {
        tracing::warn!(subpath = %target.subpath, "subpath resolves outside the checkout");
        return Err(InputError::SubpathOutsideRepo(target.subpath.clone()).into());
    }

    Ok(final_path)
}

fn checkout_dir(scratch_dir: &Path, target: &GithubTarget) -> PathBuf {
    let key = format!("{}/{}@{}", target.owner, target.repo, target.branch);
    scratch_dir.join(format!("{}-{}", target.repo, short_hash(&key)))
}

async fn git_clone(url: &str, branch: &str, dest: &Path) -> Result<(), InputError> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            InputError::CloneFailed(format!(
                "failed to create scratch directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    tracing::info!(url, branch, "cloning repository");
    let output = Command::new("git")
        .args(["clone", "-b", branch, "--depth", "1"])
        .arg(url)
        .arg(dest)
        .output()
        .await
        .map_err(|e| InputError::CloneFailed(format!("failed to execute git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::error!(url, error = %stderr, "git clone failed");
        // A failed clone can leave a partial checkout that would be reused next time
        let _ = std::fs::remove_dir_all(dest);
        return Err(InputError::CloneFailed(stderr));
    }

    Ok(())
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}
