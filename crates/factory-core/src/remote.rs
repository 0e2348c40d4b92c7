//! Remote URL helpers shared by the probe, the catalog and folder operations.

use regex::Regex;
use std::sync::OnceLock;

static REPO_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn repo_name_re() -> &'static Regex {
    REPO_NAME_RE.get_or_init(|| {
        // Matches `host/owner/repo` and scp-like `host:owner/repo`.
        Regex::new(r"[/:]([^/:]+)/([^/:]+)$").expect("valid regex")
    })
}

/// Canonical key for an origin URL.
///
/// Trailing slashes and a trailing `.git` are stripped (repeatedly, so the
/// result is a fixed point), and the scheme and host are lowercased. The
/// owner/repository path keeps its case.
pub fn normalize_remote_url(url: &str) -> String {
    let mut s = url.trim();
    loop {
        let before = s.len();
        s = s.trim_end_matches('/');
        let cut = s.len().saturating_sub(4);
        if s.len() >= 4 && s.get(cut..).is_some_and(|t| t.eq_ignore_ascii_case(".git")) {
            s = &s[..cut];
        }
        if s.len() == before {
            break;
        }
    }
    lowercase_scheme_and_host(s)
}

fn lowercase_scheme_and_host(url: &str) -> String {
    if let Some(idx) = url.find("://") {
        let after = &url[idx + 3..];
        let host_end = after.find('/').unwrap_or(after.len());
        return format!(
            "{}://{}{}",
            url[..idx].to_ascii_lowercase(),
            after[..host_end].to_ascii_lowercase(),
            &after[host_end..]
        );
    }
    // scp-like: user@host:owner/repo
    if let Some(colon) = url.find(':') {
        if !url[..colon].contains('/') {
            return format!(
                "{}{}",
                url[..colon].to_ascii_lowercase(),
                &url[colon..]
            );
        }
    }
    url.to_string()
}

/// Permissive host check: any URL mentioning `github.com` counts, which
/// covers both HTTPS and SSH remotes.
pub fn is_github_remote(url: &str) -> bool {
    url.to_ascii_lowercase().contains("github.com")
}

/// Repository name from a clone URL: `https://host/o/r(.git)`,
/// `git@host:o/r.git` or `ssh://git@host/o/r.git`.
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    let caps = repo_name_re().captures(trimmed)?;
    let name = caps.get(2)?.as_str().trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// The `https` clone URL for `owner/name` on GitHub.
pub fn github_clone_url(owner: &str, name: &str) -> String {
    format!("https://github.com/{owner}/{name}.git")
}
