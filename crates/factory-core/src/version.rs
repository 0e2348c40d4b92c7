//! Version lines for `VERSION.md` and the heuristic change summary used as
//! an automatic commit message.
//!
//! A version line reads `vMAJOR.MINOR.PATCH - <summary>`. The summary is
//! built from the working tree: which areas changed (scopes), which words
//! dominate the added lines and paths (keywords), and what kind of change
//! it looks like (action).

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::error::Result;
use crate::git;
use crate::io::append_line;
use crate::paths::VERSION_FILE;

const DIFF_LIMIT: usize = 20_000;

static VERSION_RE: OnceLock<Regex> = OnceLock::new();
static TOKEN_RE: OnceLock<Regex> = OnceLock::new();

fn version_re() -> &'static Regex {
    VERSION_RE.get_or_init(|| Regex::new(r"(?m)^\s*v(\d+)\.(\d+)\.(\d+)\b").expect("valid regex"))
}

fn token_re() -> &'static Regex {
    TOKEN_RE.get_or_init(|| Regex::new(r"[A-Za-z][A-Za-z0-9_]{2,}").expect("valid regex"))
}

/// Reserved words of common languages; never useful as keywords.
const LANGUAGE_WORDS: &[&str] = &[
    "and", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "import", "lambda", "nonlocal", "not",
    "pass", "raise", "return", "try", "while", "with", "yield", "fn", "impl", "pub", "use",
    "mut", "struct", "enum", "match",
];

const DIFF_STOP_WORDS: &[&str] = &[
    "for", "while", "if", "elif", "else", "try", "except", "raise", "pass", "break",
    "continue", "def", "str", "int", "bool", "line", "lines", "word", "words", "text", "count",
    "counter", "status", "scope", "update", "updated", "project", "the", "and", "with", "from",
    "into", "true", "false", "none", "null", "return", "class", "const", "let", "var",
    "function", "import", "export", "default", "async", "await", "self", "this", "args", "path",
    "data", "list", "dict", "string", "value", "values", "items", "index", "main", "utils",
    "helper", "helpers", "tests", "test",
];

const PATH_STOP_WORDS: &[&str] = &[
    "frontend", "backend", "version", "readme", "main", "run", "test", "tests", "index", "init",
    "app", "utils", "helper", "helpers", "create", "new", "python", "file",
];

// ---------------------------------------------------------------------------
// Version numbers
// ---------------------------------------------------------------------------

/// The version after the last `vX.Y.Z` found at a line start, or `v0.0.1`.
pub fn next_version(text: &str) -> String {
    let Some(caps) = version_re().captures_iter(text).last() else {
        return "v0.0.1".to_string();
    };
    let num = |i: usize| caps[i].parse::<u64>().unwrap_or(0);
    format!("v{}.{}.{}", num(1), num(2), num(3) + 1)
}

/// Last non-empty line of `VERSION.md`, if any.
pub fn last_version_line(repo: &Path) -> Result<Option<String>> {
    let path = repo.join(VERSION_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string))
}

/// Build the next version line for `repo` and append it to `VERSION.md`
/// unless `dry_run`. A non-empty `message` replaces the generated summary.
pub fn generate_version_line(
    repo: &Path,
    message: Option<&str>,
    dry_run: bool,
    timeout: Duration,
) -> Result<String> {
    let path = repo.join(VERSION_FILE);
    let existing = if path.exists() {
        String::from_utf8_lossy(&std::fs::read(&path)?).into_owned()
    } else {
        String::new()
    };
    let summary = match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.to_string(),
        None => summarize_working_tree(repo, timeout)?,
    };
    let line = format!("{} - {}", next_version(&existing), summary);
    if !dry_run {
        append_line(&path, &line)?;
    }
    Ok(line)
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Describe the uncommitted changes of `repo` in a few words.
pub fn summarize_working_tree(repo: &Path, timeout: Duration) -> Result<String> {
    let status = git::run_git(
        repo,
        &["status", "--porcelain", "--untracked-files=all"],
        timeout,
    )?;
    if parse_status(&status).is_empty() {
        return Ok("working tree clean".to_string());
    }
    let exclude = format!(":(exclude){VERSION_FILE}");
    let unstaged = git::run_git(repo, &["diff", "--", ".", &exclude], timeout)?;
    let staged = git::run_git(repo, &["diff", "--cached", "--", ".", &exclude], timeout)?;
    let combined: String = format!("{unstaged}\n{staged}").chars().take(DIFF_LIMIT).collect();
    Ok(summarize(&status, &combined))
}

/// Pure part of the summary: porcelain status plus diff text in, phrase out.
pub fn summarize(status: &str, diff: &str) -> String {
    let items = parse_status(status);
    if items.is_empty() {
        return "working tree clean".to_string();
    }

    let scopes = top_scopes(&items);
    let scope_human = scopes
        .iter()
        .map(|s| human_scope(s))
        .collect::<Vec<_>>()
        .join(" and ");

    let mut keywords = diff_keywords(diff);
    for (word, n) in path_keywords(&items) {
        *keywords.entry(word).or_default() += n;
    }
    let action = infer_action(&items, &keywords);

    let mut tokens: BTreeSet<String> = keywords.keys().cloned().collect();
    tokens.extend(scope_human.to_lowercase().split_whitespace().map(str::to_string));
    let feature = infer_feature(&tokens, &scope_human);

    format!("{} {feature}", action.verb())
}

/// `(status, path)` pairs from `git status --porcelain`; renames keep the
/// destination path.
fn parse_status(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .filter_map(|line| {
            let (status, path) = line.trim().split_once(char::is_whitespace)?;
            let path = path.trim();
            let path = path.split_once("->").map_or(path, |(_, to)| to.trim());
            (!path.is_empty()).then(|| (status.to_string(), path.to_string()))
        })
        .collect()
}

fn scope_of(path: &str) -> &'static str {
    let p = path.replace('\\', "/");
    let lower = p.to_lowercase();
    if lower.starts_with("frontend/") {
        "frontend"
    } else if lower.starts_with("backend/") && lower != "backend/main.py" {
        "backend"
    } else if p.starts_with("TEST") || p.contains("/TEST") || lower.starts_with("tests/") {
        "tests"
    } else if lower == "run.py" || lower == "backend/main.py" {
        "server"
    } else if lower.starts_with(".github/") {
        "ci"
    } else if lower.ends_with(".md") {
        "docs"
    } else {
        "project"
    }
}

/// The two most frequent scopes; ties keep first-seen order.
fn top_scopes(items: &[(String, String)]) -> Vec<&'static str> {
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for (_, path) in items {
        let scope = scope_of(path);
        match counts.iter_mut().find(|(s, _)| *s == scope) {
            Some((_, n)) => *n += 1,
            None => counts.push((scope, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(2).map(|(s, _)| s).collect()
}

fn human_scope(scope: &str) -> &'static str {
    match scope {
        "frontend" => "frontend",
        "backend" => "backend",
        "tests" => "tests",
        "server" => "server",
        "ci" => "CI",
        "docs" => "documentation",
        _ => "project",
    }
}

// ---------------------------------------------------------------------------
// Keywords
// ---------------------------------------------------------------------------

/// Split an identifier on `_` and camelCase boundaries into lowercase words
/// of at least three letters.
fn split_identifier(token: &str) -> Vec<String> {
    token
        .split('_')
        .filter(|c| !c.is_empty())
        .flat_map(split_camel)
        .filter(|w| w.len() >= 3 && !w.chars().all(|c| c.is_ascii_digit()))
        .map(|w| w.to_lowercase())
        .collect()
}

fn split_camel(chunk: &str) -> Vec<String> {
    let chars: Vec<char> = chunk.chars().collect();
    let mut parts = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let start = i;
        let c = chars[i];
        if c.is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        } else if c.is_ascii_uppercase() {
            while i < chars.len() && chars[i].is_ascii_uppercase() {
                i += 1;
            }
            if i < chars.len() && chars[i].is_ascii_lowercase() {
                // `HTTPServer`: the last capital starts the next word.
                if i - start > 1 {
                    parts.push(chars[start..i - 1].iter().collect());
                }
                let word = i - 1;
                while i < chars.len() && chars[i].is_ascii_lowercase() {
                    i += 1;
                }
                parts.push(chars[word..i].iter().collect());
                continue;
            }
        } else if c.is_ascii_lowercase() {
            while i < chars.len() && chars[i].is_ascii_lowercase() {
                i += 1;
            }
        } else {
            i += 1;
            continue;
        }
        parts.push(chars[start..i].iter().collect());
    }
    if parts.is_empty() {
        parts.push(chunk.to_string());
    }
    parts
}

fn count_words<'a>(
    texts: impl Iterator<Item = &'a str>,
    stop_words: &[&str],
) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for text in texts {
        for token in token_re().find_iter(text) {
            for word in split_identifier(token.as_str()) {
                if stop_words.contains(&word.as_str()) || LANGUAGE_WORDS.contains(&word.as_str()) {
                    continue;
                }
                *counts.entry(word).or_default() += 1;
            }
        }
    }
    counts
}

/// Words from added lines of a unified diff.
fn diff_keywords(diff: &str) -> HashMap<String, usize> {
    let added = diff
        .lines()
        .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
        .map(|l| &l[1..]);
    count_words(added, DIFF_STOP_WORDS)
}

fn path_keywords(items: &[(String, String)]) -> HashMap<String, usize> {
    count_words(items.iter().map(|(_, p)| p.as_str()), PATH_STOP_WORDS)
}

// ---------------------------------------------------------------------------
// Action / feature
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Remove,
    Fix,
    Refactor,
    Update,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Action::Add => "added",
            Action::Remove => "removed",
            Action::Fix => "fixed",
            Action::Refactor => "refactored",
            Action::Update => "improved",
        }
    }
}

fn infer_action(items: &[(String, String)], keywords: &HashMap<String, usize>) -> Action {
    let has = |s: &str| items.iter().any(|(status, _)| status == s);
    if has("A") || has("??") {
        return Action::Add;
    }
    if has("D") {
        return Action::Remove;
    }
    let mentions = |needles: &[&str]| {
        keywords
            .keys()
            .any(|k| needles.iter().any(|n| k.contains(n)))
    };
    if mentions(&["fix", "bug", "error", "guard", "validate", "fallback"]) {
        Action::Fix
    } else if mentions(&["refactor", "rename", "cleanup", "rework"]) {
        Action::Refactor
    } else {
        Action::Update
    }
}

fn infer_feature(tokens: &BTreeSet<String>, scope_human: &str) -> String {
    let any = |words: &[&str]| words.iter().any(|w| tokens.contains(*w));
    let phrase = if tokens.contains("version")
        && any(&["summary", "message", "keyword", "scope", "action"])
    {
        "auto version message generation"
    } else if any(&["api", "request", "response"]) {
        "API request handling"
    } else if any(&["auth", "login", "token", "session"]) {
        "authentication flow"
    } else if any(&["dialog", "modal", "button", "form"]) {
        "UI interactions"
    } else if any(&["error", "exception", "validate", "fallback"]) {
        "error handling and validation"
    } else if any(&["test", "assert", "mock", "fixture"]) {
        "test coverage"
    } else if any(&["config", "settings", "env"]) {
        "configuration loading"
    } else if any(&["rename", "name"]) {
        "rename behavior"
    } else if any(&["delete", "remove"]) {
        "delete flow"
    } else if any(&["create", "new"]) {
        "creation flow"
    } else if any(&["parser", "parse"]) {
        "parsing logic"
    } else {
        return format!("{} behavior", if scope_human.is_empty() { "project" } else { scope_human });
    };
    phrase.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::tests::init_repo;
    use tempfile::TempDir;

    const T: Duration = Duration::from_secs(30);

    #[test]
    fn next_version_increments_last_patch() {
        assert_eq!(next_version(""), "v0.0.1");
        assert_eq!(next_version("v0.1.9 - a\nv0.2.3 - b\n"), "v0.2.4");
        assert_eq!(next_version("  v1.0.0 - indented\nnot v9.9.9\n"), "v1.0.1");
    }

    #[test]
    fn split_identifier_handles_snake_and_camel() {
        assert_eq!(split_identifier("load_yaml_repos"), vec!["load", "yaml", "repos"]);
        assert_eq!(split_identifier("HTTPServerConfig"), vec!["http", "server", "config"]);
        assert_eq!(split_identifier("pushState2"), vec!["push", "state"]);
    }

    #[test]
    fn status_parsing_keeps_rename_target() {
        let items = parse_status(" M src/lib.rs\nR  old.rs -> new.rs\n?? notes.md\n\n");
        assert_eq!(
            items,
            vec![
                ("M".to_string(), "src/lib.rs".to_string()),
                ("R".to_string(), "new.rs".to_string()),
                ("??".to_string(), "notes.md".to_string()),
            ]
        );
    }

    #[test]
    fn top_scopes_ties_keep_first_seen() {
        let items = parse_status(" M frontend/app.js\n M README.md\n M docs/a.md\n M frontend/b.js\n M x.txt\n");
        assert_eq!(top_scopes(&items), vec!["frontend", "docs"]);
    }

    #[test]
    fn untracked_files_read_as_added() {
        let summary = summarize("?? frontend/login_form.js\n", "");
        assert_eq!(summary, "added authentication flow");
    }

    #[test]
    fn fix_keywords_win_over_update() {
        let diff = "+++ b/src/lib.rs\n+    validate_input(x)?;\n";
        let summary = summarize(" M src/lib.rs\n", diff);
        assert_eq!(summary, "fixed error handling and validation");
    }

    #[test]
    fn fallback_phrase_uses_scope() {
        let summary = summarize(" M README.md\n", "+Some prose here\n");
        assert_eq!(summary, "improved documentation behavior");
    }

    #[test]
    fn clean_status_is_reported() {
        assert_eq!(summarize("", ""), "working tree clean");
    }

    #[test]
    fn generate_appends_unless_dry_run() {
        let tmp = TempDir::new().unwrap();
        init_repo(tmp.path());
        std::fs::write(tmp.path().join("VERSION.md"), "v0.0.4 - earlier").unwrap();

        let line = generate_version_line(tmp.path(), Some("manual note"), true, T).unwrap();
        assert_eq!(line, "v0.0.5 - manual note");
        assert_eq!(
            last_version_line(tmp.path()).unwrap().as_deref(),
            Some("v0.0.4 - earlier")
        );

        let line = generate_version_line(tmp.path(), None, false, T).unwrap();
        assert!(line.starts_with("v0.0.5 - "));
        assert_eq!(last_version_line(tmp.path()).unwrap(), Some(line));
    }

    #[test]
    fn last_version_line_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(last_version_line(tmp.path()).unwrap(), None);
        std::fs::write(tmp.path().join("VERSION.md"), "\n  \n").unwrap();
        assert_eq!(last_version_line(tmp.path()).unwrap(), None);
    }
}
