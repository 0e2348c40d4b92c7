use std::path::{Component, Path, PathBuf};

use reqwest::Url;
use serde::Serialize;

use crate::error::{FactoryError, Result};
use crate::paths::{self, SCREENSHOTS_DIR};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "svg", "ico"];

/// Route that serves a single screenshot file.
pub const FILE_ROUTE: &str = "/api/project-screenshot-file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Screenshot {
    pub name: String,
    /// URL (path and query) the UI can load the image from.
    pub src: String,
}

pub fn screenshots_dir(project: &Path) -> PathBuf {
    project.join(SCREENSHOTS_DIR)
}

pub fn is_image(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    if mime_guess::from_path(path)
        .first()
        .is_some_and(|m| m.type_() == mime_guess::mime::IMAGE)
    {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Images under `<project>/TOOLS/SCREENSHOTS`, sorted case-insensitively.
/// A missing directory is an empty list.
pub fn list_screenshots(project: &Path) -> Vec<Screenshot> {
    let Ok(entries) = std::fs::read_dir(screenshots_dir(project)) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_image(p))
        .collect();
    files.sort_by_key(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase()));

    let project_arg = project.to_string_lossy();
    files
        .into_iter()
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().into_owned();
            let src = file_src(&project_arg, &name);
            Some(Screenshot { name, src })
        })
        .collect()
}

fn file_src(project: &str, name: &str) -> String {
    let mut url = Url::parse("http://localhost").expect("static base URL");
    url.set_path(FILE_ROUTE);
    url.query_pairs_mut()
        .append_pair("path", project)
        .append_pair("name", name);
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}

/// Locate one screenshot and its content type. Names that resolve outside
/// the screenshots directory are rejected.
pub fn screenshot_file(project: &Path, name: &str) -> Result<(PathBuf, String)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FactoryError::InvalidRequest("missing image name".to_string()));
    }
    if Path::new(name)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(FactoryError::InvalidRequest("invalid image path".to_string()));
    }
    let dir = paths::resolve(&screenshots_dir(project));
    let candidate = paths::resolve(&dir.join(name));
    if candidate == dir || !candidate.starts_with(&dir) {
        return Err(FactoryError::InvalidRequest("invalid image path".to_string()));
    }
    if !is_image(&candidate) {
        return Err(FactoryError::FileNotFound(name.to_string()));
    }
    let mime = mime_guess::from_path(&candidate)
        .first_or_octet_stream()
        .essence_str()
        .to_string();
    Ok((candidate, mime))
}
