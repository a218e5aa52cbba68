use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot expand '{path}': home directory is not available")]
pub struct PathResolutionError {
    pub path: String,
}

/// Expands a leading `~` against the current user's home directory.
///
/// Wildcards are left alone, the analysis program does its own glob matching.
pub fn expand_home(path: &str) -> Result<String, PathResolutionError> {
    expand_home_with(path, dirs::home_dir().as_deref())
}

pub fn expand_home_with(path: &str, home: Option<&Path>) -> Result<String, PathResolutionError> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        // `~user` and anything without the marker pass through
        _ => return Ok(path.to_string()),
    };
    let home = home.ok_or_else(|| PathResolutionError {
        path: path.to_string(),
    })?;
    let home = home.to_string_lossy();
    if rest.is_empty() {
        return Ok(home.into_owned());
    }
    Ok(format!("{}{rest}", home.trim_end_matches('/')))
}

pub fn expand_all(paths: &[String]) -> Result<Vec<String>, PathResolutionError> {
    expand_all_with(paths, dirs::home_dir().as_deref())
}

pub fn expand_all_with(
    paths: &[String],
    home: Option<&Path>,
) -> Result<Vec<String>, PathResolutionError> {
    paths.iter().map(|p| expand_home_with(p, home)).collect()
}

pub fn expand_path_buf(path: &str) -> Result<PathBuf, PathResolutionError> {
    expand_home(path).map(PathBuf::from)
}
