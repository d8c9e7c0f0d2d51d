//! Build context cached in the checkout by earlier pipeline stages.

use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};

/// Directory inside the checkout holding the context cache and artifacts.
pub const CACHE_DIR: &str = ".ods";

/// Context values recorded by the pipeline's checkout stage, one single-line
/// file per value under `<checkout>/.ods/`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildContext {
    pub namespace: String,
    pub component: String,
    pub git_commit_sha: String,
}

impl BuildContext {
    /// Read the cached context. Any missing or unreadable value is a fatal
    /// setup error; this runs before any external side effect.
    pub fn read_cache(checkout_dir: &Path) -> Result<Self> {
        let dir = checkout_dir.join(CACHE_DIR);
        Ok(Self {
            namespace: read_cache_value(&dir, "namespace")?,
            component: read_cache_value(&dir, "component")?,
            git_commit_sha: read_cache_value(&dir, "git-commit-sha")?,
        })
    }
}

fn read_cache_value(dir: &Path, name: &str) -> Result<String> {
    let path = dir.join(name);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::context_cache_unreadable(path.to_string_lossy(), e.to_string()))?;
    Ok(content.trim().to_string())
}
