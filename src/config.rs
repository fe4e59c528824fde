use crate::reconcile::ReconcileOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const DEFAULT_EXTENSIONS: &[&str] = &["mp3", "m4a", "m4p", "flac", "wav", "aac", "ogg", "opus"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Worker threads for a library scan. `0` lets rayon pick.
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_follow_links")]
    pub follow_links: bool,
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// SHA-256 of the whole file, for sync change detection.
    #[serde(default = "default_content_hash")]
    pub content_hash: bool,
    #[serde(default)]
    pub reconcile: ReconcileOptions,
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

fn default_follow_links() -> bool {
    true
}

fn default_content_hash() -> bool {
    true
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            workers: 0,
            follow_links: default_follow_links(),
            max_depth: None,
            content_hash: default_content_hash(),
            reconcile: ReconcileOptions::default(),
        }
    }
}

impl ScanOptions {
    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions
            .iter()
            .any(|supported| ext.eq_ignore_ascii_case(supported))
    }
}

/// Load options from a JSON file. A missing file yields the defaults.
pub fn load_options(path: &Path) -> Result<ScanOptions> {
    if !path.exists() {
        return Ok(ScanOptions::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read options file {}", path.display()))?;
    let options: ScanOptions = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse options file {}", path.display()))?;
    Ok(options)
}

pub fn save_options(path: &Path, options: &ScanOptions) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new(""));
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(options)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
