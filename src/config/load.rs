use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::de::DeserializeOwned;

use super::types::{BatchManifest, CurateManifest, SheetConfig};

/// A parsed JSON file plus the directory it came from.
///
/// Relative paths inside configs and manifests resolve against the file's
/// location, so the loader keeps the directory around.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub value: T,
    pub dir: PathBuf,
}

impl<T> Loaded<T> {
    /// Resolve a possibly-relative path against the file's directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Loaded<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let value: T = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(Loaded { value, dir })
}

pub fn load_sheet_config(path: &Path) -> Result<Loaded<SheetConfig>> {
    let loaded = load_json::<SheetConfig>(path)?;
    ensure!(loaded.value.cell_size > 0, "cell_size must be nonzero");
    ensure!(
        loaded.value.frames_per_facing > 0,
        "frames_per_facing must be nonzero"
    );
    ensure!(
        loaded.value.poll_interval_secs > 0,
        "poll_interval_secs must be nonzero"
    );
    Ok(loaded)
}

pub fn load_batch_manifest(path: &Path) -> Result<Loaded<BatchManifest>> {
    let loaded = load_json::<BatchManifest>(path)?;
    let manifest = &loaded.value;
    ensure!(!manifest.characters.is_empty(), "manifest has no characters");
    ensure!(!manifest.directions.is_empty(), "manifest has no directions");
    // The seed plan strides 10 per direction and 100 per character
    ensure!(
        manifest.directions.len() <= 10,
        "seed plan supports at most 10 directions, got {}",
        manifest.directions.len()
    );
    ensure!(
        (1..=10).contains(&manifest.variants),
        "variants must be between 1 and 10, got {}",
        manifest.variants
    );
    ensure!(manifest.retake_candidates > 0, "retake_candidates must be nonzero");
    for retake in &manifest.retakes {
        ensure!(
            manifest.directions.iter().any(|d| d.name == retake.direction),
            "retake {}_{} references unknown direction '{}'",
            retake.id,
            retake.direction,
            retake.direction
        );
    }
    Ok(loaded)
}

pub fn load_curate_manifest(path: &Path) -> Result<Loaded<CurateManifest>> {
    let loaded = load_json::<CurateManifest>(path)?;
    ensure!(
        !loaded.value.characters.is_empty(),
        "manifest has no characters"
    );
    Ok(loaded)
}

/// Check if a pattern contains glob characters.
pub(crate) fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?') || pattern.contains('[')
}
