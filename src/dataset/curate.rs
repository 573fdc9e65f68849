use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::ImageReader;
use log::{info, warn};
use rayon::prelude::*;

use crate::config::{CurateManifest, is_glob_pattern};

/// Outcome counts of one curation run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurateSummary {
    pub characters: usize,
    pub copied: usize,
    pub skipped: usize,
}

/// Copy the manifest's selected images into per-character training folders
/// and write one caption file per image.
///
/// The output tree is recreated from scratch. Sources resolve relative to
/// `base_dir` (the manifest's directory); glob patterns take their first
/// match. Missing or undecodable sources are logged and skipped so one bad
/// selection does not sink the whole dataset.
pub fn curate_dataset(
    manifest: &CurateManifest,
    base_dir: &Path,
    output_dir: &Path,
) -> Result<CurateSummary> {
    if output_dir.exists() {
        warn!("Replacing existing dataset at {}", output_dir.display());
        fs::remove_dir_all(output_dir)
            .with_context(|| format!("failed to clear dataset dir: {}", output_dir.display()))?;
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create dataset dir: {}", output_dir.display()))?;

    let mut summary = CurateSummary {
        characters: manifest.characters.len(),
        ..CurateSummary::default()
    };

    for character in &manifest.characters {
        let folder = output_dir.join(format!("{}_{}", manifest.repeats, character.trigger));
        fs::create_dir_all(&folder)
            .with_context(|| format!("failed to create {}", folder.display()))?;

        let resolved: Vec<Option<PathBuf>> = character
            .images
            .iter()
            .map(|selection| resolve_source(base_dir, &selection.src))
            .collect();

        // Decode-validate in parallel before touching the output folder;
        // a corrupt PNG in the training set is worse than a missing one.
        let problems: Vec<Option<String>> = resolved
            .par_iter()
            .map(|path| match path {
                None => Some("no file matches the source pattern".to_string()),
                Some(path) => match ImageReader::open(path) {
                    Err(e) => Some(e.to_string()),
                    Ok(reader) => reader.decode().err().map(|e| e.to_string()),
                },
            })
            .collect();

        let mut kept = 0usize;
        for (index, (selection, (path, problem))) in character
            .images
            .iter()
            .zip(resolved.iter().zip(&problems))
            .enumerate()
        {
            if let Some(problem) = problem {
                warn!("[{}] skipping '{}': {problem}", character.id, selection.src);
                summary.skipped += 1;
                continue;
            }
            let Some(path) = path else { continue };

            let stem = format!("{}_{index:02}", character.id);
            let image_dest = folder.join(format!("{stem}.png"));
            fs::copy(path, &image_dest)
                .with_context(|| format!("failed to copy {}", path.display()))?;

            let caption = build_caption(
                &character.trigger,
                &character.gender,
                &manifest.style_tags,
                &selection.tags,
            );
            let caption_dest = folder.join(format!("{stem}.txt"));
            fs::write(&caption_dest, caption)
                .with_context(|| format!("failed to write {}", caption_dest.display()))?;

            kept += 1;
            summary.copied += 1;
        }

        info!("[{}] {}: {} images", character.id, character.trigger, kept);
    }

    Ok(summary)
}

/// Resolve a source path or glob pattern; globs take their first match.
fn resolve_source(base_dir: &Path, pattern: &str) -> Option<PathBuf> {
    let full = if Path::new(pattern).is_absolute() {
        PathBuf::from(pattern)
    } else {
        base_dir.join(pattern)
    };

    if is_glob_pattern(pattern) {
        let matches = glob::glob(&full.to_string_lossy()).ok()?;
        matches.flatten().next()
    } else {
        full.exists().then_some(full)
    }
}

fn build_caption(trigger: &str, gender: &str, style_tags: &str, image_tags: &str) -> String {
    [trigger, gender, style_tags, image_tags]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}
