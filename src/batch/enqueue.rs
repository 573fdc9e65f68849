use std::fs;
use std::path::Path;

use anyhow::Result;
use log::info;
use serde::Serialize;

use crate::config::BatchManifest;
use crate::error::BakeError;
use crate::render::{JobId, RenderClient, WorkflowParams, build_workflow};

/// One expanded manifest entry, ready to submit.
#[derive(Debug, Clone)]
pub struct PlannedJob {
    pub label: String,
    pub seed: u64,
    pub params: WorkflowParams,
}

/// One successfully queued job, for the bookkeeping log.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedJob {
    pub label: String,
    pub seed: u64,
    pub prompt_id: String,
}

/// Deterministic seed for (character, direction, variant).
///
/// Stride 100 per character and 10 per direction keeps every seed of a run
/// unique while the manifest stays within ten directions and ten variants;
/// the manifest loader enforces that bound.
pub fn plan_seed(base: u64, character: usize, direction: usize, variant: usize) -> u64 {
    base + (character as u64) * 100 + (direction as u64) * 10 + variant as u64
}

fn variant_letter(variant: usize) -> char {
    char::from(b'a' + u8::try_from(variant % 26).unwrap_or(0))
}

/// Expand the manifest tables into the full list of jobs.
pub fn expand_manifest(manifest: &BatchManifest) -> Vec<PlannedJob> {
    let mut planned = Vec::new();

    for (ci, character) in manifest.characters.iter().enumerate() {
        for (di, direction) in manifest.directions.iter().enumerate() {
            for variant in 0..manifest.variants as usize {
                let seed = plan_seed(manifest.seed_base, ci, di, variant);
                let label = format!(
                    "{}_{}_{}",
                    character.id,
                    direction.name,
                    variant_letter(variant)
                );
                let positive = [
                    manifest.style_prefix.as_str(),
                    character.gender.as_str(),
                    character.tags.as_str(),
                    direction.tags.as_str(),
                ]
                .iter()
                .filter(|part| !part.is_empty())
                .copied()
                .collect::<Vec<_>>()
                .join(", ");

                planned.push(PlannedJob {
                    params: WorkflowParams {
                        positive,
                        negative: manifest.negative_prompt.clone(),
                        seed,
                        filename_prefix: format!("{}/{}", manifest.output_subdir, label),
                        sampler: manifest.sampler.clone(),
                        lora: None,
                        pose: None,
                    },
                    label,
                    seed,
                });
            }
        }
    }

    // Retakes ride along after the cross product, each at a pinned seed plus
    // stride-100 candidates so the operator can pick the best result.
    for retake in &manifest.retakes {
        let direction_tags = manifest
            .directions
            .iter()
            .find(|d| d.name == retake.direction)
            .map(|d| d.tags.as_str())
            .unwrap_or_default();

        for candidate in 0..u64::from(manifest.retake_candidates) {
            let seed = retake.seed + candidate * 100;
            let label = format!("{}_{}_regen_{seed}", retake.id, retake.direction);
            let positive = [
                manifest.style_prefix.as_str(),
                retake.tags.as_str(),
                direction_tags,
            ]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");

            planned.push(PlannedJob {
                params: WorkflowParams {
                    positive,
                    negative: manifest.negative_prompt.clone(),
                    seed,
                    filename_prefix: format!("{}/{}", manifest.output_subdir, label),
                    sampler: manifest.sampler.clone(),
                    lora: None,
                    pose: None,
                },
                label,
                seed,
            });
        }
    }

    planned
}

/// Queue every expanded job, sequentially and fire-and-forget.
///
/// Nothing is polled; the server works through its queue on its own.
/// Returns the queued jobs in submission order.
pub fn enqueue_batch(
    client: &dyn RenderClient,
    manifest: &BatchManifest,
) -> Result<Vec<QueuedJob>, BakeError> {
    let planned = expand_manifest(manifest);
    let total = planned.len();
    let mut queued = Vec::with_capacity(total);

    for (number, job) in planned.into_iter().enumerate() {
        let JobId(prompt_id) = client.submit(&build_workflow(&job.params))?;
        info!(
            "[{:02}/{total}] {} seed={} -> {}",
            number + 1,
            job.label,
            job.seed,
            prompt_id.get(..8).unwrap_or(&prompt_id)
        );
        queued.push(QueuedJob {
            label: job.label,
            seed: job.seed,
            prompt_id,
        });
    }

    Ok(queued)
}

/// Write the queued-job bookkeeping file as pretty JSON.
pub fn write_job_log(jobs: &[QueuedJob], path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(jobs)?;

    fs::write(path, content).map_err(|e| BakeError::OutputWrite {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
