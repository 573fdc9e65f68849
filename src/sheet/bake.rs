use std::collections::HashMap;

use image::RgbaImage;
use log::{info, warn};

use super::{Facing, SheetLayout, compose_sheet};
use crate::config::{FacingPrompts, PoseGuidance, SheetConfig};
use crate::error::BakeError;
use crate::frame::{StripMode, mirror_frames, normalize_frame};
use crate::render::{
    LoraWeights, PollPolicy, PoseRef, RenderClient, SamplerSettings, WorkflowParams,
    build_workflow, wait_for_outcome,
};

/// Resolved inputs for one sheet bake.
#[derive(Debug, Clone)]
pub struct SheetPlan {
    pub layout: SheetLayout,
    pub base_seed: u64,
    pub trigger: Option<String>,
    pub style_prefix: String,
    pub character_prompt: String,
    pub negative_prompt: String,
    pub facing_prompts: FacingPrompts,
    pub sampler: SamplerSettings,
    pub lora: Option<LoraWeights>,
    pub pose: Option<PoseGuidance>,
    pub strip_mode: StripMode,
    pub background_tolerance: u8,
    pub alpha_threshold: u8,
    pub poll: PollPolicy,
    pub filename_prefix: String,
}

impl SheetPlan {
    pub fn from_config(config: &SheetConfig) -> Self {
        Self {
            layout: SheetLayout::new(config.cell_size, config.cell_size, config.frames_per_facing),
            base_seed: config.base_seed,
            trigger: config.trigger.clone(),
            style_prefix: config.style_prefix.clone(),
            character_prompt: config.character_prompt.clone(),
            negative_prompt: config.negative_prompt.clone(),
            facing_prompts: config.facing_prompts.clone(),
            sampler: config.sampler.clone(),
            lora: config.lora.clone(),
            pose: config.pose.clone(),
            strip_mode: config.strip_mode,
            background_tolerance: config.background_tolerance,
            alpha_threshold: config.alpha_threshold,
            poll: PollPolicy {
                interval: std::time::Duration::from_secs(config.poll_interval_secs),
                deadline: std::time::Duration::from_secs(config.poll_timeout_secs),
            },
            filename_prefix: config.filename_prefix.clone(),
        }
    }

    fn positive_prompt(&self, facing: Facing) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(trigger) = &self.trigger {
            parts.push(trigger);
        }
        parts.push(&self.style_prefix);
        parts.push(self.facing_prompts.get(facing));
        parts.push(&self.character_prompt);
        parts.retain(|part| !part.is_empty());
        parts.join(", ")
    }

    fn workflow_params(&self, facing: Facing, frame_index: u32, seed: u64) -> WorkflowParams {
        let pose = self.pose.as_ref().map(|guidance| PoseRef {
            control_net: guidance.control_net.clone(),
            image: format!("{}/pose_{facing}_{frame_index}.png", guidance.image_dir),
            strength: guidance.strength,
        });

        WorkflowParams {
            positive: self.positive_prompt(facing),
            negative: self.negative_prompt.clone(),
            seed,
            filename_prefix: format!("{}_{facing}_{frame_index}", self.filename_prefix),
            sampler: self.sampler.clone(),
            lora: self.lora.clone(),
            pose,
        }
    }

    fn blank_cell(&self) -> RgbaImage {
        RgbaImage::new(self.layout.cell_width, self.layout.cell_height)
    }
}

/// What went sideways during a bake without stopping it.
#[derive(Debug, Clone, Default)]
pub struct SheetReport {
    /// Cells substituted with a blank placeholder, as `facing_frame` labels.
    pub blank_cells: Vec<String>,
}

/// Render, normalize and compose one spritesheet.
///
/// Strictly sequential: each frame job is polled to completion before the
/// next is submitted. Jobs that finish without an output image, or that the
/// server reports failed, become blank cells recorded in the report; the
/// poll deadline and transport errors abort the run.
pub fn bake_sheet(
    client: &dyn RenderClient,
    plan: &SheetPlan,
) -> Result<(RgbaImage, SheetReport), BakeError> {
    let mut rendered: HashMap<Facing, Vec<RgbaImage>> = HashMap::new();
    let mut report = SheetReport::default();

    for (row, facing) in Facing::ROW_ORDER.into_iter().enumerate() {
        if facing.mirror_source().is_some() {
            continue;
        }
        let seed = plan.base_seed + row as u64;
        let mut frames = Vec::with_capacity(plan.layout.frames_per_facing as usize);

        for frame_index in 0..plan.layout.frames_per_facing {
            let label = format!("{facing}_{frame_index}");
            info!("Rendering frame {label} (seed {seed})");

            match render_frame(client, plan, facing, frame_index, seed, &label)? {
                Some(frame) => frames.push(frame),
                None => {
                    warn!("Frame {label} produced no image, substituting a blank cell");
                    report.blank_cells.push(label);
                    frames.push(plan.blank_cell());
                }
            }
        }
        rendered.insert(facing, frames);
    }

    let mut ordered: Vec<RgbaImage> = Vec::with_capacity(plan.layout.cell_count());
    for facing in Facing::ROW_ORDER {
        match facing.mirror_source() {
            Some(source) => {
                info!("Deriving {facing} frames by mirroring {source}");
                let source_frames = rendered.get(&source).map(Vec::as_slice).unwrap_or(&[]);
                ordered.extend(mirror_frames(source_frames));
            }
            None => {
                ordered.extend(rendered.get(&facing).cloned().unwrap_or_default());
            }
        }
    }

    let sheet = compose_sheet(&plan.layout, &ordered)?;
    info!(
        "Composed {}x{} sheet, {} cells ({} blank)",
        sheet.width(),
        sheet.height(),
        plan.layout.cell_count(),
        report.blank_cells.len()
    );
    Ok((sheet, report))
}

fn render_frame(
    client: &dyn RenderClient,
    plan: &SheetPlan,
    facing: Facing,
    frame_index: u32,
    seed: u64,
    label: &str,
) -> Result<Option<RgbaImage>, BakeError> {
    let workflow = build_workflow(&plan.workflow_params(facing, frame_index, seed));
    let job = client.submit(&workflow)?;

    let outputs = match wait_for_outcome(client, &job, &plan.poll) {
        Ok(outputs) => outputs,
        Err(BakeError::JobFailed { job_id, detail }) => {
            warn!("Render job {job_id} failed: {detail}");
            return Ok(None);
        }
        Err(other) => return Err(other),
    };

    let Some(image_ref) = outputs.first() else {
        return Ok(None);
    };

    let bytes = client.download(image_ref)?;
    let mut frame = image::load_from_memory(&bytes)
        .map_err(|source| BakeError::ImageDecode {
            label: label.to_string(),
            source,
        })?
        .into_rgba8();

    plan.strip_mode.apply(&mut frame, plan.background_tolerance);
    Ok(Some(normalize_frame(
        &frame,
        plan.layout.cell_width,
        plan.layout.cell_height,
        plan.alpha_threshold,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{ImageRef, JobId, JobOutcome};
    use image::{ImageFormat, Rgba, imageops};
    use serde_json::Value;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::time::Duration;

    /// Serves a white-backdrop test render for every job; jobs whose save
    /// prefix matches `blank_for` complete with no output image.
    struct StubClient {
        blank_for: Option<String>,
        submitted: RefCell<Vec<Value>>,
    }

    impl StubClient {
        fn new(blank_for: Option<&str>) -> Self {
            Self {
                blank_for: blank_for.map(str::to_string),
                submitted: RefCell::new(Vec::new()),
            }
        }
    }

    impl RenderClient for StubClient {
        fn submit(&self, workflow: &Value) -> Result<JobId, BakeError> {
            self.submitted.borrow_mut().push(workflow.clone());
            let prefix = workflow["11"]["inputs"]["filename_prefix"]
                .as_str()
                .unwrap_or_default();
            Ok(JobId(prefix.to_string()))
        }

        fn fetch_outcome(&self, job: &JobId) -> Result<Option<JobOutcome>, BakeError> {
            if self.blank_for.as_deref().is_some_and(|b| job.0.ends_with(b)) {
                return Ok(Some(JobOutcome::default()));
            }
            Ok(Some(JobOutcome {
                images: vec![ImageRef {
                    filename: format!("{}.png", job.0),
                    subfolder: String::new(),
                    kind: "output".to_string(),
                }],
                error: None,
            }))
        }

        fn download(&self, _image: &ImageRef) -> Result<Vec<u8>, BakeError> {
            // 40x50 white backdrop with an asymmetric red figure
            let mut img = RgbaImage::from_pixel(40, 50, Rgba([255, 255, 255, 255]));
            for y in 10..40 {
                for x in 5..15 {
                    img.put_pixel(x, y, Rgba([200, 30, 40, 255]));
                }
            }
            img.put_pixel(6, 12, Rgba([30, 200, 40, 255]));

            let mut bytes = Cursor::new(Vec::new());
            img.write_to(&mut bytes, ImageFormat::Png).unwrap();
            Ok(bytes.into_inner())
        }
    }

    fn test_plan() -> SheetPlan {
        let mut plan = SheetPlan::from_config(&SheetConfig::default());
        plan.layout = SheetLayout::new(32, 32, 2);
        plan.base_seed = 1000;
        plan.character_prompt = "brave knight, sword, armor".to_string();
        plan.poll = PollPolicy {
            interval: Duration::from_millis(1),
            deadline: Duration::from_secs(1),
        };
        plan
    }

    #[test]
    fn test_bake_produces_fully_populated_sheet() {
        let client = StubClient::new(None);
        let (sheet, report) = bake_sheet(&client, &test_plan()).unwrap();

        assert_eq!(sheet.dimensions(), (64, 128));
        assert!(report.blank_cells.is_empty());

        // 3 rendered facings x 2 frames; the mirrored row costs no jobs
        assert_eq!(client.submitted.borrow().len(), 6);

        let layout = SheetLayout::new(32, 32, 2);
        for index in 0..8u32 {
            let (x, y) = layout.cell_origin(index);
            let cell = imageops::crop_imm(&sheet, x, y, 32, 32).to_image();
            assert!(
                cell.pixels().any(|p| p.0[3] > 0),
                "cell {index} left blank"
            );
        }
    }

    #[test]
    fn test_bake_seeds_one_per_facing_row() {
        let client = StubClient::new(None);
        bake_sheet(&client, &test_plan()).unwrap();

        let seeds: Vec<u64> = client
            .submitted
            .borrow()
            .iter()
            .map(|wf| wf["9"]["inputs"]["seed"].as_u64().unwrap())
            .collect();
        // down is row 0, left row 1, up row 3; right is never rendered
        assert_eq!(seeds, vec![1000, 1000, 1001, 1001, 1003, 1003]);
    }

    #[test]
    fn test_bake_mirrors_right_row_from_left() {
        let client = StubClient::new(None);
        let plan = test_plan();
        let (sheet, _) = bake_sheet(&client, &plan).unwrap();

        // left is row 1, right is row 2
        for column in 0..2u32 {
            let left = imageops::crop_imm(&sheet, column * 32, 32, 32, 32).to_image();
            let right = imageops::crop_imm(&sheet, column * 32, 64, 32, 32).to_image();
            let flipped = imageops::flip_horizontal(&left);
            assert_eq!(
                flipped.as_raw(),
                right.as_raw(),
                "column {column} not mirrored"
            );
        }
    }

    #[test]
    fn test_bake_substitutes_blank_cell_and_reports_it() {
        let client = StubClient::new(Some("down_1"));
        let (sheet, report) = bake_sheet(&client, &test_plan()).unwrap();

        assert_eq!(report.blank_cells, vec!["down_1".to_string()]);

        // down row is row 0; its second cell must be fully transparent
        let blank = imageops::crop_imm(&sheet, 32, 0, 32, 32).to_image();
        assert!(blank.pixels().all(|p| p.0[3] == 0));

        // the rest of the sheet still rendered
        let first = imageops::crop_imm(&sheet, 0, 0, 32, 32).to_image();
        assert!(first.pixels().any(|p| p.0[3] > 0));
    }

    #[test]
    fn test_bake_frames_are_bottom_anchored() {
        let client = StubClient::new(None);
        let (sheet, _) = bake_sheet(&client, &test_plan()).unwrap();

        // bottom row of the first cell must carry content
        let cell = imageops::crop_imm(&sheet, 0, 0, 32, 32).to_image();
        let bottom_has_content = (0..32).any(|x| cell.get_pixel(x, 31).0[3] > 0);
        assert!(bottom_has_content);
    }

    #[test]
    fn test_positive_prompt_assembly() {
        let mut plan = test_plan();
        plan.trigger = Some("flowline_style".to_string());
        plan.style_prefix = "chibi, full body".to_string();

        let prompt = plan.positive_prompt(Facing::Down);
        assert_eq!(
            prompt,
            "flowline_style, chibi, full body, front view, facing viewer, looking at viewer, \
             brave knight, sword, armor"
        );
    }

    #[test]
    fn test_pose_reference_follows_facing_and_frame() {
        let mut plan = test_plan();
        plan.pose = Some(PoseGuidance {
            control_net: "openpose.safetensors".to_string(),
            image_dir: "chibi-poses".to_string(),
            strength: 1.0,
        });

        let params = plan.workflow_params(Facing::Left, 3, 7);
        let pose = params.pose.unwrap();
        assert_eq!(pose.image, "chibi-poses/pose_left_3.png");
    }
}
