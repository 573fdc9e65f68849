use serde::{Deserialize, Serialize};

use crate::frame::StripMode;
use crate::render::{LoraWeights, SamplerSettings};
use crate::sheet::Facing;

/// Per-facing prompt fragments appended after the style prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FacingPrompts {
    pub down: String,
    pub left: String,
    pub right: String,
    pub up: String,
}

impl Default for FacingPrompts {
    fn default() -> Self {
        Self {
            down: "front view, facing viewer, looking at viewer".to_string(),
            left: "from side, side view, facing left, looking left".to_string(),
            right: "from side, side view, facing right, looking right".to_string(),
            up: "from behind, back view, facing away, looking away".to_string(),
        }
    }
}

impl FacingPrompts {
    pub fn get(&self, facing: Facing) -> &str {
        match facing {
            Facing::Down => &self.down,
            Facing::Left => &self.left,
            Facing::Right => &self.right,
            Facing::Up => &self.up,
        }
    }
}

/// Pose conditioning settings: a ControlNet plus a server-side directory of
/// `pose_{facing}_{frame}.png` reference images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseGuidance {
    pub control_net: String,
    pub image_dir: String,
    pub strength: f64,
}

impl Default for PoseGuidance {
    fn default() -> Self {
        Self {
            control_net: String::new(),
            image_dir: "poses".to_string(),
            strength: 1.0,
        }
    }
}

/// PNG recompression level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompressConfig {
    /// Optimization level 0-6
    Level(u8),
    /// Maximum compression ("max")
    Max(String),
}

/// Sheet run configuration (JSON file).
///
/// Relative paths resolve against the config file location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Config file version (currently 1)
    pub version: u32,
    /// Render server base URL
    pub server_url: String,
    /// Sampler settings shared by every frame job
    pub sampler: SamplerSettings,
    /// Optional LoRA adapter applied on top of the checkpoint
    pub lora: Option<LoraWeights>,
    /// Optional trigger word prepended to every positive prompt
    pub trigger: Option<String>,
    /// Style prefix opening every positive prompt
    pub style_prefix: String,
    /// Negative prompt shared by every job
    pub negative_prompt: String,
    /// Subject description appended after the facing tags
    pub character_prompt: String,
    /// Per-facing prompt fragments
    pub facing_prompts: FacingPrompts,
    /// Optional ControlNet pose guidance
    pub pose: Option<PoseGuidance>,
    /// Cell edge length in pixels (cells are square)
    pub cell_size: u32,
    /// Frames per facing; also the sheet column count
    pub frames_per_facing: u32,
    /// Base seed; each facing row renders at base + row index
    pub base_seed: u64,
    /// Background removal mode
    pub strip_mode: StripMode,
    /// Channel tolerance for background removal
    pub background_tolerance: u8,
    /// Alpha threshold for content bounds
    pub alpha_threshold: u8,
    /// Seconds between job polls
    pub poll_interval_secs: u64,
    /// Seconds before an unfinished job fails the run
    pub poll_timeout_secs: u64,
    /// Output directory for the sheet
    pub output_dir: String,
    /// Base name for the sheet file
    pub name: String,
    /// Server-side filename prefix for intermediate frame images
    pub filename_prefix: String,
    /// PNG recompression configuration (optional)
    pub compress: Option<CompressConfig>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server_url: "http://127.0.0.1:8188".to_string(),
            sampler: SamplerSettings::default(),
            lora: None,
            trigger: None,
            style_prefix: "masterpiece, best quality, chibi, full body, solo, \
                           simple background, white background"
                .to_string(),
            negative_prompt: "realistic, photorealistic, 3d render, blurry, low quality, \
                              deformed, ugly, extra limbs, missing limbs, fused limbs, \
                              watermark, text, signature, multiple characters, \
                              multiple views, pixel art, retro, 8bit"
                .to_string(),
            character_prompt: String::new(),
            facing_prompts: FacingPrompts::default(),
            pose: None,
            cell_size: 128,
            frames_per_facing: 8,
            base_seed: 42,
            strip_mode: StripMode::default(),
            background_tolerance: 30,
            alpha_threshold: 10,
            poll_interval_secs: 2,
            poll_timeout_secs: 120,
            output_dir: ".".to_string(),
            name: "spritesheet".to_string(),
            filename_prefix: "spritebake".to_string(),
            compress: None,
        }
    }
}

/// One character row of a batch manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterEntry {
    pub id: String,
    #[serde(default)]
    pub gender: String,
    pub tags: String,
}

/// One direction row of a batch manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionEntry {
    pub name: String,
    pub tags: String,
}

/// One retake row: a single (character, direction) render that came out bad
/// and needs regenerating with refined tags and a pinned seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetakeEntry {
    pub id: String,
    /// Direction name; must appear in the manifest's direction table
    pub direction: String,
    pub tags: String,
    pub seed: u64,
}

/// Batch enqueue manifest (JSON file): a prompt table expanded into
/// characters x directions x variants render jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchManifest {
    pub version: u32,
    pub server_url: String,
    pub sampler: SamplerSettings,
    /// Positive prompt prefix shared by every job
    pub style_prefix: String,
    pub negative_prompt: String,
    /// Server-side output subfolder for generated files
    pub output_subdir: String,
    pub seed_base: u64,
    /// Seed variants per (character, direction) pair
    pub variants: u32,
    pub characters: Vec<CharacterEntry>,
    pub directions: Vec<DirectionEntry>,
    /// Individual retakes queued after the cross product
    pub retakes: Vec<RetakeEntry>,
    /// Seed candidates per retake, strided 100 apart for pick-the-best
    pub retake_candidates: u32,
    /// Where to write the queued-job bookkeeping file
    pub job_log: Option<String>,
}

impl Default for BatchManifest {
    fn default() -> Self {
        Self {
            version: 1,
            server_url: "http://127.0.0.1:8188".to_string(),
            sampler: SamplerSettings::default(),
            style_prefix: "masterpiece, best quality, very aesthetic, absurdres, chibi, \
                           2-head-tall, full body, simple_background, green_background, \
                           standing, game sprite, clean silhouette"
                .to_string(),
            negative_prompt: "nsfw, lowres, bad quality, worst quality, text, watermark, \
                              realistic, photorealistic, 3d render, multiple characters, \
                              multiple views, deformed"
                .to_string(),
            output_subdir: "training".to_string(),
            seed_base: 200_000,
            variants: 2,
            characters: Vec::new(),
            directions: Vec::new(),
            retakes: Vec::new(),
            retake_candidates: 2,
            job_log: None,
        }
    }
}

/// One curated image selection: a source path (or glob) plus its
/// per-image caption tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurateImage {
    pub src: String,
    #[serde(default)]
    pub tags: String,
}

/// One character's curated selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurateCharacter {
    pub id: String,
    /// Trigger word; also names the training folder
    pub trigger: String,
    #[serde(default)]
    pub gender: String,
    pub images: Vec<CurateImage>,
}

/// Curation manifest (JSON file): which generated images make the final
/// training set, and how to caption them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurateManifest {
    pub version: u32,
    /// Dataset output directory; recreated from scratch each run
    pub output_dir: String,
    /// Training repeat count encoded into folder names
    pub repeats: u32,
    /// Style tags shared by every caption
    pub style_tags: String,
    pub characters: Vec<CurateCharacter>,
}

impl Default for CurateManifest {
    fn default() -> Self {
        Self {
            version: 1,
            output_dir: "dataset".to_string(),
            repeats: 10,
            style_tags: "chibi, full body, standing, green_background, simple_background"
                .to_string(),
            characters: Vec::new(),
        }
    }
}
