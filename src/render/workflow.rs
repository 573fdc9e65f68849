use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Sampler knobs shared by every job of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerSettings {
    pub checkpoint: String,
    pub steps: u32,
    pub cfg_scale: f64,
    pub sampler: String,
    pub scheduler: String,
    pub width: u32,
    pub height: u32,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            checkpoint: "animagineXL31_v31.safetensors".to_string(),
            steps: 25,
            cfg_scale: 7.0,
            sampler: "euler_ancestral".to_string(),
            scheduler: "normal".to_string(),
            width: 1024,
            height: 1024,
        }
    }
}

/// LoRA adapter applied on top of the checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoraWeights {
    pub name: String,
    pub strength_model: f64,
    pub strength_clip: f64,
}

impl Default for LoraWeights {
    fn default() -> Self {
        Self {
            name: String::new(),
            strength_model: 0.9,
            strength_clip: 0.9,
        }
    }
}

/// Pose conditioning through a ControlNet and a server-side reference image.
#[derive(Debug, Clone)]
pub struct PoseRef {
    pub control_net: String,
    pub image: String,
    pub strength: f64,
}

/// One render job, fully described.
#[derive(Debug, Clone)]
pub struct WorkflowParams {
    pub positive: String,
    pub negative: String,
    pub seed: u64,
    pub filename_prefix: String,
    pub sampler: SamplerSettings,
    pub lora: Option<LoraWeights>,
    pub pose: Option<PoseRef>,
}

/// Build the server's node-graph JSON for one job.
///
/// Fixed wiring: checkpoint loader -> optional LoRA loader -> text encodes ->
/// empty latent -> optional ControlNet pose conditioning -> sampler ->
/// VAE decode -> save node.
pub fn build_workflow(params: &WorkflowParams) -> Value {
    let mut nodes = serde_json::Map::new();

    nodes.insert(
        "1".into(),
        json!({
            "class_type": "CheckpointLoaderSimple",
            "inputs": { "ckpt_name": params.sampler.checkpoint.as_str() }
        }),
    );

    let (model_src, clip_src) = if let Some(lora) = &params.lora {
        nodes.insert(
            "2".into(),
            json!({
                "class_type": "LoraLoader",
                "inputs": {
                    "model": ["1", 0],
                    "clip": ["1", 1],
                    "lora_name": lora.name.as_str(),
                    "strength_model": lora.strength_model,
                    "strength_clip": lora.strength_clip,
                }
            }),
        );
        (json!(["2", 0]), json!(["2", 1]))
    } else {
        (json!(["1", 0]), json!(["1", 1]))
    };

    nodes.insert(
        "3".into(),
        json!({
            "class_type": "CLIPTextEncode",
            "inputs": { "text": params.positive.as_str(), "clip": clip_src.clone() }
        }),
    );
    nodes.insert(
        "4".into(),
        json!({
            "class_type": "CLIPTextEncode",
            "inputs": { "text": params.negative.as_str(), "clip": clip_src }
        }),
    );
    nodes.insert(
        "5".into(),
        json!({
            "class_type": "EmptyLatentImage",
            "inputs": {
                "width": params.sampler.width,
                "height": params.sampler.height,
                "batch_size": 1,
            }
        }),
    );

    let positive_src = if let Some(pose) = &params.pose {
        nodes.insert(
            "6".into(),
            json!({
                "class_type": "ControlNetLoader",
                "inputs": { "control_net_name": pose.control_net.as_str() }
            }),
        );
        nodes.insert(
            "7".into(),
            json!({
                "class_type": "LoadImage",
                "inputs": { "image": pose.image.as_str() }
            }),
        );
        nodes.insert(
            "8".into(),
            json!({
                "class_type": "ControlNetApply",
                "inputs": {
                    "conditioning": ["3", 0],
                    "control_net": ["6", 0],
                    "image": ["7", 0],
                    "strength": pose.strength,
                }
            }),
        );
        json!(["8", 0])
    } else {
        json!(["3", 0])
    };

    nodes.insert(
        "9".into(),
        json!({
            "class_type": "KSampler",
            "inputs": {
                "model": model_src,
                "positive": positive_src,
                "negative": ["4", 0],
                "latent_image": ["5", 0],
                "seed": params.seed,
                "steps": params.sampler.steps,
                "cfg": params.sampler.cfg_scale,
                "sampler_name": params.sampler.sampler.as_str(),
                "scheduler": params.sampler.scheduler.as_str(),
                "denoise": 1,
            }
        }),
    );
    nodes.insert(
        "10".into(),
        json!({
            "class_type": "VAEDecode",
            "inputs": { "samples": ["9", 0], "vae": ["1", 2] }
        }),
    );
    nodes.insert(
        "11".into(),
        json!({
            "class_type": "SaveImage",
            "inputs": { "images": ["10", 0], "filename_prefix": params.filename_prefix.as_str() }
        }),
    );

    Value::Object(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> WorkflowParams {
        WorkflowParams {
            positive: "chibi, full body, brave knight".to_string(),
            negative: "blurry, deformed".to_string(),
            seed: 42,
            filename_prefix: "test/knight_down_0".to_string(),
            sampler: SamplerSettings::default(),
            lora: None,
            pose: None,
        }
    }

    #[test]
    fn test_plain_graph_wiring() {
        let wf = build_workflow(&base_params());

        assert_eq!(wf["9"]["inputs"]["model"], json!(["1", 0]));
        assert_eq!(wf["9"]["inputs"]["positive"], json!(["3", 0]));
        assert_eq!(wf["9"]["inputs"]["seed"], json!(42));
        assert_eq!(wf["9"]["inputs"]["steps"], json!(25));
        assert_eq!(wf["3"]["inputs"]["clip"], json!(["1", 1]));
        assert_eq!(wf["3"]["inputs"]["text"], json!("chibi, full body, brave knight"));
        assert_eq!(wf["11"]["inputs"]["filename_prefix"], json!("test/knight_down_0"));
        assert!(wf.get("2").is_none());
        assert!(wf.get("8").is_none());
    }

    #[test]
    fn test_lora_reroutes_model_and_clip() {
        let mut params = base_params();
        params.lora = Some(LoraWeights {
            name: "style-v1.safetensors".to_string(),
            ..LoraWeights::default()
        });

        let wf = build_workflow(&params);

        assert_eq!(wf["2"]["inputs"]["lora_name"], json!("style-v1.safetensors"));
        assert_eq!(wf["2"]["inputs"]["strength_model"], json!(0.9));
        assert_eq!(wf["9"]["inputs"]["model"], json!(["2", 0]));
        assert_eq!(wf["3"]["inputs"]["clip"], json!(["2", 1]));
        assert_eq!(wf["4"]["inputs"]["clip"], json!(["2", 1]));
    }

    #[test]
    fn test_pose_reroutes_conditioning() {
        let mut params = base_params();
        params.pose = Some(PoseRef {
            control_net: "openpose.safetensors".to_string(),
            image: "poses/pose_down_0.png".to_string(),
            strength: 1.0,
        });

        let wf = build_workflow(&params);

        assert_eq!(wf["7"]["inputs"]["image"], json!("poses/pose_down_0.png"));
        assert_eq!(wf["8"]["inputs"]["conditioning"], json!(["3", 0]));
        assert_eq!(wf["9"]["inputs"]["positive"], json!(["8", 0]));
        // negative conditioning stays on the raw encode
        assert_eq!(wf["9"]["inputs"]["negative"], json!(["4", 0]));
    }

    #[test]
    fn test_latent_matches_render_size() {
        let mut params = base_params();
        params.sampler.width = 768;
        params.sampler.height = 512;

        let wf = build_workflow(&params);

        assert_eq!(wf["5"]["inputs"]["width"], json!(768));
        assert_eq!(wf["5"]["inputs"]["height"], json!(512));
        assert_eq!(wf["5"]["inputs"]["batch_size"], json!(1));
    }
}
