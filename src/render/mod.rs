mod client;
mod workflow;

pub use client::{
    HttpRenderClient, ImageRef, JobId, JobOutcome, PollPolicy, RenderClient, wait_for_outcome,
};
pub use workflow::{LoraWeights, PoseRef, SamplerSettings, WorkflowParams, build_workflow};
