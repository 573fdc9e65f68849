use std::collections::HashMap;
use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::error::BakeError;

/// Identifier the render server assigns to a queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side reference to one generated image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_image_kind")]
    pub kind: String,
}

fn default_image_kind() -> String {
    "output".to_string()
}

/// What a finished job reported back.
#[derive(Debug, Clone, Default)]
pub struct JobOutcome {
    pub images: Vec<ImageRef>,
    pub error: Option<String>,
}

/// Synchronous submit/poll/download interface to the render server.
///
/// The pipeline drives exactly one job at a time, polled to completion before
/// the next submit, so implementations never see concurrent calls. Tests
/// substitute a stub for the HTTP implementation.
pub trait RenderClient {
    /// Queue a workflow, returning the server-assigned job id.
    fn submit(&self, workflow: &Value) -> Result<JobId, BakeError>;

    /// Check on a queued job. `None` while it is still pending.
    fn fetch_outcome(&self, job: &JobId) -> Result<Option<JobOutcome>, BakeError>;

    /// Fetch the raw bytes of a generated image.
    fn download(&self, image: &ImageRef) -> Result<Vec<u8>, BakeError>;
}

/// Fixed-interval polling bounds for one render job.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            deadline: Duration::from_secs(120),
        }
    }
}

/// Poll a job until the server reports it finished.
///
/// Exceeding the deadline is fatal for the run. A job the server reports as
/// failed comes back as `JobFailed`; completion with an empty image list is
/// `Ok` and left to the caller, which substitutes a blank cell.
pub fn wait_for_outcome(
    client: &dyn RenderClient,
    job: &JobId,
    poll: &PollPolicy,
) -> Result<Vec<ImageRef>, BakeError> {
    let start = Instant::now();
    loop {
        if let Some(outcome) = client.fetch_outcome(job)? {
            if let Some(detail) = outcome.error {
                return Err(BakeError::JobFailed {
                    job_id: job.0.clone(),
                    detail,
                });
            }
            return Ok(outcome.images);
        }
        if start.elapsed() >= poll.deadline {
            return Err(BakeError::JobTimeout {
                job_id: job.0.clone(),
                deadline_secs: poll.deadline.as_secs(),
            });
        }
        thread::sleep(poll.interval);
    }
}

#[derive(Deserialize)]
struct SubmitResponse {
    prompt_id: String,
}

#[derive(Deserialize)]
struct HistoryEntry {
    #[serde(default)]
    outputs: HashMap<String, NodeOutput>,
    #[serde(default)]
    status: Option<HistoryStatus>,
}

#[derive(Deserialize)]
struct NodeOutput {
    #[serde(default)]
    images: Vec<ImageRef>,
}

#[derive(Deserialize)]
struct HistoryStatus {
    #[serde(default)]
    status_str: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    messages: Vec<Value>,
}

impl HistoryEntry {
    /// `None` when the entry is listed but still executing.
    fn into_outcome(self) -> Option<JobOutcome> {
        if let Some(status) = &self.status {
            if status.status_str == "error" {
                let detail = if status.messages.is_empty() {
                    "server reported an execution error".to_string()
                } else {
                    status
                        .messages
                        .iter()
                        .map(Value::to_string)
                        .collect::<Vec<_>>()
                        .join("; ")
                };
                return Some(JobOutcome {
                    images: Vec::new(),
                    error: Some(detail),
                });
            }
            if !status.completed {
                return None;
            }
        }

        let images = self
            .outputs
            .into_values()
            .flat_map(|output| output.images)
            .collect();
        Some(JobOutcome {
            images,
            error: None,
        })
    }
}

/// `RenderClient` over the server's HTTP API: `POST /prompt`,
/// `GET /history/{id}`, `GET /view`.
pub struct HttpRenderClient {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpRenderClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { agent, base_url }
    }
}

impl RenderClient for HttpRenderClient {
    fn submit(&self, workflow: &Value) -> Result<JobId, BakeError> {
        let response = self
            .agent
            .post(&format!("{}/prompt", self.base_url))
            .send_json(serde_json::json!({ "prompt": workflow }))?;
        let parsed: SubmitResponse = response
            .into_json()
            .map_err(|e| BakeError::MalformedResponse(e.to_string()))?;
        debug!("Queued job {}", parsed.prompt_id);
        Ok(JobId(parsed.prompt_id))
    }

    fn fetch_outcome(&self, job: &JobId) -> Result<Option<JobOutcome>, BakeError> {
        let response = self
            .agent
            .get(&format!("{}/history/{}", self.base_url, job))
            .call()?;
        let mut history: HashMap<String, HistoryEntry> = response
            .into_json()
            .map_err(|e| BakeError::MalformedResponse(e.to_string()))?;
        Ok(history.remove(&job.0).and_then(HistoryEntry::into_outcome))
    }

    fn download(&self, image: &ImageRef) -> Result<Vec<u8>, BakeError> {
        let response = self
            .agent
            .get(&format!("{}/view", self.base_url))
            .query("filename", &image.filename)
            .query("subfolder", &image.subfolder)
            .query("type", &image.kind)
            .call()?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| BakeError::MalformedResponse(e.to_string()))?;
        Ok(bytes)
    }
}
