use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BakeError {
    #[error("Failed to decode render output for frame '{label}': {source}")]
    ImageDecode {
        label: String,
        source: image::ImageError,
    },

    #[error("Failed to save image '{path}': {source}")]
    ImageSave {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to write output file '{path}': {source}")]
    OutputWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to compress PNG '{path}': {message}")]
    PngCompress { path: PathBuf, message: String },

    #[error("Render server request failed: {0}")]
    Http(Box<ureq::Error>),

    #[error("Render server returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("Render job {job_id} did not complete within {deadline_secs}s")]
    JobTimeout { job_id: String, deadline_secs: u64 },

    #[error("Render job {job_id} failed on the server: {detail}")]
    JobFailed { job_id: String, detail: String },

    #[error("Sheet layout expects {expected} frames, got {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    #[error(
        "Frame {index} is {actual_width}x{actual_height}, expected cell size {expected_width}x{expected_height}"
    )]
    CellSizeMismatch {
        index: usize,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

impl From<ureq::Error> for BakeError {
    fn from(source: ureq::Error) -> Self {
        BakeError::Http(Box::new(source))
    }
}
