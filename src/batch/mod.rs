mod enqueue;

pub use enqueue::{PlannedJob, QueuedJob, enqueue_batch, expand_manifest, plan_seed, write_job_log};
