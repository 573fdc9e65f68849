mod curate;

pub use curate::{CurateSummary, curate_dataset};
