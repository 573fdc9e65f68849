pub mod batch;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod frame;
pub mod output;
pub mod render;
pub mod sheet;

pub use error::BakeError;
pub use render::{HttpRenderClient, RenderClient};
pub use sheet::{Facing, SheetLayout, SheetPlan, SheetReport};
