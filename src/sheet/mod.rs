mod bake;
mod compose;
mod layout;

pub use bake::{SheetPlan, SheetReport, bake_sheet};
pub use compose::compose_sheet;
pub use layout::{Facing, SheetLayout};
