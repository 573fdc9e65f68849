mod load;
mod types;

pub(crate) use load::is_glob_pattern;
pub use load::{Loaded, load_batch_manifest, load_curate_manifest, load_sheet_config};
pub use types::{
    BatchManifest, CharacterEntry, CompressConfig, CurateCharacter, CurateImage, CurateManifest,
    DirectionEntry, FacingPrompts, PoseGuidance, RetakeEntry, SheetConfig,
};
