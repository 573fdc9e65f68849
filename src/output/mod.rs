mod format;

pub use format::save_sheet_image;
