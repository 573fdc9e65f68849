mod args;

pub use args::{BatchArgs, CliArgs, Command, CompressionLevel, CurateArgs, SheetArgs};
