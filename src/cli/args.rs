use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "spritebake")]
#[command(version, about = "Render-server sprite pipeline for LoRA training data", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Render character frames and bake them into a spritesheet
    Sheet(SheetArgs),
    /// Enqueue a batch of training-image jobs from a prompt manifest
    Batch(BatchArgs),
    /// Copy curated images and write caption files for training
    Curate(CurateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SheetArgs {
    /// Sheet configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: PathBuf,

    /// Output directory for the sheet [default: from config]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Base name for the sheet file [default: from config]
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Render server base URL [default: from config]
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Base seed; each facing row renders at seed + row index [default: from config]
    #[arg(long)]
    pub seed: Option<u64>,

    /// Character description appended to every prompt [default: from config]
    #[arg(long)]
    pub character: Option<String>,

    /// LoRA file name on the server [default: from config]
    #[arg(long)]
    pub lora: Option<String>,

    /// Cell edge length in pixels [default: from config]
    #[arg(long)]
    pub cell_size: Option<u32>,

    /// Compress PNG output (0-6 or 'max'). Default level is 2 if flag is present without value.
    #[arg(long, value_name = "LEVEL", default_missing_value = "2", num_args = 0..=1)]
    pub compress: Option<CompressionLevel>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Prompt manifest file
    pub manifest: PathBuf,

    /// Render server base URL [default: from manifest]
    #[arg(long, value_name = "URL")]
    pub server: Option<String>,

    /// Where to write the queued-job log [default: from manifest]
    #[arg(long, value_name = "FILE")]
    pub job_log: Option<PathBuf>,

    /// Expand the manifest and print the plan without submitting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CurateArgs {
    /// Curation manifest file
    pub manifest: PathBuf,

    /// Output dataset directory [default: from manifest]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// PNG compression level (0-6 or max)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    /// Optimization level 0-6
    Level(u8),
    /// Maximum compression
    Max,
}

impl std::str::FromStr for CompressionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("max") {
            Ok(CompressionLevel::Max)
        } else {
            s.parse::<u8>()
                .map_err(|_e| format!("invalid compression level: {}", s))
                .and_then(|n| {
                    if n <= 6 {
                        Ok(CompressionLevel::Level(n))
                    } else {
                        Err(format!("compression level must be 0-6 or 'max', got {}", n))
                    }
                })
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        CompressionLevel::Level(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_level_parses() {
        assert_eq!("max".parse::<CompressionLevel>(), Ok(CompressionLevel::Max));
        assert_eq!("MAX".parse::<CompressionLevel>(), Ok(CompressionLevel::Max));
        assert_eq!(
            "3".parse::<CompressionLevel>(),
            Ok(CompressionLevel::Level(3))
        );
        assert!("7".parse::<CompressionLevel>().is_err());
        assert!("fast".parse::<CompressionLevel>().is_err());
    }
}
