use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;

use crate::source::Source;

#[derive(Parser)]
#[command(version, about = "Render SVG documents to PNG.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a single SVG file or URL.
    Convert(ConvertArgs),

    /// Convert every input listed in the config file.
    Batch(BatchArgs),
}

#[derive(Args, Clone)]
pub struct ConvertArgs {
    /// Path or http(s) URL of the SVG to convert.
    pub source: Source,

    /// Where to write the PNG. Use "-" for stdout.
    /// Defaults to the source file name with a .png extension.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output width in pixels.
    #[arg(short = 'W', long, default_value_t = svg2png::convert::DEFAULT_WIDTH)]
    pub width: u32,

    /// Output height in pixels.
    #[arg(short = 'H', long, default_value_t = svg2png::convert::DEFAULT_HEIGHT)]
    pub height: u32,

    /// Resolution used for physical units (in, cm, mm, pt, pc).
    #[arg(short, long, default_value_t = svg2png::convert::DEFAULT_DPI)]
    pub dpi: u32,

    /// Render at N times the output size and downsample.
    /// Overrides the config file.
    #[arg(long)]
    pub supersample: Option<u32>,

    /// Config file to read limits from, if it exists.
    #[arg(long, default_value = crate::config::FILE_NAME)]
    pub config: PathBuf,
}

#[derive(Args, Clone)]
pub struct BatchArgs {
    /// Config file listing the inputs.
    #[arg(long, default_value = crate::config::FILE_NAME)]
    pub config: PathBuf,

    /// Maximum number of files converted at once.
    #[arg(short, long, default_value_t = 4)]
    pub jobs: usize,
}
