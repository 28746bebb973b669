use clap::Parser;
use std::path::PathBuf;

use rusty_overlay::control::ComputeBackend;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Camera Index (default 0)
    #[arg(short, long, default_value_t = 0)]
    pub cam_index: u32,

    /// Inference backend, overrides the config file
    #[arg(short, long, value_enum)]
    pub backend: Option<ComputeBackend>,

    /// Maximum number of faces to track (1-20)
    #[arg(short, long)]
    pub max_faces: Option<u32>,

    /// Mirror the camera output
    #[arg(long)]
    pub mirror: Option<bool>,

    /// Path to the JSON config file
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// List available cameras
    #[arg(long)]
    pub list: bool,

    /// Run without a window for this many frames
    #[arg(long)]
    pub headless: Option<u32>,

    /// Save the last headless frame as PNG
    #[arg(long, requires = "headless")]
    pub snapshot: Option<PathBuf>,
}
