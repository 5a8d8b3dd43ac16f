use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mediarec")]
#[command(about = "Record audio and video clips from the local capture devices", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// Show the running session's phase, timer and recording
    Status,
    /// Start recording, or resume a paused recording
    Start,
    /// Pause the current recording
    Pause,
    /// Stop recording and finalize the clip
    Stop,
    /// Switch the recorder between audio and video
    ToggleMode,
    /// Save the finished recording to disk
    Download(DownloadCliArgs),
    /// Show the config file location and effective settings
    Config,
}

#[derive(ClapArgs, Debug)]
pub struct DownloadCliArgs {
    /// Output file or directory (default: configured download directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
