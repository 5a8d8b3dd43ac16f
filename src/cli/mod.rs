//! CLI handlers.
//!
//! Session commands talk to the running service over its HTTP API.

pub mod args;
pub mod client;

use anyhow::Result;

use crate::config::Config;
use crate::session::{SessionPhase, SessionSnapshot};

pub use args::{Cli, CliCommand, DownloadCliArgs};
pub use client::{DownloadTarget, SessionClient};

pub async fn handle_session_command(command: CliCommand, config: &Config) -> Result<()> {
    let client = SessionClient::new(config.api.base_url());

    match command {
        CliCommand::Status => print_snapshot(&client.status().await?),
        CliCommand::Start => {
            let snapshot = client.command("start").await?;
            println!("Recording {} (session {})", snapshot.mode, session_label(&snapshot));
        }
        CliCommand::Pause => {
            let snapshot = client.command("pause").await?;
            println!("{} at {}", capitalize(snapshot.phase.as_str()), snapshot.elapsed);
        }
        CliCommand::Stop => {
            let snapshot = client.command("stop").await?;
            match &snapshot.artifact {
                Some(artifact) => println!(
                    "Recording finished: {} ({} bytes, {}s). Save it with `mediarec download`.",
                    artifact.filename, artifact.size_bytes, artifact.duration_seconds
                ),
                None if snapshot.phase == SessionPhase::Stopped => {
                    println!("Stopped, nothing was captured")
                }
                None => println!("Stop requested ({})", snapshot.phase),
            }
        }
        CliCommand::ToggleMode => {
            let mode = client.toggle_mode().await?;
            println!("Capture mode: {}", mode);
        }
        CliCommand::Download(args) => {
            let target = match args.output {
                Some(path) => DownloadTarget::from_output(path),
                None => DownloadTarget::Directory(config.download.resolve_directory()?),
            };
            let path = client.download(&target).await?;
            println!("Saved recording to {}", path.display());
        }
        CliCommand::Version | CliCommand::Config => {}
    }

    Ok(())
}

pub fn handle_config_command(config: &Config) -> Result<()> {
    println!("Config file: {}", Config::config_path()?.display());
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    println!("Phase:    {}", snapshot.phase);
    println!("Mode:     {} ({:?} recorder)", snapshot.mode, snapshot.variant);
    println!("Elapsed:  {}", snapshot.elapsed);
    if let Some(stream) = &snapshot.live_stream {
        let tracks: Vec<String> = stream.tracks.iter().map(|t| t.to_string()).collect();
        println!("Live:     {} [{}]", stream.id, tracks.join(", "));
    }
    if let Some(artifact) = &snapshot.artifact {
        println!(
            "Clip:     {} ({}, {} bytes, {}s)",
            artifact.filename, artifact.mime, artifact.size_bytes, artifact.duration_seconds
        );
    }
    if let Some(warning) = &snapshot.warning {
        println!("Warning:  {}", warning);
    }
    if let Some(error) = &snapshot.last_error {
        println!("Error:    {}", error);
    }
}

fn session_label(snapshot: &SessionSnapshot) -> String {
    snapshot
        .session_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
