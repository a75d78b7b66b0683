use anyhow::{Result, bail};
use apsis::{run, scenario::ScenarioConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(about = "Orbit and trajectory pipeline for patched-conic space simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a scenario
    Run {
        /// Path to RON scenario file to use
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of frames to run (overrides the scenario file)
        #[arg(short, long)]
        frames: Option<u64>,
    },
    /// Generate the default RON scenario file
    GenerateConfig {
        /// Path where the file should be written
        #[arg(short, long)]
        output_path: PathBuf,
        /// Overwrite any existing file at the given path
        #[arg(short, long)]
        force_overwrite: bool,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { config, frames } => {
            let config = match config {
                Some(file_path) => ScenarioConfig::from_ron_file(file_path)?,
                None => ScenarioConfig::default(),
            };
            let summary = run::run(config, frames)?;
            println!("{summary:#?}");
            Ok(())
        }
        Command::GenerateConfig {
            output_path,
            force_overwrite,
        } => {
            if !force_overwrite && output_path.exists() {
                bail!("File {} already exists", output_path.display());
            }
            ScenarioConfig::default().write_ron_file(output_path)
        }
    }
}
