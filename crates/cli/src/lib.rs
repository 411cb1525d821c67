pub mod cli;
pub mod commands;

// Re-export commonly used items
pub use cli::{Commands, ModelKind, Shafu};

use anyhow::Result;
use commands::{RunOptions, build_command, inspect_command, resolve_command};

/// Dispatches a parsed command line.
pub fn run(cli: Shafu) -> Result<()> {
    let options = RunOptions {
        timeout: cli.timeout,
        gradle: cli.gradle,
    };
    match cli.command {
        Commands::Build {
            project_dir,
            command_line,
        } => build_command(&project_dir, &command_line, &options),
        Commands::Inspect { project_dir, model } => inspect_command(&project_dir, model, &options),
        Commands::Resolve { version, insecure } => resolve_command(&version, insecure),
    }
}
