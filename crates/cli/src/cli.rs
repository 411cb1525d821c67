use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shafu")]
#[command(version, about = "Run and inspect Gradle builds", long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    RUST_LOG=debug    Enable debug logging")]
pub struct Shafu {
    /// Cancel the operation after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Gradle launcher to use instead of the wrapper or the one on PATH
    #[arg(long, global = true, value_name = "PATH")]
    pub gradle: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run tasks of a project
    #[command(visible_alias = "b")]
    Build {
        /// Project directory
        project_dir: PathBuf,

        /// Command line: [@version] [options] tasks... [# options...]
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command_line: Vec<String>,
    },
    /// Print a model of a project as JSON
    #[command(visible_alias = "i")]
    Inspect {
        /// Project directory
        project_dir: PathBuf,

        /// Model to retrieve
        #[arg(value_enum)]
        model: ModelKind,
    },
    /// Print the distribution locator of a Gradle version
    Resolve {
        /// Gradle version, e.g. 7.6
        version: String,

        /// Use http instead of https
        #[arg(long)]
        insecure: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    Environment,
    Projects,
    Tasks,
}
