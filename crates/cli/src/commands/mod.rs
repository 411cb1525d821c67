pub mod build;
pub mod inspect;
pub mod resolve;

pub use build::build_command;
pub use inspect::inspect_command;
pub use resolve::resolve_command;

use anyhow::{Context, Result};
use shafu_core::context::OutputSink;
use shafu_core::monitor::{CancelFlag, TracingMonitor};
use shafu_core::{GradleContext, Launcher, ProcessConnector, Settings};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Options shared by the commands that run Gradle.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub timeout: Option<u64>,
    pub gradle: Option<PathBuf>,
}

impl RunOptions {
    /// Monitor that is cancelled once the timeout elapses.
    pub fn monitor(&self) -> TracingMonitor {
        let flag = CancelFlag::new();
        if let Some(seconds) = self.timeout {
            let timer = flag.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_secs(seconds));
                warn!("Timeout of {}s reached, cancelling", seconds);
                timer.cancel();
            });
        }
        TracingMonitor::new(flag)
    }

    pub fn launcher(&self, settings: &Settings) -> Launcher {
        let connector = match &self.gradle {
            Some(executable) => ProcessConnector::with_executable(executable),
            None => ProcessConnector::new(),
        };
        Launcher::new(Arc::new(connector)).with_enhancers(settings.enhancer_registry().chain())
    }
}

pub(crate) fn project_directory(path: &Path) -> Result<PathBuf> {
    let directory = path
        .canonicalize()
        .with_context(|| format!("Project directory {} not found", path.display()))?;
    debug!("Project directory: {}", directory.display());
    Ok(directory)
}

pub(crate) fn load_settings(project_dir: &Path) -> Result<Settings> {
    Settings::load(project_dir)
        .with_context(|| format!("Failed to load settings for {}", project_dir.display()))
}

/// Routes the tool's output and status lines to this process's streams.
pub(crate) fn attach_console(context: GradleContext) -> GradleContext {
    let stdout: OutputSink = Arc::new(Mutex::new(std::io::stdout()));
    let stderr: OutputSink = Arc::new(Mutex::new(std::io::stderr()));
    context
        .with_standard_output(stdout)
        .with_standard_error(stderr.clone())
        .with_information_output(stderr)
}
