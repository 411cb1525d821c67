use anyhow::{Context, Result};
use serde::Serialize;
use shafu_core::{BuildEnvironment, InspectTask, Launcher, ProjectList, TaskList, ToolModel};
use shafu_core::context::{GradleContext, OutputSink};
use shafu_core::monitor::ProgressMonitor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::{RunOptions, attach_console, load_settings, project_directory};
use crate::cli::ModelKind;

pub fn inspect_command(project_dir: &Path, model: ModelKind, options: &RunOptions) -> Result<()> {
    let project_dir = project_directory(project_dir)?;
    let settings = load_settings(&project_dir)?;

    // model output is printed as JSON, so the tool's own output goes to stderr
    let stderr: OutputSink = Arc::new(Mutex::new(std::io::stderr()));
    let context = attach_console(settings.create_context(&project_dir, &[])?).with_standard_output(stderr);

    let launcher = options.launcher(&settings);
    let mut monitor = options.monitor();
    let json = match model {
        ModelKind::Environment => inspect::<BuildEnvironment>(context, &launcher, &mut monitor)?,
        ModelKind::Projects => inspect::<ProjectList>(context, &launcher, &mut monitor)?,
        ModelKind::Tasks => inspect::<TaskList>(context, &launcher, &mut monitor)?,
    };
    println!("{json}");
    Ok(())
}

fn inspect<M: ToolModel + Serialize + std::fmt::Debug>(
    context: GradleContext,
    launcher: &Launcher,
    monitor: &mut dyn ProgressMonitor,
) -> Result<String> {
    let model = InspectTask::<M>::new(context).run(launcher, monitor)?;
    serde_json::to_string_pretty(&model).with_context(|| format!("Failed to serialize {}", M::NAME))
}
