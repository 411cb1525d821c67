use anyhow::Result;
use shafu_core::{BuildTask, GradleArguments};
use std::path::Path;
use tracing::{debug, info};

use super::{RunOptions, attach_console, load_settings, project_directory};

pub fn build_command(project_dir: &Path, command_line: &[String], options: &RunOptions) -> Result<()> {
    let project_dir = project_directory(project_dir)?;
    let settings = load_settings(&project_dir)?;

    let arguments = GradleArguments::parse(&command_line.join(" "));
    debug!("Parsed command line: {:?}", arguments);

    let mut context = attach_console(settings.create_context(&project_dir, &arguments.options)?);
    if let Some(version) = arguments.gradle_version {
        context.set_gradle_version(Some(version));
    }

    info!("Building {} {}", project_dir.display(), arguments.task_names.join(" "));
    let launcher = options.launcher(&settings);
    let mut monitor = options.monitor();
    BuildTask::new(context, arguments.task_names).run(&launcher, &mut monitor)?;
    Ok(())
}
