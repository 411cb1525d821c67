use super::{Launcher, TaskState, summarize};
use crate::context::GradleContext;
use crate::error::{Error, Result};
use crate::monitor::ProgressMonitor;
use tracing::info;

/// Runs tasks of a project.
#[derive(Debug)]
pub struct BuildTask {
    context: GradleContext,
    task_names: Vec<String>,
    trace: Vec<TaskState>,
}

impl BuildTask {
    pub fn new(context: GradleContext, task_names: Vec<String>) -> Self {
        Self {
            context,
            task_names,
            trace: Vec::new(),
        }
    }

    pub fn context(&self) -> &GradleContext {
        &self.context
    }

    pub fn task_names(&self) -> &[String] {
        &self.task_names
    }

    /// Phases passed by the last run.
    pub fn trace(&self) -> &[TaskState] {
        &self.trace
    }

    /// Runs the build. A cancelled build returns [`Error::Cancelled`] unwrapped.
    pub fn run(&mut self, launcher: &Launcher, monitor: &mut dyn ProgressMonitor) -> Result<()> {
        let project = self.context.project_name();
        monitor.begin_task(&format!("Building {project}"), 100);
        self.trace.clear();

        let task_names = self.task_names.clone();
        let wrapped_project = project.clone();
        let result = launcher.run(
            &mut self.context,
            monitor,
            &mut self.trace,
            move |connection| connection.new_build(&task_names),
            move |source| Error::Build {
                project: wrapped_project,
                source: Box::new(source),
            },
        );
        match &result {
            Ok(()) => info!("Build of {} succeeded", project),
            Err(Error::Cancelled) => info!("Build of {} was cancelled", project),
            Err(error) => self.context.information(&summarize(error)),
        }
        result
    }
}
