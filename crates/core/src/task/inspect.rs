use super::{Launcher, TaskState, summarize};
use crate::context::GradleContext;
use crate::error::{Error, Result};
use crate::model::ToolModel;
use crate::monitor::ProgressMonitor;
use std::marker::PhantomData;
use tracing::{debug, info};

/// Retrieves a model of a project.
#[derive(Debug)]
pub struct InspectTask<M> {
    context: GradleContext,
    trace: Vec<TaskState>,
    model: PhantomData<fn() -> M>,
}

impl<M: ToolModel> InspectTask<M> {
    pub fn new(context: GradleContext) -> Self {
        Self {
            context,
            trace: Vec::new(),
            model: PhantomData,
        }
    }

    pub fn context(&self) -> &GradleContext {
        &self.context
    }

    pub fn trace(&self) -> &[TaskState] {
        &self.trace
    }

    pub fn run(&mut self, launcher: &Launcher, monitor: &mut dyn ProgressMonitor) -> Result<M> {
        let project = self.context.project_name();
        monitor.begin_task(&format!("Inspecting {} of {project}", M::NAME), 100);
        self.trace.clear();

        let wrapped_project = project.clone();
        let result = launcher.run(
            &mut self.context,
            monitor,
            &mut self.trace,
            |connection| connection.new_model_request(&M::tasks()),
            move |source| Error::Inspect {
                project: wrapped_project,
                model: M::NAME.to_string(),
                source: Box::new(source),
            },
        );
        let parsed = result.and_then(|output| {
            debug!("Parsing {} bytes of {} output", output.len(), M::NAME);
            M::parse(&output).map_err(|source| Error::Inspect {
                project: project.clone(),
                model: M::NAME.to_string(),
                source: Box::new(source),
            })
        });
        match &parsed {
            Ok(_) => info!("Inspected {} of {}", M::NAME, project),
            Err(Error::Cancelled) => info!("Inspection of {} was cancelled", project),
            Err(error) => self.context.information(&summarize(error)),
        }
        parsed
    }
}
