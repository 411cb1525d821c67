//! Build and inspect tasks: enhance, connect, execute, disconnect, dispose

mod build;
mod inspect;

pub use build::BuildTask;
pub use inspect::InspectTask;

use crate::ambient::AmbientProperties;
use crate::capability::CapabilityGate;
use crate::connector::{ConnectionSpec, Operation, ProjectConnection, ToolConnector};
use crate::context::GradleContext;
use crate::enhance::EnhancerChain;
use crate::error::{Error, Result};
use crate::init_script::InitScript;
use crate::monitor::{ProgressMonitor, check_cancel};
use crate::operation::{OperationHandler, OperationSetup};
use crate::version::VersionResolver;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Phases a task run passes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Init,
    Enhancing,
    Connecting,
    Executing,
    Succeeded,
    Cancelled,
    Failed,
    Disposing,
    Done,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Init => "init",
            TaskState::Enhancing => "enhancing",
            TaskState::Connecting => "connecting",
            TaskState::Executing => "executing",
            TaskState::Succeeded => "succeeded",
            TaskState::Cancelled => "cancelled",
            TaskState::Failed => "failed",
            TaskState::Disposing => "disposing",
            TaskState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Shared collaborators of build and inspect tasks.
///
/// Tasks sharing one [`AmbientProperties`] must not execute concurrently;
/// each call temporarily overwrites the same properties.
#[derive(Clone)]
pub struct Launcher {
    connector: Arc<dyn ToolConnector>,
    enhancers: EnhancerChain,
    resolver: VersionResolver,
    ambient: AmbientProperties,
    gate: CapabilityGate,
    script_directory: Option<PathBuf>,
    marker_directory: Option<PathBuf>,
}

impl Launcher {
    pub fn new(connector: Arc<dyn ToolConnector>) -> Self {
        Self {
            connector,
            enhancers: EnhancerChain::default(),
            resolver: VersionResolver::default(),
            ambient: AmbientProperties::from_process(),
            gate: CapabilityGate::new(),
            script_directory: None,
            marker_directory: None,
        }
    }

    pub fn with_enhancers(mut self, enhancers: EnhancerChain) -> Self {
        self.enhancers = enhancers;
        self
    }

    pub fn with_resolver(mut self, resolver: VersionResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_ambient(mut self, ambient: AmbientProperties) -> Self {
        self.ambient = ambient;
        self
    }

    /// Where each call's copy of the init script is written instead of the system temp dir.
    pub fn with_script_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.script_directory = Some(directory.into());
        self
    }

    /// Where cancel markers are created instead of the system temp dir.
    pub fn with_marker_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.marker_directory = Some(directory.into());
        self
    }

    pub fn ambient(&self) -> &AmbientProperties {
        &self.ambient
    }

    pub fn enhancers(&self) -> &EnhancerChain {
        &self.enhancers
    }

    fn install_script(&self) -> Result<InitScript> {
        match &self.script_directory {
            Some(directory) => InitScript::install_in(directory),
            None => InitScript::install(),
        }
    }

    /// Runs every phase of one task and returns the execution outcome.
    ///
    /// Disconnect and dispose run whatever happened before them, panics
    /// included; a panic is resumed once both are done. Connect and
    /// execute failures pass through `wrap`; cancellations and enhancer
    /// failures are returned as they are.
    pub(crate) fn run<T, C, W>(
        &self,
        context: &mut GradleContext,
        monitor: &mut dyn ProgressMonitor,
        trace: &mut Vec<TaskState>,
        create: C,
        wrap: W,
    ) -> Result<T>
    where
        T: Send + 'static,
        C: FnOnce(&mut dyn ProjectConnection) -> Result<Box<dyn Operation<T>>>,
        W: FnOnce(Error) -> Error,
    {
        trace.push(TaskState::Init);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.enhance_and_execute(&mut *context, &mut *monitor, &mut *trace, create, wrap)
        }));
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(payload) => {
                error!("Task of {} panicked, disposing before unwinding", context.project_name());
                trace.push(TaskState::Failed);
                Self::dispose(context, monitor, trace);
                panic::resume_unwind(payload);
            }
        };

        trace.push(match &outcome {
            Ok(_) => TaskState::Succeeded,
            Err(Error::Cancelled) => TaskState::Cancelled,
            Err(_) => TaskState::Failed,
        });
        Self::dispose(context, monitor, trace);
        outcome
    }

    fn dispose(context: &mut GradleContext, monitor: &mut dyn ProgressMonitor, trace: &mut Vec<TaskState>) {
        trace.push(TaskState::Disposing);
        if EnhancerChain::dispose(context, monitor) {
            debug!("Disposal of {} observed a cancellation", context.project_name());
        }
        trace.push(TaskState::Done);
        monitor.done();
    }

    fn enhance_and_execute<T, C, W>(
        &self,
        context: &mut GradleContext,
        monitor: &mut dyn ProgressMonitor,
        trace: &mut Vec<TaskState>,
        create: C,
        wrap: W,
    ) -> Result<T>
    where
        T: Send + 'static,
        C: FnOnce(&mut dyn ProjectConnection) -> Result<Box<dyn Operation<T>>>,
        W: FnOnce(Error) -> Error,
    {
        trace.push(TaskState::Enhancing);
        self.enhancers.enhance(monitor, context)?;

        trace.push(TaskState::Connecting);
        check_cancel(monitor)?;
        let spec = ConnectionSpec::for_context(context, &self.resolver);
        let mut connection = match self.connector.connect(&spec) {
            Ok(connection) => connection,
            Err(e) => return Err(wrap_failure(e, wrap)),
        };

        trace.push(TaskState::Executing);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.execute(&*context, connection.as_mut(), &mut *monitor, create)
        }));
        connection.close();
        match outcome {
            Ok(outcome) => outcome.map_err(|e| wrap_failure(e, wrap)),
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    fn execute<T, C>(
        &self,
        context: &GradleContext,
        connection: &mut dyn ProjectConnection,
        monitor: &mut dyn ProgressMonitor,
        create: C,
    ) -> Result<T>
    where
        T: Send + 'static,
        C: FnOnce(&mut dyn ProjectConnection) -> Result<Box<dyn Operation<T>>>,
    {
        let server_version = match connection.build_environment(&*monitor) {
            Ok(environment) => Some(environment.gradle_version),
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!("Failed to detect the Gradle version: {}", e);
                None
            }
        };
        let operation = create(connection)?;
        // removed once the call is over
        let script = self.install_script()?;
        let setup = OperationSetup {
            init_script: Some(script.to_path_buf()),
            server_version,
            marker_directory: self.marker_directory.clone(),
            gate: self.gate,
        };
        let mut handler = OperationHandler::prepare(context, &self.ambient, &setup)?;
        handler.start(operation)?;
        handler.drive(monitor)
    }
}

impl fmt::Debug for Launcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Launcher")
            .field("enhancers", &self.enhancers)
            .field("resolver", &self.resolver)
            .field("script_directory", &self.script_directory)
            .field("marker_directory", &self.marker_directory)
            .finish()
    }
}

fn wrap_failure(error: Error, wrap: impl FnOnce(Error) -> Error) -> Error {
    match error {
        Error::Cancelled | Error::CancelNotConfirmed { .. } => error,
        other => wrap(other),
    }
}

/// One-line description of a failure for the information sink.
pub(crate) fn summarize(error: &Error) -> String {
    match error.tool_failure() {
        Some(failure) => format!("{error}: {}", failure.message()),
        None => match std::error::Error::source(error) {
            Some(source) => format!("{error}: {source}"),
            None => error.to_string(),
        },
    }
}
