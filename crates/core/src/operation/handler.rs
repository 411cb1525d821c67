use super::{
    Completion, OperationConfig, OperationStatus, OperationTimings, ProgressEvent,
    ProgressListener, ResultHandler,
};
use crate::ambient::{AmbientProperties, KEY_USER_DIR, PropertyScope};
use crate::cancel::{Cancellation, CancelMarker, CancellationToken, MarkerStrategy, TokenStrategy};
use crate::capability::{CapabilityGate, Feature};
use crate::connector::Operation;
use crate::context::{GradleContext, apply_overrides, extract_system_properties};
use crate::error::{Error, Result};
use crate::monitor::ProgressMonitor;
use crate::version::GradleVersion;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Build property carrying the cancel marker path into the init script.
pub const KEY_CANCEL_FILE: &str = "shafu.core.cancelFile";

const TASK_NAME_PREFIX: &str = "[Gradle] ";

/// Per-call inputs that do not come from the context.
#[derive(Debug, Clone, Default)]
pub struct OperationSetup {
    /// Script passed with `--init-script` to every call.
    pub init_script: Option<PathBuf>,
    /// Tool version reported by the connected session.
    pub server_version: Option<String>,
    /// Where the cancel marker is created; the system temp dir if unset.
    pub marker_directory: Option<PathBuf>,
    pub gate: CapabilityGate,
}

/// Drives one asynchronous tool call from a synchronous, cancellable caller.
///
/// Preparing the handler installs the call's ambient property overrides and
/// creates its cancel marker. Both are undone exactly once by
/// [`OperationHandler::close`], which [`OperationHandler::drive`] always
/// calls and `Drop` falls back to.
pub struct OperationHandler<T> {
    completion: Arc<Completion<T>>,
    progress: Arc<Mutex<Option<ProgressEvent>>>,
    cancellation: Cancellation,
    properties: Option<PropertyScope>,
    config: Option<OperationConfig>,
    ambient: AmbientProperties,
    timings: OperationTimings,
    closed: bool,
}

impl<T: Send + 'static> OperationHandler<T> {
    /// Builds the call configuration from `context` and applies its ambient overrides.
    pub fn prepare(
        context: &GradleContext,
        ambient: &AmbientProperties,
        setup: &OperationSetup,
    ) -> Result<Self> {
        let server_version = setup.server_version.as_deref();
        let mut cancellation = Cancellation::new();
        let mut arguments = Vec::new();

        if let Some(script) = &setup.init_script {
            arguments.push("--init-script".to_string());
            arguments.push(script.display().to_string());
        }

        let marker = match &setup.marker_directory {
            Some(directory) => CancelMarker::create_in(directory),
            None => CancelMarker::create(),
        };
        match marker {
            Ok(marker) => {
                arguments.push(format!("-D{}={}", KEY_CANCEL_FILE, marker.path().display()));
                cancellation = cancellation.with_strategy(MarkerStrategy(marker));
            }
            Err(e) => warn!("Failed to create cancel marker, marker cancellation disabled: {}", e),
        }
        arguments.extend(context.gradle_arguments().iter().cloned());

        let environment = if context.environment().is_empty() {
            None
        } else if setup
            .gate
            .allows(Feature::EnvironmentVariables, server_version, context)
        {
            Some(apply_overrides(std::env::vars_os(), context.environment()))
        } else {
            None
        };

        let cancellation_token = match GradleVersion::parse(Feature::CancellationToken.minimum_version()) {
            Ok(minimum) if setup.gate.supports(server_version, &minimum) => {
                let token = CancellationToken::new();
                cancellation = cancellation.with_strategy(TokenStrategy(token.clone()));
                Some(token)
            }
            _ => {
                debug!(
                    "Gradle {:?}: {}",
                    server_version,
                    Feature::CancellationToken.fallback()
                );
                None
            }
        };

        let progress = Arc::new(Mutex::new(None));
        let slot = progress.clone();
        let listener: ProgressListener = Arc::new(move |event: ProgressEvent| {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(event);
        });

        let config = OperationConfig {
            java_home: context.java_home().map(|p| p.to_path_buf()),
            standard_input: context.standard_input().cloned(),
            standard_output: context.standard_output().cloned(),
            standard_error: context.standard_error().cloned(),
            jvm_arguments: context.jvm_arguments().to_vec(),
            arguments,
            environment,
            progress_listeners: vec![listener],
            cancellation_token,
        };

        let mut overrides = extract_system_properties(context.jvm_arguments());
        overrides.insert(
            KEY_USER_DIR.to_string(),
            context.project_directory().display().to_string(),
        );
        // the marker inside `cancellation` is removed on drop if this fails
        let properties = ambient.scoped(overrides)?;

        debug!(
            "Prepared operation for {} (cancellation: {:?})",
            context.project_name(),
            cancellation.active()
        );
        Ok(Self {
            completion: Arc::new(Completion::new()),
            progress,
            cancellation,
            properties: Some(properties),
            config: Some(config),
            ambient: ambient.clone(),
            timings: context.timings(),
            closed: false,
        })
    }

    /// The configuration the operation will be started with.
    pub fn config(&self) -> Option<&OperationConfig> {
        self.config.as_ref()
    }

    /// The listener that feeds the latest-event slot.
    pub fn progress_listener(&self) -> Option<ProgressListener> {
        self.config
            .as_ref()
            .and_then(|config| config.progress_listeners.first().cloned())
    }

    /// Names of the cancellation strategies a cancel request will fire.
    pub fn active_cancellation(&self) -> Vec<&'static str> {
        self.cancellation.active()
    }

    /// Fires the call; completion arrives later through the result handler.
    pub fn start(&mut self, operation: Box<dyn Operation<T>>) -> Result<()> {
        let config = self
            .config
            .take()
            .ok_or_else(|| Error::Connection("operation was already started".to_string()))?;
        operation.start(
            config,
            &self.ambient,
            ResultHandler::new(self.completion.clone()),
        );
        Ok(())
    }

    /// Waits up to `timeout` for the call to finish.
    pub fn await_completion(&self, timeout: Duration) -> bool {
        self.completion.wait(timeout)
    }

    /// Drains the most recent progress event, if any arrived since the last call.
    pub fn take_progress_event(&self) -> Option<ProgressEvent> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_done(&self) -> bool {
        self.completion.is_settled()
    }

    pub fn has_failure(&self) -> bool {
        self.completion.has_failure()
    }

    /// Hands over the outcome once; `Pending` before completion or after it was taken.
    pub fn take_status(&self) -> OperationStatus<T> {
        self.completion.take()
    }

    /// Requests cancellation through every strategy and waits for the grace period.
    pub fn cancel_and_wait(&mut self) -> Result<T> {
        self.cancellation.request();
        let grace = self.timings.cancel_grace;
        if self.await_completion(grace) {
            info!("Operation cancelled");
            return Err(Error::Cancelled);
        }
        warn!("Operation did not confirm cancellation within {:?}", grace);
        Err(Error::CancelNotConfirmed { grace })
    }

    /// Polls the started call to its end and releases the handler's resources.
    pub fn drive(&mut self, monitor: &mut dyn ProgressMonitor) -> Result<T> {
        let outcome = self.poll(monitor);
        self.close();
        outcome
    }

    fn poll(&mut self, monitor: &mut dyn ProgressMonitor) -> Result<T> {
        while !self.await_completion(self.timings.poll_interval) {
            if monitor.is_cancelled() {
                return self.cancel_and_wait();
            }
            if let Some(event) = self.take_progress_event() {
                monitor.set_task_name(&format!("{}{}", TASK_NAME_PREFIX, event.description()));
            }
            monitor.worked(1);
        }
        match self.take_status() {
            OperationStatus::Completed(value) => Ok(value),
            OperationStatus::Failed(failure) if failure.is_cancellation() => {
                debug!("Failure reclassified as cancellation: {}", failure);
                Err(Error::Cancelled)
            }
            OperationStatus::Failed(failure) => Err(Error::Tool(failure)),
            OperationStatus::Pending => Err(Error::Connection(
                "operation finished without reporting a result".to_string(),
            )),
        }
    }

    /// Restores ambient properties and deletes the cancel marker. Runs once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(scope) = self.properties.take() {
            if let Err(e) = scope.close() {
                error!("Failed to restore ambient properties: {}", e);
            }
        }
        self.cancellation.release();
    }
}

impl<T> Drop for OperationHandler<T> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            // PropertyScope restores on drop and logs its own failure
            self.properties.take();
            self.cancellation.release();
        }
    }
}
