//! The build request: where to run, which tool, and with what arguments

mod environment;

pub use environment::{EnvironmentOverrides, apply_overrides, extract_system_properties};

use crate::error::Result;
use crate::monitor::ProgressMonitor;
use crate::operation::OperationTimings;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use url::Url;

/// The default file name of a Gradle build script.
pub const DEFAULT_BUILD_SCRIPT_NAME: &str = "build.gradle";

/// A writable stream shared with the running operation.
pub type OutputSink = Arc<Mutex<dyn Write + Send>>;

/// A readable stream handed to the running operation.
pub type InputSource = Arc<Mutex<dyn Read + Send>>;

/// Teardown work registered while enhancing a context.
pub type DisposeAction = Box<dyn FnOnce(&mut dyn ProgressMonitor) -> Result<()> + Send>;

/// Describes one Gradle invocation.
///
/// A context is created per logical operation, mutated by enhancers, read
/// while the operation executes and discarded after its dispose actions ran.
pub struct GradleContext {
    project_directory: PathBuf,
    gradle_version: Option<String>,
    use_https: bool,
    gradle_distribution: Option<Url>,
    gradle_user_home: Option<PathBuf>,
    java_home: Option<PathBuf>,
    standard_input: Option<InputSource>,
    standard_output: Option<OutputSink>,
    standard_error: Option<OutputSink>,
    information_output: Option<OutputSink>,
    jvm_arguments: Vec<String>,
    gradle_arguments: Vec<String>,
    environment: EnvironmentOverrides,
    timings: OperationTimings,
    pub(crate) dispose_actions: Vec<DisposeAction>,
}

impl GradleContext {
    pub fn new(project_directory: impl Into<PathBuf>) -> Self {
        let project_directory = project_directory.into();
        let project_directory =
            std::path::absolute(&project_directory).unwrap_or(project_directory);
        Self {
            project_directory,
            gradle_version: None,
            use_https: false,
            gradle_distribution: None,
            gradle_user_home: None,
            java_home: None,
            standard_input: None,
            standard_output: None,
            standard_error: None,
            information_output: None,
            jvm_arguments: Vec::new(),
            gradle_arguments: Vec::new(),
            environment: EnvironmentOverrides::new(),
            timings: OperationTimings::default(),
            dispose_actions: Vec::new(),
        }
    }

    pub fn project_directory(&self) -> &Path {
        &self.project_directory
    }

    /// Display name of the project: the last component of its directory.
    pub fn project_name(&self) -> String {
        self.project_directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.project_directory.display().to_string())
    }

    /// Only consulted when no distribution locator is set.
    pub fn gradle_version(&self) -> Option<&str> {
        self.gradle_version.as_deref()
    }

    pub fn set_gradle_version(&mut self, version: Option<String>) {
        self.gradle_version = version;
    }

    pub fn use_https(&self) -> bool {
        self.use_https
    }

    pub fn set_use_https(&mut self, use_https: bool) {
        self.use_https = use_https;
    }

    pub fn gradle_distribution(&self) -> Option<&Url> {
        self.gradle_distribution.as_ref()
    }

    pub fn set_gradle_distribution(&mut self, distribution: Option<Url>) {
        self.gradle_distribution = distribution;
    }

    pub fn gradle_user_home(&self) -> Option<&Path> {
        self.gradle_user_home.as_deref()
    }

    pub fn set_gradle_user_home(&mut self, directory: Option<PathBuf>) {
        self.gradle_user_home = directory;
    }

    pub fn java_home(&self) -> Option<&Path> {
        self.java_home.as_deref()
    }

    pub fn set_java_home(&mut self, directory: Option<PathBuf>) {
        self.java_home = directory;
    }

    pub fn standard_input(&self) -> Option<&InputSource> {
        self.standard_input.as_ref()
    }

    pub fn standard_output(&self) -> Option<&OutputSink> {
        self.standard_output.as_ref()
    }

    pub fn standard_error(&self) -> Option<&OutputSink> {
        self.standard_error.as_ref()
    }

    pub fn jvm_arguments(&self) -> &[String] {
        &self.jvm_arguments
    }

    pub fn set_jvm_arguments(&mut self, arguments: Vec<String>) {
        self.jvm_arguments = arguments;
    }

    pub fn gradle_arguments(&self) -> &[String] {
        &self.gradle_arguments
    }

    pub fn set_gradle_arguments(&mut self, arguments: Vec<String>) {
        self.gradle_arguments = arguments;
    }

    pub fn environment(&self) -> &EnvironmentOverrides {
        &self.environment
    }

    pub fn set_environment(&mut self, variables: EnvironmentOverrides) {
        self.environment = variables;
    }

    pub fn timings(&self) -> OperationTimings {
        self.timings
    }

    pub fn dispose_action_count(&self) -> usize {
        self.dispose_actions.len()
    }

    pub fn with_gradle_version(mut self, version: impl Into<String>) -> Self {
        self.gradle_version = Some(version.into());
        self
    }

    pub fn with_https(mut self, use_https: bool) -> Self {
        self.use_https = use_https;
        self
    }

    pub fn with_gradle_distribution(mut self, distribution: Url) -> Self {
        self.gradle_distribution = Some(distribution);
        self
    }

    pub fn with_gradle_user_home(mut self, directory: impl Into<PathBuf>) -> Self {
        self.gradle_user_home = Some(directory.into());
        self
    }

    pub fn with_java_home(mut self, directory: impl Into<PathBuf>) -> Self {
        self.java_home = Some(directory.into());
        self
    }

    pub fn with_standard_input(mut self, stream: InputSource) -> Self {
        self.standard_input = Some(stream);
        self
    }

    pub fn with_standard_output(mut self, stream: OutputSink) -> Self {
        self.standard_output = Some(stream);
        self
    }

    pub fn with_standard_error(mut self, stream: OutputSink) -> Self {
        self.standard_error = Some(stream);
        self
    }

    /// Status lines go here instead of the process log.
    pub fn with_information_output(mut self, stream: OutputSink) -> Self {
        self.information_output = Some(stream);
        self
    }

    pub fn with_timings(mut self, timings: OperationTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Appends JVM arguments, keeping their order.
    pub fn with_jvm_arguments<I, S>(&mut self, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.jvm_arguments
            .extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Appends build arguments, keeping their order.
    pub fn with_gradle_arguments<I, S>(&mut self, arguments: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.gradle_arguments
            .extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Adds environment overrides; a `None` value unsets the inherited variable.
    pub fn with_environment_variables<I, K>(&mut self, variables: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        for (key, value) in variables {
            self.environment.insert(key.into(), value);
        }
        self
    }

    /// Registers an action to run once when the context is disposed.
    pub fn with_dispose_action<F>(&mut self, action: F) -> &mut Self
    where
        F: FnOnce(&mut dyn ProgressMonitor) -> Result<()> + Send + 'static,
    {
        self.dispose_actions.push(Box::new(action));
        self
    }

    /// Prints a status line into the information sink, or logs it.
    pub fn information(&self, message: &str) {
        match &self.information_output {
            Some(sink) => {
                let written = match sink.lock() {
                    Ok(mut writer) => writeln!(writer, "{message}").and_then(|_| writer.flush()),
                    Err(_) => Err(std::io::Error::other("information sink is poisoned")),
                };
                if let Err(e) = written {
                    warn!("Failed to write information '{}': {}", message, e);
                }
            }
            None => info!("{}", message),
        }
    }
}

impl fmt::Debug for GradleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradleContext")
            .field("project_directory", &self.project_directory)
            .field("gradle_version", &self.gradle_version)
            .field("use_https", &self.use_https)
            .field("gradle_distribution", &self.gradle_distribution)
            .field("gradle_user_home", &self.gradle_user_home)
            .field("java_home", &self.java_home)
            .field("jvm_arguments", &self.jvm_arguments)
            .field("gradle_arguments", &self.gradle_arguments)
            .field("environment", &self.environment)
            .field("dispose_actions", &self.dispose_actions.len())
            .finish()
    }
}
