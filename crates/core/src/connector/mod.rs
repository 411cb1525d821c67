//! Seam between the orchestration layer and the build tool itself

mod process;

pub use process::ProcessConnector;

use crate::ambient::AmbientProperties;
use crate::context::GradleContext;
use crate::error::Result;
use crate::model::BuildEnvironment;
use crate::monitor::ProgressMonitor;
use crate::operation::{OperationConfig, ResultHandler};
use crate::version::VersionResolver;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Which tool distribution a connection uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Distribution {
    /// Whatever the project or connector picks by default.
    Default,
    /// A version name the connector resolves on its own.
    Version(String),
    /// An explicit distribution locator.
    Uri(Url),
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Default => f.write_str("default distribution"),
            Distribution::Version(version) => write!(f, "Gradle {version}"),
            Distribution::Uri(uri) => write!(f, "{uri}"),
        }
    }
}

/// Connection parameters derived from a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    pub project_directory: PathBuf,
    pub distribution: Distribution,
    pub gradle_user_home: Option<PathBuf>,
}

impl ConnectionSpec {
    /// Picks the distribution for `context`.
    ///
    /// An explicit locator always wins. Otherwise a version (or the https
    /// policy alone, which applies to the default version) is resolved to a
    /// locator; when that fails the connection falls back to the bare name.
    pub fn for_context(context: &GradleContext, resolver: &VersionResolver) -> Self {
        let distribution = if let Some(uri) = context.gradle_distribution() {
            Distribution::Uri(uri.clone())
        } else if context.gradle_version().is_some() || context.use_https() {
            match resolver.resolve(context.gradle_version(), context.use_https()) {
                Some(uri) => Distribution::Uri(uri),
                None => Distribution::Version(
                    context
                        .gradle_version()
                        .unwrap_or(resolver.default_version())
                        .to_string(),
                ),
            }
        } else {
            Distribution::Default
        };
        debug!(
            "Connecting to {} using {}",
            context.project_directory().display(),
            distribution
        );
        Self {
            project_directory: context.project_directory().to_path_buf(),
            distribution,
            gradle_user_home: context.gradle_user_home().map(|p| p.to_path_buf()),
        }
    }
}

/// Opens sessions against a project.
pub trait ToolConnector: Send + Sync {
    /// Open a session for the project described by `spec`
    fn connect(&self, spec: &ConnectionSpec) -> Result<Box<dyn ProjectConnection>>;
}

/// An open session with the tool for one project.
pub trait ProjectConnection: Send {
    /// Discover the environment the tool runs in, including its version.
    /// Fails with [`Error::Cancelled`](crate::error::Error::Cancelled) once `monitor` is cancelled.
    fn build_environment(&mut self, monitor: &dyn ProgressMonitor) -> Result<BuildEnvironment>;

    /// Create a build running `tasks`
    fn new_build(&mut self, tasks: &[String]) -> Result<Box<dyn Operation<()>>>;

    /// Create a model request; the result is the tool's raw report output
    fn new_model_request(&mut self, tasks: &[String]) -> Result<Box<dyn Operation<String>>>;

    /// Close the session. Must not fail.
    fn close(&mut self);
}

/// A call that starts immediately and reports its outcome later.
pub trait Operation<T>: Send {
    /// Launch the call. `handler` is invoked once, usually from another thread.
    fn start(self: Box<Self>, config: OperationConfig, ambient: &AmbientProperties, handler: ResultHandler<T>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distribution_priority() {
        let resolver = VersionResolver::default();
        let explicit = Url::parse("file:///opt/gradle-6.9").unwrap();
        let context = GradleContext::new("/work/app")
            .with_gradle_version("7.0")
            .with_gradle_distribution(explicit.clone());
        let spec = ConnectionSpec::for_context(&context, &resolver);
        assert_eq!(spec.distribution, Distribution::Uri(explicit));
    }

    #[test]
    fn test_version_resolves_to_locator() {
        let resolver = VersionResolver::default();
        let context = GradleContext::new("/work/app")
            .with_gradle_version("7.0")
            .with_https(true);
        let spec = ConnectionSpec::for_context(&context, &resolver);
        match spec.distribution {
            Distribution::Uri(uri) => {
                assert_eq!(uri.scheme(), "https");
                assert!(uri.path().ends_with("/gradle-7.0-bin.zip"));
            }
            other => panic!("unexpected distribution {other:?}"),
        }
    }

    #[test]
    fn test_malformed_version_falls_back_to_name() {
        let resolver = VersionResolver::default();
        let context = GradleContext::new("/work/app").with_gradle_version("not a version");
        let spec = ConnectionSpec::for_context(&context, &resolver);
        assert_eq!(spec.distribution, Distribution::Version("not a version".to_string()));
    }

    #[test]
    fn test_nothing_set_uses_default() {
        let resolver = VersionResolver::default();
        let context = GradleContext::new("/work/app").with_gradle_user_home("/cache/gradle");
        let spec = ConnectionSpec::for_context(&context, &resolver);
        assert_eq!(spec.distribution, Distribution::Default);
        assert_eq!(spec.gradle_user_home, Some(PathBuf::from("/cache/gradle")));
    }
}
