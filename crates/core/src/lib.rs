//! shafu-core - Orchestration of Gradle builds for interactive callers
//!
//! This crate provides functionality to:
//! - Describe a Gradle invocation and adjust it through enhancers
//! - Resolve tool versions to distributions and gate features by version
//! - Drive an asynchronously completing build from a synchronous, cancellable caller
//! - Keep process-wide properties intact around every call
pub mod ambient;
pub mod arguments;
pub mod cancel;
pub mod capability;
pub mod config;
pub mod connector;
pub mod context;
pub mod enhance;
pub mod error;
pub mod init_script;
pub mod model;
pub mod monitor;
pub mod operation;
pub mod task;
pub mod version;

// Re-export commonly used types and traits
pub use ambient::AmbientProperties;
pub use arguments::GradleArguments;
pub use capability::{CapabilityGate, Feature};
pub use config::Settings;
pub use connector::{ProcessConnector, ToolConnector};
pub use context::GradleContext;
pub use enhance::{ContextEnhancer, EnhancerChain, EnhancerRegistry};
pub use error::{Error, Result};
pub use model::{BuildEnvironment, ProjectList, TaskList, ToolModel};
pub use monitor::ProgressMonitor;
pub use operation::{OperationHandler, OperationStatus, OperationTimings};
pub use task::{BuildTask, InspectTask, Launcher, TaskState};
pub use version::{GradleVersion, VersionResolver};
