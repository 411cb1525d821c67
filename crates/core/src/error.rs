use std::fmt;
use std::io;
use std::time::Duration;

/// Errors that can occur while driving a Gradle operation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Enhancer '{enhancer}' failed: {message}")]
    Enhance { enhancer: String, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Tool(#[from] ToolFailure),

    #[error("Failed to build project '{project}'")]
    Build {
        project: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to inspect project '{project}' ({model})")]
    Inspect {
        project: String,
        model: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Model error: {0}")]
    Model(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Cancellation was requested but not confirmed within {grace:?}; the operation may still be running")]
    CancelNotConfirmed { grace: Duration },

    #[error("Ambient property error: {0}")]
    Ambient(String),
}

impl Error {
    /// Returns true only for a confirmed cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Returns the tool failure at the bottom of this error, if any.
    pub fn tool_failure(&self) -> Option<&ToolFailure> {
        match self {
            Error::Tool(failure) => Some(failure),
            Error::Build { source, .. } | Error::Inspect { source, .. } => source.tool_failure(),
            _ => None,
        }
    }
}

/// Result type alias for shafu operations
pub type Result<T> = std::result::Result<T, Error>;

/// Class name the tool uses for a cancelled build.
pub const BUILD_CANCELLED_KIND: &str = "BuildCancelledException";

/// One link of a failure's cause chain, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureCause {
    pub kind: String,
    pub message: String,
}

impl FailureCause {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Failure reported by the external tool through the completion callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    causes: Vec<FailureCause>,
}

impl ToolFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            causes: vec![FailureCause::new(kind, message)],
        }
    }

    /// Appends an inner cause.
    pub fn caused_by(mut self, kind: impl Into<String>, message: impl Into<String>) -> Self {
        self.causes.push(FailureCause::new(kind, message));
        self
    }

    pub fn causes(&self) -> &[FailureCause] {
        &self.causes
    }

    pub fn message(&self) -> &str {
        self.causes.first().map(|c| c.message.as_str()).unwrap_or("")
    }

    /// Whether any cause in the chain names the tool's cancellation class.
    ///
    /// This is a name match, so a genuine failure whose cause happens to
    /// share that simple name is reported as a cancellation as well.
    pub fn is_cancellation(&self) -> bool {
        self.causes.iter().any(|cause| {
            cause
                .kind
                .rsplit(['.', '$'])
                .next()
                .is_some_and(|simple| simple == BUILD_CANCELLED_KIND)
        })
    }
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for cause in &self.causes {
            if !first {
                write!(f, "\nCaused by: ")?;
            }
            write!(f, "{}: {}", cause.kind, cause.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ToolFailure {}
