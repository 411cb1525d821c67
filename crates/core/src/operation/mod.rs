//! Bridge between the tool's callback-based operations and a polling caller

mod handler;

pub use handler::{KEY_CANCEL_FILE, OperationHandler, OperationSetup};

use crate::cancel::CancellationToken;
use crate::context::{InputSource, OutputSink};
use crate::error::ToolFailure;
use indexmap::IndexMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Wait intervals of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimings {
    /// Bounded wait per iteration; also the latency of observing a cancel request.
    pub poll_interval: Duration,
    /// How long a requested cancellation may take before it is reported unconfirmed.
    pub cancel_grace: Duration,
}

impl Default for OperationTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            cancel_grace: Duration::from_secs(3),
        }
    }
}

/// Status text published by a running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    description: String,
}

impl ProgressEvent {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

pub type ProgressListener = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Outcome of an operation as seen by the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus<T> {
    Pending,
    Completed(T),
    Failed(ToolFailure),
}

impl<T> OperationStatus<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, OperationStatus::Pending)
    }
}

struct CompletionState<T> {
    settled: bool,
    outcome: Option<Result<T, ToolFailure>>,
}

/// Single-count latch carrying the operation's result.
pub(crate) struct Completion<T> {
    state: Mutex<CompletionState<T>>,
    signal: Condvar,
}

impl<T> Completion<T> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(CompletionState {
                settled: false,
                outcome: None,
            }),
            signal: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CompletionState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the outcome if none was recorded yet.
    fn settle(&self, outcome: Result<T, ToolFailure>) -> bool {
        let mut state = self.lock();
        if state.settled {
            return false;
        }
        state.settled = true;
        state.outcome = Some(outcome);
        self.signal.notify_all();
        true
    }

    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .signal
            .wait_timeout_while(state, timeout, |state| !state.settled)
            .unwrap_or_else(PoisonError::into_inner);
        state.settled
    }

    pub(crate) fn is_settled(&self) -> bool {
        self.lock().settled
    }

    pub(crate) fn has_failure(&self) -> bool {
        matches!(self.lock().outcome, Some(Err(_)))
    }

    /// Hands the outcome over once; later calls see `Pending`.
    pub(crate) fn take(&self) -> OperationStatus<T> {
        match self.lock().outcome.take() {
            Some(Ok(value)) => OperationStatus::Completed(value),
            Some(Err(failure)) => OperationStatus::Failed(failure),
            None => OperationStatus::Pending,
        }
    }
}

/// Completion callback handed to the connector.
///
/// Consumed by the first call, so a connector can report at most one of
/// completion or failure.
pub struct ResultHandler<T> {
    completion: Arc<Completion<T>>,
}

impl<T> ResultHandler<T> {
    pub(crate) fn new(completion: Arc<Completion<T>>) -> Self {
        Self { completion }
    }

    pub fn on_complete(self, result: T) {
        if !self.completion.settle(Ok(result)) {
            debug!("Ignored completion of an already finished operation");
        }
    }

    pub fn on_failure(self, failure: ToolFailure) {
        if !self.completion.settle(Err(failure)) {
            debug!("Ignored failure of an already finished operation");
        }
    }
}

/// Everything the connector needs to launch one call.
#[derive(Default)]
pub struct OperationConfig {
    pub java_home: Option<PathBuf>,
    pub standard_input: Option<InputSource>,
    pub standard_output: Option<OutputSink>,
    pub standard_error: Option<OutputSink>,
    pub jvm_arguments: Vec<String>,
    pub arguments: Vec<String>,
    /// Full environment of the call; `None` inherits the host environment.
    pub environment: Option<IndexMap<OsString, OsString>>,
    pub progress_listeners: Vec<ProgressListener>,
    pub cancellation_token: Option<CancellationToken>,
}

impl OperationConfig {
    pub fn notify_progress(&self, event: ProgressEvent) {
        for listener in &self.progress_listeners {
            listener(event.clone());
        }
    }
}

impl fmt::Debug for OperationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationConfig")
            .field("java_home", &self.java_home)
            .field("jvm_arguments", &self.jvm_arguments)
            .field("arguments", &self.arguments)
            .field("environment", &self.environment.as_ref().map(|e| e.len()))
            .field("progress_listeners", &self.progress_listeners.len())
            .field("cancellation_token", &self.cancellation_token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_completion_settles_once() {
        let completion = Arc::new(Completion::<u32>::new());
        ResultHandler::new(completion.clone()).on_complete(1);
        ResultHandler::new(completion.clone()).on_failure(ToolFailure::new("X", "late"));

        assert!(completion.is_settled());
        assert!(!completion.has_failure());
        assert_eq!(completion.take(), OperationStatus::Completed(1));
        assert_eq!(completion.take(), OperationStatus::Pending);
    }

    #[test]
    fn test_wait_times_out_then_observes_background_completion() {
        let completion = Arc::new(Completion::<&'static str>::new());
        assert!(!completion.wait(Duration::from_millis(10)));

        let handler = ResultHandler::new(completion.clone());
        let worker = thread::spawn(move || handler.on_complete("done"));
        assert!(completion.wait(Duration::from_secs(5)));
        worker.join().unwrap();
        assert_eq!(completion.take(), OperationStatus::Completed("done"));
    }

    #[test]
    fn test_config_notifies_all_listeners() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = seen.clone();
        let b = seen.clone();
        let config = OperationConfig {
            progress_listeners: vec![
                Arc::new(move |e: ProgressEvent| a.lock().unwrap().push(format!("a:{e}"))),
                Arc::new(move |e: ProgressEvent| b.lock().unwrap().push(format!("b:{e}"))),
            ],
            ..Default::default()
        };
        config.notify_progress(ProgressEvent::new("compile"));
        assert_eq!(*seen.lock().unwrap(), ["a:compile", "b:compile"]);
    }
}
