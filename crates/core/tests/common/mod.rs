//! Scripted connector used by the integration tests

#![allow(dead_code)]

use indexmap::IndexMap;
use shafu_core::ambient::{AmbientProperties, PropertySnapshot};
use shafu_core::connector::{ConnectionSpec, Operation, ProjectConnection, ToolConnector};
use shafu_core::error::{Error, Result, ToolFailure};
use shafu_core::model::BuildEnvironment;
use shafu_core::monitor::{CancelFlag, ProgressMonitor};
use shafu_core::operation::{KEY_CANCEL_FILE, OperationConfig, OperationTimings, ProgressEvent, ResultHandler};
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// What a started operation does.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Emits the events, waits, then completes with the output.
    Succeed {
        events: Vec<String>,
        delay: Duration,
        output: String,
    },
    Fail(ToolFailure),
    /// Runs until the token is cancelled.
    HonorToken,
    /// Runs until the cancel marker disappears, like the init script.
    HonorMarker,
    /// Completes after `delay` whatever happens.
    IgnoreCancel(Duration),
    /// Panics inside `start`.
    Panic,
}

/// What the connector saw.
#[derive(Debug, Default)]
pub struct Recorded {
    pub spec: Option<ConnectionSpec>,
    pub tasks: Vec<String>,
    pub arguments: Vec<String>,
    pub jvm_arguments: Vec<String>,
    pub environment: Option<IndexMap<OsString, OsString>>,
    pub has_token: bool,
    pub ambient_at_start: Option<PropertySnapshot>,
    pub closed: bool,
}

impl Recorded {
    pub fn marker_path(&self) -> Option<PathBuf> {
        let prefix = format!("-D{KEY_CANCEL_FILE}=");
        self.arguments
            .iter()
            .find_map(|argument| argument.strip_prefix(&prefix).map(PathBuf::from))
    }
}

#[derive(Clone)]
pub struct FakeConnector {
    pub server_version: Option<String>,
    pub behavior: Behavior,
    pub refuse: bool,
    /// Tripped when the operation starts, as if the user pressed cancel.
    pub trip: Option<CancelFlag>,
    pub recorded: Arc<Mutex<Recorded>>,
}

impl FakeConnector {
    pub fn new(server_version: Option<&str>, behavior: Behavior) -> Self {
        Self {
            server_version: server_version.map(str::to_string),
            behavior,
            refuse: false,
            trip: None,
            recorded: Arc::new(Mutex::new(Recorded::default())),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(
            Some("7.6"),
            Behavior::Succeed {
                events: Vec::new(),
                delay: Duration::from_millis(20),
                output: String::new(),
            },
        )
    }

    pub fn tripping(mut self, flag: CancelFlag) -> Self {
        self.trip = Some(flag);
        self
    }

    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }
}

impl ToolConnector for FakeConnector {
    fn connect(&self, spec: &ConnectionSpec) -> Result<Box<dyn ProjectConnection>> {
        self.recorded.lock().unwrap().spec = Some(spec.clone());
        if self.refuse {
            return Err(Error::Connection("connection refused".to_string()));
        }
        Ok(Box::new(FakeConnection {
            connector: self.clone(),
        }))
    }
}

struct FakeConnection {
    connector: FakeConnector,
}

impl FakeConnection {
    fn operation(&self, tasks: &[String]) -> FakeOperation {
        self.connector.recorded.lock().unwrap().tasks = tasks.to_vec();
        FakeOperation {
            connector: self.connector.clone(),
        }
    }
}

impl ProjectConnection for FakeConnection {
    fn build_environment(&mut self, monitor: &dyn ProgressMonitor) -> Result<BuildEnvironment> {
        if monitor.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match &self.connector.server_version {
            Some(version) => Ok(BuildEnvironment {
                gradle_version: version.clone(),
                details: IndexMap::new(),
            }),
            None => Err(Error::Connection("version check failed".to_string())),
        }
    }

    fn new_build(&mut self, tasks: &[String]) -> Result<Box<dyn Operation<()>>> {
        Ok(Box::new(self.operation(tasks)))
    }

    fn new_model_request(&mut self, tasks: &[String]) -> Result<Box<dyn Operation<String>>> {
        Ok(Box::new(self.operation(tasks)))
    }

    fn close(&mut self) {
        self.connector.recorded.lock().unwrap().closed = true;
    }
}

struct FakeOperation {
    connector: FakeConnector,
}

impl FakeOperation {
    fn launch<T, F>(self, config: OperationConfig, ambient: &AmbientProperties, handler: ResultHandler<T>, value: F)
    where
        T: Send + 'static,
        F: FnOnce(String) -> T + Send + 'static,
    {
        {
            let mut recorded = self.connector.recorded.lock().unwrap();
            recorded.arguments = config.arguments.clone();
            recorded.jvm_arguments = config.jvm_arguments.clone();
            recorded.environment = config.environment.clone();
            recorded.has_token = config.cancellation_token.is_some();
            recorded.ambient_at_start = ambient.snapshot().ok();
        }
        if let Some(flag) = &self.connector.trip {
            flag.cancel();
        }
        let marker = self.connector.recorded.lock().unwrap().marker_path();
        let cancelled = || ToolFailure::new("GradleConnectionException", "Could not execute build")
            .caused_by("org.gradle.api.BuildCancelledException", "Build cancelled.");

        match self.connector.behavior.clone() {
            Behavior::Panic => panic!("forced failure inside the connector"),
            Behavior::Succeed { events, delay, output } => {
                thread::spawn(move || {
                    for event in events {
                        config.notify_progress(ProgressEvent::new(event));
                    }
                    thread::sleep(delay);
                    handler.on_complete(value(output));
                });
            }
            Behavior::Fail(failure) => {
                thread::spawn(move || handler.on_failure(failure));
            }
            Behavior::HonorToken => {
                thread::spawn(move || {
                    let token = config.cancellation_token.clone();
                    while !token.as_ref().is_some_and(|t| t.is_cancelled()) {
                        thread::sleep(Duration::from_millis(5));
                    }
                    handler.on_failure(cancelled());
                });
            }
            Behavior::HonorMarker => {
                thread::spawn(move || {
                    while marker.as_ref().is_some_and(|path| path.exists()) {
                        thread::sleep(Duration::from_millis(5));
                    }
                    handler.on_failure(cancelled());
                });
            }
            Behavior::IgnoreCancel(delay) => {
                thread::spawn(move || {
                    thread::sleep(delay);
                    handler.on_complete(value(String::new()));
                });
            }
        }
    }
}

impl Operation<()> for FakeOperation {
    fn start(self: Box<Self>, config: OperationConfig, ambient: &AmbientProperties, handler: ResultHandler<()>) {
        (*self).launch(config, ambient, handler, |_| ());
    }
}

impl Operation<String> for FakeOperation {
    fn start(self: Box<Self>, config: OperationConfig, ambient: &AmbientProperties, handler: ResultHandler<String>) {
        (*self).launch(config, ambient, handler, |output| output);
    }
}

pub fn fast_timings() -> OperationTimings {
    OperationTimings {
        poll_interval: Duration::from_millis(10),
        cancel_grace: Duration::from_millis(300),
    }
}

/// Monitor that records the task names it was given.
#[derive(Debug, Default)]
pub struct RecordingMonitor {
    pub cancel: CancelFlag,
    pub names: Vec<String>,
    pub worked: u32,
}

impl RecordingMonitor {
    pub fn with_flag(cancel: CancelFlag) -> Self {
        Self {
            cancel,
            ..Self::default()
        }
    }
}

impl ProgressMonitor for RecordingMonitor {
    fn begin_task(&mut self, name: &str, _total_work: u32) {
        self.names.push(name.to_string());
    }

    fn set_task_name(&mut self, name: &str) {
        self.names.push(name.to_string());
    }

    fn worked(&mut self, work: u32) {
        self.worked += work;
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn set_cancelled(&mut self, cancelled: bool) {
        self.cancel.set(cancelled);
    }
}
