//! Progress reporting and cooperative cancellation for the caller's side

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// The caller's progress scope.
///
/// Tasks report phase names and units of work through it and poll it for
/// cancellation once per loop iteration.
pub trait ProgressMonitor: Send {
    fn begin_task(&mut self, name: &str, total_work: u32);

    fn set_task_name(&mut self, name: &str);

    fn worked(&mut self, work: u32);

    fn is_cancelled(&self) -> bool;

    fn set_cancelled(&mut self, cancelled: bool);

    fn done(&mut self) {}
}

/// Fails with [`Error::Cancelled`] if the monitor was cancelled.
pub fn check_cancel(monitor: &dyn ProgressMonitor) -> Result<()> {
    if monitor.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// A cancel request shared between the caller and a running monitor.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn set(&self, cancelled: bool) {
        self.0.store(cancelled, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Monitor that discards progress and only tracks cancellation.
#[derive(Debug, Clone, Default)]
pub struct NullMonitor {
    cancel: CancelFlag,
}

impl NullMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_flag(cancel: CancelFlag) -> Self {
        Self { cancel }
    }
}

impl ProgressMonitor for NullMonitor {
    fn begin_task(&mut self, _name: &str, _total_work: u32) {}

    fn set_task_name(&mut self, _name: &str) {}

    fn worked(&mut self, _work: u32) {}

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn set_cancelled(&mut self, cancelled: bool) {
        self.cancel.set(cancelled);
    }
}

/// Monitor that reports task names through `tracing`.
#[derive(Debug, Default)]
pub struct TracingMonitor {
    cancel: CancelFlag,
    current: String,
    worked: u64,
}

impl TracingMonitor {
    pub fn new(cancel: CancelFlag) -> Self {
        Self {
            cancel,
            current: String::new(),
            worked: 0,
        }
    }

    pub fn total_worked(&self) -> u64 {
        self.worked
    }
}

impl ProgressMonitor for TracingMonitor {
    fn begin_task(&mut self, name: &str, total_work: u32) {
        debug!("begin task: {} ({} units)", name, total_work);
        self.current = name.to_string();
    }

    fn set_task_name(&mut self, name: &str) {
        if self.current != name {
            info!("{}", name);
            self.current = name.to_string();
        }
    }

    fn worked(&mut self, work: u32) {
        self.worked += u64::from(work);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn set_cancelled(&mut self, cancelled: bool) {
        self.cancel.set(cancelled);
    }

    fn done(&mut self) {
        debug!("done: {}", self.current);
    }
}
