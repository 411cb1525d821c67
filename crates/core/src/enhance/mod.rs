//! Steps that adjust a context before it is executed

mod init_script;

pub use init_script::{InitScriptEnhancer, ScriptSource};

use crate::context::GradleContext;
use crate::error::{Error, Result};
use crate::monitor::{ProgressMonitor, check_cancel};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error};

/// One step of the enhancer chain.
///
/// An enhancer may change arguments and environment and may register dispose
/// actions on the context. It runs once per context and must not rely on the
/// effects of any other enhancer.
pub trait ContextEnhancer: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Adjust `context`; returning an error fails the whole request
    fn enhance(&self, monitor: &mut dyn ProgressMonitor, context: &mut GradleContext) -> Result<()>;
}

/// The ordered enhancers applied to every context.
#[derive(Clone, Default)]
pub struct EnhancerChain {
    enhancers: Vec<Arc<dyn ContextEnhancer>>,
}

impl EnhancerChain {
    pub fn new(enhancers: Vec<Arc<dyn ContextEnhancer>>) -> Self {
        Self { enhancers }
    }

    pub fn len(&self) -> usize {
        self.enhancers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enhancers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.enhancers.iter().map(|e| e.name()).collect()
    }

    /// Runs every enhancer in order, stopping at the first error or cancel request.
    pub fn enhance(&self, monitor: &mut dyn ProgressMonitor, context: &mut GradleContext) -> Result<()> {
        for enhancer in &self.enhancers {
            check_cancel(monitor)?;
            debug!("Enhancing context with {}", enhancer.name());
            enhancer.enhance(monitor, context)?;
        }
        check_cancel(monitor)
    }

    /// Runs and clears every dispose action registered on `context`.
    ///
    /// Each action runs exactly once, in registration order, even when an
    /// earlier one failed or panicked. Returns whether any action reported a
    /// cancellation; the monitor is marked cancelled in that case.
    pub fn dispose(context: &mut GradleContext, monitor: &mut dyn ProgressMonitor) -> bool {
        let actions = std::mem::take(&mut context.dispose_actions);
        let mut cancelled = false;
        for (index, action) in actions.into_iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| action(&mut *monitor))) {
                Ok(Ok(())) => {}
                Ok(Err(Error::Cancelled)) => {
                    debug!("Dispose action #{} observed a cancellation", index);
                    cancelled = true;
                }
                Ok(Err(e)) => error!("Dispose action #{} failed: {}", index, e),
                Err(_) => error!("Dispose action #{} panicked", index),
            }
        }
        if cancelled {
            monitor.set_cancelled(true);
        }
        cancelled
    }
}

impl fmt::Debug for EnhancerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhancerChain")
            .field("enhancers", &self.names())
            .finish()
    }
}

/// Explicit registration of the enhancers available to tasks.
#[derive(Clone, Default)]
pub struct EnhancerRegistry {
    enhancers: Vec<Arc<dyn ContextEnhancer>>,
}

impl EnhancerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, enhancer: impl ContextEnhancer + 'static) -> Self {
        self.enhancers.push(Arc::new(enhancer));
        self
    }

    pub fn register_shared(mut self, enhancer: Arc<dyn ContextEnhancer>) -> Self {
        self.enhancers.push(enhancer);
        self
    }

    pub fn len(&self) -> usize {
        self.enhancers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.enhancers.is_empty()
    }

    /// Chain of the registered enhancers, in registration order.
    pub fn chain(&self) -> EnhancerChain {
        EnhancerChain::new(self.enhancers.clone())
    }
}

impl fmt::Debug for EnhancerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhancerRegistry")
            .field("enhancers", &self.chain().names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{CancelFlag, NullMonitor};
    use std::sync::Mutex;

    struct Append(&'static str);

    impl ContextEnhancer for Append {
        fn name(&self) -> &str {
            self.0
        }

        fn enhance(&self, _monitor: &mut dyn ProgressMonitor, context: &mut GradleContext) -> Result<()> {
            context.with_gradle_arguments([self.0]);
            Ok(())
        }
    }

    struct Cancels(CancelFlag);

    impl ContextEnhancer for Cancels {
        fn name(&self) -> &str {
            "cancels"
        }

        fn enhance(&self, _monitor: &mut dyn ProgressMonitor, _context: &mut GradleContext) -> Result<()> {
            self.0.cancel();
            Ok(())
        }
    }

    struct Fails;

    impl ContextEnhancer for Fails {
        fn name(&self) -> &str {
            "fails"
        }

        fn enhance(&self, _monitor: &mut dyn ProgressMonitor, _context: &mut GradleContext) -> Result<()> {
            Err(Error::Enhance {
                enhancer: "fails".to_string(),
                message: "missing script".to_string(),
            })
        }
    }

    #[test]
    fn test_enhancers_run_in_order() {
        let chain = EnhancerRegistry::new()
            .register(Append("first"))
            .register(Append("second"))
            .chain();
        let mut context = GradleContext::new("/tmp/project");
        chain.enhance(&mut NullMonitor::new(), &mut context).unwrap();
        assert_eq!(context.gradle_arguments(), ["first", "second"]);
    }

    #[test]
    fn test_cancel_stops_the_chain() {
        let flag = CancelFlag::new();
        let chain = EnhancerRegistry::new()
            .register(Cancels(flag.clone()))
            .register(Append("never"))
            .chain();
        let mut context = GradleContext::new("/tmp/project");
        let result = chain.enhance(&mut NullMonitor::with_cancel_flag(flag), &mut context);
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(context.gradle_arguments().is_empty());
    }

    #[test]
    fn test_enhancer_failure_propagates() {
        let chain = EnhancerRegistry::new().register(Fails).register(Append("never")).chain();
        let mut context = GradleContext::new("/tmp/project");
        let result = chain.enhance(&mut NullMonitor::new(), &mut context);
        assert!(matches!(result, Err(Error::Enhance { .. })));
        assert!(context.gradle_arguments().is_empty());
    }

    #[test]
    fn test_dispose_runs_every_action_once() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut context = GradleContext::new("/tmp/project");
        for index in 0..4 {
            let calls = calls.clone();
            context.with_dispose_action(move |_| {
                calls.lock().unwrap().push(index);
                match index {
                    1 => Err(Error::Config("broken".to_string())),
                    2 => panic!("dispose action exploded"),
                    _ => Ok(()),
                }
            });
        }

        let mut monitor = NullMonitor::new();
        let cancelled = EnhancerChain::dispose(&mut context, &mut monitor);
        assert!(!cancelled);
        assert_eq!(*calls.lock().unwrap(), [0, 1, 2, 3]);
        assert_eq!(context.dispose_action_count(), 0);

        // a second disposal has nothing left to run
        EnhancerChain::dispose(&mut context, &mut monitor);
        assert_eq!(calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_dispose_cancellation_flips_flag_and_continues() {
        let ran_after = Arc::new(Mutex::new(false));
        let mut context = GradleContext::new("/tmp/project");
        context.with_dispose_action(|_| Err(Error::Cancelled));
        let flag = ran_after.clone();
        context.with_dispose_action(move |_| {
            *flag.lock().unwrap() = true;
            Ok(())
        });

        let mut monitor = NullMonitor::new();
        assert!(EnhancerChain::dispose(&mut context, &mut monitor));
        assert!(monitor.is_cancelled());
        assert!(*ran_after.lock().unwrap());
    }
}
