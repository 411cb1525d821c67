//! The two cancellation paths of an operation
//!
//! An in-process [`CancellationToken`] asks the connector to stop the call.
//! Tool versions that cannot receive a token are reached through a
//! [`CancelMarker`]: a file created before the call starts whose removal is
//! observed by the bundled init script inside the tool's own process. Both
//! are fired together by [`Cancellation::request`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempPath;
use tracing::{debug, warn};

/// In-process cancellation signal shared with the connector.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A per-operation file whose disappearance means "stop".
pub struct CancelMarker {
    path: Option<TempPath>,
    location: PathBuf,
}

impl CancelMarker {
    /// Creates a unique marker in the system temporary directory.
    pub fn create() -> io::Result<Self> {
        Self::create_in(std::env::temp_dir())
    }

    pub fn create_in(directory: impl AsRef<Path>) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("gradle")
            .suffix(".tmp")
            .tempfile_in(directory)?;
        let path = file.into_temp_path();
        let location = path.to_path_buf();
        debug!("Created cancel marker {}", location.display());
        Ok(Self {
            path: Some(path),
            location,
        })
    }

    pub fn path(&self) -> &Path {
        &self.location
    }

    /// Removes the marker so the tool side notices the cancel request.
    pub fn signal(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.location) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn is_signalled(&self) -> bool {
        !self.location.exists()
    }

    /// Deletes the marker if it still exists. Later calls do nothing.
    pub fn release(&mut self) -> io::Result<()> {
        match self.path.take() {
            Some(path) if path.exists() => path.close(),
            Some(_) | None => Ok(()),
        }
    }
}

impl Drop for CancelMarker {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(
                "Failed to delete cancel marker {}: {}",
                self.location.display(),
                e
            );
        }
    }
}

impl fmt::Debug for CancelMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelMarker")
            .field("location", &self.location)
            .field("released", &self.path.is_none())
            .finish()
    }
}

/// One way of telling a running operation to stop.
pub trait CancellationStrategy: Send {
    fn name(&self) -> &'static str;

    fn request(&mut self) -> io::Result<()>;

    /// Frees resources held by the strategy once the operation is over.
    fn release(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Cancels through the connector's in-process token.
#[derive(Debug, Clone)]
pub struct TokenStrategy(pub CancellationToken);

impl CancellationStrategy for TokenStrategy {
    fn name(&self) -> &'static str {
        "token"
    }

    fn request(&mut self) -> io::Result<()> {
        self.0.cancel();
        Ok(())
    }
}

/// Cancels by removing the marker file watched by the init script.
#[derive(Debug)]
pub struct MarkerStrategy(pub CancelMarker);

impl CancellationStrategy for MarkerStrategy {
    fn name(&self) -> &'static str {
        "marker-file"
    }

    fn request(&mut self) -> io::Result<()> {
        self.0.signal()
    }

    fn release(&mut self) -> io::Result<()> {
        self.0.release()
    }
}

/// The layered cancellation paths active for one operation.
#[derive(Default)]
pub struct Cancellation {
    strategies: Vec<Box<dyn CancellationStrategy>>,
    requested: bool,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: impl CancellationStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Names of the strategies that a cancel request will fire.
    pub fn active(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn is_requested(&self) -> bool {
        self.requested
    }

    /// Fires every strategy; one failing does not stop the others.
    pub fn request(&mut self) {
        self.requested = true;
        for strategy in &mut self.strategies {
            match strategy.request() {
                Ok(()) => debug!("Requested cancellation via {}", strategy.name()),
                Err(e) => warn!("Cancellation via {} failed: {}", strategy.name(), e),
            }
        }
    }

    /// Releases every strategy, logging failures.
    pub fn release(&mut self) {
        for strategy in &mut self.strategies {
            if let Err(e) = strategy.release() {
                warn!("Failed to release {} cancellation: {}", strategy.name(), e);
            }
        }
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("active", &self.active())
            .field("requested", &self.requested)
            .finish()
    }
}
