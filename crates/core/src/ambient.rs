//! Process-wide configuration properties read by the connector at call time
//!
//! The properties are shared by every operation in the process. An operation
//! takes a snapshot, installs its own overrides, and restores the snapshot when
//! it finishes. Two operations must not execute concurrently against the same
//! [`AmbientProperties`]; callers serialize them.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error};

pub const KEY_USER_DIR: &str = "user.dir";

pub const KEY_USER_HOME: &str = "user.home";

pub const KEY_OS_NAME: &str = "os.name";

/// Shared, process-wide key/value configuration.
#[derive(Debug, Clone, Default)]
pub struct AmbientProperties {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

/// A full copy of the properties at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertySnapshot(BTreeMap<String, String>);

impl PropertySnapshot {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl AmbientProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the properties from the current process.
    pub fn from_process() -> Self {
        let mut properties = BTreeMap::new();
        if let Ok(dir) = std::env::current_dir() {
            properties.insert(KEY_USER_DIR.to_string(), dir.display().to_string());
        }
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            properties.insert(KEY_USER_HOME.to_string(), home.to_string_lossy().into_owned());
        }
        properties.insert(KEY_OS_NAME.to_string(), std::env::consts::OS.to_string());
        Self::from_map(properties)
    }

    pub fn from_map(properties: BTreeMap<String, String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(properties)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, String>>> {
        self.inner
            .lock()
            .map_err(|_| Error::Ambient("ambient properties lock is poisoned".to_string()))
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> Result<Option<String>> {
        Ok(self.lock()?.insert(key.into(), value.into()))
    }

    pub fn remove(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.remove(key))
    }

    pub fn snapshot(&self) -> Result<PropertySnapshot> {
        Ok(PropertySnapshot(self.lock()?.clone()))
    }

    /// Replaces every property with the snapshot's contents.
    pub fn restore(&self, snapshot: &PropertySnapshot) -> Result<()> {
        let mut properties = self.lock()?;
        *properties = snapshot.0.clone();
        Ok(())
    }

    /// Snapshots the current state, then layers `overrides` on top of it.
    ///
    /// The returned scope restores the snapshot when it is closed or dropped.
    pub fn scoped<I, K, V>(&self, overrides: I) -> Result<PropertyScope>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut properties = self.lock()?;
        let saved = PropertySnapshot(properties.clone());
        for (key, value) in overrides {
            properties.insert(key.into(), value.into());
        }
        debug!(
            "Installed ambient overrides ({} -> {} properties)",
            saved.len(),
            properties.len()
        );
        Ok(PropertyScope {
            owner: self.clone(),
            saved: Some(saved),
        })
    }
}

/// Restores saved properties exactly once.
#[derive(Debug)]
pub struct PropertyScope {
    owner: AmbientProperties,
    saved: Option<PropertySnapshot>,
}

impl PropertyScope {
    pub fn saved(&self) -> Option<&PropertySnapshot> {
        self.saved.as_ref()
    }

    /// Restores the snapshot now and reports a failure to the caller.
    pub fn close(mut self) -> Result<()> {
        self.restore_saved()
    }

    fn restore_saved(&mut self) -> Result<()> {
        match self.saved.take() {
            Some(saved) => self.owner.restore(&saved),
            None => Ok(()),
        }
    }
}

impl Drop for PropertyScope {
    fn drop(&mut self) {
        if let Err(e) = self.restore_saved() {
            error!("Failed to restore ambient properties: {}", e);
        }
    }
}
