use super::ContextEnhancer;
use crate::context::GradleContext;
use crate::error::{Error, Result};
use crate::monitor::{ProgressMonitor, check_cancel};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Where an extra init script comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// An existing script file.
    File(PathBuf),
    /// Script text, written to a temporary file for the duration of the call.
    Inline(String),
}

/// Adds an extra init script and feature flags to every invocation.
///
/// Flags become `-D<prefix>.<flag>=true` JVM arguments so the script can
/// read them as system properties.
#[derive(Debug, Clone)]
pub struct InitScriptEnhancer {
    name: String,
    source: ScriptSource,
    prefix: String,
    flags: Vec<String>,
}

impl InitScriptEnhancer {
    pub fn new(name: impl Into<String>, source: ScriptSource) -> Self {
        let name = name.into();
        Self {
            prefix: name.clone(),
            name,
            source,
            flags: Vec::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    pub fn flag_arguments(&self) -> Vec<String> {
        self.flags
            .iter()
            .map(|flag| format!("-D{}.{}=true", self.prefix, flag))
            .collect()
    }

    fn failure(&self, message: impl Into<String>) -> Error {
        Error::Enhance {
            enhancer: self.name.clone(),
            message: message.into(),
        }
    }

    fn materialize(&self, context: &mut GradleContext) -> Result<PathBuf> {
        match &self.source {
            ScriptSource::File(path) => {
                if !path.is_file() {
                    return Err(self.failure(format!("init script {} does not exist", path.display())));
                }
                Ok(std::path::absolute(path)?)
            }
            ScriptSource::Inline(content) => {
                let mut file = tempfile::Builder::new()
                    .prefix("shafu-enhancer")
                    .suffix(".gradle")
                    .tempfile()
                    .map_err(|e| self.failure(format!("failed to extract init script: {e}")))?;
                file.write_all(content.as_bytes())?;
                let script = file.into_temp_path();
                let path = script.to_path_buf();
                context.with_dispose_action(move |_| {
                    debug!("Removing extracted init script {}", script.display());
                    script.close()?;
                    Ok(())
                });
                Ok(path)
            }
        }
    }
}

impl ContextEnhancer for InitScriptEnhancer {
    fn name(&self) -> &str {
        &self.name
    }

    fn enhance(&self, monitor: &mut dyn ProgressMonitor, context: &mut GradleContext) -> Result<()> {
        monitor.set_task_name(&format!("Configuring {}", self.name));
        check_cancel(monitor)?;
        let script = self.materialize(context)?;

        let mut arguments = vec!["--init-script".to_string(), script.display().to_string()];
        arguments.extend(context.gradle_arguments().iter().cloned());
        context.set_gradle_arguments(arguments);
        context.with_jvm_arguments(self.flag_arguments());
        monitor.worked(1);
        Ok(())
    }
}
