use crate::arguments::{GradleOption, LogLevel, NetworkMode, StackTrace};
use crate::context::GradleContext;
use crate::enhance::{EnhancerRegistry, InitScriptEnhancer, ScriptSource};
use crate::error::{Error, Result};
use crate::operation::OperationTimings;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const CONFIG_FILE_NAMES: [&str; 2] = [".shafu.json", "shafu.json"];

fn default_system_properties() -> IndexMap<String, String> {
    let mut properties = IndexMap::new();
    properties.insert("file.encoding".to_string(), "UTF-8".to_string());
    properties
}

fn default_use_https() -> bool {
    true
}

/// An extra init script registered as an enhancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct InitScriptSettings {
    pub name: String,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

/// Poll loop timings in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TimingSettings {
    pub poll_interval_ms: u64,
    pub cancel_grace_ms: u64,
}

impl From<TimingSettings> for OperationTimings {
    fn from(settings: TimingSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            cancel_grace: Duration::from_millis(settings.cancel_grace_ms),
        }
    }
}

/// User preferences applied to every context created for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub stack_trace: StackTrace,
    #[serde(default)]
    pub network_mode: NetworkMode,
    #[serde(default)]
    pub project_properties: IndexMap<String, String>,
    #[serde(default = "default_system_properties")]
    pub system_properties: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradle_user_home: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_home: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradle_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradle_distribution: Option<String>,
    #[serde(default = "default_use_https")]
    pub use_https: bool,
    /// A `null` value unsets the inherited variable.
    #[serde(default)]
    pub environment: IndexMap<String, Option<String>>,
    #[serde(default)]
    pub init_scripts: Vec<InitScriptSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<TimingSettings>,

    // Directory relative paths are resolved against (not stored in JSON)
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            stack_trace: StackTrace::default(),
            network_mode: NetworkMode::default(),
            project_properties: IndexMap::new(),
            system_properties: default_system_properties(),
            gradle_user_home: None,
            java_home: None,
            gradle_version: None,
            gradle_distribution: None,
            use_https: default_use_https(),
            environment: IndexMap::new(),
            init_scripts: Vec::new(),
            timings: None,
            base_dir: None,
        }
    }
}

impl Settings {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut settings: Settings = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))?;
        settings.base_dir = path.parent().map(Path::to_path_buf);
        settings.validate()?;
        Ok(settings)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize settings: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn find_config_file(start_path: &Path) -> Option<PathBuf> {
        let mut current = start_path;

        loop {
            for name in CONFIG_FILE_NAMES {
                let config_path = current.join(name);
                if config_path.exists() {
                    return Some(config_path);
                }
            }

            current = current.parent()?;
        }
    }

    /// Loads the nearest settings file above `project_dir`, or the defaults.
    pub fn load(project_dir: &Path) -> Result<Self> {
        match Self::find_config_file(project_dir) {
            Some(path) => {
                debug!("Loading settings from {}", path.display());
                Self::load_from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(distribution) = &self.gradle_distribution {
            Url::parse(distribution).map_err(|e| {
                Error::Config(format!("Invalid gradle_distribution '{distribution}': {e}"))
            })?;
        }
        if let Some(timings) = &self.timings {
            if timings.poll_interval_ms == 0 {
                return Err(Error::Config("poll_interval_ms must be positive".to_string()));
            }
        }
        for script in &self.init_scripts {
            if script.name.trim().is_empty() {
                return Err(Error::Config("init script entries need a name".to_string()));
            }
        }
        Ok(())
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Creates the context for running `arguments` in `project_dir`.
    ///
    /// Configured log level, stack trace and network mode switches are only
    /// added when `arguments` carries no switch of the same family.
    pub fn create_context(&self, project_dir: &Path, arguments: &[String]) -> Result<GradleContext> {
        self.validate()?;
        let mut context = GradleContext::new(project_dir);

        if !LogLevel::appears_in(arguments) {
            context.with_gradle_arguments(self.log_level.arguments());
        }
        if !StackTrace::appears_in(arguments) {
            context.with_gradle_arguments(self.stack_trace.arguments());
        }
        if !NetworkMode::appears_in(arguments) {
            context.with_gradle_arguments(self.network_mode.arguments());
        }
        context.with_gradle_arguments(
            self.project_properties
                .iter()
                .map(|(key, value)| format!("-P{key}={value}")),
        );
        context.with_gradle_arguments(arguments.iter().cloned());
        context.with_jvm_arguments(
            self.system_properties
                .iter()
                .map(|(key, value)| format!("-D{key}={value}")),
        );
        context.with_environment_variables(self.environment.clone());

        context.set_gradle_user_home(self.gradle_user_home.as_deref().map(|p| self.resolve_path(p)));
        context.set_java_home(self.java_home.as_deref().map(|p| self.resolve_path(p)));
        context.set_gradle_version(self.gradle_version.clone());
        context.set_use_https(self.use_https);
        if let Some(distribution) = &self.gradle_distribution {
            let uri = Url::parse(distribution)
                .map_err(|e| Error::Config(format!("Invalid gradle_distribution: {e}")))?;
            context.set_gradle_distribution(Some(uri));
        }
        if let Some(timings) = self.timings {
            context = context.with_timings(timings.into());
        }
        Ok(context)
    }

    /// Enhancers for the configured extra init scripts.
    pub fn enhancer_registry(&self) -> EnhancerRegistry {
        self.init_scripts
            .iter()
            .fold(EnhancerRegistry::new(), |registry, script| {
                let mut enhancer = InitScriptEnhancer::new(
                    script.name.clone(),
                    ScriptSource::File(self.resolve_path(&script.path)),
                );
                if let Some(prefix) = &script.prefix {
                    enhancer = enhancer.with_prefix(prefix.clone());
                }
                for flag in &script.flags {
                    enhancer = enhancer.with_flag(flag.clone());
                }
                registry.register(enhancer)
            })
    }
}
