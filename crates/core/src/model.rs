//! Models obtained from the tool's own report output

use crate::error::{Error, Result};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// A model the tool can be asked for.
pub trait ToolModel: Sized + Send + 'static {
    /// Name used in messages and on the command line
    const NAME: &'static str;

    /// Tool invocation that prints the model
    fn tasks() -> Vec<String>;

    /// Build the model from the invocation's standard output
    fn parse(output: &str) -> Result<Self>;
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^Gradle\s+(\S+)\s*$").expect("valid regex"))
}

fn detail_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([A-Za-z][A-Za-z ]*):\s+(.+)$").expect("valid regex"))
}

/// The tool version and runtime details printed by `--version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildEnvironment {
    pub gradle_version: String,
    pub details: IndexMap<String, String>,
}

impl BuildEnvironment {
    pub fn jvm(&self) -> Option<&str> {
        self.details.get("JVM").map(String::as_str)
    }

    pub fn os(&self) -> Option<&str> {
        self.details.get("OS").map(String::as_str)
    }
}

impl ToolModel for BuildEnvironment {
    const NAME: &'static str = "environment";

    fn tasks() -> Vec<String> {
        vec!["--version".to_string()]
    }

    fn parse(output: &str) -> Result<Self> {
        let gradle_version = version_pattern()
            .captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| Error::Model("no Gradle version in --version output".to_string()))?;
        let details = output
            .lines()
            .filter_map(|line| detail_pattern().captures(line.trim_end()))
            .map(|c| (c[1].trim().to_string(), c[2].trim().to_string()))
            .collect();
        Ok(Self {
            gradle_version,
            details,
        })
    }
}

fn root_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?m)^Root project '([^']*)'").expect("valid regex"))
}

fn project_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Project '(:[^']*)'").expect("valid regex"))
}

/// The project hierarchy printed by the `projects` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectList {
    pub root: String,
    /// Sub-project paths such as `:app`, in report order.
    pub projects: Vec<String>,
}

impl ToolModel for ProjectList {
    const NAME: &'static str = "projects";

    fn tasks() -> Vec<String> {
        vec!["projects".to_string(), "--quiet".to_string()]
    }

    fn parse(output: &str) -> Result<Self> {
        let root = root_pattern()
            .captures(output)
            .map(|c| c[1].to_string())
            .ok_or_else(|| Error::Model("no root project in projects report".to_string()))?;
        let projects = project_pattern()
            .captures_iter(output)
            .map(|c| c[1].to_string())
            .collect();
        Ok(Self { root, projects })
    }
}

fn task_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([\w.:\-]+)(?: - (.*))?$").expect("valid regex"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskInfo {
    pub path: String,
    pub group: String,
    pub description: Option<String>,
}

/// Tasks printed by `tasks --all`, grouped as the report groups them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TaskList {
    pub tasks: Vec<TaskInfo>,
}

impl TaskList {
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for task in &self.tasks {
            if !groups.contains(&task.group.as_str()) {
                groups.push(&task.group);
            }
        }
        groups
    }

    pub fn find(&self, path: &str) -> Option<&TaskInfo> {
        self.tasks.iter().find(|task| task.path == path)
    }
}

const RULES_GROUP: &str = "Rules";

impl ToolModel for TaskList {
    const NAME: &'static str = "tasks";

    fn tasks() -> Vec<String> {
        vec!["tasks".to_string(), "--all".to_string(), "--quiet".to_string()]
    }

    fn parse(output: &str) -> Result<Self> {
        let mut tasks = Vec::new();
        let mut group: Option<String> = None;
        let mut lines = output.lines().map(str::trim_end).peekable();

        while let Some(line) = lines.next() {
            if line.is_empty() {
                continue;
            }
            let underlined = lines
                .peek()
                .is_some_and(|next| !next.is_empty() && next.chars().all(|c| c == '-'));
            if underlined {
                lines.next();
                group = Some(line.trim_end_matches(" tasks").to_string());
                continue;
            }
            let Some(current) = group.as_deref() else {
                continue;
            };
            if current == RULES_GROUP {
                continue;
            }
            if let Some(captures) = task_pattern().captures(line) {
                tasks.push(TaskInfo {
                    path: captures[1].to_string(),
                    group: current.to_string(),
                    description: captures.get(2).map(|m| m.as_str().to_string()),
                });
            }
        }
        Ok(Self { tasks })
    }
}
