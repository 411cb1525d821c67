//! Task command lines and the tool's option families

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

const ESCAPE: char = '\\';
const SEPARATOR: &str = "#";
const VERSION_PREFIX: char = '@';

/// Splits a command line into tokens.
///
/// Whitespace separates tokens, `\` escapes the next character and `#` is
/// always a token of its own.
pub fn tokenize(command_line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in command_line.chars() {
        if escaped {
            escaped = false;
            current.push(c);
        } else if c == ESCAPE {
            escaped = true;
        } else if SEPARATOR.starts_with(c) {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            tokens.push(SEPARATOR.to_string());
        } else if c.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Tokens before the first `#`.
pub fn parse_task_names(command_line: &str) -> Vec<String> {
    let mut tokens = tokenize(command_line);
    if let Some(at) = tokens.iter().position(|t| t == SEPARATOR) {
        tokens.truncate(at);
    }
    tokens
}

/// Tokens after the first `#`, or nothing when there is no separator.
pub fn parse_build_arguments(command_line: &str) -> Vec<String> {
    let tokens = tokenize(command_line);
    match tokens.iter().position(|t| t == SEPARATOR) {
        Some(at) => tokens[at + 1..].to_vec(),
        None => Vec::new(),
    }
}

/// A parsed `[@version] [options] tasks... [# options...]` command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GradleArguments {
    pub gradle_version: Option<String>,
    /// Task names together with their task options.
    pub task_names: Vec<String>,
    pub options: Vec<String>,
}

impl GradleArguments {
    pub fn parse(command_line: &str) -> Self {
        let mut tokens = tokenize(command_line).into_iter().peekable();

        let gradle_version = match tokens.peek() {
            Some(first) if first.len() >= 2 && first.starts_with(VERSION_PREFIX) => {
                tokens.next().map(|t| t[VERSION_PREFIX.len_utf8()..].to_string())
            }
            _ => None,
        };

        let mut task_names = Vec::new();
        let mut options = Vec::new();
        let mut saw_task = false;
        let mut saw_separator = false;
        for token in tokens {
            if saw_separator {
                options.push(token);
            } else if token == SEPARATOR {
                saw_separator = true;
            } else if token.starts_with("--") {
                // long options count as task options once a task was named
                if saw_task {
                    task_names.push(token);
                } else {
                    options.push(token);
                }
            } else if token.starts_with('-') {
                options.push(token);
            } else {
                saw_task = true;
                task_names.push(token);
            }
        }
        Self {
            gradle_version,
            task_names,
            options,
        }
    }
}

/// A family of mutually exclusive tool switches configured in settings.
pub trait GradleOption: Copy + Sized + 'static {
    const ALL: &'static [Self];

    fn short_option(self) -> Option<&'static str>;

    fn long_option(self) -> Option<&'static str>;

    /// Arguments this choice adds to the command line.
    fn arguments(self) -> Vec<String> {
        self.long_option().map(str::to_string).into_iter().collect()
    }

    /// Whether any switch of this family already appears in `arguments`.
    fn appears_in(arguments: &[String]) -> bool {
        arguments.iter().any(|argument| {
            Self::ALL.iter().any(|option| {
                option.short_option() == Some(argument.as_str())
                    || option.long_option() == Some(argument.as_str())
            })
        })
    }
}

macro_rules! option_symbols {
    ($name:ident, $default:ident, { $($variant:ident => $symbol:literal),+ $(,)? }) => {
        impl $name {
            pub fn symbol(self) -> &'static str {
                match self {
                    $($name::$variant => $symbol,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($symbol => Ok($name::$variant),)+
                    _ => Err(format!("unknown {} '{}'", stringify!($name), s)),
                }
            }
        }

        impl From<String> for $name {
            fn from(symbol: String) -> Self {
                symbol.parse().unwrap_or_else(|e| {
                    warn!("{}; using {}", e, $name::$default.symbol());
                    $name::$default
                })
            }
        }

        impl From<$name> for String {
            fn from(option: $name) -> Self {
                option.symbol().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.symbol())
            }
        }
    };
}

/// Console log level of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    Quiet,
    #[default]
    Lifecycle,
    Info,
    Debug,
}

option_symbols!(LogLevel, Lifecycle, {
    Quiet => "quiet",
    Lifecycle => "lifecycle",
    Info => "info",
    Debug => "debug",
});

impl GradleOption for LogLevel {
    const ALL: &'static [Self] = &[LogLevel::Quiet, LogLevel::Lifecycle, LogLevel::Info, LogLevel::Debug];

    fn short_option(self) -> Option<&'static str> {
        match self {
            LogLevel::Quiet => Some("-q"),
            LogLevel::Lifecycle => None,
            LogLevel::Info => Some("-i"),
            LogLevel::Debug => Some("-d"),
        }
    }

    fn long_option(self) -> Option<&'static str> {
        match self {
            LogLevel::Quiet => Some("--quiet"),
            LogLevel::Lifecycle => None,
            LogLevel::Info => Some("--info"),
            LogLevel::Debug => Some("--debug"),
        }
    }
}

/// How much of a failure's stack trace the tool prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StackTrace {
    #[default]
    Never,
    User,
    All,
}

option_symbols!(StackTrace, Never, {
    Never => "never",
    User => "user",
    All => "all",
});

impl GradleOption for StackTrace {
    const ALL: &'static [Self] = &[StackTrace::Never, StackTrace::User, StackTrace::All];

    fn short_option(self) -> Option<&'static str> {
        match self {
            StackTrace::Never => None,
            StackTrace::User => Some("-s"),
            StackTrace::All => Some("-S"),
        }
    }

    fn long_option(self) -> Option<&'static str> {
        match self {
            StackTrace::Never => None,
            StackTrace::User => Some("--stacktrace"),
            StackTrace::All => Some("--full-stacktrace"),
        }
    }
}

/// Whether the tool may reach remote repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NetworkMode {
    #[default]
    Online,
    Offline,
}

option_symbols!(NetworkMode, Online, {
    Online => "online",
    Offline => "offline",
});

impl GradleOption for NetworkMode {
    const ALL: &'static [Self] = &[NetworkMode::Online, NetworkMode::Offline];

    fn short_option(self) -> Option<&'static str> {
        None
    }

    fn long_option(self) -> Option<&'static str> {
        match self {
            NetworkMode::Online => None,
            NetworkMode::Offline => Some("--offline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_escapes_and_separator() {
        assert_eq!(
            tokenize(r"build a\ b c#d \#e"),
            ["build", "a b", "c", "#", "d", "#e"]
        );
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_task_names_and_build_arguments() {
        assert_eq!(parse_task_names("clean build # --offline"), ["clean", "build"]);
        assert_eq!(parse_build_arguments("clean build # --offline -q"), ["--offline", "-q"]);
        assert!(parse_build_arguments("clean build").is_empty());
    }

    #[test]
    fn test_parse_version_options_and_tasks() {
        let args = GradleArguments::parse("@7.0 --offline -q test --tests Foo -Pa=1 # --info");
        assert_eq!(args.gradle_version.as_deref(), Some("7.0"));
        assert_eq!(args.task_names, strings(&["test", "--tests", "Foo"]));
        assert_eq!(args.options, strings(&["--offline", "-q", "-Pa=1", "--info"]));
    }

    #[test]
    fn test_bare_at_sign_is_a_task() {
        let args = GradleArguments::parse("@ build");
        assert_eq!(args.gradle_version, None);
        assert_eq!(args.task_names, strings(&["@", "build"]));
    }

    #[test]
    fn test_appears_in() {
        assert!(LogLevel::appears_in(&strings(&["build", "-i"])));
        assert!(StackTrace::appears_in(&strings(&["--full-stacktrace"])));
        assert!(!NetworkMode::appears_in(&strings(&["build", "--info"])));
        assert!(!LogLevel::appears_in(&[]));
    }

    #[test]
    fn test_option_arguments() {
        assert_eq!(LogLevel::Info.arguments(), ["--info"]);
        assert!(LogLevel::Lifecycle.arguments().is_empty());
        assert_eq!(StackTrace::User.arguments(), ["--stacktrace"]);
        assert_eq!(NetworkMode::Offline.arguments(), ["--offline"]);
    }

    #[test]
    fn test_unknown_symbol_falls_back() {
        let level: LogLevel = serde_json::from_str("\"verbose\"").unwrap();
        assert_eq!(level, LogLevel::Lifecycle);
        let trace: StackTrace = serde_json::from_str("\"ALL\"").unwrap();
        assert_eq!(trace, StackTrace::All);
        assert_eq!(serde_json::to_string(&NetworkMode::Offline).unwrap(), "\"offline\"");
    }
}
