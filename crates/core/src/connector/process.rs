use super::{ConnectionSpec, Distribution, Operation, ProjectConnection, ToolConnector};
use crate::ambient::{AmbientProperties, KEY_USER_DIR};
use crate::context::OutputSink;
use crate::error::{BUILD_CANCELLED_KIND, Error, Result, ToolFailure};
use crate::model::{BuildEnvironment, ToolModel};
use crate::monitor::ProgressMonitor;
use crate::operation::{OperationConfig, ProgressEvent, ResultHandler};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONNECTION_FAILURE_KIND: &str = "GradleConnectionException";
const BUILD_FAILURE_KIND: &str = "BuildException";

const PROGRESS_PREFIXES: [&str; 2] = ["> Task ", "> Configure "];

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

fn wrapper_name() -> &'static str {
    if cfg!(windows) { "gradlew.bat" } else { "gradlew" }
}

fn launcher_name() -> &'static str {
    if cfg!(windows) { "gradle.bat" } else { "gradle" }
}

/// Connects by running the tool's command line in a child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessConnector {
    executable: Option<PathBuf>,
}

impl ProcessConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always run `executable`, ignoring distributions and wrappers.
    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(executable.into()),
        }
    }

    /// Picks the launcher for `spec`.
    pub fn locate(&self, spec: &ConnectionSpec) -> PathBuf {
        if let Some(executable) = &self.executable {
            return executable.clone();
        }
        match &spec.distribution {
            Distribution::Uri(uri) if uri.scheme() == "file" => match uri.to_file_path() {
                Ok(home) => return home.join("bin").join(launcher_name()),
                Err(()) => warn!("Ignoring distribution {} without a local path", uri),
            },
            Distribution::Uri(uri) => {
                info!("Distribution {} is not downloaded; using a local Gradle", uri)
            }
            Distribution::Version(version) => {
                info!("Gradle {} is not installed on demand; using a local Gradle", version)
            }
            Distribution::Default => {}
        }
        let wrapper = spec.project_directory.join(wrapper_name());
        if wrapper.is_file() {
            return wrapper;
        }
        PathBuf::from(launcher_name())
    }
}

impl ToolConnector for ProcessConnector {
    fn connect(&self, spec: &ConnectionSpec) -> Result<Box<dyn ProjectConnection>> {
        if !spec.project_directory.is_dir() {
            return Err(Error::Connection(format!(
                "project directory {} does not exist",
                spec.project_directory.display()
            )));
        }
        let executable = self.locate(spec);
        debug!("Using Gradle launcher {}", executable.display());
        Ok(Box::new(ProcessConnection {
            executable,
            spec: spec.clone(),
        }))
    }
}

struct ProcessConnection {
    executable: PathBuf,
    spec: ConnectionSpec,
}

impl ProcessConnection {
    fn operation(&self, tasks: &[String], capture: bool) -> ProcessOperation {
        ProcessOperation {
            executable: self.executable.clone(),
            spec: self.spec.clone(),
            tasks: tasks.to_vec(),
            capture,
        }
    }
}

impl ProjectConnection for ProcessConnection {
    fn build_environment(&mut self, monitor: &dyn ProgressMonitor) -> Result<BuildEnvironment> {
        let failure = |e: io::Error| Error::Connection(format!("could not run {}: {}", self.executable.display(), e));
        let mut child = Command::new(&self.executable)
            .current_dir(&self.spec.project_directory)
            .args(user_home_arguments(&self.spec))
            .args(BuildEnvironment::tasks())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(failure)?;
        let stdout = child.stdout.take().map(|stream| spawn_reader(stream, None, |_| true));

        // the reader is left behind on cancellation; grandchildren may still hold the pipe
        let Some(status) = wait_for_exit(&mut child, || monitor.is_cancelled()).map_err(failure)? else {
            return Err(Error::Cancelled);
        };
        let output = join_reader(stdout);
        if !status.success() {
            return Err(Error::Connection(format!(
                "{} --version exited with {}",
                self.executable.display(),
                status
            )));
        }
        BuildEnvironment::parse(&output)
    }

    fn new_build(&mut self, tasks: &[String]) -> Result<Box<dyn Operation<()>>> {
        Ok(Box::new(self.operation(tasks, false)))
    }

    fn new_model_request(&mut self, tasks: &[String]) -> Result<Box<dyn Operation<String>>> {
        Ok(Box::new(self.operation(tasks, true)))
    }

    fn close(&mut self) {
        debug!("Closed connection to {}", self.spec.project_directory.display());
    }
}

fn user_home_arguments(spec: &ConnectionSpec) -> Vec<String> {
    match &spec.gradle_user_home {
        Some(home) => vec!["--gradle-user-home".to_string(), home.display().to_string()],
        None => Vec::new(),
    }
}

struct ProcessOperation {
    executable: PathBuf,
    spec: ConnectionSpec,
    tasks: Vec<String>,
    capture: bool,
}

impl ProcessOperation {
    fn command_line(&self, config: &OperationConfig) -> std::result::Result<Vec<String>, ToolFailure> {
        let mut arguments = vec!["--console=plain".to_string()];
        arguments.extend(user_home_arguments(&self.spec));
        if let Some(java_home) = &config.java_home {
            arguments.push(format!("-Dorg.gradle.java.home={}", java_home.display()));
        }
        if !config.jvm_arguments.is_empty() {
            let jvm_arguments = join_jvm_arguments(&config.jvm_arguments).map_err(|argument| {
                ToolFailure::new(CONNECTION_FAILURE_KIND, "Could not pass JVM arguments")
                    .caused_by("IllegalArgumentException", format!("cannot quote JVM argument {argument:?}"))
            })?;
            arguments.push(format!("-Dorg.gradle.jvmargs={jvm_arguments}"));
        }
        arguments.extend(config.arguments.iter().cloned());
        arguments.extend(self.tasks.iter().cloned());
        Ok(arguments)
    }

    fn run(self, config: OperationConfig, working_directory: PathBuf) -> std::result::Result<String, ToolFailure> {
        let arguments = self.command_line(&config)?;
        debug!("Running {} {}", self.executable.display(), arguments.join(" "));

        let mut command = Command::new(&self.executable);
        command
            .current_dir(&working_directory)
            .args(&arguments)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if config.standard_input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(environment) = &config.environment {
            command.env_clear().envs(environment);
        }
        let mut child = command.spawn().map_err(|e| {
            ToolFailure::new(
                CONNECTION_FAILURE_KIND,
                format!("Could not start {}", self.executable.display()),
            )
            .caused_by("IOException", e.to_string())
        })?;

        if let (Some(input), Some(mut stdin)) = (config.standard_input.clone(), child.stdin.take()) {
            thread::spawn(move || {
                let copied = match input.lock() {
                    Ok(mut source) => io::copy(&mut *source, &mut stdin),
                    Err(_) => Err(io::Error::other("standard input is poisoned")),
                };
                if let Err(e) = copied {
                    debug!("Standard input forwarding stopped: {}", e);
                }
            });
        }

        let config = Arc::new(config);
        let stdout = child.stdout.take().map(|stream| {
            let config = config.clone();
            let capture = self.capture;
            spawn_reader(stream, config.standard_output.clone(), move |line| {
                if let Some(prefix) = PROGRESS_PREFIXES.iter().find(|p| line.starts_with(*p)) {
                    debug!("progress: {}", &line[prefix.len()..]);
                    config.notify_progress(ProgressEvent::new(line.trim()));
                }
                capture
            })
        });
        let stderr = child
            .stderr
            .take()
            .map(|stream| spawn_reader(stream, config.standard_error.clone(), |_| true));

        let token = config.cancellation_token.clone();
        let status = wait_for_exit(&mut child, || token.as_ref().is_some_and(|t| t.is_cancelled()))
            .map_err(|e| {
                ToolFailure::new(CONNECTION_FAILURE_KIND, "Lost track of the Gradle process")
                    .caused_by("IOException", e.to_string())
            })?
            .ok_or_else(|| {
                ToolFailure::new(CONNECTION_FAILURE_KIND, "Could not execute build")
                    .caused_by(BUILD_CANCELLED_KIND, "Build cancelled.")
            })?;
        let captured = join_reader(stdout);
        let errors = join_reader(stderr);

        if status.success() {
            return Ok(captured);
        }
        let mut failure = ToolFailure::new(
            CONNECTION_FAILURE_KIND,
            format!("Could not execute build using {}", self.executable.display()),
        );
        if errors.contains(BUILD_CANCELLED_KIND) {
            failure = failure.caused_by(BUILD_CANCELLED_KIND, "Build cancelled.");
        } else {
            failure = failure.caused_by(BUILD_FAILURE_KIND, format!("Gradle exited with {status}"));
        }
        Err(failure)
    }
}

impl Operation<()> for ProcessOperation {
    fn start(self: Box<Self>, config: OperationConfig, ambient: &AmbientProperties, handler: ResultHandler<()>) {
        let working_directory = working_directory(&self.spec, ambient);
        thread::spawn(move || match (*self).run(config, working_directory) {
            Ok(_) => handler.on_complete(()),
            Err(failure) => handler.on_failure(failure),
        });
    }
}

impl Operation<String> for ProcessOperation {
    fn start(self: Box<Self>, config: OperationConfig, ambient: &AmbientProperties, handler: ResultHandler<String>) {
        let working_directory = working_directory(&self.spec, ambient);
        thread::spawn(move || match (*self).run(config, working_directory) {
            Ok(output) => handler.on_complete(output),
            Err(failure) => handler.on_failure(failure),
        });
    }
}

/// The call runs where the ambient `user.dir` points, as the tool's own connector does.
fn working_directory(spec: &ConnectionSpec, ambient: &AmbientProperties) -> PathBuf {
    match ambient.get(KEY_USER_DIR) {
        Ok(Some(dir)) if Path::new(&dir).is_dir() => PathBuf::from(dir),
        _ => spec.project_directory.clone(),
    }
}

/// Waits for `child` to exit; kills it and returns `None` once `cancelled` holds.
fn wait_for_exit(child: &mut Child, cancelled: impl Fn() -> bool) -> io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if cancelled() {
            info!("Stopping Gradle process {}", child.id());
            if let Err(e) = child.kill() {
                warn!("Failed to stop Gradle process {}: {}", child.id(), e);
            }
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Joins JVM arguments into one `org.gradle.jvmargs` value.
///
/// Gradle splits the value on whitespace and honors single and double
/// quotes without escapes, so an argument with whitespace is quoted with
/// whichever quote it does not contain. Fails with the argument that
/// contains whitespace and both quotes.
fn join_jvm_arguments(arguments: &[String]) -> std::result::Result<String, String> {
    let mut quoted = Vec::with_capacity(arguments.len());
    for argument in arguments {
        if !argument.chars().any(char::is_whitespace) {
            quoted.push(argument.clone());
        } else if !argument.contains('"') {
            quoted.push(format!("\"{argument}\""));
        } else if !argument.contains('\'') {
            quoted.push(format!("'{argument}'"));
        } else {
            return Err(argument.clone());
        }
    }
    Ok(quoted.join(" "))
}

/// Copies lines to `sink`; lines for which `keep` returns true are also collected.
fn spawn_reader<R, F>(stream: R, sink: Option<OutputSink>, keep: F) -> JoinHandle<String>
where
    R: Read + Send + 'static,
    F: Fn(&str) -> bool + Send + 'static,
{
    thread::spawn(move || {
        let mut sink = sink;
        let mut kept = String::new();
        for line in BufReader::new(stream).lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!("Stopped reading Gradle output: {}", e);
                    break;
                }
            };
            if let Some(writer) = &sink {
                let written = match writer.lock() {
                    Ok(mut writer) => writeln!(writer, "{line}"),
                    Err(_) => Err(io::Error::other("output sink is poisoned")),
                };
                // the pipe is still drained so the process never blocks on a full buffer
                if let Err(e) = written {
                    warn!("Stopped forwarding Gradle output: {}", e);
                    sink = None;
                }
            }
            if keep(&line) {
                kept.push_str(&line);
                kept.push('\n');
            }
        }
        kept
    })
}

fn join_reader(reader: Option<JoinHandle<String>>) -> String {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use url::Url;

    fn spec(dir: &Path, distribution: Distribution) -> ConnectionSpec {
        ConnectionSpec {
            project_directory: dir.to_path_buf(),
            distribution,
            gradle_user_home: None,
        }
    }

    #[test]
    fn test_locate_prefers_override() {
        let dir = TempDir::new().unwrap();
        let connector = ProcessConnector::with_executable("/opt/bin/gradle");
        assert_eq!(
            connector.locate(&spec(dir.path(), Distribution::Default)),
            PathBuf::from("/opt/bin/gradle")
        );
    }

    #[test]
    fn test_locate_local_distribution() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("gradle-7.6");
        let uri = Url::from_directory_path(&home).unwrap();
        let located = ProcessConnector::new().locate(&spec(dir.path(), Distribution::Uri(uri)));
        assert_eq!(located, home.join("bin").join(launcher_name()));
    }

    #[test]
    fn test_locate_wrapper_then_path() {
        let dir = TempDir::new().unwrap();
        let connector = ProcessConnector::new();
        assert_eq!(
            connector.locate(&spec(dir.path(), Distribution::Version("7.0".into()))),
            PathBuf::from(launcher_name())
        );

        std::fs::write(dir.path().join(wrapper_name()), "#!/bin/sh\n").unwrap();
        assert_eq!(
            connector.locate(&spec(dir.path(), Distribution::Default)),
            dir.path().join(wrapper_name())
        );
    }

    #[test]
    fn test_command_line_mapping() {
        let dir = TempDir::new().unwrap();
        let mut spec = spec(dir.path(), Distribution::Default);
        spec.gradle_user_home = Some(PathBuf::from("/cache"));
        let operation = ProcessOperation {
            executable: PathBuf::from("gradle"),
            spec,
            tasks: vec!["build".to_string()],
            capture: false,
        };
        let config = OperationConfig {
            java_home: Some(PathBuf::from("/jdk")),
            jvm_arguments: vec!["-Xmx1g".to_string(), "-Da=1".to_string()],
            arguments: vec!["--offline".to_string()],
            ..Default::default()
        };
        assert_eq!(
            operation.command_line(&config).unwrap(),
            [
                "--console=plain",
                "--gradle-user-home",
                "/cache",
                "-Dorg.gradle.java.home=/jdk",
                "-Dorg.gradle.jvmargs=-Xmx1g -Da=1",
                "--offline",
                "build",
            ]
        );
    }

    #[test]
    fn test_jvm_arguments_with_whitespace_are_quoted() {
        let arguments = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
        assert_eq!(
            join_jvm_arguments(&arguments(&["-Xmx1g", "-Dmessage=hello world"])).unwrap(),
            "-Xmx1g \"-Dmessage=hello world\""
        );
        assert_eq!(
            join_jvm_arguments(&arguments(&["-Dquote=say \"hi\""])).unwrap(),
            "'-Dquote=say \"hi\"'"
        );
        assert_eq!(
            join_jvm_arguments(&arguments(&["-Dmixed=it's \"both\""])).unwrap_err(),
            "-Dmixed=it's \"both\""
        );
    }

    #[test]
    fn test_command_line_rejects_unquotable_jvm_argument() {
        let dir = TempDir::new().unwrap();
        let operation = ProcessOperation {
            executable: PathBuf::from("gradle"),
            spec: spec(dir.path(), Distribution::Default),
            tasks: Vec::new(),
            capture: false,
        };
        let config = OperationConfig {
            jvm_arguments: vec!["-Dmixed=it's \"both\"".to_string()],
            ..Default::default()
        };
        let failure = operation.command_line(&config).unwrap_err();
        assert!(failure.to_string().contains("JVM arguments"));
    }

    /// Sink whose writes always fail.
    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_reader_drains_after_sink_failure() {
        let sink: OutputSink = Arc::new(std::sync::Mutex::new(BrokenSink));
        let input = io::Cursor::new("one\ntwo\nthree\n");
        let kept = spawn_reader(input, Some(sink), |line| line != "two").join().unwrap();
        assert_eq!(kept, "one\nthree\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_version_check_stops_when_cancelled() {
        use crate::monitor::{CancelFlag, NullMonitor};
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("slow-gradle");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let mut connection = ProcessConnector::with_executable(&script)
            .connect(&spec(dir.path(), Distribution::Default))
            .unwrap();

        let flag = CancelFlag::new();
        flag.cancel();
        let started = std::time::Instant::now();
        let result = connection.build_environment(&NullMonitor::with_cancel_flag(flag));
        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_connect_rejects_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let result = ProcessConnector::new().connect(&spec(&missing, Distribution::Default));
        assert!(matches!(result, Err(Error::Connection(_))));
    }

    #[test]
    fn test_working_directory_follows_user_dir() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let ambient = AmbientProperties::new();
        let spec = spec(dir.path(), Distribution::Default);
        assert_eq!(working_directory(&spec, &ambient), dir.path());

        ambient.set(KEY_USER_DIR, other.path().display().to_string()).unwrap();
        assert_eq!(working_directory(&spec, &ambient), other.path());
    }
}
