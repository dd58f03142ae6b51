//! Target process lifecycle: spawn with piped streams, bounded line reads, forced termination.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;

use crate::error::{HarnessError, Result};

/// How long `terminate` waits for the killed child to be reaped
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything needed to launch a target executable
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub workdir: Option<PathBuf>,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            workdir: None,
        }
    }

    pub fn arg(mut self, value: impl Into<String>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn workdir(mut self, path: impl Into<PathBuf>) -> Self {
        self.workdir = Some(path.into());
        self
    }

    /// Explicit workdir, else the executable's own directory, else `.`
    pub fn working_dir(&self, resolved_program: &Path) -> PathBuf {
        if let Some(dir) = &self.workdir {
            return dir.clone();
        }
        match resolved_program.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Check that `path` names an existing, executable regular file
pub fn resolve_executable(path: &Path) -> Result<PathBuf> {
    let resolved = std::fs::canonicalize(path)
        .map_err(|e| HarnessError::launch(path, format!("executable not found: {}", e)))?;

    let metadata = std::fs::metadata(&resolved)
        .map_err(|e| HarnessError::launch(path, format!("cannot stat executable: {}", e)))?;

    if !metadata.is_file() {
        return Err(HarnessError::launch(path, "not a regular file"));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(HarnessError::launch(path, "file is not executable"));
        }
    }

    Ok(resolved)
}

/// A live target with exclusively owned stdin/stdout handles.
///
/// The child is spawned with `kill_on_drop`, so dropping the handle also
/// ends the process; `terminate` does the same explicitly and waits for it.
pub struct TargetProcess {
    name: String,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<Lines<BufReader<ChildStdout>>>,
    stderr_task: Option<JoinHandle<()>>,
    terminated: bool,
}

impl TargetProcess {
    /// Launch the target with piped streams and the `TargetSpec` environment overrides
    pub async fn start(spec: &TargetSpec) -> Result<Self> {
        let program = resolve_executable(&spec.program)?;
        let workdir = spec.working_dir(&program);

        let mut command = Command::new(&program);
        command
            .args(&spec.args)
            .current_dir(&workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = command
            .spawn()
            .map_err(|e| HarnessError::launch(&spec.program, e.to_string()))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .map(|stdout| BufReader::new(stdout).lines());
        let stderr_task = child.stderr.take().map(|stderr| {
            let name = spec.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target_name = %name, "stderr: {}", line);
                }
            })
        });

        tracing::info!(
            "Started {} (pid {:?}) from {}",
            spec.name,
            child.id(),
            workdir.display()
        );

        Ok(Self {
            name: spec.name.clone(),
            child,
            stdin,
            stdout,
            stderr_task,
            terminated: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id, `None` once the child has been reaped
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Queue `line` plus a newline on the target's stdin (not flushed)
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(HarnessError::StreamClosed)?;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(HarnessError::from_write)?;
        stdin.write_all(b"\n").await.map_err(HarnessError::from_write)
    }

    pub async fn flush(&mut self) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(HarnessError::StreamClosed)?;
        stdin.flush().await.map_err(HarnessError::from_write)
    }

    /// Read one line from stdout, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` on end of stream.
    pub async fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        let stdout = self.stdout.as_mut().ok_or(HarnessError::StreamClosed)?;
        match tokio::time::timeout(timeout, stdout.next_line()).await {
            Ok(Ok(line)) => Ok(line),
            Ok(Err(e)) => Err(HarnessError::Io(e)),
            Err(_) => Err(HarnessError::ResponseTimeout { timeout }),
        }
    }

    /// Exit status if the child has already exited
    pub fn exit_status(&mut self) -> Option<ExitStatus> {
        self.child.try_wait().ok().flatten()
    }

    pub fn is_running(&mut self) -> bool {
        !self.terminated && matches!(self.child.try_wait(), Ok(None))
    }

    /// Force the target down and release its streams. Safe to call repeatedly.
    pub async fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        self.stdin.take();
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!("{} had already exited with {}", self.name, status);
            }
            _ => {
                if let Err(e) = self.child.start_kill() {
                    tracing::debug!("kill {} failed: {}", self.name, e);
                }
                match tokio::time::timeout(REAP_TIMEOUT, self.child.wait()).await {
                    Ok(Ok(status)) => {
                        tracing::info!("Terminated {} ({})", self.name, status);
                    }
                    Ok(Err(e)) => tracing::warn!("Failed to reap {}: {}", self.name, e),
                    Err(_) => tracing::warn!(
                        "{} still running {}s after kill",
                        self.name,
                        REAP_TIMEOUT.as_secs()
                    ),
                }
            }
        }

        self.stdout.take();
    }
}

impl Drop for TargetProcess {
    fn drop(&mut self) {
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_executable_is_launch_error() {
        let err = resolve_executable(Path::new("/definitely/not/here/gatekeeper")).unwrap_err();
        assert!(matches!(err, HarnessError::Launch { .. }));
        assert!(err.to_string().contains("executable not found"));
    }

    #[test]
    fn test_directory_is_launch_error() {
        let err = resolve_executable(&std::env::temp_dir()).unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_executable_file_is_launch_error() {
        let path = std::env::temp_dir().join(format!("stdio-bench-{}.txt", uuid::Uuid::new_v4()));
        std::fs::write(&path, "not a program").unwrap();

        let err = resolve_executable(&path).unwrap_err();
        std::fs::remove_file(&path).ok();

        assert!(err.to_string().contains("not executable"));
    }

    #[test]
    fn test_working_dir_defaults_to_executable_parent() {
        let spec = TargetSpec::new("gatekeeper", "/opt/api/gatekeeper");
        assert_eq!(
            spec.working_dir(Path::new("/opt/api/gatekeeper")),
            PathBuf::from("/opt/api")
        );

        let spec = spec.workdir("/tmp");
        assert_eq!(
            spec.working_dir(Path::new("/opt/api/gatekeeper")),
            PathBuf::from("/tmp")
        );
    }

    #[test]
    fn test_spec_builder() {
        let spec = TargetSpec::new("monitor", "./deepguard")
            .arg("--verbose")
            .args(["--mode", "monitor"])
            .env("MONITOR_KEY", "secret");

        assert_eq!(spec.args, vec!["--verbose", "--mode", "monitor"]);
        assert_eq!(
            spec.env,
            vec![("MONITOR_KEY".to_string(), "secret".to_string())]
        );
    }

    #[tokio::test]
    async fn test_start_missing_target_fails() {
        let spec = TargetSpec::new("gatekeeper", "/definitely/not/here/gatekeeper");
        let result = TargetProcess::start(&spec).await;
        assert!(matches!(result, Err(HarnessError::Launch { .. })));
    }
}
