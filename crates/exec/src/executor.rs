//! Sandboxed command execution with dry-run preview and rollback.
//!
//! Grounded on `safe_shell.py`'s `SafeShellExecutor`: commands that aren't on
//! the safe list run inside a throwaway copy of the working directory with
//! `HOME`/`TMPDIR` redirected there, so a misbehaving command can't escape to
//! the real filesystem.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::policy::CommandPolicy;
use crate::tracker::FileTracker;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const SANDBOX_IGNORE: &[&str] = &[".git", "__pycache__", "node_modules", ".venv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    Error,
    Blocked,
    Staged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub command: String,
    pub status: CommandStatus,
    pub returncode: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    pub dry_run: bool,
    pub sandbox: bool,
    pub execution_time_ms: u64,
    pub files_modified: Vec<String>,
    pub rollback_available: bool,
}

impl CommandResult {
    fn blocked(command: &str, reason: String, dry_run: bool) -> Self {
        CommandResult {
            command: command.to_string(),
            status: CommandStatus::Blocked,
            returncode: None,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(reason),
            dry_run,
            sandbox: false,
            execution_time_ms: 0,
            files_modified: vec![],
            rollback_available: false,
        }
    }
}

pub struct SafeShellExecutor {
    policy: CommandPolicy,
    timeout: Duration,
    track_files: bool,
    working_dir: PathBuf,
    file_tracker: Mutex<FileTracker>,
}

impl SafeShellExecutor {
    pub fn new(working_dir: PathBuf) -> Self {
        SafeShellExecutor {
            policy: CommandPolicy::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            track_files: true,
            working_dir,
            file_tracker: Mutex::new(FileTracker::new()),
        }
    }

    pub fn with_policy(mut self, policy: CommandPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_file_tracking(mut self, enabled: bool) -> Self {
        self.track_files = enabled;
        self
    }

    /// Runs `command`. When `dry_run` is true, only the policy checks happen
    /// and the command itself never executes.
    pub async fn run(&self, command: &str, dry_run: bool) -> CommandResult {
        let start = Instant::now();

        if let Some(reason) = self.policy.is_blocked(command) {
            return CommandResult::blocked(command, reason, dry_run);
        }

        if dry_run {
            let modifies = self.policy.modifies_files(command);
            return CommandResult {
                command: command.to_string(),
                status: CommandStatus::Staged,
                returncode: None,
                stdout: String::new(),
                stderr: String::new(),
                error: None,
                dry_run: true,
                sandbox: !self.policy.is_safe(command),
                execution_time_ms: 0,
                files_modified: vec![],
                rollback_available: modifies && self.track_files,
            };
        }

        if self.track_files && self.policy.modifies_files(command) {
            let mut tracker = self.file_tracker.lock().await;
            tracker.snapshot_directory(&self.working_dir);
        }

        let use_sandbox = !self.policy.is_safe(command);
        let mut result = if use_sandbox {
            self.execute_sandboxed(command).await
        } else {
            self.execute_direct(command).await
        };
        result.execution_time_ms = start.elapsed().as_millis() as u64;
        result
    }

    /// Restores every file tracked since the last `run` call that modified
    /// the filesystem. No-op if file tracking is disabled.
    pub async fn rollback(&self) -> Vec<String> {
        self.file_tracker.lock().await.rollback()
    }

    async fn execute_direct(&self, command: &str) -> CommandResult {
        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&self.working_dir)
                .output(),
        )
        .await;

        let files_modified = if self.track_files {
            self.file_tracker.lock().await.get_modified_files()
        } else {
            vec![]
        };

        match output {
            Ok(Ok(output)) => CommandResult {
                command: command.to_string(),
                status: if output.status.success() { CommandStatus::Success } else { CommandStatus::Error },
                returncode: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                error: None,
                dry_run: false,
                sandbox: false,
                execution_time_ms: 0,
                rollback_available: !files_modified.is_empty() && self.track_files,
                files_modified,
            },
            Ok(Err(e)) => CommandResult {
                command: command.to_string(),
                status: CommandStatus::Error,
                returncode: None,
                stdout: String::new(),
                stderr: String::new(),
                error: Some(e.to_string()),
                dry_run: false,
                sandbox: false,
                execution_time_ms: 0,
                files_modified: vec![],
                rollback_available: false,
            },
            Err(_) => CommandResult {
                command: command.to_string(),
                status: CommandStatus::Error,
                returncode: None,
                stdout: String::new(),
                stderr: String::new(),
                error: Some(format!("command timed out after {}s", self.timeout.as_secs())),
                dry_run: false,
                sandbox: false,
                execution_time_ms: 0,
                files_modified: vec![],
                rollback_available: false,
            },
        }
    }

    async fn execute_sandboxed(&self, command: &str) -> CommandResult {
        let sandbox_dir = match tempfile::Builder::new().prefix("safe_shell_").tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return CommandResult {
                    command: command.to_string(),
                    status: CommandStatus::Error,
                    returncode: None,
                    stdout: String::new(),
                    stderr: String::new(),
                    error: Some(format!("failed to create sandbox dir: {e}")),
                    dry_run: false,
                    sandbox: true,
                    execution_time_ms: 0,
                    files_modified: vec![],
                    rollback_available: false,
                };
            }
        };

        let sandbox_work = sandbox_dir.path().join("work");
        if let Err(e) = copy_dir_filtered(&self.working_dir, &sandbox_work) {
            return CommandResult {
                command: command.to_string(),
                status: CommandStatus::Error,
                returncode: None,
                stdout: String::new(),
                stderr: String::new(),
                error: Some(format!("failed to populate sandbox: {e}")),
                dry_run: false,
                sandbox: true,
                execution_time_ms: 0,
                files_modified: vec![],
                rollback_available: false,
            };
        }

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&sandbox_work)
                .env("HOME", sandbox_dir.path())
                .env("TMPDIR", sandbox_dir.path())
                .output(),
        )
        .await;

        match output {
            Ok(Ok(output)) => CommandResult {
                command: command.to_string(),
                status: if output.status.success() { CommandStatus::Success } else { CommandStatus::Error },
                returncode: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                error: None,
                dry_run: false,
                sandbox: true,
                execution_time_ms: 0,
                files_modified: vec![],
                rollback_available: false,
            },
            Ok(Err(e)) => CommandResult {
                command: command.to_string(),
                status: CommandStatus::Error,
                returncode: None,
                stdout: String::new(),
                stderr: String::new(),
                error: Some(e.to_string()),
                dry_run: false,
                sandbox: true,
                execution_time_ms: 0,
                files_modified: vec![],
                rollback_available: false,
            },
            Err(_) => CommandResult {
                command: command.to_string(),
                status: CommandStatus::Error,
                returncode: None,
                stdout: String::new(),
                stderr: String::new(),
                error: Some(format!("command timed out after {}s", self.timeout.as_secs())),
                dry_run: false,
                sandbox: true,
                execution_time_ms: 0,
                files_modified: vec![],
                rollback_available: false,
            },
        }
    }
}

fn copy_dir_filtered(src: &std::path::Path, dst: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    if !src.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if SANDBOX_IGNORE.iter().any(|ignored| name == std::ffi::OsStr::new(ignored)) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        if src_path.is_dir() {
            copy_dir_filtered(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn blocked_command_never_runs() {
        let dir = tempfile::tempdir().unwrap();
        let executor = SafeShellExecutor::new(dir.path().to_path_buf());
        let result = executor.run("rm -rf /", false).await;
        assert_eq!(result.status, CommandStatus::Blocked);
    }

    #[tokio::test]
    async fn dry_run_does_not_execute() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker.txt");
        let executor = SafeShellExecutor::new(dir.path().to_path_buf());
        let result = executor.run(&format!("touch {}", marker.display()), true).await;
        assert_eq!(result.status, CommandStatus::Staged);
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn direct_execution_of_safe_command_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let executor = SafeShellExecutor::new(dir.path().to_path_buf());
        let result = executor.run("echo hello", false).await;
        assert_eq!(result.status, CommandStatus::Success);
        assert!(result.stdout.contains("hello"));
        assert!(!result.sandbox);
    }

    #[tokio::test]
    async fn unsafe_command_runs_sandboxed_and_does_not_touch_real_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("real.txt"), b"original").unwrap();
        let executor = SafeShellExecutor::new(dir.path().to_path_buf());

        let result = executor.run("printf tampered > real.txt", false).await;
        assert_eq!(result.status, CommandStatus::Success);
        assert!(result.sandbox);
        assert_eq!(fs::read(dir.path().join("real.txt")).unwrap(), b"original");
    }

    #[tokio::test]
    async fn rollback_restores_modified_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("real.txt");
        fs::write(&file, b"original").unwrap();
        // `echo` is on the safe list, so this runs direct and is tracked.
        let executor = SafeShellExecutor::new(dir.path().to_path_buf());
        executor.run(&format!("echo overwritten > {}", file.display()), false).await;
        executor.rollback().await;
        assert_eq!(fs::read(&file).unwrap(), b"original");
    }
}
