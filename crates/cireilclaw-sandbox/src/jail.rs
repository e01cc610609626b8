//! Namespace-isolated command execution.
//!
//! Builds an OS-level jail around a single command: a fresh mount, PID, IPC,
//! UTS and user namespace (`mounts::build_and_enter` does the actual root
//! rebuild and `pivot_root`), a cleared and rebuilt environment, and a
//! parent-death signal so the child never outlives the agent process. The
//! allowlist/denylist precheck in `safety` runs first and is defense in
//! depth, not a substitute for the namespace isolation.

use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{instrument, warn};

use crate::error::{Result, SandboxError};
use crate::safety;

/// A single sandboxed command invocation, as received from the `exec` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub allowed_binaries: Vec<String>,
    pub timeout_ms: u64,
    pub agent_slug: String,
    pub agent_root: PathBuf,
}

/// Successful result of a sandboxed invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

const KILL_GRACE: Duration = Duration::from_millis(500);

/// Runs `request` inside a namespace jail, returning its captured output.
///
/// Preconditions enforced before anything is spawned:
/// - `command` must be a bare binary name with no path separators.
/// - `command` must appear in `allowed_binaries`.
/// - the joined command line must pass the [`safety`] precheck.
#[instrument(skip(request), fields(command = %request.command, agent = %request.agent_slug))]
pub async fn run(request: ExecRequest) -> Result<ExecOutput> {
    validate_shape(&request)?;

    if !request.allowed_binaries.iter().any(|b| b == &request.command) {
        return Err(SandboxError::NotAllowed(request.command.clone()));
    }

    let joined = std::iter::once(request.command.as_str())
        .chain(request.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");
    if let Err(reason) = safety::check_command(&joined) {
        return Err(SandboxError::Denylisted(reason));
    }

    let mut command = Command::new(&request.command);
    command
        .args(&request.args)
        .env_clear()
        .env("PATH", "/usr/bin:/bin")
        .env("HOME", "/workspace")
        .env("LANG", "C.UTF-8")
        .env("LC_ALL", "C.UTF-8")
        .envs(load_dot_env(&request.agent_root))
        .current_dir(request.agent_root.join("workspace"))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // SAFETY: pre_exec runs in the forked child before exec, single-threaded
    // at that point; only async-signal-safe syscalls are used here.
    let agent_root = request.agent_root.clone();
    let allowed_binaries = request.allowed_binaries.clone();
    unsafe {
        command.pre_exec(move || {
            isolate_namespaces(&agent_root, &allowed_binaries)?;
            set_die_with_parent()?;
            Ok(())
        });
    }

    let mut child = command.spawn().map_err(SandboxError::SpawnFailed)?;

    // Drain stdout/stderr concurrently with waiting on exit: `child.wait()`
    // alone doesn't read the pipes, so a command writing more than the OS
    // pipe buffer would block forever on write() and never hit the timeout.
    let mut stdout_pipe = child.stdout.take().expect("stdout piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr piped");
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    let status = match timeout(Duration::from_millis(request.timeout_ms), child.wait()).await {
        Ok(result) => result.map_err(SandboxError::SpawnFailed)?,
        Err(_elapsed) => {
            warn!(timeout_ms = request.timeout_ms, "sandboxed command timed out, killing");
            let _ = child.start_kill();
            let _ = timeout(KILL_GRACE, child.wait()).await;

            let stdout = drain_with_grace(stdout_task).await;
            let mut stderr = drain_with_grace(stderr_task).await;
            stderr.extend_from_slice(
                format!("\n[sandbox] command timed out after {}ms and was killed\n", request.timeout_ms)
                    .as_bytes(),
            );

            return Ok(ExecOutput {
                exit_code: -1,
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            });
        }
    };

    let stdout = stdout_task
        .await
        .map_err(|e| SandboxError::SpawnFailed(std::io::Error::other(e)))?;
    let stderr = stderr_task
        .await
        .map_err(|e| SandboxError::SpawnFailed(std::io::Error::other(e)))?;

    Ok(ExecOutput {
        exit_code: status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&stdout.map_err(SandboxError::SpawnFailed)?).into_owned(),
        stderr: String::from_utf8_lossy(&stderr.map_err(SandboxError::SpawnFailed)?).into_owned(),
    })
}

/// Awaits a pipe-draining task, aborting it if it hasn't finished within
/// `KILL_GRACE` of the child's own exit (e.g. a grandchild still holding the
/// write end open).
async fn drain_with_grace(mut task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>) -> Vec<u8> {
    tokio::select! {
        result = &mut task => result.ok().and_then(|r| r.ok()).unwrap_or_default(),
        _ = tokio::time::sleep(KILL_GRACE) => {
            task.abort();
            Vec::new()
        }
    }
}

/// Parses `KEY=VALUE` lines from `{agent_root}/workspace/.env`, skipping
/// comments and lines with no `=`. Missing file yields no variables.
fn load_dot_env(agent_root: &Path) -> Vec<(String, String)> {
    let path = agent_root.join("workspace").join(".env");
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (key, value) = line.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn validate_shape(request: &ExecRequest) -> Result<()> {
    if request.command.is_empty() {
        return Err(SandboxError::InvalidCommand("command must not be empty".into()));
    }
    if request.command.contains('/') {
        return Err(SandboxError::InvalidCommand(
            "command must be a bare binary name, not a path".into(),
        ));
    }
    if request.timeout_ms == 0 {
        return Err(SandboxError::InvalidCommand("timeoutMs must be greater than zero".into()));
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn isolate_namespaces(agent_root: &Path, allowed_binaries: &[String]) -> std::io::Result<()> {
    use nix::sched::{unshare, CloneFlags};
    unshare(
        CloneFlags::CLONE_NEWUSER
            | CloneFlags::CLONE_NEWPID
            | CloneFlags::CLONE_NEWIPC
            | CloneFlags::CLONE_NEWUTS
            | CloneFlags::CLONE_NEWNS,
    )
    .map_err(std::io::Error::from)?;

    crate::mounts::build_and_enter(agent_root, allowed_binaries)
}

#[cfg(not(target_os = "linux"))]
fn isolate_namespaces(_agent_root: &Path, _allowed_binaries: &[String]) -> std::io::Result<()> {
    Ok(())
}

#[cfg(target_os = "linux")]
fn set_die_with_parent() -> std::io::Result<()> {
    let ret = unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) };
    if ret != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_die_with_parent() -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_agent_root() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        for sub in ["workspace", "memories", "skills"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn rejects_binary_not_in_allowlist() {
        let request = ExecRequest {
            command: "nmap".into(),
            args: vec![],
            allowed_binaries: vec!["ls".into(), "cat".into()],
            timeout_ms: 1000,
            agent_slug: "test-agent".into(),
            agent_root: PathBuf::new(),
        };
        let err = run(request).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Command 'nmap' is not in the allowed binaries list."
        );
    }

    #[tokio::test]
    async fn rejects_path_shaped_command() {
        let request = ExecRequest {
            command: "/bin/ls".into(),
            args: vec![],
            allowed_binaries: vec!["/bin/ls".into()],
            timeout_ms: 1000,
            agent_slug: "test-agent".into(),
            agent_root: PathBuf::new(),
        };
        let err = run(request).await.unwrap_err();
        assert!(matches!(err, SandboxError::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn rejects_denylisted_command_even_if_allowlisted_binary() {
        let request = ExecRequest {
            command: "rm".into(),
            args: vec!["-rf".into(), "/".into()],
            allowed_binaries: vec!["rm".into()],
            timeout_ms: 1000,
            agent_slug: "test-agent".into(),
            agent_root: PathBuf::new(),
        };
        let err = run(request).await.unwrap_err();
        assert!(matches!(err, SandboxError::Denylisted(_)));
    }

    #[tokio::test]
    async fn rejects_zero_timeout() {
        let request = ExecRequest {
            command: "ls".into(),
            args: vec![],
            allowed_binaries: vec!["ls".into()],
            timeout_ms: 0,
            agent_slug: "test-agent".into(),
            agent_root: PathBuf::new(),
        };
        let err = run(request).await.unwrap_err();
        assert!(matches!(err, SandboxError::InvalidCommand(_)));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn runs_allowlisted_command() {
        let dir = make_agent_root();
        let request = ExecRequest {
            command: "echo".into(),
            args: vec!["hello".into()],
            allowed_binaries: vec!["echo".into()],
            timeout_ms: 2000,
            agent_slug: "test-agent".into(),
            agent_root: dir.path().to_path_buf(),
        };
        let output = run(request).await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.exit_code, 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_returns_exit_code_minus_one_with_note_in_stderr() {
        let dir = make_agent_root();
        let request = ExecRequest {
            command: "sleep".into(),
            args: vec!["5".into()],
            allowed_binaries: vec!["sleep".into()],
            timeout_ms: 100,
            agent_slug: "test-agent".into(),
            agent_root: dir.path().to_path_buf(),
        };
        let output = run(request).await.unwrap();
        assert_eq!(output.exit_code, -1);
        assert!(output.stderr.contains("timed out"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn environment_is_confined_and_dot_env_is_injected() {
        let dir = make_agent_root();
        std::fs::write(
            dir.path().join("workspace/.env"),
            "FOO=bar\n# a comment\nNOVALUE\nBAZ = qux \n",
        )
        .unwrap();
        let request = ExecRequest {
            command: "env".into(),
            args: vec![],
            allowed_binaries: vec!["env".into()],
            timeout_ms: 2000,
            agent_slug: "test-agent".into(),
            agent_root: dir.path().to_path_buf(),
        };
        let output = run(request).await.unwrap();
        assert!(output.stdout.contains("HOME=/workspace"));
        assert!(output.stdout.contains("LANG=C.UTF-8"));
        assert!(output.stdout.contains("LC_ALL=C.UTF-8"));
        assert!(output.stdout.contains("FOO=bar"));
        assert!(output.stdout.contains("BAZ=qux"));
        assert!(!output.stdout.contains("NOVALUE"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn host_filesystem_is_not_reachable_from_the_jail() {
        let dir = make_agent_root();
        std::fs::write(dir.path().join("not-in-jail.txt"), "secret").unwrap();
        let request = ExecRequest {
            command: "cat".into(),
            args: vec![dir.path().join("not-in-jail.txt").display().to_string()],
            allowed_binaries: vec!["cat".into()],
            timeout_ms: 2000,
            agent_slug: "test-agent".into(),
            agent_root: dir.path().to_path_buf(),
        };
        let output = run(request).await.unwrap();
        assert_ne!(output.exit_code, 0);
        assert!(!output.stdout.contains("secret"));
    }
}
