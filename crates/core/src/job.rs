// crates/core/src/job.rs
//! Bounded execution of external analysis programs.
//!
//! Each [`AnalysisJob`] is one subprocess invocation with a hard deadline.
//! The natural exit and the timeout timer race; whichever resolves first
//! decides the outcome. On expiry the process is killed outright (no
//! graceful shutdown) and whatever stderr was captured is kept for
//! diagnostics.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// One bounded invocation of an external analysis program against one input.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    /// Program to execute. Invoked as `<program> <args...>`.
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Working directory for the child, if it should differ from ours.
    pub working_dir: Option<PathBuf>,
    /// Hard deadline. On expiry the process is killed (SIGKILL).
    pub timeout: Duration,
    /// Opaque correlation token carried into log fields.
    pub label: String,
}

/// Captured output of a successful job. Stderr is always retained for
/// diagnostics even when the process exits cleanly.
#[derive(Debug)]
pub struct JobOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Typed failure of a job. Execution failures are distinct from parse
/// failures, which live in [`crate::parse`].
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("process killed after exceeding {timeout_ms}ms")]
    Timeout { timeout_ms: u64, stderr: String },

    #[error("process exited with code {code:?}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("i/o error while supervising process: {0}")]
    Io(#[from] std::io::Error),
}

/// Run one analysis job to completion or deadline.
///
/// stdin is closed; stdout and stderr are drained concurrently into
/// growing buffers so a chatty child can never stall on a full pipe.
/// Exit 0 yields the raw stdout bytes; nonzero exit and timeout are
/// typed failures carrying stderr verbatim.
pub async fn run_job(job: &AnalysisJob) -> Result<JobOutput, JobError> {
    let t0 = std::time::Instant::now();
    let timeout_ms = job.timeout.as_millis() as u64;

    let mut cmd = Command::new(&job.program);
    cmd.args(&job.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &job.working_dir {
        cmd.current_dir(dir);
    }

    tracing::info!(
        job = %job.label,
        program = %job.program.display(),
        timeout_ms,
        "spawning analysis process"
    );

    let mut child = cmd.spawn().map_err(|e| JobError::Spawn {
        program: job.program.display().to_string(),
        source: e,
    })?;

    let stdout_pipe = child.stdout.take().ok_or_else(|| JobError::Spawn {
        program: job.program.display().to_string(),
        source: std::io::Error::other("stdout not captured"),
    })?;
    let stderr_pipe = child.stderr.take().ok_or_else(|| JobError::Spawn {
        program: job.program.display().to_string(),
        source: std::io::Error::other("stderr not captured"),
    })?;

    let stdout_task = tokio::spawn(drain(stdout_pipe));
    let stderr_task = tokio::spawn(drain(stderr_pipe));

    let deadline = tokio::time::sleep(job.timeout);
    tokio::pin!(deadline);

    // Natural exit races the timer; the loser's effect is discarded.
    let status = tokio::select! {
        status = child.wait() => Some(status?),
        _ = &mut deadline => None,
    };

    let Some(status) = status else {
        // Deadline won. Kill is a no-op if the child exited in between.
        let _ = child.start_kill();
        let _ = child.wait().await;
        let stderr = collect_lossy(stderr_task).await;
        tracing::error!(
            job = %job.label,
            timeout_ms,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "analysis process timed out and was killed"
        );
        return Err(JobError::Timeout { timeout_ms, stderr });
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = collect_lossy(stderr_task).await;
    let elapsed_ms = t0.elapsed().as_millis() as u64;

    if status.success() {
        tracing::info!(
            job = %job.label,
            elapsed_ms,
            stdout_len = stdout.len(),
            "analysis process completed"
        );
        Ok(JobOutput { stdout, stderr })
    } else {
        tracing::error!(
            job = %job.label,
            elapsed_ms,
            exit_code = ?status.code(),
            stderr_len = stderr.len(),
            "analysis process exited with failure"
        );
        Err(JobError::Exit {
            code: status.code(),
            stderr,
        })
    }
}

async fn drain(mut pipe: impl AsyncReadExt + Unpin) -> Vec<u8> {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf).await;
    buf
}

async fn collect_lossy(task: tokio::task::JoinHandle<Vec<u8>>) -> String {
    let bytes = task.await.unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> AnalysisJob {
        AnalysisJob {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
            working_dir: None,
            timeout,
            label: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_exit_zero_yields_stdout() {
        let job = sh(r#"printf '{"ok":true}'"#, Duration::from_secs(5));
        let output = run_job(&job).await.unwrap();
        assert_eq!(output.stdout, br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn test_stderr_retained_on_success() {
        let job = sh(
            "printf result; printf 'progress note' >&2",
            Duration::from_secs(5),
        );
        let output = run_job(&job).await.unwrap();
        assert_eq!(output.stdout, b"result");
        assert_eq!(output.stderr, "progress note");
    }

    #[tokio::test]
    async fn test_nonzero_exit_surfaces_code_and_stderr() {
        let job = sh("printf 'boom' >&2; exit 3", Duration::from_secs(5));
        let err = run_job(&job).await.unwrap_err();
        match err {
            JobError::Exit { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("expected Exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hanging_process_is_killed_at_deadline() {
        let job = sh(
            "printf 'started' >&2; sleep 30",
            Duration::from_millis(200),
        );
        let t0 = std::time::Instant::now();
        let err = run_job(&job).await.unwrap_err();
        assert!(
            t0.elapsed() < Duration::from_secs(5),
            "kill did not happen near the deadline"
        );
        match err {
            JobError::Timeout { timeout_ms, stderr } => {
                assert_eq!(timeout_ms, 200);
                assert_eq!(stderr, "started");
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fast_exit_cancels_timer() {
        // A short timeout must not fire for a process that exits quickly.
        let job = sh("printf done", Duration::from_secs(60));
        let output = run_job(&job).await.unwrap();
        assert_eq!(output.stdout, b"done");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let job = AnalysisJob {
            program: PathBuf::from("/nonexistent/program"),
            args: vec![],
            working_dir: None,
            timeout: Duration::from_secs(1),
            label: "test".to_string(),
        };
        let err = run_job(&job).await.unwrap_err();
        assert!(matches!(err, JobError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_working_dir_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let mut job = sh("pwd", Duration::from_secs(5));
        job.working_dir = Some(dir.path().to_path_buf());
        let output = run_job(&job).await.unwrap();
        let printed = String::from_utf8(output.stdout).unwrap();
        let printed = std::path::Path::new(printed.trim());
        // Compare canonicalized paths; macOS tempdirs live behind symlinks.
        assert_eq!(
            printed.canonicalize().unwrap(),
            dir.path().canonicalize().unwrap()
        );
    }

    #[tokio::test]
    async fn test_concurrent_jobs_do_not_interfere() {
        let slow = sh("sleep 30", Duration::from_millis(200));
        let fast = sh("printf fast", Duration::from_secs(5));
        let (slow_result, fast_result) = tokio::join!(run_job(&slow), run_job(&fast));
        assert!(matches!(slow_result, Err(JobError::Timeout { .. })));
        assert_eq!(fast_result.unwrap().stdout, b"fast");
    }
}
