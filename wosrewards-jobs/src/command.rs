//! Executor that shells out to the external automation command.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::{debug, info};
use wosrewards_job_queue::{ExecutionOutcome, ExecutorError, JobExecutor};

use crate::error::JobError;
use crate::report::ExecutorReport;

/// Runs `<program> <args..> --output-dir <dir> --player-ids <id>..` per job.
///
/// The child is killed if the run future is dropped, which is how the
/// worker's deadline stops a hung browser session.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: String,
    args: Vec<String>,
}

impl CommandExecutor {
    pub const NAME: &'static str = "command";

    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    #[inline]
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run_command(
        &self,
        inputs: &[String],
        output_dir: &Path,
    ) -> Result<ExecutionOutcome, JobError> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg("--output-dir")
            .arg(output_dir)
            .arg("--player-ids")
            .args(inputs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| JobError::Spawn {
                program: self.program.clone(),
                source,
            })?
            .wait_with_output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(
            program = %self.program,
            status = %output.status,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "automation command exited"
        );

        if !output.status.success() {
            let detail = stderr.trim();
            return Err(JobError::CommandFailed(if detail.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                detail.to_owned()
            }));
        }

        ExecutorReport::from_stdout(&stdout)?.into_outcome(output_dir)
    }
}

#[async_trait]
impl JobExecutor for CommandExecutor {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(
        &self,
        inputs: &[String],
        output_dir: &Path,
    ) -> Result<ExecutionOutcome, ExecutorError> {
        info!(
            program = %self.program,
            players = inputs.len(),
            output_dir = %output_dir.display(),
            "running automation command"
        );
        Ok(self.run_command(inputs, output_dir).await?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// `sh -c <script>`; the appended flags become `$1..`, so `$2` is the output dir.
    fn shell(script: &str) -> CommandExecutor {
        CommandExecutor::new("sh", vec!["-c".into(), script.into(), "automation".into()])
    }

    #[tokio::test]
    async fn success_report_points_at_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let executor = shell(
            r#"out="$2"; shift 3; printf 'player_id,status\n' > "$out/task_status.csv"; echo "players: $*"; echo '{"status":"success","artifact_path":"task_status.csv"}'"#,
        );

        let outcome = executor
            .run(&["111".into(), "222".into()], dir.path())
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Success {
                artifact_path: dir.path().join("task_status.csv")
            }
        );
    }

    #[tokio::test]
    async fn arguments_are_passed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let executor = shell(
            r#"printf '%s\n' "$@" > "$2/args.txt"; echo '{"status":"success","artifact_path":"args.txt"}'"#,
        );

        executor
            .run(&["111".into(), "222".into()], dir.path())
            .await
            .unwrap();
        let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
        let expected = format!(
            "--output-dir\n{}\n--player-ids\n111\n222\n",
            dir.path().display()
        );
        assert_eq!(args, expected);
    }

    #[tokio::test]
    async fn blocked_report_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let executor = shell(r#"echo '{"status":"blocked","message":"challenge detected"}'"#);
        let outcome = executor.run(&["111".into()], dir.path()).await.unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Blocked {
                message: "challenge detected".into(),
                artifact_path: None
            }
        );
    }

    #[tokio::test]
    async fn non_zero_exit_uses_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let executor = shell("echo '  network timeout  ' >&2; exit 3");
        let err = executor.run(&["111".into()], dir.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "network timeout");
    }

    #[tokio::test]
    async fn silent_failure_names_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let executor = shell("exit 4");
        let err = executor.run(&["111".into()], dir.path()).await.unwrap_err();
        assert!(err.to_string().starts_with("sh exited with"), "{err}");
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let executor = CommandExecutor::new("/nonexistent/wosrewards-automation", Vec::new());
        let err = executor.run(&["111".into()], dir.path()).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to start"), "{err}");
    }

    #[tokio::test]
    async fn abandoned_run_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let executor = shell(&format!("sleep 2; touch {}", marker.display()));

        let inputs = ["111".to_string()];
        let run = executor.run(&inputs, dir.path());
        assert!(tokio::time::timeout(std::time::Duration::from_millis(200), run)
            .await
            .is_err());
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(!marker.exists());
    }
}
