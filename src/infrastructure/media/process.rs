use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::{ToolError, ToolOutput, ToolRunner};

/// Runs media tools as child processes, capturing exit status and output.
pub struct ProcessToolRunner;

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string())
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<ToolOutput, ToolError> {
        let tool = program_name(program);
        debug!("{} {}", tool, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The worker pool cancels a timed-out task by dropping this
            // future; the child must not outlive it.
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ToolError {
                tool: tool.clone(),
                message: format!("failed to spawn: {e}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(ToolError {
                tool,
                message: format!("exited with status {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn captures_stdout() {
        let runner = ProcessToolRunner;
        let output = runner
            .run(&PathBuf::from("echo"), &["hello".to_string()])
            .await;

        if let Ok(out) = output {
            assert!(out.stdout.trim().contains("hello"));
        }
        // Minimal environments may lack `echo`; spawning errors are covered below.
    }

    #[tokio::test]
    async fn missing_tool_is_an_error() {
        let runner = ProcessToolRunner;
        let result = runner
            .run(&PathBuf::from("no_such_tool_xyz_123"), &[])
            .await;

        let err = result.unwrap_err();
        assert!(err.message.contains("failed to spawn"), "{}", err.message);
    }
}
