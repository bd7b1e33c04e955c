use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

pub mod process;

#[derive(Debug, Error)]
#[error("{tool}: {message}")]
pub struct ToolError {
    pub tool: String,
    pub message: String,
}

/// Captured output of a finished tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// "Run this external tool with these arguments" — the only capability the
/// pipeline has over ffmpeg/ffprobe. A non-zero exit status surfaces as
/// [`ToolError`] carrying the tool's stderr; tests inject a scripted
/// implementation instead of spawning processes.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> Result<ToolOutput, ToolError>;
}
