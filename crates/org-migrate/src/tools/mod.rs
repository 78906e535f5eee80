//! External tool invocation (git, git-lfs, docker, npm).

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::core::traits::{ExternalTool, ToolOutput};
use crate::error::{MigrateError, Result};

/// [`ExternalTool`] implementation backed by real child processes.
#[derive(Debug, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ExternalTool for ProcessRunner {
    async fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<ToolOutput> {
        debug!("running {} {}", program, args.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let output = command.output().await.map_err(|e| {
            MigrateError::tool(program, format!("failed to spawn: {}", e))
        })?;

        Ok(ToolOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run a tool and treat a non-zero exit as a [`MigrateError::Tool`], with the
/// captured stderr as the failure message.
pub async fn run_checked(
    tool: &dyn ExternalTool,
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
) -> Result<ToolOutput> {
    let output = tool.run(program, args, cwd).await?;
    if output.exit_code != 0 {
        let stderr = output.stderr.trim();
        return Err(MigrateError::tool(
            program,
            format!("exit {}: {}", output.exit_code, stderr),
        ));
    }
    Ok(output)
}
