use crate::config::Config;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Everything the analysis program left behind, captured once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(
        "CLI tool not found at {0}. Please run 'pnpm run build' in the parent directory first."
    )]
    CliMissing(String),
    #[error("{program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CLI timed out after {0}s")]
    TimedOut(u64),
}

#[derive(Debug, Clone)]
pub struct CliInvoker {
    node: String,
    cli: PathBuf,
    timeout: Option<Duration>,
}

impl CliInvoker {
    pub fn new(node: impl Into<String>, cli: impl Into<PathBuf>, timeout_secs: Option<u64>) -> Self {
        Self {
            node: node.into(),
            cli: cli.into(),
            timeout: timeout_secs.filter(|s| *s > 0).map(Duration::from_secs),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.node.clone(), config.cli.clone(), config.timeout_secs)
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    /// Full command line handed to the node executable: the script, then `args`.
    pub fn command_line(&self, args: &[String]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(self.cli.to_string_lossy().into_owned());
        argv.extend(args.iter().cloned());
        argv
    }

    /// Runs the analysis program once in the current working directory.
    pub async fn invoke(&self, args: &[String]) -> Result<ProcessResult, InvokeError> {
        if !self.cli.exists() {
            return Err(InvokeError::CliMissing(self.cli.display().to_string()));
        }
        let cwd = std::env::current_dir().map_err(|source| InvokeError::Spawn {
            program: self.node.clone(),
            source,
        })?;
        run(&self.node, &self.command_line(args), &cwd, self.timeout).await
    }
}

/// Spawns `program` and waits for it to exit with both streams captured.
///
/// The child is killed if the wait is abandoned (timeout or dropped future).
pub async fn run(
    program: &str,
    args: &[String],
    cwd: &Path,
    timeout: Option<Duration>,
) -> Result<ProcessResult, InvokeError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match timeout {
        Some(dur) => tokio::time::timeout(dur, cmd.output())
            .await
            .map_err(|_| InvokeError::TimedOut(dur.as_secs()))?,
        None => cmd.output().await,
    }
    .map_err(|source| InvokeError::Spawn {
        program: program.to_string(),
        source,
    })?;

    Ok(ProcessResult {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: output.stdout,
        stderr: output.stderr,
    })
}
