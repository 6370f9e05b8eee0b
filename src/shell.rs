use crate::error::AssistError;
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: i32,
    /// stdout followed by stderr.
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool { self.code == 0 }

    pub fn into_result(self, command: &str) -> Result<CommandOutput, AssistError> {
        if self.success() {
            Ok(self)
        } else {
            Err(AssistError::Subprocess { command: command.to_string(), code: self.code, output: self.output })
        }
    }
}

/// Subprocess execution, always in an explicit working directory.
#[async_trait::async_trait]
pub trait Shell: Send + Sync {
    /// Run to completion capturing output.
    async fn run(&self, cwd: &Path, program: &str, args: &[String]) -> Result<CommandOutput>;

    /// Run with the terminal attached; returns the exit code.
    async fn run_attached(&self, cwd: &Path, program: &str, args: &[String]) -> Result<i32>;
}

pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program.to_string()).chain(args.iter().cloned()).collect::<Vec<_>>().join(" ")
}

pub struct SystemShell;

#[async_trait::async_trait]
impl Shell for SystemShell {
    async fn run(&self, cwd: &Path, program: &str, args: &[String]) -> Result<CommandOutput> {
        tracing::info!(cwd = %cwd.display(), command = %display_command(program, args), "running command");
        let cwd: PathBuf = cwd.to_path_buf();
        let program_owned = program.to_string();
        let args_owned = args.to_vec();
        // Blocking std::process inside spawn_blocking.
        let handle = tokio::task::spawn_blocking(move || {
            Command::new(&program_owned)
                .args(&args_owned)
                .current_dir(&cwd)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
        });
        match handle.await {
            Ok(Ok(output)) => {
                let code = output.status.code().unwrap_or(-1);
                let mut text = String::from_utf8_lossy(&output.stdout).to_string();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                tracing::debug!(code, "command finished");
                Ok(CommandOutput { code, output: text })
            }
            Ok(Err(e)) => Err(anyhow!("failed to start `{}`: {}", program, e)),
            Err(join_err) => Err(anyhow!("command join error: {}", join_err)),
        }
    }

    async fn run_attached(&self, cwd: &Path, program: &str, args: &[String]) -> Result<i32> {
        tracing::info!(cwd = %cwd.display(), command = %display_command(program, args), "running attached command");
        let cwd: PathBuf = cwd.to_path_buf();
        let program_owned = program.to_string();
        let args_owned = args.to_vec();
        let handle = tokio::task::spawn_blocking(move || {
            Command::new(&program_owned).args(&args_owned).current_dir(&cwd).status()
        });
        match handle.await {
            Ok(Ok(status)) => Ok(status.code().unwrap_or(-1)),
            Ok(Err(e)) => Err(anyhow!("failed to start `{}`: {}", program, e)),
            Err(join_err) => Err(anyhow!("command join error: {}", join_err)),
        }
    }
}
