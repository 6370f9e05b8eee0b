//! The interactive read-eval loop and its built-in system commands.

use crate::context;
use crate::dispatch::{Dispatcher, Report};
use crate::error::AssistError;
use crate::gateway::Gateway;
use crate::intent::{ModelClassifier, ResilientClassifier};
use crate::render;
use crate::shell::Shell;
use anyhow::{bail, Context, Result};
use std::io::{BufRead as _, Write as _};
use std::path::{Path, PathBuf};

const EXIT_WORDS: &[&str] = &["exit", "quit", "q", "bye"];

/// Everything that changes between turns. Owned by the loop.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub cwd: PathBuf,
}

impl SessionState {
    pub fn new(cwd: PathBuf) -> Self { Self { cwd } }

    pub fn prompt(&self) -> String { format!("{} > ", context::dir_name(&self.cwd)) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCommand {
    Help,
    Version,
    Status,
    Clear,
    Pwd,
    Cd(String),
    TestOllama,
    Models,
    Scan,
}

impl SystemCommand {
    /// Matches on the first whitespace token only.
    pub fn parse(line: &str) -> Option<SystemCommand> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((h, r)) => (h, r.trim()),
            None => (line, ""),
        };
        let cmd = match head.to_lowercase().as_str() {
            "help" => SystemCommand::Help,
            "version" => SystemCommand::Version,
            "status" => SystemCommand::Status,
            "clear" => SystemCommand::Clear,
            "pwd" => SystemCommand::Pwd,
            "cd" => SystemCommand::Cd(rest.to_string()),
            "test-ollama" => SystemCommand::TestOllama,
            "models" => SystemCommand::Models,
            "scan" => SystemCommand::Scan,
            _ => return None,
        };
        Some(cmd)
    }
}

pub fn is_exit(line: &str) -> bool {
    let line = line.trim().to_lowercase();
    EXIT_WORDS.contains(&line.as_str())
}

/// `~` expands to the home directory; the result must be an existing directory.
pub fn resolve_cd(cwd: &Path, arg: &str) -> Result<PathBuf> {
    let arg = arg.trim();
    if arg.is_empty() {
        bail!("usage: cd <path>");
    }
    let target = if arg == "~" || arg.starts_with("~/") {
        let home = dirs::home_dir().context("could not determine the home directory")?;
        home.join(arg.trim_start_matches('~').trim_start_matches('/'))
    } else {
        cwd.join(arg)
    };
    let target = target
        .canonicalize()
        .with_context(|| format!("no such directory: {}", target.display()))?;
    if !target.is_dir() {
        bail!("not a directory: {}", target.display());
    }
    Ok(target)
}

pub struct Session<'a> {
    app_name: String,
    gateway: &'a Gateway,
    shell: &'a dyn Shell,
    state: SessionState,
}

impl<'a> Session<'a> {
    pub fn new(app_name: &str, gateway: &'a Gateway, shell: &'a dyn Shell, cwd: PathBuf) -> Self {
        Self { app_name: app_name.to_string(), gateway, shell, state: SessionState::new(cwd) }
    }

    pub fn print_banner(&self) {
        println!("{}", render::banner(&self.app_name, self.gateway.base_url(), self.gateway.current_model()));
    }

    /// Reads stdin until an exit word or end of input.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            print!("{}", self.state.prompt());
            std::io::stdout().flush().ok();
            let mut raw = Vec::new();
            let n = std::io::stdin().lock().read_until(b'\n', &mut raw)?;
            if n == 0 {
                println!();
                break;
            }
            // Terminals in legacy encodings send bytes that are not UTF-8.
            let input = String::from_utf8_lossy(&raw);
            let line = input.trim();
            if line.is_empty() {
                continue;
            }
            if is_exit(line) {
                println!("Goodbye!");
                break;
            }
            self.handle(line).await;
        }
        Ok(())
    }

    async fn handle(&mut self, line: &str) {
        if let Some(cmd) = SystemCommand::parse(line) {
            if cmd == SystemCommand::Clear {
                if let Err(e) = console::Term::stdout().clear_screen() {
                    tracing::debug!(error = %e, "clearing the screen failed");
                }
                self.print_banner();
                return;
            }
            render::print_report(&self.system(cmd).await);
            return;
        }

        let classifier = ResilientClassifier::new(ModelClassifier::new(self.gateway));
        let intent = classifier.classify(line).await;
        let outcome = Dispatcher::new(self.gateway, self.shell).dispatch(&intent, line, &mut self.state).await;
        render::print_report(&outcome.report);

        if let Some(followup) = outcome.followup {
            let mut report = Report::default();
            match self.shell.run_attached(&followup.cwd, &followup.program, &followup.args).await {
                Ok(0) => {}
                Ok(code) => report.warning(format!("`{}` exited with status {}", followup.command_line(), code)),
                Err(e) => report.failure(e),
            }
            render::print_report(&report);
        }
    }

    pub async fn system(&mut self, cmd: SystemCommand) -> Report {
        let mut report = Report::default();
        match cmd {
            SystemCommand::Help => return render::help(),
            SystemCommand::Version => {
                report.info(format!("{} v{}", self.app_name, env!("CARGO_PKG_VERSION")));
            }
            SystemCommand::Status => self.status(&mut report).await,
            SystemCommand::Clear => {}
            SystemCommand::Pwd => report.text(self.state.cwd.display().to_string()),
            SystemCommand::Cd(arg) => match resolve_cd(&self.state.cwd, &arg) {
                Ok(dir) => {
                    report.success(format!("Now in {}", dir.display()));
                    self.state.cwd = dir;
                }
                Err(e) => report.failure(e),
            },
            SystemCommand::TestOllama => self.test_backend(&mut report).await,
            SystemCommand::Models => self.models(&mut report).await,
            SystemCommand::Scan => self.scan(&mut report).await,
        }
        report
    }

    async fn status(&self, report: &mut Report) {
        report.heading("Status");
        report.detail(format!("Version: {}", env!("CARGO_PKG_VERSION")));
        report.detail(format!("Directory: {}", self.state.cwd.display()));
        report.detail(format!("Backend: {}", self.gateway.base_url()));
        report.detail(format!("Model: {}", self.gateway.current_model()));
        let status = self.gateway.probe().await;
        if status.is_connected() {
            report.success(format!("Backend connected ({} models)", status.models.len()));
            if !status.model_available {
                report.failure(AssistError::ModelUnavailable { model: status.current_model });
            }
        } else {
            report.failure(AssistError::Connectivity(status.message.unwrap_or_default()));
        }
    }

    async fn test_backend(&self, report: &mut Report) {
        let status = self.gateway.probe().await;
        if !status.is_connected() {
            report.failure(AssistError::Connectivity(status.message.unwrap_or_default()));
            return;
        }
        report.success(format!("Connected to {}", self.gateway.base_url()));
        for name in &status.models {
            if name == &status.current_model {
                report.success(format!("{} (current)", name));
            } else {
                report.detail(name.clone());
            }
        }
        if !status.model_available {
            report.failure(AssistError::ModelUnavailable { model: status.current_model });
        }
    }

    async fn models(&self, report: &mut Report) {
        let models = self.gateway.list_models().await;
        if models.is_empty() {
            report.warning("No models found");
            report.detail(format!("install one with: ollama pull {}", self.gateway.current_model()));
            return;
        }
        report.heading("Installed models");
        for model in models {
            let modified = model
                .modified
                .as_deref()
                .and_then(|m| chrono::DateTime::parse_from_rfc3339(m).ok())
                .map(|d| format!(", modified {}", d.format("%Y-%m-%d")))
                .unwrap_or_default();
            let line = format!("{} ({}{})", model.name, model.size, modified);
            if model.name == self.gateway.current_model() {
                report.success(format!("{} (current)", line));
            } else {
                report.detail(line);
            }
        }
    }

    async fn scan(&self, report: &mut Report) {
        let root = &self.state.cwd;
        report.heading(format!("Scanning {}", context::dir_name(root)));
        let framework = context::framework_label(root);
        match framework {
            Some(fw) => report.success(format!("Framework: {}", fw)),
            None => report.info("Framework: none detected"),
        }
        match context::list_php_files(root, None).await {
            Ok(files) => report.detail(format!("PHP files: {}", files.len())),
            Err(e) => report.failure(e),
        }
        if framework == Some("Laravel") {
            let models = context::laravel_models(root);
            let controllers = context::laravel_controllers(root);
            report.detail(format!("Models ({}): {}", models.len(), models.join(", ")));
            report.detail(format!("Controllers ({}): {}", controllers.len(), controllers.join(", ")));
        }
    }
}
