//! Executes a classified intent. Handlers never fail: every problem ends up
//! as a report line and the session carries on.

use crate::context::{self, ProjectContext};
use crate::error::{hint_for, AssistError};
use crate::extract::{extract_json, strip_fences};
use crate::files::{can_safely_edit, resolve_in, DirectResult, FileGenerator};
use crate::gateway::Gateway;
use crate::intent::{Action, Intent};
use crate::project::{ProjectAnalysis, ProjectPlanner};
use crate::scaffold;
use crate::session::SessionState;
use crate::shell::{display_command, Shell};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ANALYZE_LIST_LIMIT: usize = 10;
const ANALYZE_FILE_LIMIT: usize = 3;
const ANALYSIS_PREVIEW_CHARS: usize = 200;
const FAILED_OUTPUT_LINES: usize = 8;
const SERVER_WORDS: &[&str] = &["start", "serve", "server", "run", "launch", "démarrer", "lancer", "serveur"];
const INSTALL_WORDS: &[&str] = &["install", "composer"];

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Heading(String),
    Success(String),
    Info(String),
    Warning(String),
    Error(String),
    Hint(String),
    Detail(String),
    Text(String),
}

#[derive(Debug, Default, Clone)]
pub struct Report {
    lines: Vec<Line>,
}

impl Report {
    pub fn lines(&self) -> &[Line] { &self.lines }

    pub fn heading(&mut self, s: impl Into<String>) { self.lines.push(Line::Heading(s.into())) }
    pub fn success(&mut self, s: impl Into<String>) { self.lines.push(Line::Success(s.into())) }
    pub fn info(&mut self, s: impl Into<String>) { self.lines.push(Line::Info(s.into())) }
    pub fn warning(&mut self, s: impl Into<String>) { self.lines.push(Line::Warning(s.into())) }
    pub fn error(&mut self, s: impl Into<String>) { self.lines.push(Line::Error(s.into())) }
    pub fn detail(&mut self, s: impl Into<String>) { self.lines.push(Line::Detail(s.into())) }
    pub fn text(&mut self, s: impl Into<String>) { self.lines.push(Line::Text(s.into())) }

    /// Error line plus remediation hint when the chain carries one.
    pub fn failure(&mut self, err: impl Into<anyhow::Error>) {
        let err = err.into();
        self.error(format!("{:#}", err));
        if let Some(hint) = hint_for(&err) {
            self.lines.push(Line::Hint(hint));
        }
    }
}

/// Long-running command the session runs, attached, after rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Followup {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl Followup {
    pub fn dev_server(cwd: &Path) -> Self {
        Self {
            program: "php".to_string(),
            args: ["-S", "localhost:8000", "-t", "public"].iter().map(|s| s.to_string()).collect(),
            cwd: cwd.to_path_buf(),
        }
    }

    pub fn command_line(&self) -> String { display_command(&self.program, &self.args) }
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub report: Report,
    pub followup: Option<Followup>,
}

#[derive(Debug, Default, Deserialize)]
struct FeaturePlan {
    #[serde(default)]
    packages: Vec<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    instructions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FileTarget {
    #[serde(default)]
    file: Option<String>,
}

fn feature_prompt(input: &str) -> String {
    format!(
        r#"The user wants to add: "{input}"

Return ONLY a JSON object listing the Composer packages to install:
{{"packages": ["vendor/package"], "description": "short description", "instructions": "short usage notes"}}"#
    )
}

fn target_prompt(input: &str) -> String {
    format!(
        r#"The user wants: "{input}"

Which file must be modified? Return ONLY: {{"file": "path/to/file.php", "action": "description"}}"#
    )
}

fn mentions(text: &str, words: &[&str]) -> bool { words.iter().any(|w| text.contains(w)) }

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

pub struct Dispatcher<'a> {
    gateway: &'a Gateway,
    shell: &'a dyn Shell,
}

impl<'a> Dispatcher<'a> {
    pub fn new(gateway: &'a Gateway, shell: &'a dyn Shell) -> Self { Self { gateway, shell } }

    pub async fn dispatch(&self, intent: &Intent, input: &str, state: &mut SessionState) -> Outcome {
        tracing::info!(action = %intent.action, confidence = intent.confidence, "dispatching");
        let mut report = Report::default();
        report.detail(format!("Action: {} (confidence: {:.0}%)", intent.action, intent.confidence * 100.0));

        let followup = match intent.action {
            Action::CreateProject => {
                self.create_project(input, state, &mut report).await;
                None
            }
            Action::AddFeature => {
                self.add_feature(input, state, &mut report).await;
                None
            }
            Action::GenerateCode => {
                self.generate_code(input, state, &mut report).await;
                None
            }
            Action::ModifyFile => {
                self.modify_file(intent, input, state, &mut report).await;
                None
            }
            Action::AnalyzeCode => {
                self.analyze_code(state, &mut report).await;
                None
            }
            Action::RunCommand => self.run_command(input, state, &mut report).await,
            Action::AskQuestion => {
                self.answer_question(input, state, &mut report).await;
                None
            }
        };
        Outcome { report, followup }
    }

    /// Runs one command; a non-zero exit is reported with its output tail.
    async fn run_step(&self, cwd: &Path, program: &str, args: Vec<String>, report: &mut Report) -> bool {
        let command = display_command(program, &args);
        let result = match self.shell.run(cwd, program, &args).await {
            Ok(out) => out.into_result(&command).map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(_) => {
                report.success(command);
                true
            }
            Err(e) => {
                let output = match e.downcast_ref::<AssistError>() {
                    Some(AssistError::Subprocess { output, .. }) => output.clone(),
                    _ => String::new(),
                };
                report.failure(e);
                let lines: Vec<&str> = output.lines().filter(|l| !l.trim().is_empty()).collect();
                let skip = lines.len().saturating_sub(FAILED_OUTPUT_LINES);
                for line in &lines[skip..] {
                    report.detail(format!("    {}", line));
                }
                false
            }
        }
    }

    async fn create_project(&self, input: &str, state: &mut SessionState, report: &mut Report) {
        let analysis = ProjectPlanner::new(self.gateway).plan(input).await;
        report.heading(format!("Creating project: {}", analysis.project_name));
        report.info(analysis.description.clone());
        report.detail(format!("Framework: {} / type: {}", analysis.framework, analysis.project_type));

        let project_dir = state.cwd.join(&analysis.project_name);
        if let Err(e) = tokio::fs::create_dir_all(&project_dir).await {
            report.failure(AssistError::filesystem(&project_dir, e));
            return;
        }
        report.success(format!("Directory created: {}", analysis.project_name));
        state.cwd = project_dir.clone();

        let init_args = vec![
            "init".to_string(),
            format!("--name=app/{}", analysis.project_name),
            "--type=project".to_string(),
            "--no-interaction".to_string(),
        ];
        self.run_step(&project_dir, "composer", init_args, report).await;

        for library in &analysis.libraries {
            self.run_step(&project_dir, "composer", vec!["require".to_string(), library.clone()], report).await;
        }

        for folder in &analysis.folders {
            match resolve_in(&project_dir, folder) {
                Ok(path) => match tokio::fs::create_dir_all(&path).await {
                    Ok(()) => report.success(format!("Folder: {}", folder)),
                    Err(e) => report.failure(AssistError::filesystem(&path, e)),
                },
                Err(e) => report.failure(e),
            }
        }

        match scaffold::write_project_files(&project_dir, &analysis).await {
            Ok(files) => files.into_iter().for_each(|f| report.success(format!("File: {}", f))),
            Err(e) => report.failure(e),
        }
        self.write_model_files(&project_dir, &analysis, report).await;

        report.heading("Project created");
        report.info("Next steps:");
        report.detail(format!("cd {}", analysis.project_name));
        report.detail("php -S localhost:8000 -t public");
        report.info(format!("Your {} will be served at http://localhost:8000", analysis.project_type));
    }

    /// Files the model proposed, minus the ones the templates own.
    async fn write_model_files(&self, project_dir: &Path, analysis: &ProjectAnalysis, report: &mut Report) {
        let owned = scaffold::generated_paths(&analysis.framework);
        for (rel, content) in &analysis.main_files {
            let path = match resolve_in(project_dir, rel) {
                Ok(p) => p,
                Err(e) => {
                    report.failure(e);
                    continue;
                }
            };
            // Compared after joining so `./public/index.php` matches too.
            if owned.iter().any(|p| project_dir.join(p) == path) {
                tracing::debug!(file = %rel, "skipping model file that a template owns");
                continue;
            }
            if let Some(parent) = path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    report.failure(AssistError::filesystem(parent, e));
                    continue;
                }
            }
            match tokio::fs::write(&path, strip_fences(content)).await {
                Ok(()) => report.success(format!("File: {}", rel)),
                Err(e) => report.failure(AssistError::filesystem(&path, e)),
            }
        }
    }

    async fn add_feature(&self, input: &str, state: &mut SessionState, report: &mut Report) {
        if !context::has_manifest(&state.cwd) {
            report.warning("No composer.json here. Creating a basic project first.");
            self.create_project(&format!("simple API with {}", input), state, report).await;
            return;
        }

        let plan = match self.plan_feature(input).await {
            Ok(plan) => plan,
            Err(e) => {
                report.failure(e.context("could not analyze the request"));
                return;
            }
        };
        if let Some(description) = &plan.description {
            report.info(description.clone());
        }
        if plan.packages.is_empty() {
            report.warning("The model suggested no packages to install.");
            return;
        }

        report.heading(format!("Installing: {}", plan.packages.join(", ")));
        let cwd = state.cwd.clone();
        let mut installed = 0;
        for package in &plan.packages {
            if self.run_step(&cwd, "composer", vec!["require".to_string(), package.clone()], report).await {
                installed += 1;
            }
        }
        report.info(format!("{}/{} packages installed", installed, plan.packages.len()));
        if let Some(instructions) = plan.instructions.filter(|s| !s.trim().is_empty()) {
            report.info("Instructions:");
            report.text(instructions);
        }
    }

    async fn plan_feature(&self, input: &str) -> anyhow::Result<FeaturePlan> {
        let answer = self.gateway.ask(&feature_prompt(input)).await?;
        let json = extract_json(&answer)?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn generate_code(&self, input: &str, state: &SessionState, report: &mut Report) {
        let generator = FileGenerator::new(self.gateway, &state.cwd);
        match generator.create_file(input).await {
            Ok(created) => {
                report.success(format!("Code generated: {}", created.file_path));
                if let Some(backup) = created.backup_path {
                    report.detail(format!("Previous version saved to {}", backup.display()));
                }
                for suggestion in created.suggestions {
                    report.info(format!("Suggestion: {}", suggestion));
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "class-based generation failed, generating directly");
                match generator.generate_directly(input).await {
                    Ok(DirectResult::Written(rel)) => report.success(format!("File created: {}", rel)),
                    Ok(DirectResult::Answer(answer)) => {
                        report.info("Model answer:");
                        report.text(answer);
                    }
                    Err(e) => report.failure(e),
                }
            }
        }
    }

    /// Parameter first, then the model's pick; only existing files count.
    async fn edit_target(&self, intent: &Intent, input: &str, cwd: &Path) -> Option<String> {
        let exists = |rel: &str| resolve_in(cwd, rel).map(|p| p.is_file()).unwrap_or(false);
        if let Some(rel) = intent.param("file_path").filter(|p| exists(*p)) {
            return Some(rel.to_string());
        }
        let answer = self.gateway.ask(&target_prompt(input)).await.ok()?;
        let json = extract_json(&answer).ok()?;
        let target: FileTarget = serde_json::from_str(&json).ok()?;
        target.file.filter(|f| exists(f.as_str()))
    }

    async fn modify_file(&self, intent: &Intent, input: &str, state: &SessionState, report: &mut Report) {
        let Some(rel) = self.edit_target(intent, input, &state.cwd).await else {
            report.detail("No existing file identified; answering as a question.");
            self.answer_question(input, state, report).await;
            return;
        };
        if !can_safely_edit(&state.cwd, &rel) {
            report.error(format!("{} cannot be edited safely (protected or read-only)", rel));
            return;
        }
        match FileGenerator::new(self.gateway, &state.cwd).edit_file(&rel, input).await {
            Ok(change) => {
                report.success(format!("File modified: {}", change.file_path));
                report.detail(format!("Backup: {}", change.backup_path.display()));
                report.detail(format!("Lines added: {} (total {})", change.lines_added, change.total_lines));
            }
            Err(e) => report.failure(e),
        }
    }

    async fn analyze_code(&self, state: &SessionState, report: &mut Report) {
        let files = match context::list_php_files(&state.cwd, Some(ANALYZE_LIST_LIMIT)).await {
            Ok(files) => files,
            Err(e) => {
                report.failure(e);
                return;
            }
        };
        if files.is_empty() {
            report.warning("No PHP files found to analyze.");
            return;
        }

        report.info(format!("Analyzing {} files...", files.len().min(ANALYZE_FILE_LIMIT)));
        let project = ProjectContext::gather(&state.cwd);
        let generator = FileGenerator::new(self.gateway, &state.cwd);
        for file in files.iter().take(ANALYZE_FILE_LIMIT) {
            let shown = file.strip_prefix(&state.cwd).unwrap_or(file).display().to_string();
            match generator.analyze_file(file, &project).await {
                Ok(summary) => {
                    report.success(shown);
                    report.text(preview(&summary, ANALYSIS_PREVIEW_CHARS));
                }
                Err(e) => {
                    report.failure(e.context(format!("analyzing {}", shown)));
                    break;
                }
            }
        }
    }

    async fn run_command(&self, input: &str, state: &SessionState, report: &mut Report) -> Option<Followup> {
        let text = input.to_lowercase();
        if mentions(&text, SERVER_WORDS) {
            if state.cwd.join("public").join("index.php").is_file() {
                report.info("Starting the development server on http://localhost:8000");
                report.detail("Press Ctrl+C to stop it");
                return Some(Followup::dev_server(&state.cwd));
            }
            report.error("No public/index.php found in the current directory");
            return None;
        }
        if mentions(&text, INSTALL_WORDS) {
            report.info("Installing dependencies...");
            self.run_step(&state.cwd, "composer", vec!["install".to_string()], report).await;
            return None;
        }
        self.answer_question(input, state, report).await;
        None
    }

    async fn answer_question(&self, input: &str, state: &SessionState, report: &mut Report) {
        let prompt = context::question_prompt(
            input,
            context::framework_label(&state.cwd),
            &context::dir_name(&state.cwd),
        );
        match self.gateway.ask(&prompt).await {
            Ok(answer) => report.text(answer),
            Err(e) => report.failure(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendSettings;
    use crate::intent::{KeywordClassifier, ParamValue};
    use crate::testing::{RecordingShell, ScriptedTransport};
    use std::collections::BTreeMap;
    use std::fs;
    use std::sync::Arc;

    fn offline() -> Gateway {
        Gateway::with_transport(BackendSettings::default(), Arc::new(ScriptedTransport::offline()))
    }

    fn online(replies: &[&str]) -> Gateway {
        let transport = Arc::new(ScriptedTransport::online(&[BackendSettings::default().model.as_str()]));
        for r in replies {
            transport.push_reply(r);
        }
        Gateway::with_transport(BackendSettings::default(), transport)
    }

    fn intent(action: Action, params: &[(&str, &str)]) -> Intent {
        Intent {
            action,
            confidence: 0.9,
            reasoning: String::new(),
            parameters: params
                .iter()
                .map(|(k, v)| (k.to_string(), ParamValue::Text(v.to_string())))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn has(report: &Report, pred: impl Fn(&Line) -> bool) -> bool { report.lines().iter().any(pred) }

    #[tokio::test]
    async fn rest_api_project_is_scaffolded_offline() {
        let dir = tempfile::tempdir().unwrap();
        let gw = offline();
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());
        let input = "build a REST API";

        let outcome = Dispatcher::new(&gw, &shell).dispatch(&KeywordClassifier.detect(input), input, &mut state).await;

        assert!(state.cwd.starts_with(dir.path()));
        assert_ne!(state.cwd, dir.path());
        for folder in ["public", "src", "config"] {
            assert!(state.cwd.join(folder).is_dir(), "{folder}");
        }
        assert!(state.cwd.join("public/index.php").is_file());
        assert!(state.cwd.join("README.md").is_file());

        let calls = shell.calls();
        assert!(calls[0].starts_with("composer init --name=app/project-"));
        assert!(calls.contains(&"composer require slim/slim:^4.0".to_string()));
        assert!(calls.contains(&"composer require firebase/php-jwt".to_string()));
        assert!(outcome.followup.is_none());
        assert!(!has(&outcome.report, |l| matches!(l, Line::Error(_))));
    }

    #[tokio::test]
    async fn failed_install_does_not_stop_creation() {
        let dir = tempfile::tempdir().unwrap();
        let gw = offline();
        let shell = RecordingShell::failing_on(&["slim/psr7"]);
        let mut state = SessionState::new(dir.path().to_path_buf());
        let input = "build a REST API";

        let outcome = Dispatcher::new(&gw, &shell).dispatch(&KeywordClassifier.detect(input), input, &mut state).await;

        assert!(has(&outcome.report, |l| matches!(l, Line::Error(e) if e.contains("slim/psr7"))));
        assert!(has(&outcome.report, |l| matches!(l, Line::Detail(d) if d.contains("Could not find package"))));
        assert!(shell.calls().iter().any(|c| c.contains("respect/validation")));
        assert!(state.cwd.join("README.md").is_file());
    }

    #[tokio::test]
    async fn model_files_never_replace_template_files() {
        let dir = tempfile::tempdir().unwrap();
        let gw = online(&[r#"{"project_name": "shop", "framework": "slim", "main_files": {"./public/index.php": "<?php echo 'model';", "src/App.php": "<?php\nclass App {}"}}"#]);
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());

        Dispatcher::new(&gw, &shell)
            .dispatch(&intent(Action::CreateProject, &[]), "a shop", &mut state)
            .await;

        let index = fs::read_to_string(dir.path().join("shop/public/index.php")).unwrap();
        assert!(index.contains("AppFactory::create()"));
        assert!(!index.contains("echo 'model'"));
        assert!(dir.path().join("shop/src/App.php").is_file());
    }

    #[tokio::test]
    async fn project_dir_failure_aborts_creation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shop"), "not a directory").unwrap();
        let gw = online(&[r#"{"project_name": "shop", "framework": "slim"}"#]);
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());

        let outcome = Dispatcher::new(&gw, &shell)
            .dispatch(&intent(Action::CreateProject, &[]), "a shop", &mut state)
            .await;

        assert!(shell.calls().is_empty());
        assert_eq!(state.cwd, dir.path());
        assert!(has(&outcome.report, |l| matches!(l, Line::Error(_))));
        assert!(!has(&outcome.report, |l| matches!(l, Line::Heading(h) if h == "Project created")));
    }

    #[tokio::test]
    async fn add_feature_without_manifest_creates_a_project() {
        let dir = tempfile::tempdir().unwrap();
        let gw = offline();
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());

        let outcome = Dispatcher::new(&gw, &shell)
            .dispatch(&intent(Action::AddFeature, &[]), "jwt auth", &mut state)
            .await;

        assert!(has(&outcome.report, |l| matches!(l, Line::Warning(_))));
        assert!(state.cwd.join("public/index.php").is_file());
    }

    #[tokio::test]
    async fn add_feature_installs_suggested_packages() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("composer.json"), "{}").unwrap();
        let gw = online(&[r#"{"packages": ["firebase/php-jwt"], "instructions": "Use JWT::encode"}"#]);
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());

        let outcome = Dispatcher::new(&gw, &shell)
            .dispatch(&intent(Action::AddFeature, &[]), "add jwt", &mut state)
            .await;

        assert_eq!(shell.calls(), vec!["composer require firebase/php-jwt"]);
        assert!(has(&outcome.report, |l| matches!(l, Line::Text(t) if t == "Use JWT::encode")));
    }

    #[tokio::test]
    async fn modify_file_edits_named_target() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/A.php"), "<?php\nclass A {}\n").unwrap();
        let gw = online(&["```php\n<?php\nclass A { public function b() {} }\n```"]);
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());

        let outcome = Dispatcher::new(&gw, &shell)
            .dispatch(&intent(Action::ModifyFile, &[("file_path", "src/A.php")]), "add method b", &mut state)
            .await;

        assert!(has(&outcome.report, |l| matches!(l, Line::Success(s) if s.contains("src/A.php"))));
        assert!(fs::read_to_string(dir.path().join("src/A.php")).unwrap().contains("function b()"));
    }

    #[tokio::test]
    async fn modify_without_existing_target_answers_as_question() {
        let dir = tempfile::tempdir().unwrap();
        let gw = online(&[r#"{"file": null}"#, "Add a setter that validates the email."]);
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());

        let outcome = Dispatcher::new(&gw, &shell)
            .dispatch(&intent(Action::ModifyFile, &[("file_path", "src/Missing.php")]), "add email validation", &mut state)
            .await;

        assert!(has(&outcome.report, |l| matches!(l, Line::Detail(d) if d.contains("answering as a question"))));
        assert!(has(&outcome.report, |l| matches!(l, Line::Text(t) if t == "Add a setter that validates the email.")));
        assert!(!dir.path().join("src/Missing.php").exists());
    }

    #[tokio::test]
    async fn analyze_without_php_files_only_warns() {
        let dir = tempfile::tempdir().unwrap();
        let gw = offline();
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());

        let outcome = Dispatcher::new(&gw, &shell)
            .dispatch(&intent(Action::AnalyzeCode, &[]), "review my code", &mut state)
            .await;

        assert!(has(&outcome.report, |l| matches!(l, Line::Warning(_))));
        assert!(!has(&outcome.report, |l| matches!(l, Line::Error(_))));
    }

    #[tokio::test]
    async fn run_command_routes_by_keyword() {
        let dir = tempfile::tempdir().unwrap();
        let gw = offline();
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());
        let dispatcher = Dispatcher::new(&gw, &shell);
        let run = intent(Action::RunCommand, &[]);

        let outcome = dispatcher.dispatch(&run, "start the server", &mut state).await;
        assert!(outcome.followup.is_none());
        assert!(has(&outcome.report, |l| matches!(l, Line::Error(e) if e.contains("public/index.php"))));

        fs::create_dir_all(dir.path().join("public")).unwrap();
        fs::write(dir.path().join("public/index.php"), "<?php").unwrap();
        let outcome = dispatcher.dispatch(&run, "Start the server", &mut state).await;
        let followup = outcome.followup.unwrap();
        assert_eq!(followup.command_line(), "php -S localhost:8000 -t public");
        assert_eq!(followup.cwd, dir.path());

        dispatcher.dispatch(&run, "composer install please", &mut state).await;
        assert_eq!(shell.calls(), vec!["composer install"]);
    }

    #[tokio::test]
    async fn run_command_without_keywords_is_answered() {
        let dir = tempfile::tempdir().unwrap();
        let gw = online(&["OPcache keeps compiled scripts in memory."]);
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());

        let outcome = Dispatcher::new(&gw, &shell)
            .dispatch(&intent(Action::RunCommand, &[]), "what does opcache do", &mut state)
            .await;

        assert!(outcome.followup.is_none());
        assert!(shell.calls().is_empty());
        assert!(has(&outcome.report, |l| matches!(l, Line::Text(t) if t == "OPcache keeps compiled scripts in memory.")));
    }

    #[tokio::test]
    async fn question_offline_reports_error_with_hint() {
        let dir = tempfile::tempdir().unwrap();
        let gw = offline();
        let shell = RecordingShell::new();
        let mut state = SessionState::new(dir.path().to_path_buf());

        let outcome = Dispatcher::new(&gw, &shell)
            .dispatch(&intent(Action::AskQuestion, &[]), "what is PSR-4?", &mut state)
            .await;

        assert!(has(&outcome.report, |l| matches!(l, Line::Error(_))));
        assert!(has(&outcome.report, |l| matches!(l, Line::Hint(h) if h.contains("test-ollama"))));
    }
}
