use crate::extract::extract_json;
use crate::gateway::Gateway;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_PROJECT_NAME: &str = "my-php-project";
pub const DEFAULT_FRAMEWORK: &str = "slim";
pub const DEFAULT_FOLDERS: &[&str] = &["public", "src", "config"];
const API_EXTRAS: &[&str] = &["firebase/php-jwt", "respect/validation"];

/// What to scaffold for a new project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAnalysis {
    pub project_name: String,
    pub framework: String,
    pub project_type: String,
    pub description: String,
    pub libraries: Vec<String>,
    pub composer_commands: Vec<String>,
    pub folders: Vec<String>,
    pub main_files: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawAnalysis {
    project_name: Option<String>,
    framework: Option<String>,
    project_type: Option<String>,
    description: Option<String>,
    libraries: Option<Vec<String>>,
    composer_commands: Option<Vec<String>>,
    folders: Option<Vec<String>>,
    main_files: Option<BTreeMap<String, String>>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Kebab-case, `[a-z0-9-]` only.
pub fn sanitize_project_name(raw: &str) -> String {
    let mut out = String::new();
    for c in raw.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-').to_string();
    if trimmed.is_empty() { DEFAULT_PROJECT_NAME.to_string() } else { trimmed }
}

pub fn default_libraries(framework: &str) -> Vec<String> {
    let libs: &[&str] = match framework {
        "laravel" => &["laravel/framework"],
        "symfony" => &["symfony/framework-bundle", "symfony/console"],
        "vanilla" => &["monolog/monolog", "guzzlehttp/guzzle"],
        _ => &["slim/slim:^4.0", "slim/psr7:^1.0", "slim/http:^1.0"],
    };
    libs.iter().map(|s| s.to_string()).collect()
}

fn framework_core(framework: &str) -> &'static [&'static str] {
    match framework {
        "slim" => &["slim/slim", "slim/psr7", "slim/http"],
        "laravel" => &["laravel/framework"],
        "symfony" => &["symfony/framework-bundle"],
        _ => &[],
    }
}

fn package_name(requirement: &str) -> &str { requirement.split(':').next().unwrap_or(requirement) }

/// Keeps the first occurrence of each package, ignoring version constraints.
fn dedup_packages(libs: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    libs.into_iter()
        .filter(|l| !l.trim().is_empty())
        .filter(|l| seen.insert(package_name(l).to_lowercase()))
        .collect()
}

/// Packages named by `composer require ...` lines.
fn packages_from_commands(commands: &[String]) -> Vec<String> {
    commands
        .iter()
        .filter_map(|c| c.trim().strip_prefix("composer require"))
        .flat_map(|rest| rest.split_whitespace().filter(|p| !p.starts_with('-')).map(|p| p.to_string()))
        .collect()
}

impl ProjectAnalysis {
    /// Merge what the model returned over the default skeleton, then add the
    /// framework core packages and the API extras.
    fn from_model(raw: RawAnalysis) -> Self {
        let framework = non_empty(raw.framework).map(|f| f.to_lowercase()).unwrap_or_else(|| DEFAULT_FRAMEWORK.to_string());
        let project_type = non_empty(raw.project_type).map(|t| t.to_lowercase()).unwrap_or_else(|| "api".to_string());
        let composer_commands = raw.composer_commands.unwrap_or_default();

        let mut libraries: Vec<String> = framework_core(&framework).iter().map(|s| s.to_string()).collect();
        libraries.extend(raw.libraries.unwrap_or_default());
        libraries.extend(packages_from_commands(&composer_commands));
        if project_type == "api" {
            libraries.extend(API_EXTRAS.iter().map(|s| s.to_string()));
        }

        Self {
            project_name: sanitize_project_name(&non_empty(raw.project_name).unwrap_or_else(|| DEFAULT_PROJECT_NAME.to_string())),
            framework,
            project_type,
            description: non_empty(raw.description).unwrap_or_else(|| "PHP project generated automatically".to_string()),
            libraries: dedup_packages(libraries),
            composer_commands,
            folders: raw.folders.unwrap_or_else(|| DEFAULT_FOLDERS.iter().map(|s| s.to_string()).collect()),
            main_files: raw.main_files.unwrap_or_default(),
        }
    }

    /// Keyword-only detection used when the model cannot help.
    pub fn detect_basic(instruction: &str) -> Self {
        let text = instruction.to_lowercase();
        let tables: &[(&str, &[&str])] = &[
            ("slim", &["slim", "api", "rest", "microservice"]),
            ("laravel", &["laravel", "eloquent", "artisan", "blade"]),
            ("symfony", &["symfony", "doctrine", "twig"]),
            ("vanilla", &["vanilla", "simple", "basic", "basique"]),
        ];
        let framework = tables
            .iter()
            .find(|(_, keys)| keys.iter().any(|k| text.contains(k)))
            .map(|(f, _)| *f)
            .unwrap_or(DEFAULT_FRAMEWORK);
        let project_type = if text.contains("api") { "api" } else { "web" };

        let mut libraries = default_libraries(framework);
        if project_type == "api" {
            libraries.extend(API_EXTRAS.iter().map(|s| s.to_string()));
        }

        Self {
            project_name: format!("project-{}", chrono::Local::now().format("%Y%m%d-%H%M%S")),
            framework: framework.to_string(),
            project_type: project_type.to_string(),
            description: format!("Project detected from: {}", instruction.trim()),
            libraries: dedup_packages(libraries),
            composer_commands: vec![],
            folders: DEFAULT_FOLDERS.iter().map(|s| s.to_string()).collect(),
            main_files: BTreeMap::new(),
        }
    }
}

pub fn analysis_prompt(instruction: &str) -> String {
    format!(
        r#"You are a PHP expert. Analyze this project request and return ONLY valid JSON:

REQUEST: "{instruction}"

Return exactly this JSON shape (no text before or after):
{{
    "project_name": "project-name-in-kebab-case",
    "framework": "slim|laravel|symfony|vanilla|lumen|codeigniter",
    "project_type": "api|web|cli|package|microservice|bot",
    "description": "Short project description",
    "libraries": ["composer", "packages"],
    "composer_commands": ["composer require slim/slim", "composer require firebase/php-jwt"],
    "folders": ["public", "src/Controllers", "config"],
    "main_files": {{
        "public/index.php": "file content"
    }}
}}

Pick the best PHP technologies for the request."#
    )
}

/// Turns a free-text project request into a `ProjectAnalysis`.
pub struct ProjectPlanner<'a> {
    gateway: &'a Gateway,
}

impl<'a> ProjectPlanner<'a> {
    pub fn new(gateway: &'a Gateway) -> Self { Self { gateway } }

    async fn plan_with_model(&self, instruction: &str) -> Result<ProjectAnalysis> {
        let answer = self.gateway.ask(&analysis_prompt(instruction)).await?;
        let json = extract_json(&answer)?;
        let raw: RawAnalysis = serde_json::from_str(&json).context("failed to parse project analysis JSON")?;
        Ok(ProjectAnalysis::from_model(raw))
    }

    /// Never fails; falls back to keyword detection.
    pub async fn plan(&self, instruction: &str) -> ProjectAnalysis {
        match self.plan_with_model(instruction).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(error = %e, "project analysis by model failed, using keyword detection");
                ProjectAnalysis::detect_basic(instruction)
            }
        }
    }
}
