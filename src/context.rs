//! What the assistant knows about the project in the working directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const IGNORED_DIRS: &[&str] = &["vendor", ".git", "node_modules"];

/// Framework from marker files.
pub fn detect_framework(root: &Path) -> Option<&'static str> {
    if root.join("artisan").exists() { return Some("Laravel"); }
    if root.join("bin").join("console").exists() { return Some("Symfony"); }
    if root.join("wp-config.php").exists() { return Some("WordPress"); }
    None
}

/// Framework from `composer.json` requirements.
pub fn composer_framework(root: &Path) -> Option<&'static str> {
    let text = std::fs::read_to_string(root.join("composer.json")).ok()?;
    let json: serde_json::Value = serde_json::from_str(&text).ok()?;
    let require = json.get("require")?.as_object()?;
    let mut found = None;
    for package in require.keys() {
        if package.starts_with("slim/") { found = Some("Slim"); }
        if package.starts_with("laravel/") { found = Some("Laravel"); }
        if package.starts_with("symfony/") { found = Some("Symfony"); }
    }
    found
}

pub fn framework_label(root: &Path) -> Option<&'static str> {
    detect_framework(root).or_else(|| composer_framework(root))
}

pub fn has_manifest(root: &Path) -> bool { root.join("composer.json").is_file() }

pub fn dir_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_ignored(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| IGNORED_DIRS.contains(&name))
        .unwrap_or(false)
}

/// PHP sources under `root`, skipping dependency and VCS directories, in a
/// stable (sorted) order. Stops after `limit` files when given.
pub async fn list_php_files(root: &Path, limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_php_files(root, &mut files, limit).await?;
    Ok(files)
}

fn collect_php_files<'a>(
    dir: &'a Path,
    files: &'a mut Vec<PathBuf>,
    limit: Option<usize>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(dir).await
            .with_context(|| format!("reading directory: {}", dir.display()))?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();

        for path in paths {
            if limit.is_some_and(|l| files.len() >= l) {
                break;
            }
            if path.is_dir() {
                if !is_ignored(&path) {
                    collect_php_files(&path, files, limit).await?;
                }
            } else if path.extension().and_then(|e| e.to_str()) == Some("php") {
                files.push(path);
            }
        }
        Ok(())
    })
}

fn php_stems(dir: &Path, skip: &[&str]) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else { return vec![] };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("php"))
        .filter(|p| !skip.contains(&p.file_name().and_then(|n| n.to_str()).unwrap_or_default()))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(|s| s.to_string()))
        .collect();
    names.sort();
    names
}

pub fn laravel_models(root: &Path) -> Vec<String> {
    php_stems(&root.join("app").join("Models"), &[])
}

pub fn laravel_controllers(root: &Path) -> Vec<String> {
    php_stems(&root.join("app").join("Http").join("Controllers"), &["Controller.php"])
}

pub fn structure_patterns(root: &Path) -> Vec<&'static str> {
    let app = root.join("app");
    let mut patterns = Vec::new();
    if app.join("Repositories").is_dir() { patterns.push("Repository Pattern"); }
    if app.join("Services").is_dir() { patterns.push("Service Layer"); }
    if app.join("Http").join("Resources").is_dir() { patterns.push("API Resources"); }
    patterns
}

/// Snapshot of the project used to ground prompts.
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub framework: String,
    pub models: Vec<String>,
    pub controllers: Vec<String>,
    pub patterns: Vec<&'static str>,
}

impl ProjectContext {
    pub fn gather(root: &Path) -> Self {
        Self {
            framework: framework_label(root).unwrap_or("PHP Vanilla").to_string(),
            models: laravel_models(root),
            controllers: laravel_controllers(root),
            patterns: structure_patterns(root),
        }
    }

    /// Prompt preamble for code generation and analysis.
    pub fn prompt_for(&self, instruction: &str) -> String {
        let none = |v: &[String]| if v.is_empty() { "none".to_string() } else { v.join(", ") };
        let patterns = if self.patterns.is_empty() { "none".to_string() } else { self.patterns.join(", ") };
        format!(
            "You are an expert PHP developer specialised in {fw}.\n\n\
             PROJECT CONTEXT:\n\
             - Framework: {fw}\n\
             - Structure: {patterns}\n\
             - Available models: {models}\n\
             - Controllers: {n} found\n\n\
             INSTRUCTION: {instruction}\n\n\
             RULES:\n\
             - Follow {fw} conventions\n\
             - Use modern PHP 8+ practices\n\
             - Include every required import\n\
             - Clean, commented code\n\n",
            fw = self.framework,
            models = none(&self.models),
            n = self.controllers.len(),
        )
    }
}

/// Prompt for a free-form question, with lightweight project context.
pub fn question_prompt(question: &str, framework: Option<&str>, dir: &str) -> String {
    let mut prompt = String::from("You are a concise, expert PHP assistant.\n\n");
    if let Some(fw) = framework {
        prompt.push_str(&format!("CONTEXT: {} project\n", fw));
    }
    prompt.push_str(&format!("DIRECTORY: {}\n", dir));
    prompt.push_str("\nRule: answer concisely and practically. Give code examples when relevant.\n");
    prompt.push_str(&format!("Question: {}\n\nAnswer:", question));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn marker_files_win_over_composer() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(framework_label(dir.path()), None);
        fs::write(dir.path().join("composer.json"), r#"{"require":{"php":">=8.1","slim/slim":"^4.0"}}"#).unwrap();
        assert_eq!(framework_label(dir.path()), Some("Slim"));
        fs::write(dir.path().join("artisan"), "#!/usr/bin/env php").unwrap();
        assert_eq!(framework_label(dir.path()), Some("Laravel"));
    }

    #[tokio::test]
    async fn php_listing_skips_vendor_and_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/Http")).unwrap();
        fs::create_dir_all(root.join("vendor/acme")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("src/A.php"), "<?php").unwrap();
        fs::write(root.join("src/Http/B.php"), "<?php").unwrap();
        fs::write(root.join("src/readme.md"), "# hi").unwrap();
        fs::write(root.join("vendor/acme/C.php"), "<?php").unwrap();
        fs::write(root.join(".git/D.php"), "<?php").unwrap();

        let all = list_php_files(root, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|p| !p.to_string_lossy().contains("vendor")));

        let one = list_php_files(root, Some(1)).await.unwrap();
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn laravel_layout_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("app/Models")).unwrap();
        fs::create_dir_all(root.join("app/Http/Controllers")).unwrap();
        fs::create_dir_all(root.join("app/Services")).unwrap();
        fs::write(root.join("app/Models/User.php"), "").unwrap();
        fs::write(root.join("app/Http/Controllers/Controller.php"), "").unwrap();
        fs::write(root.join("app/Http/Controllers/UserController.php"), "").unwrap();
        let ctx = ProjectContext::gather(root);
        assert_eq!(ctx.models, vec!["User"]);
        assert_eq!(ctx.controllers, vec!["UserController"]);
        assert_eq!(ctx.patterns, vec!["Service Layer"]);
        assert!(ctx.prompt_for("add a scope").contains("INSTRUCTION: add a scope"));
    }

    #[test]
    fn question_prompt_mentions_context() {
        let p = question_prompt("What is PSR-7?", Some("Slim"), "shop");
        assert!(p.contains("CONTEXT: Slim project"));
        assert!(p.contains("DIRECTORY: shop"));
        assert!(p.ends_with("Question: What is PSR-7?\n\nAnswer:"));
    }
}
