//! Model-driven creation and editing of PHP files inside a project root.

use crate::context::ProjectContext;
use crate::error::AssistError;
use crate::extract::{extract_code, parse_tagged_file};
use crate::gateway::Gateway;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::{Component, Path, PathBuf};

const FORBIDDEN_DIRS: &[&str] = &["vendor", "node_modules", ".git", "storage"];
const MAX_SUGGESTIONS: usize = 3;

/// Join `rel` onto `root`, rejecting absolute paths and `..` segments.
pub fn resolve_in(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel_path = Path::new(rel.trim());
    if rel.trim().is_empty() {
        bail!("empty file path");
    }
    for component in rel_path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => bail!("path escapes the project: {}", rel),
        }
    }
    Ok(root.join(rel_path))
}

/// Existing, writable, and outside dependency/VCS/storage directories.
pub fn editable_path(root: &Path, rel: &str) -> Result<PathBuf> {
    let path = resolve_in(root, rel)?;
    let in_forbidden = Path::new(rel).components().any(|c| match c {
        Component::Normal(name) => name.to_str().map(|n| FORBIDDEN_DIRS.contains(&n)).unwrap_or(false),
        _ => false,
    });
    if in_forbidden {
        bail!("refusing to edit {}: protected directory", rel);
    }
    let meta = std::fs::metadata(&path).map_err(|e| AssistError::filesystem(&path, e))?;
    if !meta.is_file() {
        bail!("not a file: {}", rel);
    }
    if meta.permissions().readonly() {
        bail!("file is read-only: {}", rel);
    }
    Ok(path)
}

pub fn can_safely_edit(root: &Path, rel: &str) -> bool { editable_path(root, rel).is_ok() }

/// `namespace App\Http\Controllers; class UserController` becomes
/// `app/Http/Controllers/UserController.php`.
pub fn guess_path_from_code(code: &str) -> Option<String> {
    let ns_re = Regex::new(r"namespace\s+([^;]+);").ok()?;
    let class_re = Regex::new(r"class\s+(\w+)").ok()?;
    let namespace = ns_re.captures(code)?[1].trim().replace('\\', "/");
    let class = class_re.captures(code)?[1].to_string();
    let dir = match namespace.strip_prefix("App/") {
        Some(rest) => format!("app/{}", rest),
        None if namespace == "App" => "app".to_string(),
        None => namespace,
    };
    Some(format!("{}/{}.php", dir, class))
}

pub fn extract_suggestions(answer: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"(?im)\b(?:suggestion|recommendation|recommandation|tip|conseil)s?\s*:\s*(.+)$") else {
        return vec![];
    };
    re.captures_iter(answer)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect()
}

fn line_count(text: &str) -> usize { text.split('\n').count() }

/// `<path>.backup.<epoch>`, with a numeric suffix if that name is taken.
fn backup_path_for(path: &Path) -> PathBuf {
    let base = format!("{}.backup.{}", path.display(), chrono::Utc::now().timestamp());
    let mut candidate = PathBuf::from(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{}.{}", base, n));
        n += 1;
    }
    candidate
}

/// Copy the current content aside. Must succeed before any overwrite.
async fn backup(path: &Path, content: &str) -> Result<PathBuf> {
    let backup_path = backup_path_for(path);
    tokio::fs::write(&backup_path, content)
        .await
        .map_err(|e| AssistError::filesystem(&backup_path, e))?;
    tracing::info!(original = %path.display(), backup = %backup_path.display(), "backup written");
    Ok(backup_path)
}

async fn write_creating_dirs(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating directory: {}", parent.display()))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| AssistError::filesystem(path, e))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CreatedFile {
    pub file_path: String,
    pub backup_path: Option<PathBuf>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct FileChange {
    pub file_path: String,
    pub backup_path: PathBuf,
    pub lines_added: i64,
    pub total_lines: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectResult {
    Written(String),
    Answer(String),
}

pub struct FileGenerator<'a> {
    gateway: &'a Gateway,
    root: &'a Path,
}

impl<'a> FileGenerator<'a> {
    pub fn new(gateway: &'a Gateway, root: &'a Path) -> Self { Self { gateway, root } }

    /// Generate a class from `instruction` and place it by its namespace.
    pub async fn create_file(&self, instruction: &str) -> Result<CreatedFile> {
        let mut prompt = ProjectContext::gather(self.root).prompt_for(instruction);
        prompt.push_str("Return the complete file in a ```php block, with a namespace and a class.\n");
        let answer = self.gateway.ask(&prompt).await?;

        let code = extract_code(&answer, "php");
        if code.trim().is_empty() {
            return Err(AssistError::MalformedOutput("no code in model output".to_string()).into());
        }
        let rel = guess_path_from_code(&code)
            .ok_or_else(|| AssistError::MalformedOutput("could not determine file path from code".to_string()))?;
        let path = resolve_in(self.root, &rel)?;

        let backup_path = match tokio::fs::read_to_string(&path).await {
            Ok(existing) => Some(backup(&path, &existing).await?),
            Err(_) => None,
        };
        write_creating_dirs(&path, &code).await?;
        tracing::info!(file = %rel, "file created");

        Ok(CreatedFile { file_path: rel, backup_path, suggestions: extract_suggestions(&answer) })
    }

    /// Rewrite an existing file per `instruction`. The backup is written
    /// before the target is touched.
    pub async fn edit_file(&self, rel: &str, instruction: &str) -> Result<FileChange> {
        let path = editable_path(self.root, rel)?;
        let original = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| AssistError::filesystem(&path, e))?;

        let framework = ProjectContext::gather(self.root).framework;
        let prompt = edit_prompt(&framework, rel, &original, instruction);
        let answer = self.gateway.ask(&prompt).await?;
        let updated = extract_code(&answer, "php");
        if updated.trim().is_empty() {
            return Err(AssistError::MalformedOutput("model returned no code".to_string()).into());
        }

        let backup_path = backup(&path, &original).await?;
        write_creating_dirs(&path, &updated).await?;

        let total_lines = line_count(&updated);
        Ok(FileChange {
            file_path: rel.to_string(),
            backup_path,
            lines_added: total_lines as i64 - line_count(&original) as i64,
            total_lines,
        })
    }

    pub async fn analyze_file(&self, path: &Path, context: &ProjectContext) -> Result<String> {
        let code = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AssistError::filesystem(path, e))?;
        let mut prompt = context.prompt_for("Analyze this code and suggest concrete improvements.");
        prompt.push_str(&format!("CODE ({}):\n```php\n{}\n```\n", path.display(), code));
        Ok(self.gateway.ask(&prompt).await?)
    }

    /// Fallback when the class-based path cannot be used: ask for a tagged
    /// `FILE:`/`CONTENT:` answer and write it, or hand back the raw answer.
    pub async fn generate_directly(&self, instruction: &str) -> Result<DirectResult> {
        let answer = self.gateway.ask(&direct_prompt(instruction)).await?;
        let Some((rel, content)) = parse_tagged_file(&answer) else {
            return Ok(DirectResult::Answer(answer));
        };
        let path = match resolve_in(self.root, &rel) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "model proposed an unusable path");
                return Ok(DirectResult::Answer(answer));
            }
        };
        let content = if content.trim_start().starts_with("<?php") {
            content
        } else {
            format!("<?php\n\n{}", content)
        };
        if let Ok(existing) = tokio::fs::read_to_string(&path).await {
            backup(&path, &existing).await?;
        }
        write_creating_dirs(&path, &content).await?;
        Ok(DirectResult::Written(rel))
    }
}

fn edit_prompt(framework: &str, rel: &str, current: &str, instruction: &str) -> String {
    format!(
        "You are an expert PHP developer editing existing code.\n\n\
         PROJECT CONTEXT:\n\
         Framework: {framework}\n\
         File to modify: {rel}\n\n\
         CURRENT CODE:\n```php\n{current}\n```\n\n\
         INSTRUCTION: {instruction}\n\n\
         RULES:\n\
         - Change ONLY what is asked\n\
         - Keep working code intact\n\
         - Follow the existing code style\n\
         - Add the imports you need\n\
         - Return the complete modified file\n\n\
         MODIFIED CODE:\n"
    )
}

fn direct_prompt(instruction: &str) -> String {
    format!(
        "Generate PHP code for: {instruction}\n\n\
         Answer in exactly this format:\n\
         FILE: relative/path/to/File.php\n\
         CONTENT:\n```php\n<?php\n// code\n```\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendSettings;
    use crate::testing::ScriptedTransport;
    use std::fs;
    use std::sync::Arc;

    fn online(replies: &[&str]) -> Gateway {
        let transport = Arc::new(ScriptedTransport::online(&["qwen2.5-coder:3b"]));
        for r in replies {
            transport.push_reply(r);
        }
        Gateway::with_transport(BackendSettings::default(), transport)
    }

    fn backups_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains(".backup."))
            .collect()
    }

    #[tokio::test]
    async fn edit_writes_backup_then_extracted_code() {
        let dir = tempfile::tempdir().unwrap();
        let original = "<?php\nclass A {}\n";
        fs::write(dir.path().join("A.php"), original).unwrap();
        let gw = online(&["Here is the updated file:\n```php\n<?php\nclass A { public int $x = 1; }\n```\nDone."]);

        let change = FileGenerator::new(&gw, dir.path()).edit_file("A.php", "add a property").await.unwrap();

        assert_eq!(fs::read_to_string(&change.backup_path).unwrap(), original);
        assert_eq!(fs::read_to_string(dir.path().join("A.php")).unwrap(), "<?php\nclass A { public int $x = 1; }");
        assert_eq!(change.total_lines, 2);
        assert_eq!(change.lines_added, -1);
    }

    #[tokio::test]
    async fn failed_generation_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("A.php"), "<?php\n").unwrap();
        let gw = Gateway::with_transport(BackendSettings::default(), Arc::new(ScriptedTransport::offline()));
        assert!(FileGenerator::new(&gw, dir.path()).edit_file("A.php", "x").await.is_err());
        assert_eq!(fs::read_to_string(dir.path().join("A.php")).unwrap(), "<?php\n");
        assert!(backups_in(dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_backup_leaves_original_untouched() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::write(locked.join("A.php"), "<?php\nclass A {}\n").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        // Privileged users can still write into the directory.
        if fs::write(locked.join("write-check"), "").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }
        let gw = online(&["```php\n<?php\nclass A { public int $x = 1; }\n```"]);

        let result = FileGenerator::new(&gw, dir.path()).edit_file("locked/A.php", "add a property").await;

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(locked.join("A.php")).unwrap(), "<?php\nclass A {}\n");
        assert!(backups_in(&locked).is_empty());
    }

    #[test]
    fn protected_and_missing_files_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vendor/acme")).unwrap();
        fs::write(dir.path().join("vendor/acme/X.php"), "<?php").unwrap();
        fs::write(dir.path().join("ok.php"), "<?php").unwrap();
        assert!(!can_safely_edit(dir.path(), "vendor/acme/X.php"));
        assert!(!can_safely_edit(dir.path(), "missing.php"));
        assert!(!can_safely_edit(dir.path(), "../ok.php"));
        assert!(can_safely_edit(dir.path(), "ok.php"));
    }

    #[test]
    fn path_follows_namespace_and_class() {
        let code = "<?php\nnamespace App\\Http\\Controllers;\n\nclass UserController extends Controller {}";
        assert_eq!(guess_path_from_code(code).as_deref(), Some("app/Http/Controllers/UserController.php"));
        let code = "<?php\nnamespace Domain\\Billing;\nfinal class Invoice {}";
        assert_eq!(guess_path_from_code(code).as_deref(), Some("Domain/Billing/Invoice.php"));
        assert_eq!(guess_path_from_code("<?php\nclass Loose {}"), None);
    }

    #[test]
    fn at_most_three_suggestions() {
        let text = "Suggestion: add tests\nTip: use DI\nrecommendation: cache it\nSuggestion: fourth\n";
        assert_eq!(extract_suggestions(text), vec!["add tests", "use DI", "cache it"]);
    }

    #[tokio::test]
    async fn created_file_lands_at_namespace_path() {
        let dir = tempfile::tempdir().unwrap();
        let gw = online(&["```php\n<?php\nnamespace App\\Services;\n\nclass Mailer {}\n```\nSuggestion: inject the transport"]);
        let created = FileGenerator::new(&gw, dir.path()).create_file("a mailer service").await.unwrap();
        assert_eq!(created.file_path, "app/Services/Mailer.php");
        assert!(created.backup_path.is_none());
        assert!(fs::read_to_string(dir.path().join("app/Services/Mailer.php")).unwrap().contains("class Mailer"));
        assert_eq!(created.suggestions, vec!["inject the transport"]);
    }

    #[tokio::test]
    async fn direct_generation_writes_tagged_file_or_returns_answer() {
        let dir = tempfile::tempdir().unwrap();
        let gw = online(&[
            "FILE: src/hello.php\nCONTENT:\n```php\necho 'hi';\n```",
            "I cannot decide on a file, but here is how: ...",
        ]);
        let generator = FileGenerator::new(&gw, dir.path());
        assert_eq!(generator.generate_directly("hello").await.unwrap(), DirectResult::Written("src/hello.php".into()));
        assert_eq!(fs::read_to_string(dir.path().join("src/hello.php")).unwrap(), "<?php\n\necho 'hi';");
        assert!(matches!(generator.generate_directly("hello").await.unwrap(), DirectResult::Answer(_)));
    }
}
