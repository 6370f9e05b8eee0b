//! File templates written into freshly created projects.

use crate::project::ProjectAnalysis;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TemplateFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub files: Vec<TemplateFile>,
}

impl Template {
    pub fn new(name: &str) -> Self {
        Template { name: name.to_string(), files: Vec::new() }
    }

    pub fn add_file(mut self, path: &str, content: &str) -> Self {
        self.files.push(TemplateFile { path: path.to_string(), content: content.to_string() });
        self
    }

    /// Render every file into `output_dir`; returns paths relative to it.
    pub async fn generate(&self, output_dir: &Path, vars: &HashMap<String, String>) -> Result<Vec<String>> {
        let mut created = Vec::new();
        for file in &self.files {
            let rel = render(&file.path, vars);
            let target = output_dir.join(&rel);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating parent directory: {}", parent.display()))?;
            }
            tokio::fs::write(&target, render(&file.content, vars))
                .await
                .with_context(|| format!("writing file: {}", target.display()))?;
            created.push(rel);
        }
        tracing::debug!(template = %self.name, files = created.len(), "template rendered");
        Ok(created)
    }
}

/// Single pass over `template`; substituted values are never re-expanded.
pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| vars.get(&after[..end]).map(|v| (v, end)));
        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn variables(analysis: &ProjectAnalysis) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("project_name".to_string(), analysis.project_name.clone());
    vars.insert("title".to_string(), capitalize(&analysis.project_name));
    // Lands inside double-quoted PHP strings.
    let description: String = analysis.description.chars().filter(|c| !matches!(c, '\\' | '$')).collect();
    vars.insert("description".to_string(), description.replace('"', "'"));
    vars.insert("framework".to_string(), capitalize(&analysis.framework));
    vars.insert("project_type".to_string(), capitalize(&analysis.project_type));
    vars.insert(
        "libraries".to_string(),
        analysis.libraries.iter().map(|l| format!("- {}", l)).collect::<Vec<_>>().join("\n"),
    );
    vars
}

/// Entry files for the framework, then the common `.gitignore`/`README.md`.
pub fn project_template(framework: &str) -> Template {
    let template = match framework {
        "slim" => Template::new("slim").add_file("public/index.php", SLIM_INDEX),
        "laravel" => Template::new("laravel")
            .add_file("routes/web.php", LARAVEL_ROUTES)
            .add_file("public/index.php", LARAVEL_INDEX),
        "symfony" => Template::new("symfony")
            .add_file("src/Controller/HomeController.php", SYMFONY_CONTROLLER)
            .add_file("public/index.php", SYMFONY_INDEX),
        other => Template::new(other).add_file("public/index.php", VANILLA_INDEX),
    };
    template.add_file(".gitignore", GITIGNORE).add_file("README.md", README)
}

pub async fn write_project_files(project_dir: &Path, analysis: &ProjectAnalysis) -> Result<Vec<String>> {
    project_template(&analysis.framework).generate(project_dir, &variables(analysis)).await
}

/// Paths that the generated templates own for this framework.
pub fn generated_paths(framework: &str) -> Vec<PathBuf> {
    project_template(framework).files.iter().map(|f| PathBuf::from(&f.path)).collect()
}

const SLIM_INDEX: &str = r#"<?php
use Psr\Http\Message\ResponseInterface as Response;
use Psr\Http\Message\ServerRequestInterface as Request;
use Slim\Factory\AppFactory;

require __DIR__ . "/../vendor/autoload.php";

$app = AppFactory::create();

$app->addBodyParsingMiddleware();
$app->addErrorMiddleware(true, true, true);

$app->get("/", function (Request $request, Response $response) {
    $data = [
        "message" => "{{description}}",
        "framework" => "Slim 4",
        "timestamp" => date("c")
    ];

    $response->getBody()->write(json_encode($data, JSON_PRETTY_PRINT));
    return $response->withHeader("Content-Type", "application/json");
});

$app->get("/api/health", function (Request $request, Response $response) {
    $response->getBody()->write(json_encode(["status" => "OK"]));
    return $response->withHeader("Content-Type", "application/json");
});

$app->run();
"#;

const LARAVEL_ROUTES: &str = r#"<?php

use Illuminate\Support\Facades\Route;

Route::get('/', function () {
    return response()->json([
        'message' => "{{description}}",
        'framework' => 'Laravel',
    ]);
});
"#;

const LARAVEL_INDEX: &str = r#"<?php

use Illuminate\Http\Request;

define('LARAVEL_START', microtime(true));

require __DIR__ . '/../vendor/autoload.php';

$app = require_once __DIR__ . '/../bootstrap/app.php';

$app->handleRequest(Request::capture());
"#;

const SYMFONY_CONTROLLER: &str = r#"<?php

namespace App\Controller;

use Symfony\Bundle\FrameworkBundle\Controller\AbstractController;
use Symfony\Component\HttpFoundation\JsonResponse;
use Symfony\Component\Routing\Attribute\Route;

class HomeController extends AbstractController
{
    #[Route('/', name: 'home')]
    public function index(): JsonResponse
    {
        return $this->json([
            'message' => "{{description}}",
            'framework' => 'Symfony',
        ]);
    }
}
"#;

const SYMFONY_INDEX: &str = r#"<?php

use App\Kernel;

require_once dirname(__DIR__) . '/vendor/autoload_runtime.php';

return function (array $context) {
    return new Kernel($context['APP_ENV'] ?? 'dev', (bool) ($context['APP_DEBUG'] ?? true));
};
"#;

const VANILLA_INDEX: &str = r#"<?php

require __DIR__ . '/../vendor/autoload.php';

header('Content-Type: application/json');

$path = parse_url($_SERVER['REQUEST_URI'] ?? '/', PHP_URL_PATH);

if ($path === '/api/health') {
    echo json_encode(['status' => 'OK']);
    return;
}

echo json_encode([
    'message' => "{{description}}",
    'timestamp' => date('c'),
], JSON_PRETTY_PRINT);
"#;

const GITIGNORE: &str = "vendor/
.env
*.log
.DS_Store
Thumbs.db
composer.lock
";

const README: &str = "# {{title}}

{{description}}

## Installation

```bash
composer install
```

## Running

```bash
php -S localhost:8000 -t public
```

## Built with

- Framework: {{framework}}
- Type: {{project_type}}

## Libraries

{{libraries}}
";
