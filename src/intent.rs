//! Two-tier intent classification: the model first, keyword tables when the
//! model is unavailable or answers in the wrong shape.

use crate::extract::extract_json;
use crate::gateway::Gateway;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CreateProject,
    AddFeature,
    GenerateCode,
    AskQuestion,
    ModifyFile,
    AnalyzeCode,
    RunCommand,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::CreateProject,
        Action::AddFeature,
        Action::GenerateCode,
        Action::AskQuestion,
        Action::ModifyFile,
        Action::AnalyzeCode,
        Action::RunCommand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateProject => "create_project",
            Action::AddFeature => "add_feature",
            Action::GenerateCode => "generate_code",
            Action::AskQuestion => "ask_question",
            Action::ModifyFile => "modify_file",
            Action::AnalyzeCode => "analyze_code",
            Action::RunCommand => "run_command",
        }
    }

    pub fn parse(s: &str) -> Option<Action> {
        let s = s.trim();
        Action::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    List(Vec<String>),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            ParamValue::List(_) => None,
        }
    }
}

fn scalar_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Lenient conversion of a model-supplied parameter object.
fn params_from_json(map: &serde_json::Map<String, serde_json::Value>) -> BTreeMap<String, ParamValue> {
    let mut out = BTreeMap::new();
    for (k, v) in map {
        let value = match v {
            serde_json::Value::Array(items) => Some(ParamValue::List(items.iter().filter_map(scalar_to_string).collect())),
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
            other => scalar_to_string(other).map(ParamValue::Text),
        };
        if let Some(value) = value {
            out.insert(k.clone(), value);
        }
    }
    out
}

/// A classified request. Built once per user turn and never changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intent {
    pub action: Action,
    pub confidence: f32,
    pub reasoning: String,
    pub parameters: BTreeMap<String, ParamValue>,
}

impl Intent {
    fn keyword(action: Action, confidence: f32, reasoning: &str, params: &[(&str, &str)]) -> Self {
        Self {
            action,
            confidence,
            reasoning: reasoning.to_string(),
            parameters: params
                .iter()
                .map(|(k, v)| (k.to_string(), ParamValue::Text(v.to_string())))
                .collect(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(ParamValue::as_text).filter(|s| !s.trim().is_empty())
    }

    /// Parse the model's JSON. Missing or unknown `action` is an error.
    pub fn from_model_json(json: &str) -> Result<Intent> {
        let value: serde_json::Value = serde_json::from_str(json).context("failed to parse intent JSON")?;
        let obj = value.as_object().ok_or_else(|| anyhow!("intent JSON is not an object"))?;
        let action_raw = obj
            .get("action")
            .and_then(|a| a.as_str())
            .ok_or_else(|| anyhow!("intent JSON has no action"))?;
        let action = Action::parse(action_raw).ok_or_else(|| anyhow!("unknown action '{}'", action_raw))?;
        let confidence = obj
            .get("confidence")
            .and_then(|c| c.as_f64())
            .map(|c| c.clamp(0.0, 1.0) as f32)
            .unwrap_or(0.5);
        let reasoning = obj.get("reasoning").and_then(|r| r.as_str()).unwrap_or_default().to_string();
        let parameters = obj
            .get("parameters")
            .and_then(|p| p.as_object())
            .map(params_from_json)
            .unwrap_or_default();
        Ok(Intent { action, confidence, reasoning, parameters })
    }
}

#[async_trait::async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, input: &str) -> Result<Intent>;
}

pub fn intent_prompt(input: &str) -> String {
    let actions = Action::ALL.iter().map(|a| a.as_str()).collect::<Vec<_>>().join("|");
    format!(
        r#"You are an assistant for PHP developers. Decide which ACTION fulfils this request.

REQUEST: "{input}"

Return ONLY this JSON (no text before or after):
{{
    "action": "{actions}",
    "confidence": 0.9,
    "reasoning": "why this action",
    "parameters": {{
        "project_type": "api|web|cli|package|bot",
        "framework": "slim|laravel|symfony|vanilla",
        "libraries": ["composer packages"],
        "file_path": "path/to/file.php",
        "component": "UserController|middleware|service",
        "question_type": "how_to|explanation|best_practice|troubleshooting"
    }}
}}

EXAMPLES:
- "create a Slim API" -> create_project
- "add JWT" -> add_feature
- "generate a UserController" -> generate_code
- "how do I do X" -> ask_question
- "change this file" -> modify_file
- "analyze my code" -> analyze_code
- "start the server" -> run_command"#
    )
}

/// Tier 1: asks the model for a structured intent.
pub struct ModelClassifier<'a> {
    gateway: &'a Gateway,
}

impl<'a> ModelClassifier<'a> {
    pub fn new(gateway: &'a Gateway) -> Self { Self { gateway } }
}

#[async_trait::async_trait]
impl<'a> Classifier for ModelClassifier<'a> {
    async fn classify(&self, input: &str) -> Result<Intent> {
        let answer = self.gateway.ask(&intent_prompt(input)).await?;
        let json = extract_json(&answer)?;
        Intent::from_model_json(&json)
    }
}

const CREATE_KEYWORDS: &[&str] = &[
    "create", "créer", "build", "make", "faire", "new", "nouveau", "project", "projet", "api", "application", "site",
];
const ADD_KEYWORDS: &[&str] = &["add", "ajouter", "install", "installer", "integrate", "intégrer", "mettre"];
const GENERATE_KEYWORDS: &[&str] = &["generate", "générer", "controller", "middleware", "service", "model"];
const QUESTION_KEYWORDS: &[&str] = &[
    "how", "comment", "why", "pourquoi", "what", "qu'est-ce", "which", "quelle", "quel", "explain", "expliquer",
];

/// Tier 2: deterministic keyword tables, checked in priority order.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn detect(&self, input: &str) -> Intent {
        let text = input.to_lowercase();
        let hit = |table: &[&str]| table.iter().any(|k| text.contains(k));

        if hit(CREATE_KEYWORDS) {
            return Intent::keyword(
                Action::CreateProject,
                0.7,
                "creation keywords detected",
                &[("project_type", "api"), ("framework", "slim")],
            );
        }
        if hit(ADD_KEYWORDS) {
            return Intent::keyword(Action::AddFeature, 0.7, "addition keywords detected", &[]);
        }
        if hit(GENERATE_KEYWORDS) {
            return Intent::keyword(Action::GenerateCode, 0.7, "generation keywords detected", &[]);
        }
        if hit(QUESTION_KEYWORDS) {
            return Intent::keyword(Action::AskQuestion, 0.8, "question detected", &[("question_type", "how_to")]);
        }
        Intent::keyword(
            Action::AskQuestion,
            0.5,
            "intent unclear, treated as a question",
            &[("question_type", "general")],
        )
    }
}

#[async_trait::async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, input: &str) -> Result<Intent> { Ok(self.detect(input)) }
}

/// Tries `primary`; any failure falls through to the keyword tables.
pub struct ResilientClassifier<P> {
    primary: P,
    fallback: KeywordClassifier,
}

impl<P: Classifier> ResilientClassifier<P> {
    pub fn new(primary: P) -> Self { Self { primary, fallback: KeywordClassifier } }

    pub async fn classify(&self, input: &str) -> Intent {
        match self.primary.classify(input).await {
            Ok(intent) => {
                tracing::debug!(action = %intent.action, confidence = intent.confidence, "model classification");
                intent
            }
            Err(e) => {
                tracing::warn!(error = %e, "model classification failed, using keyword fallback");
                self.fallback.detect(input)
            }
        }
    }
}
