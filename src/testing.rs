//! In-memory doubles for the backend and the OS shell.

use crate::gateway::{HttpReply, Transport};
use crate::shell::{CommandOutput, Shell};
use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Backend double. `tags == None` behaves like a refused connection.
pub struct ScriptedTransport {
    tags: Option<Vec<String>>,
    replies: Mutex<VecDeque<HttpReply>>,
    posts: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedTransport {
    pub fn offline() -> Self {
        Self { tags: None, replies: Mutex::new(VecDeque::new()), posts: Mutex::new(vec![]) }
    }

    pub fn online(models: &[&str]) -> Self {
        Self {
            tags: Some(models.iter().map(|m| m.to_string()).collect()),
            replies: Mutex::new(VecDeque::new()),
            posts: Mutex::new(vec![]),
        }
    }

    /// Queue a successful generation whose `response` is `text`.
    pub fn push_reply(&self, text: &str) {
        let body = serde_json::json!({ "response": text, "done": true }).to_string();
        self.push_raw(200, &body);
    }

    pub fn push_raw(&self, status: u16, body: &str) {
        self.replies.lock().unwrap().push_back(HttpReply { status, body: body.to_string() });
    }

    pub fn post_count(&self) -> usize { self.posts.lock().unwrap().len() }

    pub fn last_post_body(&self) -> Option<serde_json::Value> { self.posts.lock().unwrap().last().cloned() }

    pub fn prompts(&self) -> Vec<String> {
        self.posts
            .lock()
            .unwrap()
            .iter()
            .filter_map(|b| b["prompt"].as_str().map(|s| s.to_string()))
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpReply> {
        match &self.tags {
            None => Err(anyhow!("unable to connect to {}", url)),
            Some(names) => {
                let models: Vec<serde_json::Value> = names
                    .iter()
                    .map(|n| serde_json::json!({ "name": n, "size": 1_900_000_000u64, "modified_at": "2024-05-01T10:00:00Z" }))
                    .collect();
                Ok(HttpReply { status: 200, body: serde_json::json!({ "models": models }).to_string() })
            }
        }
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value, _timeout: Duration) -> Result<HttpReply> {
        if self.tags.is_none() {
            return Err(anyhow!("unable to connect to {}", url));
        }
        self.posts.lock().unwrap().push(body.clone());
        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or(HttpReply { status: 500, body: r#"{"error":"no scripted reply"}"#.to_string() }))
    }
}

/// Shell double that records invocations. Programs listed in `failing`
/// exit with status 1.
#[derive(Default)]
pub struct RecordingShell {
    calls: Mutex<Vec<String>>,
    failing: Vec<String>,
}

impl RecordingShell {
    pub fn new() -> Self { Self::default() }

    pub fn failing_on(needles: &[&str]) -> Self {
        Self { calls: Mutex::new(vec![]), failing: needles.iter().map(|s| s.to_string()).collect() }
    }

    pub fn calls(&self) -> Vec<String> { self.calls.lock().unwrap().clone() }
}

#[async_trait::async_trait]
impl Shell for RecordingShell {
    async fn run(&self, _cwd: &Path, program: &str, args: &[String]) -> Result<CommandOutput> {
        let line = crate::shell::display_command(program, args);
        let fails = self.failing.iter().any(|f| line.contains(f.as_str()));
        self.calls.lock().unwrap().push(line);
        Ok(CommandOutput {
            code: if fails { 1 } else { 0 },
            output: if fails { "Could not find package".to_string() } else { String::new() },
        })
    }

    async fn run_attached(&self, cwd: &Path, program: &str, args: &[String]) -> Result<i32> {
        Ok(self.run(cwd, program, args).await?.code)
    }
}
