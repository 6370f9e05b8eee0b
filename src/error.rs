use std::path::PathBuf;

/// Failure kinds callers branch on. Everything else travels as `anyhow::Error`.
#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("backend not reachable: {0}")]
    Connectivity(String),
    #[error("model '{model}' is not installed on the backend")]
    ModelUnavailable { model: String },
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
    #[error("filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("command failed ({code}): {command}")]
    Subprocess {
        command: String,
        code: i32,
        output: String,
    },
}

impl AssistError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AssistError::Filesystem { path: path.into(), source }
    }

    /// Remediation hint shown under the error line.
    pub fn hint(&self) -> Option<String> {
        match self {
            AssistError::Connectivity(_) => {
                Some("check that the Ollama server is running and reachable (try `test-ollama`)".to_string())
            }
            AssistError::ModelUnavailable { model } => Some(format!("install it with: ollama pull {}", model)),
            AssistError::Generation(msg) if msg.contains("timed out") => {
                Some("the model took too long; raise `timeout` in the config or use --timeout".to_string())
            }
            AssistError::Filesystem { .. } => Some("check permissions of the project directory".to_string()),
            _ => None,
        }
    }
}

/// Hint for an arbitrary error chain, when one of its links is an `AssistError`.
pub fn hint_for(err: &anyhow::Error) -> Option<String> {
    err.chain()
        .find_map(|e| e.downcast_ref::<AssistError>())
        .and_then(AssistError::hint)
}
