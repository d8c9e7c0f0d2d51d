use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidValue,
    ValidationInvalidArgument,

    ContextCacheUnreadable,

    ProcessSpawnFailed,
    ProcessStreamFailed,
    ProcessExitedNonzero,

    SignCommandFailed,
    ArtifactIoError,

    PipelineSkipped,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidValue => "config.invalid_value",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::ContextCacheUnreadable => "context.cache_unreadable",

            ErrorCode::ProcessSpawnFailed => "process.spawn_failed",
            ErrorCode::ProcessStreamFailed => "process.stream_failed",
            ErrorCode::ProcessExitedNonzero => "process.exited_nonzero",

            ErrorCode::SignCommandFailed => "sign.command_failed",
            ErrorCode::ArtifactIoError => "artifact.io_error",

            ErrorCode::PipelineSkipped => "pipeline.skipped",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandDetails {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathErrorDetails {
    pub path: String,
    pub error: String,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn config_invalid_value(key: impl Into<String>, problem: impl Into<String>) -> Self {
        let key: String = key.into();
        let problem: String = problem.into();
        let details = serde_json::json!({
            "key": key,
            "problem": problem,
        });
        Self::new(
            ErrorCode::ConfigInvalidValue,
            "Invalid configuration value",
            details,
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let field = field.into();
        let problem = problem.into();
        let details = serde_json::to_value(InvalidArgumentDetails {
            field,
            problem: problem.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::ValidationInvalidArgument, problem, details)
    }

    pub fn context_cache_unreadable(path: impl Into<String>, error: impl Into<String>) -> Self {
        let details = serde_json::to_value(PathErrorDetails {
            path: path.into(),
            error: error.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ContextCacheUnreadable,
            "Context cache is unreadable",
            details,
        )
    }

    pub fn process_spawn_failed(command: impl Into<String>, error: impl Into<String>) -> Self {
        let command = command.into();
        let details = serde_json::to_value(CommandDetails {
            command: command.clone(),
            exit_code: None,
            error: Some(error.into()),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ProcessSpawnFailed,
            format!("Failed to start '{}'", command),
            details,
        )
    }

    pub fn process_stream_failed(command: impl Into<String>, error: impl Into<String>) -> Self {
        let command = command.into();
        let error = error.into();
        let details = serde_json::to_value(CommandDetails {
            command: command.clone(),
            exit_code: None,
            error: Some(error.clone()),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ProcessStreamFailed,
            format!("Collect output of '{}': {}", command, error),
            details,
        )
    }

    pub fn process_exited_nonzero(command: impl Into<String>, exit_code: Option<i32>) -> Self {
        let command = command.into();
        let details = serde_json::to_value(CommandDetails {
            command: command.clone(),
            exit_code,
            error: None,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        let message = match exit_code {
            Some(code) => format!("'{}' exited with code {}", command, code),
            None => format!("'{}' was terminated by a signal", command),
        };
        Self::new(ErrorCode::ProcessExitedNonzero, message, details)
    }

    pub fn sign_command_failed(command: impl Into<String>, error: impl Into<String>) -> Self {
        let command = command.into();
        let error = error.into();
        let details = serde_json::to_value(CommandDetails {
            command: command.clone(),
            exit_code: None,
            error: Some(error.clone()),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::SignCommandFailed,
            format!("cosign: {}", error),
            details,
        )
    }

    pub fn artifact_io(path: impl Into<String>, error: impl Into<String>) -> Self {
        let details = serde_json::to_value(PathErrorDetails {
            path: path.into(),
            error: error.into(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(ErrorCode::ArtifactIoError, "Artifact store error", details)
    }

    /// Construct the skip signal. Not a failure: the step executor treats
    /// this code as a successful early termination of the whole pipeline.
    pub fn pipeline_skipped(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PipelineSkipped,
            reason,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let error: String = error.into();
        let details = serde_json::json!({
            "error": error,
            "context": context,
        });
        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let error: String = error.into();
        let details = serde_json::json!({
            "error": error,
            "context": context,
        });
        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        let error: String = error.into();
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Prefix the message with surrounding context (e.g. the failing unit of
    /// work), keeping code and details intact.
    pub fn wrap(mut self, context: &str) -> Self {
        self.message = format!("{}: {}", context, self.message);
        self
    }

    /// Label this error with the identity of the step it occurred in.
    pub fn in_step(mut self, step: &str) -> Self {
        self.message = format!("{}: {}", step, self.message);
        if let Value::Object(map) = &mut self.details {
            map.insert("step".to_string(), Value::String(step.to_string()));
        }
        self
    }
}
