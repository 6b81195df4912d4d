use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigFileNotFound,
    ConfigInvalidContent,
    ConfigInvalidFileType,
    ConfigInvalidSchema,
    ConfigDuplicateStepId,

    EngineNotLoaded,

    PlatformCommandFailed,
    PlatformDeployFailed,

    GitCommandFailed,

    ManifestInvalidXml,

    ValidationInvalidArgument,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigFileNotFound => "config.file_not_found",
            ErrorCode::ConfigInvalidContent => "config.invalid_content",
            ErrorCode::ConfigInvalidFileType => "config.invalid_file_type",
            ErrorCode::ConfigInvalidSchema => "config.invalid_schema",
            ErrorCode::ConfigDuplicateStepId => "config.duplicate_step_id",

            ErrorCode::EngineNotLoaded => "engine.not_loaded",

            ErrorCode::PlatformCommandFailed => "platform.command_failed",
            ErrorCode::PlatformDeployFailed => "platform.deploy_failed",

            ErrorCode::GitCommandFailed => "git.command_failed",

            ErrorCode::ManifestInvalidXml => "manifest.invalid_xml",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetails {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateStepIdDetails {
    pub id: String,
    pub first: usize,
    pub second: usize,
}

/// Structured payload of a failed platform command.
///
/// `name` is the collaborator's own taxonomy tag (e.g. `NoOrgFound`), which
/// is what ends up in a step's failure record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlatformErrorDetails {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn config_file_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        let message = format!("File '{}' is not exist.", path);
        Self::new(
            ErrorCode::ConfigFileNotFound,
            message,
            to_details(FileDetails {
                path,
                expected: None,
                error: None,
            }),
        )
    }

    pub fn config_invalid_content(
        path: impl Into<String>,
        content_type: impl Into<String>,
        error: Option<String>,
    ) -> Self {
        let path = path.into();
        let content_type = content_type.into();
        let message = format!("File '{}' must contain valid {} data.", path, content_type);
        Self::new(
            ErrorCode::ConfigInvalidContent,
            message,
            to_details(FileDetails {
                path,
                expected: Some(content_type),
                error,
            }),
        )
    }

    pub fn config_invalid_file_type(path: impl Into<String>, file_type: impl Into<String>) -> Self {
        let path = path.into();
        let file_type = file_type.into();
        let message = format!("File '{}' must a {} file.", path, file_type);
        Self::new(
            ErrorCode::ConfigInvalidFileType,
            message,
            to_details(FileDetails {
                path,
                expected: Some(file_type),
                error: None,
            }),
        )
        .with_hint("Use a .yml, .yaml or .json file")
    }

    pub fn config_invalid_schema(path: impl Into<String>, errors: impl Into<String>) -> Self {
        let path = path.into();
        let errors = errors.into();
        let message = format!("File '{}' has incorrect schema. Errors: {}", path, errors);
        Self::new(
            ErrorCode::ConfigInvalidSchema,
            message,
            to_details(FileDetails {
                path,
                expected: None,
                error: Some(errors),
            }),
        )
    }

    pub fn config_duplicate_step_id(id: impl Into<String>, first: usize, second: usize) -> Self {
        let id = id.into();
        let message = format!("Steps #{} and #{} has duplicated ID: '{}'", first, second, id);
        Self::new(
            ErrorCode::ConfigDuplicateStepId,
            message,
            to_details(DuplicateStepIdDetails { id, first, second }),
        )
    }

    pub fn engine_not_loaded() -> Self {
        Self::new(
            ErrorCode::EngineNotLoaded,
            "CI Settings are not loaded. load() must be called at the first.",
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn platform_command_failed(message: impl Into<String>, details: PlatformErrorDetails) -> Self {
        Self::new(
            ErrorCode::PlatformCommandFailed,
            message,
            to_details(details),
        )
    }

    /// Deploy failure carrying the deploy report summary when one is available.
    pub fn platform_deploy_failed(message: impl Into<String>, summary: Option<Value>) -> Self {
        Self::new(
            ErrorCode::PlatformDeployFailed,
            message,
            to_details(PlatformErrorDetails {
                name: "MetadataDeployError".to_string(),
                summary,
                ..Default::default()
            }),
        )
    }

    pub fn git_command_failed(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::GitCommandFailed,
            message,
            Value::Object(serde_json::Map::new()),
        )
    }

    pub fn manifest_invalid_xml(path: impl Into<String>, error: impl Into<String>) -> Self {
        let path = path.into();
        let message = format!("File '{}' must contain valid XML data.", path);
        Self::new(
            ErrorCode::ManifestInvalidXml,
            message,
            to_details(FileDetails {
                path,
                expected: Some("package.xml".to_string()),
                error: Some(error.into()),
            }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    /// Platform error details, when this error came from a collaborator.
    pub fn platform_details(&self) -> Option<PlatformErrorDetails> {
        match self.code {
            ErrorCode::PlatformCommandFailed | ErrorCode::PlatformDeployFailed => {
                serde_json::from_value(self.details.clone()).ok()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_step_id_names_both_positions() {
        let err = Error::config_duplicate_step_id("deploy", 1, 4);
        assert_eq!(err.code.as_str(), "config.duplicate_step_id");
        assert_eq!(err.message, "Steps #1 and #4 has duplicated ID: 'deploy'");
        assert_eq!(err.details["first"], 1);
        assert_eq!(err.details["second"], 4);
    }

    #[test]
    fn platform_details_round_trip_through_error() {
        let err = Error::platform_command_failed(
            "No org configuration found for name ci",
            PlatformErrorDetails {
                name: "NoOrgFound".to_string(),
                command: Some("force:org:display".to_string()),
                ..Default::default()
            },
        );

        let details = err.platform_details().unwrap();
        assert_eq!(details.name, "NoOrgFound");
        assert_eq!(details.command.as_deref(), Some("force:org:display"));
    }

    #[test]
    fn deploy_failure_carries_summary() {
        let err = Error::platform_deploy_failed(
            "Deployment error",
            Some(serde_json::json!({ "numberComponentErrors": 2 })),
        );
        let details = err.platform_details().unwrap();
        assert_eq!(details.name, "MetadataDeployError");
        assert_eq!(details.summary.unwrap()["numberComponentErrors"], 2);
    }

    #[test]
    fn non_platform_errors_have_no_platform_details() {
        assert!(Error::engine_not_loaded().platform_details().is_none());
    }
}
