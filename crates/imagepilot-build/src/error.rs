use crate::events::EngineError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Docker config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to parse Docker config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Credentials for registry {registry} not found in Docker config")]
    CredentialsNotFound { registry: String },

    #[error("Invalid auth format for {registry}: {message}")]
    CredentialFormat { registry: String, message: String },

    #[error("Docker credentials not provided or found for registry: {registry}")]
    CredentialsMissing { registry: String },

    #[error("Dockerfile not found at path: {0}")]
    DockerfileMissing(PathBuf),

    #[error("Failed to create build context archive: {0}")]
    ArchiveIo(#[source] std::io::Error),

    #[error("Failed to build image: {0}")]
    BuildFailed(#[source] EngineError),

    #[error("Failed to stream build response: {0}")]
    BuildStream(#[source] EngineError),

    #[error("Failed to push image: {0}")]
    PushFailed(#[source] EngineError),

    #[error("Failed to stream push response: {0}")]
    PushStream(#[source] EngineError),

    #[error("Failed to encode auth config: {0}")]
    Encode(String),

    #[error("Failed to render Dockerfile template: {0}")]
    Template(#[from] tera::Error),

    #[error("Failed to write Dockerfile {path}: {source}")]
    TemplateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid instruction '{0}': expected KEY=value")]
    InvalidInstruction(String),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::DockerfileMissing(path) => {
                format!(
                    "Dockerfile not found: {}\n\
                     \n\
                     Hint:\n\
                     1. Run imagepilot from the directory that should be the build context\n\
                     2. Or pass the directory explicitly: --context path/to/dir",
                    path.display()
                )
            }
            BuildError::CredentialsMissing { registry } => {
                format!(
                    "No credentials available for {}\n\
                     \n\
                     Hint:\n\
                     1. Run `docker login {}` to store credentials locally\n\
                     2. Or pass --username and --password",
                    registry, registry
                )
            }
            BuildError::BuildFailed(e) | BuildError::BuildStream(e) => {
                format!(
                    "Image build failed: {}\n\
                     \n\
                     Check that the Docker daemon is running and the Dockerfile is valid.",
                    e
                )
            }
            BuildError::PushFailed(e) | BuildError::PushStream(e) => {
                format!(
                    "Image push failed: {}\n\
                     \n\
                     Check the registry address and that your credentials can push to it.",
                    e
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
