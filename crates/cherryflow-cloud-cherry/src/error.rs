//! Cherry Servers provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CherryError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] cherryflow_cloud::CloudError),
}

impl From<CherryError> for cherryflow_cloud::CloudError {
    fn from(err: CherryError) -> Self {
        match err {
            CherryError::CloudError(inner) => inner,
            CherryError::JsonError(inner) => cherryflow_cloud::CloudError::Json(inner),
            CherryError::UnknownResourceType(name) => {
                cherryflow_cloud::CloudError::Validation(format!("unknown resource type: {name}"))
            }
            other => cherryflow_cloud::CloudError::InvalidConfig(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CherryError>;
