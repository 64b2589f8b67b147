use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExtensionError>;

#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("you must run init() before using reportable errors")]
    NotConfigured,

    #[error("Not a reportable exception: {error}")]
    NotReportable { error: String },

    #[error("Invalid setting {key}: {message}")]
    InvalidSetting { key: String, message: String },

    #[error("Failed to render template '{template}': {source}")]
    Render {
        template: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ExtensionError {
    pub fn invalid_setting(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSetting {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Fallback used when the reportable path itself fails.
///
/// The body never carries the failure details; those go to the log.
impl axum::response::IntoResponse for ExtensionError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("Reportable error handling failed: {}", self);
        (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error",
        )
            .into_response()
    }
}
