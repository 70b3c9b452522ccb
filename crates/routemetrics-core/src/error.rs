//! Shared error type across routemetrics crates.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, RouteMetricsError>;

/// Unified error type used by core and gateway.
#[derive(Debug, Error)]
pub enum RouteMetricsError {
    #[error("malformed route template `{template}`: {reason}")]
    MalformedTemplate { template: String, reason: String },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("io: {0}")]
    Io(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl RouteMetricsError {
    pub(crate) fn malformed(template: &str, reason: impl Into<String>) -> Self {
        RouteMetricsError::MalformedTemplate {
            template: template.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable short name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteMetricsError::MalformedTemplate { .. } => "MALFORMED_TEMPLATE",
            RouteMetricsError::InvalidConfig(_) => "INVALID_CONFIG",
            RouteMetricsError::Io(_) => "IO",
            RouteMetricsError::Internal(_) => "INTERNAL",
        }
    }
}
