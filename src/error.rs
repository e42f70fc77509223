use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    TransientStore(String),

    /// The store cannot serve a filter + order query in its current
    /// configuration, usually because a composite index is missing.
    #[error("Unsupported query shape: index {index} is not provisioned")]
    UnsupportedQueryShape { index: String },

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-friendly label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::TransientStore(_) => "transient_store",
            AppError::UnsupportedQueryShape { .. } => "unsupported_query_shape",
            AppError::Permission(_) => "permission",
            AppError::Unauthorized => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::TransientStore(_) | AppError::UnsupportedQueryShape { .. }
        )
    }

    /// Text that is safe to show to an end user. Store internals are never
    /// echoed back.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::TransientStore(_) | AppError::UnsupportedQueryShape { .. } => {
                "The announcement service is temporarily unavailable, please try again".to_string()
            }
            AppError::Permission(_) => "You do not have permission to do that".to_string(),
            AppError::Unauthorized => "Unauthorized".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TransientStore(_) | AppError::UnsupportedQueryShape { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Permission(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self {
            AppError::TransientStore(ref msg) => {
                tracing::error!(kind = self.kind(), "Store error: {}", msg);
            }
            AppError::UnsupportedQueryShape { ref index } => {
                tracing::error!(kind = self.kind(), index = %index, "Query shape not supported");
            }
            AppError::Internal(ref msg) => {
                tracing::error!(kind = self.kind(), "Internal error: {}", msg);
            }
            AppError::Permission(ref msg) => {
                tracing::warn!(kind = self.kind(), "Permission denied: {}", msg);
            }
            _ => {}
        }

        let body = Json(json!({
            "error": self.user_message(),
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::TransientStore(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let detail = errs
                    .iter()
                    .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .next()
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, detail)
            })
            .collect();
        fields.sort();
        AppError::Validation(fields.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_are_not_echoed() {
        let err = AppError::TransientStore("disk I/O error at page 42".to_string());
        assert!(err.is_transient());
        assert!(!err.user_message().contains("page 42"));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Permission("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unsupported_query_shape_is_transient() {
        let err = AppError::UnsupportedQueryShape { index: "idx".to_string() };
        assert!(err.is_transient());
        assert_eq!(err.kind(), "unsupported_query_shape");
    }
}
