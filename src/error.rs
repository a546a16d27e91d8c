use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::validation::FieldErrors;

/// Every failure a handler can surface, mapped onto an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation fails")]
    Validation(FieldErrors),
    /// Unknown email, already-active user and wrong token all collapse here.
    #[error("User e-mail or token doesn't exist.")]
    InvalidCredentials,
    #[error("Invalid e-mail or password.")]
    InvalidLogin,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("e-mail delivery failed: {0}")]
    MailDelivery(String),
    #[error("JWT_SECRET is not configured")]
    MissingSecret,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InvalidCredentials
            | Self::InvalidLogin
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MailDelivery(_) | Self::MissingSecret | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => json!({
                "message": self.to_string(),
                "errors": errors,
            }),
            Self::InvalidCredentials | Self::InvalidLogin => json!({ "error": self.to_string() }),
            Self::MailDelivery(reason) => {
                tracing::error!(error = %reason, "e-mail send error");
                json!({ "message": "Internal server error" })
            }
            Self::MissingSecret => {
                tracing::error!("JWT_SECRET is not configured; refusing to issue token");
                json!({ "message": "Internal server error" })
            }
            Self::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                json!({ "message": "Internal server error" })
            }
            _ => json!({ "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

/// Malformed JSON or a wrong content type is a plain 400; a well-formed body
/// of the wrong shape goes through the validation payload.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => {
                let mut errors = FieldErrors::default();
                errors.push("body", e.body_text());
                Self::Validation(errors)
            }
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(error: AppError) -> (StatusCode, serde_json::Value) {
        let resp = error.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_lists_fields() {
        let mut errors = FieldErrors::default();
        errors.push("name", "name is a required field");
        let (status, json) = body_of(AppError::Validation(errors)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Validation fails");
        assert_eq!(json["errors"]["name"][0], "name is a required field");
    }

    #[tokio::test]
    async fn invalid_credentials_uses_error_key() {
        let (status, json) = body_of(AppError::InvalidCredentials).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "User e-mail or token doesn't exist.");
    }

    #[tokio::test]
    async fn server_side_failures_hide_details() {
        for err in [
            AppError::MailDelivery("smtp down".into()),
            AppError::MissingSecret,
            AppError::Internal(anyhow::anyhow!("db exploded")),
        ] {
            let (status, json) = body_of(err).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(json, serde_json::json!({ "message": "Internal server error" }));
        }
    }

    #[tokio::test]
    async fn not_found_names_the_resource() {
        let (status, json) = body_of(AppError::NotFound("Product")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["message"], "Product not found");
    }
}
