use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dockhand_common::DockhandError;
use serde_json::json;
use tracing::{error, warn};

/// HTTP face of [`DockhandError`].
#[derive(Debug)]
pub struct ApiError(pub DockhandError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DockhandError::NotFound(_) => StatusCode::NOT_FOUND,
            DockhandError::PreconditionFailed(_) | DockhandError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            DockhandError::Conflict(_) => StatusCode::CONFLICT,
            DockhandError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DockhandError> for ApiError {
    fn from(err: DockhandError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.0 {
            DockhandError::RecreateFatal {
                container,
                cause,
                rollback_cause,
                ..
            } => {
                error!(%container, %cause, %rollback_cause, "Recreate rollback failed");
            }
            err if status.is_server_error() => {
                error!(error = %err, code = err.code(), "Request failed")
            }
            err => warn!(error = %err, code = err.code(), "Request rejected"),
        }
        let body = json!({
            "error": self.0.to_string(),
            "code": self.0.code(),
        });
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (DockhandError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (DockhandError::PreconditionFailed("x".into()), StatusCode::BAD_REQUEST),
            (DockhandError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (DockhandError::Conflict("x".into()), StatusCode::CONFLICT),
            (DockhandError::EngineUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (DockhandError::Engine("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
        let restored = DockhandError::RecreateRestored {
            container: "web".into(),
            action: "attach volume".into(),
            cause: "boom".into(),
        };
        assert_eq!(ApiError(restored).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
