//! Portal API error envelope and shared response bodies.
use super::*;

#[derive(Debug)]
pub(super) struct PortalApiError {
    pub(super) status: StatusCode,
    pub(super) code: &'static str,
    pub(super) message: String,
}

impl PortalApiError {
    pub(super) fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub(super) fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub(super) fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or expired session",
        )
    }

    pub(super) fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
    }

    pub(super) fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub(super) fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "upload_too_large", message)
    }

    pub(super) fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl From<ReportStoreError> for PortalApiError {
    fn from(error: ReportStoreError) -> Self {
        let message = error.to_string();
        match error {
            ReportStoreError::Validation { .. } => Self::bad_request("validation_error", message),
            ReportStoreError::Format(_) => Self::bad_request("format_error", message),
            ReportStoreError::Encode(_) => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, "report_data_rejected", message)
            }
            ReportStoreError::NotFound(_) => Self::not_found("report_not_found", message),
            ReportStoreError::Permission { .. } => Self::forbidden("report_forbidden", message),
        }
    }
}

impl IntoResponse for PortalApiError {
    fn into_response(self) -> Response {
        let error_type = if self.status.is_client_error() {
            "invalid_request_error"
        } else {
            "server_error"
        };
        (
            self.status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "code": self.code,
                    "message": self.message,
                }
            })),
        )
            .into_response()
    }
}
