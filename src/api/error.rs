//! Error hierarchy for REST calls

use thiserror::Error;

/// Shown when the server rejects input with a field-error object instead of a message.
pub const GENERIC_VALIDATION_MESSAGE: &str = "Please check the highlighted fields and try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("session expired or invalid: {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: &str, url: &str) -> Self {
        match status {
            401 => ApiError::Unauthorized(server_message(body).unwrap_or_else(|| url.to_string())),
            403 => ApiError::Forbidden(
                server_message(body).unwrap_or_else(|| "You do not have access to this resource".to_string()),
            ),
            404 => ApiError::NotFound(server_message(body).unwrap_or_else(|| url.to_string())),
            400..=499 => ApiError::Validation(validation_message(body)),
            _ => ApiError::Server {
                status,
                message: server_message(body).unwrap_or_else(|| "Something went wrong".to_string()),
            },
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e.to_string())
    }
}

/// `message` (or `detail`) as a plain string, if the body carries one.
fn server_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "detail", "error"]
        .iter()
        .find_map(|key| v.get(*key).and_then(|m| m.as_str()))
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
}

/// Message for a rejected submission: the server string, or the generic fallback when
/// the server answered with a structured field-error object.
pub fn validation_message(body: &str) -> String {
    server_message(body).unwrap_or_else(|| GENERIC_VALIDATION_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ApiError::from_status(401, "", "u").is_unauthorized());
        assert!(matches!(ApiError::from_status(403, "", "u"), ApiError::Forbidden(_)));
        assert!(matches!(ApiError::from_status(404, "", "u"), ApiError::NotFound(_)));
        assert!(matches!(ApiError::from_status(422, "", "u"), ApiError::Validation(_)));
        assert!(matches!(
            ApiError::from_status(502, "<html>", "u"),
            ApiError::Server { status: 502, .. }
        ));
    }

    #[test]
    fn test_validation_uses_server_message() {
        let err = ApiError::from_status(
            400,
            r#"{"statusCode":400,"message":"Skill already exists"}"#,
            "u",
        );
        assert_eq!(err.to_string(), "Skill already exists");
    }

    #[test]
    fn test_validation_field_errors_fall_back_to_generic() {
        let err = ApiError::from_status(
            400,
            r#"{"statusCode":400,"message":{"name":["This field is required."]}}"#,
            "u",
        );
        assert_eq!(err.to_string(), GENERIC_VALIDATION_MESSAGE);

        let bare = ApiError::from_status(400, r#"{"name":["required"]}"#, "u");
        assert_eq!(bare.to_string(), GENERIC_VALIDATION_MESSAGE);
    }
}
