// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! User-facing API error handling.
//!
//! Handlers never leak internal details to the browser: responses carry a
//! short actionable message plus a unique reference code, while the full
//! details are logged server-side with the same code after passing through
//! the sanitizer (paths, tokens and addresses are redacted before they hit
//! the log).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::Serialize;

// =============================================================================
// ERROR REFERENCE CODE GENERATION
// =============================================================================

/// Generate a unique error reference code.
/// Format: ERR-YYYYMMDD-XXXXXX (e.g., ERR-20250115-A3F8K2)
pub fn generate_reference_code() -> String {
    let date = Utc::now().format("%Y%m%d");
    let mut rng = rand::thread_rng();
    let chars: Vec<char> = "ABCDEFGHJKLMNPQRSTUVWXYZ23456789".chars().collect();
    let random: String = (0..6)
        .map(|_| chars[rng.gen_range(0..chars.len())])
        .collect();
    format!("ERR-{}-{}", date, random)
}

// =============================================================================
// USER-FACING ERROR TYPES
// =============================================================================

/// Errors the front end can receive from photopull's own API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error_type", rename_all = "snake_case")]
pub enum UserError {
    /// Invalid or stale request from the client (400)
    InvalidRequest {
        message: String,
        reference: String,
        field: Option<String>,
    },

    /// No authenticated vault session cached yet (401)
    AuthenticationRequired {
        message: String,
        reference: String,
    },

    /// The vault behind us misbehaved (502)
    BadGateway {
        message: String,
        reference: String,
    },

    /// Internal server error (500); internal details stay in the log
    InternalError {
        message: String,
        reference: String,
    },
}

impl UserError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            UserError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            UserError::AuthenticationRequired { .. } => StatusCode::UNAUTHORIZED,
            UserError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            UserError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the reference code for this error.
    pub fn reference(&self) -> &str {
        match self {
            UserError::InvalidRequest { reference, .. } => reference,
            UserError::AuthenticationRequired { reference, .. } => reference,
            UserError::BadGateway { reference, .. } => reference,
            UserError::InternalError { reference, .. } => reference,
        }
    }

    /// Get the user-facing message.
    pub fn message(&self) -> &str {
        match self {
            UserError::InvalidRequest { message, .. } => message,
            UserError::AuthenticationRequired { message, .. } => message,
            UserError::BadGateway { message, .. } => message,
            UserError::InternalError { message, .. } => message,
        }
    }
}

// =============================================================================
// ERROR CONSTRUCTORS (WITH LOGGING)
// =============================================================================

impl UserError {
    /// Create an InvalidRequest error, logging internal details if provided.
    pub fn invalid_request(
        user_message: &str,
        field: Option<&str>,
        internal_details: Option<&str>,
    ) -> Self {
        let reference = generate_reference_code();
        if let Some(details) = internal_details {
            let sanitized = sanitize_error_details(details);
            tracing::warn!(
                reference = %reference,
                internal_details = %sanitized,
                field = ?field,
                "Invalid request"
            );
        }
        Self::InvalidRequest {
            message: user_message.to_string(),
            reference,
            field: field.map(|s| s.to_string()),
        }
    }

    /// Create an AuthenticationRequired error.
    pub fn authentication_required(internal_reason: Option<&str>) -> Self {
        let reference = generate_reference_code();
        if let Some(reason) = internal_reason {
            tracing::warn!(
                reference = %reference,
                internal_reason = %sanitize_error_details(reason),
                "Authentication required"
            );
        }
        Self::AuthenticationRequired {
            message: "No authenticated vault session yet. Finish signing in first.".to_string(),
            reference,
        }
    }

    /// Create a BadGateway error, logging full details internally.
    pub fn bad_gateway(internal_error: &str) -> Self {
        let reference = generate_reference_code();
        tracing::error!(
            reference = %reference,
            internal_error = %sanitize_error_details(internal_error),
            "Vault request failed"
        );
        Self::BadGateway {
            message: "The photo vault did not answer properly. Try again shortly.".to_string(),
            reference,
        }
    }

    /// Create an InternalError, logging full details internally.
    pub fn internal_error(internal_error: &str) -> Self {
        let reference = generate_reference_code();
        tracing::error!(
            reference = %reference,
            internal_error = %sanitize_error_details(internal_error),
            "Internal error"
        );
        Self::InternalError {
            message: "Something went wrong on our side.".to_string(),
            reference,
        }
    }
}

/// User-facing error response structure (JSON format).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: UserError,
    pub status: u16,
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let response = ErrorResponse {
            status: status.as_u16(),
            error: self,
        };

        let body = serde_json::to_string(&response).unwrap_or_else(|_| {
            r#"{"error":{"error_type":"internal_error","message":"An unexpected error occurred","reference":"ERR-FALLBACK"},"status":500}"#.to_string()
        });

        (status, [("content-type", "application/json")], body).into_response()
    }
}

/// Result type that uses UserError for the error variant.
pub type ApiResult<T> = Result<T, UserError>;

// =============================================================================
// SANITIZATION
// =============================================================================

static SANITIZE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        // File paths (Unix and Windows)
        (
            Regex::new(r"(?:/[\w.-]+){2,}").expect("Unix path regex"),
            "[PATH_REDACTED]",
        ),
        (
            Regex::new(r"[A-Za-z]:\\(?:[\w.-]+\\?)+").expect("Windows path regex"),
            "[PATH_REDACTED]",
        ),
        // IPv4 addresses
        (
            Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("IPv4 regex"),
            "[IP_REDACTED]",
        ),
        // Vault session tokens and bearer headers
        (
            Regex::new(r"tok-[A-Za-z0-9]{8,}").expect("Vault token regex"),
            "[TOKEN_REDACTED]",
        ),
        (
            Regex::new(r"Bearer [A-Za-z0-9\-._~+/]+=*").expect("Bearer token regex"),
            "Bearer [TOKEN_REDACTED]",
        ),
        // Email addresses (account usernames are emails for most vaults)
        (
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
                .expect("Email regex"),
            "[EMAIL_REDACTED]",
        ),
        // Generic long alphanumeric strings (potential secrets)
        (
            Regex::new(r"\b[A-Za-z0-9]{40,}\b").expect("Long secret regex"),
            "[SECRET_REDACTED]",
        ),
    ]
});

/// Sanitize error details before they are logged.
pub fn sanitize_error_details(error: &str) -> String {
    let mut result = error.to_string();
    for (pattern, replacement) in SANITIZE_PATTERNS.iter() {
        result = pattern.replace_all(&result, *replacement).to_string();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_reference_code() {
        let code = generate_reference_code();
        assert!(code.starts_with("ERR-"));
        assert_eq!(code.len(), 19); // ERR-YYYYMMDD-XXXXXX = 4+8+1+6

        // Should be unique
        let code2 = generate_reference_code();
        assert_ne!(code, code2);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            UserError::invalid_request("test", None, None).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            UserError::authentication_required(None).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            UserError::bad_gateway("test").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            UserError::internal_error("test").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_sanitize_file_paths() {
        let unix_path = "Failed to write /home/user/Photos/photopull/IMG_0001.HEIC";
        let sanitized = sanitize_error_details(unix_path);
        assert!(!sanitized.contains("home"));
        assert!(sanitized.contains("[PATH_REDACTED]"));
    }

    #[test]
    fn test_sanitize_tokens() {
        let sanitized = sanitize_error_details("vault rejected tok-abcdef123456789");
        assert!(!sanitized.contains("tok-abcdef123456789"));
        assert!(sanitized.contains("[TOKEN_REDACTED]"));

        let sanitized = sanitize_error_details("header was Bearer abc.def-ghi");
        assert!(sanitized.contains("Bearer [TOKEN_REDACTED]"));
    }

    #[test]
    fn test_sanitize_emails_and_ips() {
        let sanitized = sanitize_error_details("ansel@example.com unreachable at 192.168.1.40");
        assert!(!sanitized.contains("ansel@example.com"));
        assert!(!sanitized.contains("192.168.1.40"));
        assert!(sanitized.contains("[EMAIL_REDACTED]"));
        assert!(sanitized.contains("[IP_REDACTED]"));
    }

    #[test]
    fn test_user_message_is_not_internal_detail() {
        let err = UserError::bad_gateway("GET /libraries failed with HTTP 500");
        assert!(!err.message().contains("/libraries"));
        assert!(err.reference().starts_with("ERR-"));
    }
}
