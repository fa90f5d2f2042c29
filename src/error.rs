/// Error Handling Module
///
/// Unified error handling for the authentication service:
/// 1. Domain-specific error types (validation, tokens, auth, store, hashing, config)
/// 2. A single `AppError` used for control flow inside the service
/// 3. HTTP response mapping with generic, non-leaking messages
/// 4. Structured error logging with request context

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use thiserror::Error;

use crate::middleware::RequestId;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data. Raised before any secret is touched.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(String),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(String, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(String, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(String),
}

/// Failures of the token layer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Why a login attempt was rejected. Only ever logged, never rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    UnknownUser,
    WrongPassword,
}

/// Authentication errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    // Same message for both reasons.
    #[error("invalid username or password")]
    BadCredentials(CredentialFailure),
    #[error("invalid token: {0}")]
    InvalidToken(TokenError),
    #[error("access and refresh token belong to different subjects")]
    IdentityMismatch,
    #[error("refresh token is stale or invalid")]
    StaleRefreshToken,
    #[error("missing authentication token")]
    MissingToken,
    #[error("malformed authorization header")]
    MalformedHeader,
}

/// User store failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("username is already taken")]
    UsernameTaken,
    #[error("user not found")]
    NotFound,
    #[error("store operation timed out")]
    Timeout,
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Password hashing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("hashing failed: {0}")]
    Hashing(String),
    #[error("hash verification could not be performed: {0}")]
    Verification(String),
}

/// Configuration errors. Always fatal at startup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required config: {0}")]
    MissingRequired(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AppError::Internal(format!("token signing failed: {}", msg)),
            other => AppError::Auth(AuthError::InvalidToken(other)),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                StoreError::UsernameTaken
            }
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for HashError {
    fn from(err: tokio::task::JoinError) -> Self {
        HashError::Hashing(format!("hashing task failed: {}", err))
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response body
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Unique error ID for correlating with server logs
    pub error_id: String,
    /// Generic human-readable message
    pub message: String,
    /// Stable code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Renders an error as a status code and response body
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    fn classify(&self) -> (StatusCode, &'static str, &'static str) {
        match self {
            AppError::Validation(_) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Request validation failed",
            ),
            AppError::Auth(e) => match e {
                AuthError::BadCredentials(_) => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_CREDENTIALS",
                    "Invalid username or password",
                ),
                AuthError::InvalidToken(_) => (
                    StatusCode::BAD_REQUEST,
                    "INVALID_TOKEN",
                    "Invalid or expired token",
                ),
                AuthError::IdentityMismatch => (
                    StatusCode::BAD_REQUEST,
                    "IDENTITY_MISMATCH",
                    "Token pair is not consistent",
                ),
                AuthError::StaleRefreshToken => (
                    StatusCode::BAD_REQUEST,
                    "STALE_REFRESH_TOKEN",
                    "Refresh token is no longer valid",
                ),
                AuthError::MissingToken | AuthError::MalformedHeader => (
                    StatusCode::UNAUTHORIZED,
                    "UNAUTHORIZED",
                    "Missing or invalid authorization header",
                ),
            },
            AppError::Store(StoreError::UsernameTaken) => (
                StatusCode::BAD_REQUEST,
                "USERNAME_TAKEN",
                "Username is already taken",
            ),
            AppError::Store(_) => (
                StatusCode::BAD_REQUEST,
                "STORE_ERROR",
                "Request could not be completed",
            ),
            AppError::Hash(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error",
            ),
            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Server configuration error",
            ),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.classify();
        let mut message = message.to_string();
        // Validation messages name the offending field and never carry secrets.
        if let AppError::Validation(e) = self {
            message = e.to_string();
        }

        (
            status,
            ErrorResponse::new(
                request_id.to_string(),
                message,
                code.to_string(),
                status.as_u16(),
            ),
        )
    }
}

/// An `AppError` bound to the request it failed.
///
/// The body's `error_id` is the request id, so it matches the
/// `x-request-id` header and the log lines for that request.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ApiError {
    request_id: String,
    error: AppError,
}

impl ApiError {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn error(&self) -> &AppError {
        &self.error
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let (status, body) = ErrorHandler::error_response(&self.error, &self.request_id);
        HttpResponse::build(status).json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.error.status_code()
    }
}

/// 401 response used by the request authenticator for every rejection.
///
/// The cause is logged but the body is identical for missing, malformed,
/// expired and forged tokens.
pub fn unauthorized_response(error: &AuthError, request_id: &str) -> HttpResponse {
    tracing::warn!(request_id = request_id, error = %error, "Request rejected by authenticator");

    HttpResponse::Unauthorized().json(ErrorResponse::new(
        request_id.to_string(),
        "Missing, invalid or expired token".to_string(),
        "UNAUTHORIZED".to_string(),
        StatusCode::UNAUTHORIZED.as_u16(),
    ))
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Error context for enhanced logging and debugging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>, request_id: &RequestId) -> Self {
        Self {
            request_id: request_id.to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Log `error` under this context and tie it to the request
    pub fn fail(&self, error: AppError) -> ApiError {
        self.log_error(&error);
        ApiError {
            request_id: self.request_id.clone(),
            error,
        }
    }

    pub fn log_error(&self, error: &AppError) {
        let request_id = self.request_id.as_str();
        let operation = self.operation.as_str();
        let user_id = self.user_id.as_deref().unwrap_or("-");

        match error {
            AppError::Validation(e) => {
                tracing::warn!(request_id, operation, error = %e, "Validation error");
            }
            AppError::Auth(AuthError::BadCredentials(reason)) => {
                tracing::warn!(request_id, operation, reason = ?reason, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id, operation, user_id, error = %e, "Authentication error");
            }
            AppError::Store(StoreError::UsernameTaken) => {
                tracing::warn!(request_id, operation, "Duplicate username attempt");
            }
            AppError::Store(e) => {
                tracing::error!(request_id, operation, user_id, error = %e, "Store error");
            }
            AppError::Hash(e) => {
                tracing::error!(request_id, operation, user_id, error = %e, "Hashing error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id, operation, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id, operation, user_id, error = %msg, "Internal error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("username".to_string());
        assert_eq!(err.to_string(), "username is empty");
    }

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = ValidationError::InvalidFormat("test".to_string()).into();
        assert!(matches!(app_err, AppError::Validation(_)));
    }

    #[test]
    fn test_token_error_maps_to_invalid_token() {
        let app_err: AppError = TokenError::Expired.into();
        assert!(matches!(
            app_err,
            AppError::Auth(AuthError::InvalidToken(TokenError::Expired))
        ));

        let app_err: AppError = TokenError::Signing("boom".to_string()).into();
        assert!(matches!(app_err, AppError::Internal(_)));
    }

    #[test]
    fn test_bad_credentials_render_identically() {
        let unknown = AppError::Auth(AuthError::BadCredentials(CredentialFailure::UnknownUser));
        let wrong = AppError::Auth(AuthError::BadCredentials(CredentialFailure::WrongPassword));

        let (status_a, body_a) = ErrorHandler::error_response(&unknown, "id");
        let (status_b, body_b) = ErrorHandler::error_response(&wrong, "id");

        assert_eq!(status_a, status_b);
        assert_eq!(body_a.code, body_b.code);
        assert_eq!(body_a.message, body_b.message);
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn test_auth_failures_are_bad_requests() {
        let cases = vec![
            AppError::Auth(AuthError::InvalidToken(TokenError::BadSignature)),
            AppError::Auth(AuthError::IdentityMismatch),
            AppError::Auth(AuthError::StaleRefreshToken),
            AppError::Store(StoreError::UsernameTaken),
            AppError::Store(StoreError::Timeout),
        ];

        for err in cases {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{}", err);
        }
    }

    #[test]
    fn test_store_error_message_does_not_leak() {
        let err = AppError::Store(StoreError::Backend("relation \"users\" does not exist".to_string()));
        let (_, body) = ErrorHandler::error_response(&err, "id");

        assert!(!body.message.contains("users"));
        assert_eq!(body.code, "STORE_ERROR");
    }

    fn request_id() -> RequestId {
        RequestId::of(&actix_web::test::TestRequest::default().to_http_request())
    }

    #[test]
    fn test_error_context_creation() {
        let id = request_id();
        let ctx = ErrorContext::new("test_operation", &id);
        assert_eq!(ctx.operation, "test_operation");
        assert_eq!(ctx.request_id, id.as_str());
        assert!(ctx.user_id.is_none());

        let ctx_with_user = ctx.with_user_id("user-123".to_string());
        assert_eq!(ctx_with_user.user_id, Some("user-123".to_string()));
    }

    #[actix_web::test]
    async fn test_api_error_body_uses_the_request_id() {
        let id = request_id();
        let err = ErrorContext::new("login", &id)
            .fail(AuthError::BadCredentials(CredentialFailure::WrongPassword).into());

        assert_eq!(err.request_id(), id.as_str());
        let response = ResponseError::error_response(&err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let body: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error_id, id.as_str());
        assert_eq!(body.code, "INVALID_CREDENTIALS");
    }
}
