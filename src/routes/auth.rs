/// Authentication Routes
///
/// Signup, login, token refresh, logout and current user information.
/// Every failure on the public routes answers 400 with a generic body;
/// the protected routes sit behind `JwtMiddleware` and answer 401 when the
/// access token is missing or invalid.

use actix_web::{web, HttpResponse};
use secrecy::Secret;
use serde::{Deserialize, Serialize};

use crate::auth::{CredentialService, RefreshRotationManager, TokenPair};
use crate::error::{ApiError, ErrorContext};
use crate::middleware::{AuthenticatedUser, RequestId};

/// Signup and login request
#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: Secret<String>,
}

#[derive(Serialize, Deserialize)]
pub struct SignUpResponse {
    pub id: String,
}

#[derive(Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
}

/// POST /signUp
///
/// # Errors
/// - 400: validation error, username taken, or store failure
pub async fn sign_up(
    form: web::Json<CredentialsRequest>,
    credentials: web::Data<CredentialService>,
    request_id: RequestId,
) -> Result<HttpResponse, ApiError> {
    let context = ErrorContext::new("sign_up", &request_id);
    let CredentialsRequest { username, password } = form.into_inner();

    let user_id = credentials
        .sign_up(&username, password)
        .await
        .map_err(|e| context.fail(e))?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "Signup handled"
    );

    Ok(HttpResponse::Created().json(SignUpResponse {
        id: user_id.to_string(),
    }))
}

/// POST /login
///
/// Returns a fresh token pair. Unknown usernames and wrong passwords get
/// the same response.
///
/// # Errors
/// - 400: validation error, bad credentials, or store failure
pub async fn login(
    form: web::Json<CredentialsRequest>,
    credentials: web::Data<CredentialService>,
    request_id: RequestId,
) -> Result<HttpResponse, ApiError> {
    let context = ErrorContext::new("login", &request_id);
    let CredentialsRequest { username, password } = form.into_inner();

    let pair = credentials.login(&username, password).await.map_err(|e| context.fail(e))?;

    tracing::info!(request_id = %context.request_id, "Login handled");

    Ok(HttpResponse::Ok().json(pair))
}

/// POST /refresh
///
/// Exchanges `{accessToken, refreshToken}` for a new pair. The submitted
/// refresh token can never be used again afterwards.
///
/// # Errors
/// - 400: invalid/expired token, subject mismatch, or stale refresh token
pub async fn refresh(
    form: web::Json<TokenPair>,
    rotation: web::Data<RefreshRotationManager>,
    request_id: RequestId,
) -> Result<HttpResponse, ApiError> {
    let context = ErrorContext::new("token_refresh", &request_id);

    let pair = rotation.rotate(&form).await.map_err(|e| context.fail(e))?;

    tracing::info!(request_id = %context.request_id, "Token refresh handled");

    Ok(HttpResponse::Ok().json(pair))
}

/// POST /api/logout
///
/// **Requires a valid access token.** Forgets the stored refresh token.
pub async fn logout(
    user: web::ReqData<AuthenticatedUser>,
    credentials: web::Data<CredentialService>,
    request_id: RequestId,
) -> Result<HttpResponse, ApiError> {
    let context = ErrorContext::new("logout", &request_id).with_user_id(user.id.to_string());

    credentials.logout(user.id).await.map_err(|e| context.fail(e))?;

    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/me
///
/// **Requires a valid access token.**
pub async fn get_current_user(
    user: web::ReqData<AuthenticatedUser>,
    credentials: web::Data<CredentialService>,
    request_id: RequestId,
) -> Result<HttpResponse, ApiError> {
    let context = ErrorContext::new("get_current_user", &request_id).with_user_id(user.id.to_string());
    let record = credentials
        .profile(user.id)
        .await
        .map_err(|e| context.fail(e))?;

    Ok(HttpResponse::Ok().json(UserResponse {
        id: record.id.to_string(),
        username: record.username,
    }))
}
