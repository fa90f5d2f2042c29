use actix_web::dev::Server;
use actix_web::{error::JsonPayloadError, middleware::Logger, web, App, HttpRequest, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{CredentialService, PasswordHasher, RefreshRotationManager, TokenCodec};
use crate::configuration::JwtSettings;
use crate::error::{AppError, ErrorContext, ValidationError};
use crate::middleware::{JwtMiddleware, RequestId, RequestLogger};
use crate::routes::{get_current_user, health_check, login, logout, refresh, sign_up};
use crate::store::UserStore;

/// Everything the HTTP layer needs, built once at startup
#[derive(Clone)]
pub struct AuthServices {
    pub credentials: CredentialService,
    pub rotation: RefreshRotationManager,
    pub codec: TokenCodec,
}

/// Wire the auth components together
///
/// # Errors
/// Fails on an unusable signing configuration or if the hasher cannot
/// produce its dummy hash. Both are fatal at startup.
pub fn build_services(
    store: Arc<dyn UserStore>,
    jwt_config: &JwtSettings,
    hasher: PasswordHasher,
) -> Result<AuthServices, AppError> {
    let codec = TokenCodec::new(jwt_config)?;
    let credentials = CredentialService::new(store.clone(), codec.clone(), hasher)?;
    let rotation = RefreshRotationManager::new(store, codec.clone(), hasher);

    Ok(AuthServices {
        credentials,
        rotation,
        codec,
    })
}

fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    let context = ErrorContext::new("parse_body", &RequestId::of(req));
    tracing::debug!(request_id = %context.request_id, error = %err, "Rejected request body");
    context
        .fail(AppError::Validation(ValidationError::InvalidFormat(
            "request body".to_string(),
        )))
        .into()
}

pub fn run(listener: TcpListener, services: AuthServices) -> Result<Server, std::io::Error> {
    let credentials = web::Data::new(services.credentials);
    let rotation = web::Data::new(services.rotation);
    let codec = services.codec;

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(RequestLogger)

            // Shared state
            .app_data(credentials.clone())
            .app_data(rotation.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/signUp", web::post().to(sign_up))
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))

            // Protected routes (require a valid access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(codec.clone()))
                    .route("/me", web::get().to(get_current_user))
                    .route("/logout", web::post().to(logout)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
