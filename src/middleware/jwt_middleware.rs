/// JWT Authentication Middleware
///
/// Validates the bearer token from the Authorization header and injects
/// the authenticated subject into request extensions. Only the token's own
/// signature and expiry are checked; there is no store lookup.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::TokenCodec;
use crate::error::{unauthorized_response, AuthError};
use crate::middleware::RequestId;

/// Subject of a validated access token, available to handlers as
/// `web::ReqData<AuthenticatedUser>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
}

/// Pull the token out of an `Authorization: Bearer <token>` header value
///
/// The scheme is matched case-insensitively; anything other than exactly
/// two space-separated parts is malformed.
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = match header {
        Some(h) if !h.trim().is_empty() => h,
        _ => return Err(AuthError::MissingToken),
    };

    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None)
            if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() =>
        {
            Ok(token)
        }
        _ => Err(AuthError::MalformedHeader),
    }
}

/// JWT middleware for protecting routes
pub struct JwtMiddleware {
    codec: Rc<TokenCodec>,
}

impl JwtMiddleware {
    pub fn new(codec: TokenCodec) -> Self {
        Self {
            codec: Rc::new(codec),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            codec: self.codec.clone(),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    codec: Rc<TokenCodec>,
}

impl<S> JwtMiddlewareService<S> {
    fn authenticate(&self, req: &ServiceRequest) -> Result<AuthenticatedUser, AuthError> {
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .map(|h| h.to_str().map_err(|_| AuthError::MalformedHeader))
            .transpose()?;

        let token = extract_bearer_token(header)?;
        let claims = self.codec.parse(token).map_err(AuthError::InvalidToken)?;

        Ok(AuthenticatedUser {
            id: claims.subject(),
        })
    }
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match self.authenticate(&req) {
            Ok(user) => {
                req.extensions_mut().insert(user);
                tracing::debug!(user_id = %user.id, "JWT validated successfully");

                let service = self.service.clone();
                Box::pin(async move {
                    service
                        .call(req)
                        .await
                        .map(|res| res.map_into_left_body())
                })
            }
            Err(e) => {
                let request_id = RequestId::of(req.request());
                let response = unauthorized_response(&e, request_id.as_str());
                Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) })
            }
        }
    }
}
