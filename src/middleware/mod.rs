/// Middleware module
///
/// Request authentication and request logging.

mod jwt_middleware;
mod logger;

pub use jwt_middleware::{extract_bearer_token, AuthenticatedUser, JwtMiddleware};
pub use logger::{RequestId, RequestLogger};
