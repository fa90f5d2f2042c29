mod auth;
mod health_check;

pub use auth::{
    get_current_user, login, logout, refresh, sign_up, CredentialsRequest, SignUpResponse,
    UserResponse,
};
pub use health_check::health_check;
