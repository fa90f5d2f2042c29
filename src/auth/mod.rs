/// Authentication module
///
/// Password hashing, token issuing/validation, credential handling and
/// refresh token rotation.

mod claims;
mod credentials;
mod jwt;
mod password;
mod refresh_token;

pub use claims::Claims;
pub use credentials::CredentialService;
pub use jwt::{TokenCodec, TokenPair};
pub use password::{refresh_token_digest, PasswordHasher, DEFAULT_HASH_COST};
pub use refresh_token::RefreshRotationManager;
