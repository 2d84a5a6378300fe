mod helpers;
mod middleware;
mod password;
mod session;
mod token;

pub use helpers::{TokenValidationError, extract_token_from_header};
pub use middleware::{AuthError, RequireAdmin, RequireAuth};
pub use password::{Argon2Hasher, CredentialHasher};
pub use session::{IssuedSession, SessionManager};
pub use token::{TokenGenerator, parse_token};
