use crate::error::Error;

#[derive(Debug, PartialEq, Eq)]
pub enum TokenValidationError {
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    InternalError,
}

impl From<Error> for TokenValidationError {
    fn from(err: Error) -> Self {
        match err {
            Error::TokenExpired => TokenValidationError::TokenExpired,
            Error::Unauthorized | Error::InvalidTokenFormat => TokenValidationError::InvalidToken,
            other => {
                tracing::error!("session validation failed: {other}");
                TokenValidationError::InternalError
            }
        }
    }
}

/// Extracts the bearer token from an Authorization header.
/// Returns None if no auth header is present.
/// Returns Err if the auth scheme is unsupported or the token is empty.
pub fn extract_token_from_header(
    auth_header: Option<&str>,
) -> Result<Option<String>, TokenValidationError> {
    let Some(header) = auth_header else {
        return Ok(None);
    };

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(TokenValidationError::InvalidScheme)?
        .trim();

    if token.is_empty() {
        return Err(TokenValidationError::InvalidToken);
    }

    Ok(Some(token.to_string()))
}
