use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use tessera_core::UserId;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    /// Numeric user id
    pub sub: String,
    pub exp: usize,
}

/// Authenticated caller, inserted into request extensions by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub UserId);

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| AppError::AuthenticationError("missing bearer token".to_string()))?;

    let token_data = decode::<CustomerClaims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| AppError::AuthenticationError(e.to_string()))?;

    let user_id: UserId = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::AuthenticationError("subject is not a user id".to_string()))?;

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}
