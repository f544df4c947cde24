// utils/token.rs
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::usermodel::{Actor, UserRole};

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: UserRole,
    pub iat: usize,
    pub exp: usize,
}

/// Signs a token the way the identity provider does.
#[cfg(test)]
pub fn create_token(
    actor: &Actor,
    secret: &[u8],
    expires_in_minutes: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = TokenClaims {
        sub: actor.user_id.to_string(),
        role: actor.role,
        iat: now.timestamp() as usize,
        exp: (now + chrono::Duration::minutes(expires_in_minutes)).timestamp() as usize,
    };

    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret),
    )
}

pub fn decode_token(token: impl AsRef<str>, secret: &[u8]) -> Result<Actor, jsonwebtoken::errors::Error> {
    let decoded = decode::<TokenClaims>(
        token.as_ref(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    )?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSubject))?;

    Ok(Actor::new(user_id, decoded.claims.role))
}
