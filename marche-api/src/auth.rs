use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use marche_core::identity::User;

use crate::error::AppError;
use crate::middleware::auth::Claims;
use crate::state::AuthConfig;

/// Sign a token carrying the user's current roles.
pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, AppError> {
    let claims = Claims {
        sub: user.id,
        roles: user.roles.clone(),
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::Anyhow(anyhow::anyhow!("Token encoding failed: {}", e)))
}
