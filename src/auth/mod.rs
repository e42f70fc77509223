use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{Identity, RoleClaims},
    error::{AppError, Result},
};

/// External identity collaborator: turns a presented credential into the
/// caller's identity and role claims.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn identify(&self, token: &str) -> Result<Identity>;
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    teacher: bool,
    iat: i64,
    exp: i64,
}

/// Verifies HS256 tokens signed with a secret shared with the issuer.
pub struct JwtIdentityProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_duration_hours: i64,
}

impl JwtIdentityProvider {
    pub fn new(secret: &str, token_duration_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            token_duration_hours,
        }
    }

    /// Mint a token for `identity`. Used by the seed tool and tests; in
    /// production tokens come from the campus identity provider.
    pub fn issue(&self, identity: &Identity) -> Result<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: identity.user_id.clone(),
            admin: identity.claims.admin,
            teacher: identity.claims.teacher,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.token_duration_hours)).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn identify(&self, token: &str) -> Result<Identity> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!("Rejected token: {}", e);
            AppError::Unauthorized
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized);
        }

        Ok(Identity::new(
            data.claims.sub,
            RoleClaims {
                admin: data.claims.admin,
                teacher: data.claims.teacher,
            },
        ))
    }
}
