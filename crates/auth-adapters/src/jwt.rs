//! HS256 bearer tokens whose `sub` claim is the profile id.

use chrono::{Duration, Utc};
use domains::{AuthError, IdentityVerifier, ProfileId};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Clock skew tolerated on `exp`/`nbf`, in seconds.
const LEEWAY_SECS: u64 = 30;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Error)]
#[error("could not sign token: {0}")]
pub struct SignError(#[from] jsonwebtoken::errors::Error);

pub struct JwtVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl JwtVerifier {
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer,
        }
    }

    /// Issues a token for `profile`. Used by tooling and tests; production
    /// tokens come from the identity provider sharing the same secret.
    pub fn sign(&self, profile: &ProfileId, ttl: Duration) -> Result<String, SignError> {
        let now = Utc::now();
        let claims = Claims {
            sub: profile.as_str().to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<ProfileId, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|error| match error.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => {
                    debug!(%error, "rejected bearer token");
                    AuthError::InvalidToken(error.to_string())
                }
            })?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".into()));
        }
        Ok(ProfileId::new(data.claims.sub))
    }
}
