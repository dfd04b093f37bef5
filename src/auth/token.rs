//! Stateless HS256 tokens carrying a user id.
//!
//! Tokens live for [`TOKEN_TTL`] and are never stored server side. The
//! signing secret is fixed when the [`TokenService`] is built and shared
//! read-only by every request.
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

/// Lifetime of every minted token.
pub const TOKEN_TTL: Duration = Duration::hours(24);

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token not supplied")]
    Missing,
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    /// Signature checked out but the payload is not the shape we mint.
    #[error("malformed token claims: {0}")]
    MalformedClaims(String),
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64, // user id
    pub iat: i64, // issued at (unix seconds)
    pub exp: i64, // expires at (unix seconds)
}

impl Claims {
    pub fn user_id(&self) -> i64 {
        self.sub
    }

    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(self.exp).ok()
    }
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn mint(&self, user_id: i64) -> Result<String, TokenError> {
        self.mint_at(user_id, OffsetDateTime::now_utc())
    }

    /// Mints a token as if it were issued at `now`.
    pub fn mint_at(&self, user_id: i64, now: OffsetDateTime) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp(),
            exp: (now + TOKEN_TTL).unix_timestamp(),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: Option<&str>) -> Result<Claims, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc())
    }

    /// Verifies `token` against the secret and checks that it is still
    /// valid at `now`. The expiry must lie strictly after `now`.
    pub fn verify_at(&self, token: Option<&str>, now: OffsetDateTime) -> Result<Claims, TokenError> {
        let token = match token.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return Err(TokenError::Missing),
        };

        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "jwt header rejected");
            TokenError::Malformed
        })?;
        if header.alg != ALGORITHM {
            warn!(alg = ?header.alg, "jwt signed with unexpected algorithm");
            return Err(TokenError::Malformed);
        }

        let mut validation = Validation::new(ALGORITHM);
        // expiry is checked below against the caller's clock
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                    TokenError::MalformedClaims(e.to_string())
                }
                _ => TokenError::Malformed,
            }
        })?;

        let claims = data.claims;
        if claims.exp <= now.unix_timestamp() {
            debug!(user_id = claims.sub, exp = claims.exp, "jwt expired");
            return Err(TokenError::Expired);
        }
        debug!(user_id = claims.sub, "jwt verified");
        Ok(claims)
    }
}
