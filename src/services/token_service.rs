use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::models::person::{Identity, Role};

pub const SESSION_TTL_HOURS: i64 = 24;
pub const EXTENDED_SESSION_TTL_DAYS: i64 = 30;
pub const RESTORE_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Session,
    Restore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "personId")]
    pub person_id: i32,
    pub kind: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

/// What a verified restore token entitles its bearer to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreGrant {
    pub person_id: i32,
    pub email: String,
}

/// Signs and verifies HS256 tokens with the server secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
    }

    pub fn issue_session_token(
        &self,
        person_id: i32,
        role: Role,
        extended: bool,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let ttl = if extended {
            Duration::days(EXTENDED_SESSION_TTL_DAYS)
        } else {
            Duration::hours(SESSION_TTL_HOURS)
        };
        let now = Utc::now();
        self.sign(&Claims {
            person_id,
            kind: TokenKind::Session,
            role: Some(role),
            email: None,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        })
    }

    pub fn issue_restore_token(
        &self,
        person_id: i32,
        email: &str,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        self.sign(&Claims {
            person_id,
            kind: TokenKind::Restore,
            role: None,
            email: Some(email.to_string()),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(RESTORE_TTL_MINUTES)).timestamp(),
        })
    }

    /// Checks signature and expiry. Does not look at the token kind.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    pub fn verify_session(&self, token: &str) -> Result<Identity, TokenError> {
        let claims = self.verify(token)?;
        match (claims.kind, claims.role) {
            (TokenKind::Session, Some(role)) => Ok(Identity {
                person_id: claims.person_id,
                role,
            }),
            _ => Err(TokenError::Invalid),
        }
    }

    pub fn verify_restore(&self, token: &str) -> Result<RestoreGrant, TokenError> {
        let claims = self.verify(token)?;
        match (claims.kind, claims.email) {
            (TokenKind::Restore, Some(email)) => Ok(RestoreGrant {
                person_id: claims.person_id,
                email,
            }),
            _ => Err(TokenError::Invalid),
        }
    }
}
