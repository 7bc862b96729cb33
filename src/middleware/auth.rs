use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::{codes, Error, Result};
use crate::models::person::{Identity, Role};
use crate::services::token_service::{TokenError, TokenService};
use crate::AppState;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolves the caller from a session bearer token.
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<Identity> {
    let Some(token) = bearer_token(headers) else {
        return Err(Error::Unauthorized(
            codes::NO_TOKEN,
            "Access denied. No token provided.".to_string(),
        ));
    };

    tokens.verify_session(token).map_err(|e| match e {
        TokenError::Expired => Error::Unauthorized(
            codes::TOKEN_EXPIRED,
            "Token expired. Please login again.".to_string(),
        ),
        TokenError::Invalid => Error::Unauthorized(codes::INVALID_TOKEN, "Invalid token.".to_string()),
    })
}

pub fn require_role(identity: Identity, role: Role) -> Result<()> {
    if identity.role == role {
        return Ok(());
    }
    let required = match role {
        Role::Recruiter => "Access denied. Recruiter privileges required.",
        Role::Applicant => "Access denied. Applicant privileges required.",
    };
    Err(Error::Forbidden(required.to_string()))
}

/// Recruiters may read anyone; applicants only themselves.
pub fn require_self_or_elevated(identity: Identity, target_person_id: i32) -> Result<()> {
    match identity.role {
        Role::Recruiter => Ok(()),
        Role::Applicant if identity.person_id == target_person_id => Ok(()),
        Role::Applicant => Err(Error::Forbidden(
            "Access denied. You can only access your own data.".to_string(),
        )),
    }
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let identity = authenticate(req.headers(), &state.tokens)?;
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

async fn gate_role(req: Request, next: Next, role: Role) -> Result<Response> {
    let Some(identity) = req.extensions().get::<Identity>().copied() else {
        return Err(Error::Unauthorized(
            codes::NO_TOKEN,
            "Access denied. No token provided.".to_string(),
        ));
    };
    if let Err(e) = require_role(identity, role) {
        warn!(
            person_id = identity.person_id,
            role = %identity.role,
            path = %req.uri().path(),
            "Unauthorized access attempt to {} resource",
            role
        );
        return Err(e);
    }
    Ok(next.run(req).await)
}

/// Must run inside `require_auth`.
pub async fn require_recruiter(req: Request, next: Next) -> Result<Response> {
    gate_role(req, next, Role::Recruiter).await
}

/// Must run inside `require_auth`.
pub async fn require_applicant(req: Request, next: Next) -> Result<Response> {
    gate_role(req, next, Role::Applicant).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "unit-test-secret-0123456789";

    fn headers(value: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        map
    }

    #[test]
    fn missing_or_foreign_scheme_is_no_token() {
        let tokens = TokenService::new(SECRET);
        assert_eq!(authenticate(&HeaderMap::new(), &tokens).unwrap_err().code(), codes::NO_TOKEN);
        assert_eq!(authenticate(&headers("Basic abc"), &tokens).unwrap_err().code(), codes::NO_TOKEN);
        assert_eq!(authenticate(&headers("Bearer "), &tokens).unwrap_err().code(), codes::NO_TOKEN);
    }

    #[test]
    fn restore_token_is_not_a_session() {
        let tokens = TokenService::new(SECRET);
        let restore = tokens.issue_restore_token(4, "x@example.com").unwrap();
        let err = authenticate(&headers(&format!("Bearer {}", restore)), &tokens).unwrap_err();
        assert_eq!(err.code(), codes::INVALID_TOKEN);

        let session = tokens.issue_session_token(4, Role::Applicant, false).unwrap();
        let identity = authenticate(&headers(&format!("Bearer {}", session)), &tokens).unwrap();
        assert_eq!(identity, Identity { person_id: 4, role: Role::Applicant });
    }

    #[test]
    fn role_checks() {
        let recruiter = Identity { person_id: 1, role: Role::Recruiter };
        let applicant = Identity { person_id: 2, role: Role::Applicant };

        assert!(require_role(recruiter, Role::Recruiter).is_ok());
        assert!(matches!(require_role(applicant, Role::Recruiter), Err(Error::Forbidden(_))));

        assert!(require_self_or_elevated(recruiter, 99).is_ok());
        assert!(require_self_or_elevated(applicant, 2).is_ok());
        assert!(require_self_or_elevated(applicant, 3).is_err());
    }
}
