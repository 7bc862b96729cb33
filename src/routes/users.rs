use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};

use crate::{
    dto::auth_dto::{
        EmailRequest, LoginRequest, SignupRequest, UpdateCredentialsRequest,
        ValidateTokenRequest, ValidateTokenResponse, VerifyPersonNumberRequest,
    },
    error::{codes, Error, Result},
    services::token_service::TokenError,
    utils::validation,
    AppState,
};

#[utoipa::path(
    post,
    path = "/users/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, session token issued"),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Stored password is not hashed")
    )
)]
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    let resp = state.auth_service.login(req).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/users/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Applicant account created"),
        (status = 400, description = "Missing or malformed fields"),
        (status = 409, description = "Username, email or person number already registered")
    )
)]
#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    let resp = state.auth_service.signup(req).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/users/verify-person-number",
    request_body = VerifyPersonNumberRequest,
    responses(
        (status = 200, description = "Person number is registered"),
        (status = 400, description = "Malformed person number"),
        (status = 404, description = "Person number not registered")
    )
)]
#[axum::debug_handler]
pub async fn verify_person_number(
    State(state): State<AppState>,
    payload: std::result::Result<Json<VerifyPersonNumberRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    Ok(Json(state.auth_service.verify_personal_number(req).await?))
}

#[utoipa::path(
    post,
    path = "/users/verify-email",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Email is registered"),
        (status = 400, description = "Malformed email"),
        (status = 404, description = "Email not registered")
    )
)]
#[axum::debug_handler]
pub async fn verify_email(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EmailRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    Ok(Json(state.restore_service.verify_email(req).await?))
}

#[utoipa::path(
    post,
    path = "/users/send-update-email",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Restore link sent, email text echoed"),
        (status = 400, description = "Malformed email"),
        (status = 404, description = "Email not registered")
    )
)]
#[axum::debug_handler]
pub async fn send_update_email(
    State(state): State<AppState>,
    payload: std::result::Result<Json<EmailRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    Ok(Json(state.restore_service.send_restore_email(req).await?))
}

#[utoipa::path(
    post,
    path = "/users/update-credentials",
    request_body = UpdateCredentialsRequest,
    responses(
        (status = 200, description = "Username and password replaced"),
        (status = 400, description = "Missing fields, expired or invalid restore token"),
        (status = 404, description = "Account no longer exists"),
        (status = 409, description = "Username already taken")
    )
)]
#[axum::debug_handler]
pub async fn update_credentials(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateCredentialsRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    Ok(Json(state.restore_service.update_credentials(req).await?))
}

#[utoipa::path(
    post,
    path = "/users/validate-token",
    request_body = ValidateTokenRequest,
    responses(
        (status = 200, description = "Token is valid, decoded payload returned"),
        (status = 400, description = "Token missing"),
        (status = 401, description = "Token expired or invalid")
    )
)]
#[axum::debug_handler]
pub async fn validate_token(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    let Some(token) = validation::non_blank(&req.token) else {
        return Err(Error::BadRequest(
            codes::MISSING_TOKEN,
            "Token is required".to_string(),
        ));
    };

    let decoded = state.tokens.verify(token).map_err(|e| match e {
        TokenError::Expired => {
            Error::Unauthorized(codes::TOKEN_EXPIRED, "Token has expired".to_string())
        }
        TokenError::Invalid => Error::Unauthorized(codes::INVALID_TOKEN, "Invalid token".to_string()),
    })?;

    Ok(Json(ValidateTokenResponse {
        success: true,
        decoded,
    }))
}
