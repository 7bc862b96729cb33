pub mod applications;
pub mod competences;
pub mod health;
pub mod users;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::dto::{
    application_dto::{AvailabilityInput, ExpertiseInput, SubmitApplicationRequest, UpdateStatusRequest},
    auth_dto::{
        EmailRequest, LoginRequest, SignupRequest, UpdateCredentialsRequest, ValidateTokenRequest,
        VerifyPersonNumberRequest,
    },
};
use crate::middleware::{
    auth::{require_applicant, require_auth, require_recruiter},
    cors::frontend_cors,
    rate_limit::{rps_middleware, RateLimiter},
};
use crate::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        users::login,
        users::signup,
        users::verify_person_number,
        users::verify_email,
        users::send_update_email,
        users::update_credentials,
        users::validate_token,
        competences::list_competences,
        applications::fetch_applications,
        applications::update_application,
        applications::submit_application,
        applications::get_application,
    ),
    components(schemas(
        LoginRequest,
        SignupRequest,
        VerifyPersonNumberRequest,
        EmailRequest,
        UpdateCredentialsRequest,
        ValidateTokenRequest,
        UpdateStatusRequest,
        SubmitApplicationRequest,
        ExpertiseInput,
        AvailabilityInput,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The complete HTTP surface. `require_auth` is layered last so it wraps the
/// role gates and runs before them.
pub fn router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/users/login", post(users::login))
        .route("/users/signup", post(users::signup))
        .route("/users/verify-person-number", post(users::verify_person_number))
        .route("/users/verify-email", post(users::verify_email))
        .route("/users/send-update-email", post(users::send_update_email))
        .route("/users/update-credentials", post(users::update_credentials))
        .route("/users/validate-token", post(users::validate_token))
        .route_layer(from_fn_with_state(
            RateLimiter::new(state.config.auth_rps),
            rps_middleware,
        ));

    let recruiter_routes = Router::new()
        .route("/applications/fetch", get(applications::fetch_applications))
        .route("/applications/update", post(applications::update_application))
        .route_layer(from_fn(require_recruiter));

    let applicant_routes = Router::new()
        .route("/applications/submit", post(applications::submit_application))
        .route_layer(from_fn(require_applicant));

    let authenticated = Router::new()
        .route("/applications/:person_id", get(applications::get_application))
        .merge(recruiter_routes)
        .merge(applicant_routes)
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    let cors = frontend_cors(&state.config.frontend_url);

    Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health))
        .route("/competences", get(competences::list_competences))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(user_routes)
        .merge(authenticated)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
