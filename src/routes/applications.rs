use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};

use crate::{
    dto::{
        application_dto::{
            ApplicationListResponse, ApplicationResponse, SubmitApplicationRequest,
            UpdateStatusRequest, UpdateStatusResponse,
        },
        auth_dto::MessageResponse,
    },
    error::{Error, Result},
    middleware::auth::require_self_or_elevated,
    models::person::Identity,
    services::application_service::StatusUpdate,
    utils::time,
    AppState,
};

#[utoipa::path(
    get,
    path = "/applications/fetch",
    responses(
        (status = 200, description = "All submitted applications"),
        (status = 401, description = "Missing, expired or invalid token"),
        (status = 403, description = "Caller is not a recruiter"),
        (status = 404, description = "No applications yet")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn fetch_applications(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let applications = state.application_service.list_applications().await?;
    Ok(Json(ApplicationListResponse {
        success: true,
        applications,
    }))
}

#[utoipa::path(
    post,
    path = "/applications/update",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed, new lastUpdated returned"),
        (status = 400, description = "Malformed id, status or lastUpdated"),
        (status = 404, description = "No such application"),
        (status = 409, description = "Application changed since it was read")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn update_application(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    let update = StatusUpdate::parse(&req, time::now())?;
    let last_updated = state.application_service.update_status(update).await?;
    Ok(Json(UpdateStatusResponse {
        success: true,
        message: "Application status updated successfully.".to_string(),
        updated_last_updated: time::to_canonical(last_updated),
    }))
}

#[utoipa::path(
    post,
    path = "/applications/submit",
    request_body = SubmitApplicationRequest,
    responses(
        (status = 201, description = "Application submitted"),
        (status = 400, description = "Invalid expertise or availability"),
        (status = 403, description = "Not an applicant, or submitting for someone else"),
        (status = 409, description = "Application already submitted")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn submit_application(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: std::result::Result<Json<SubmitApplicationRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(req) = payload?;
    state.application_service.submit(identity, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok("Application submitted successfully")),
    ))
}

#[utoipa::path(
    get,
    path = "/applications/{person_id}",
    params(
        ("person_id" = i32, Path, description = "Applicant person id")
    ),
    responses(
        (status = 200, description = "The applicant's application"),
        (status = 403, description = "Applicants may only read their own application"),
        (status = 404, description = "No submitted application")
    ),
    security(("bearer" = []))
)]
#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    person_id: std::result::Result<Path<i32>, PathRejection>,
) -> Result<impl IntoResponse> {
    let Path(person_id) = person_id.map_err(|e| Error::bad_request(e.body_text()))?;
    require_self_or_elevated(identity, person_id)?;
    let application = state.application_service.get_application(person_id).await?;
    Ok(Json(ApplicationResponse {
        success: true,
        application,
    }))
}
