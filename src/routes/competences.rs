use axum::{
    extract::State,
    response::{IntoResponse, Json},
};

use crate::{dto::application_dto::CompetenceListResponse, error::Result, AppState};

#[utoipa::path(
    get,
    path = "/competences",
    responses(
        (status = 200, description = "Competences an applicant can claim experience in"),
        (status = 404, description = "No competences configured")
    )
)]
#[axum::debug_handler]
pub async fn list_competences(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let competences = state.application_service.list_competences().await?;
    Ok(Json(CompetenceListResponse {
        success: true,
        competences,
    }))
}
