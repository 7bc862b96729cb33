use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::models::application::ApplicationSummary;
use crate::models::competence::Competence;

/// Body of `POST /applications/update`.
///
/// Fields stay loosely typed so that malformed values are reported as
/// INVALID_INPUT with a field-specific message.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    #[schema(value_type = i32)]
    pub application_id: Option<JsonValue>,
    pub status: Option<String>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusResponse {
    pub success: bool,
    pub message: String,
    pub updated_last_updated: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ExpertiseInput {
    #[schema(value_type = i32)]
    pub competence_id: JsonValue,
    #[schema(value_type = f64)]
    pub years_of_experience: JsonValue,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AvailabilityInput {
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

/// Body of `POST /applications/submit`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplicationRequest {
    #[schema(value_type = i32)]
    pub user_id: Option<JsonValue>,
    #[serde(default)]
    pub expertise: Option<Vec<ExpertiseInput>>,
    #[serde(default)]
    pub availability: Option<Vec<AvailabilityInput>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationListResponse {
    pub success: bool,
    pub applications: Vec<ApplicationSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationResponse {
    pub success: bool,
    pub application: ApplicationSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetenceListResponse {
    pub success: bool,
    pub competences: Vec<Competence>,
}
