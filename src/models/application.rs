use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::person::ApplicationStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetenceExperience {
    pub competence_id: i32,
    pub name: String,
    pub years_of_experience: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityPeriod {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// One row of `application_view`.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationSummary {
    pub application_id: i32,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub application_status: ApplicationStatus,
    pub competences: Vec<CompetenceExperience>,
    pub availability: Vec<AvailabilityPeriod>,
    #[serde(serialize_with = "crate::utils::time::serialize_canonical")]
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpertiseEntry {
    pub competence_id: i32,
    pub years_of_experience: f64,
}

/// A validated application submission for one applicant.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationSubmission {
    pub person_id: i32,
    pub expertise: Vec<ExpertiseEntry>,
    pub availability: Vec<AvailabilityPeriod>,
}
