use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{debug, info};

use crate::dto::application_dto::{
    AvailabilityInput, ExpertiseInput, SubmitApplicationRequest, UpdateStatusRequest,
};
use crate::error::{codes, Error, Result};
use crate::models::{
    application::{ApplicationSubmission, ApplicationSummary, AvailabilityPeriod, ExpertiseEntry},
    competence::Competence,
    person::{ApplicationStatus, Identity},
};
use crate::store::{ConditionalUpdate, PersonStore, StoreError, SubmitOutcome};
use crate::utils::time;

pub const CONFLICT_MESSAGE: &str = "The application has been modified by another user. \
Your update has been aborted. Refresh the page to see the new data before trying to modify it!";

const MAX_YEARS_OF_EXPERIENCE: f64 = 99.0;

#[derive(Debug, thiserror::Error)]
pub enum StatusUpdateError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("application not found")]
    NotFound,
    #[error("application was modified concurrently")]
    Conflict,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<StatusUpdateError> for Error {
    fn from(err: StatusUpdateError) -> Self {
        match err {
            StatusUpdateError::InvalidInput(msg) => Error::BadRequest(codes::INVALID_INPUT, msg),
            StatusUpdateError::NotFound => {
                Error::NotFound(codes::NOT_FOUND, "Application not found.".to_string())
            }
            StatusUpdateError::Conflict => {
                Error::Conflict(codes::CONFLICT, CONFLICT_MESSAGE.to_string())
            }
            StatusUpdateError::Store(e) => Error::Store(e),
        }
    }
}

/// A validated status change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub application_id: i32,
    pub status: ApplicationStatus,
    pub observed: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn parse(req: &UpdateStatusRequest, now: DateTime<Utc>) -> std::result::Result<Self, StatusUpdateError> {
        let application_id = req
            .application_id
            .as_ref()
            .and_then(JsonValue::as_i64)
            .filter(|id| *id > 0)
            .and_then(|id| i32::try_from(id).ok())
            .ok_or_else(|| {
                StatusUpdateError::InvalidInput(
                    "Invalid application_id. It must be a positive number.".to_string(),
                )
            })?;

        let status = req
            .status
            .as_deref()
            .and_then(|s| s.parse::<ApplicationStatus>().ok())
            .filter(|s| s.is_review_target())
            .ok_or_else(|| {
                StatusUpdateError::InvalidInput(
                    "Invalid status. Allowed values: unhandled, accepted, rejected".to_string(),
                )
            })?;

        let observed = req
            .last_updated
            .as_deref()
            .and_then(|raw| time::parse_client_timestamp(raw).ok())
            .ok_or_else(|| {
                StatusUpdateError::InvalidInput(
                    "Invalid lastUpdated. It must be a valid date string.".to_string(),
                )
            })?;
        if observed > now {
            return Err(StatusUpdateError::InvalidInput(
                "lastUpdated cannot be a future date.".to_string(),
            ));
        }

        Ok(Self {
            application_id,
            status,
            observed,
        })
    }
}

#[derive(Clone)]
pub struct ApplicationService {
    store: Arc<dyn PersonStore>,
}

impl ApplicationService {
    pub fn new(store: Arc<dyn PersonStore>) -> Self {
        Self { store }
    }

    pub async fn list_applications(&self) -> Result<Vec<ApplicationSummary>> {
        let applications = self.store.list_applications().await?;
        if applications.is_empty() {
            return Err(Error::NotFound(
                codes::NOT_FOUND,
                "No applications found".to_string(),
            ));
        }
        Ok(applications)
    }

    pub async fn get_application(&self, person_id: i32) -> Result<ApplicationSummary> {
        self.store
            .find_application(person_id)
            .await?
            .ok_or_else(|| Error::NotFound(codes::NOT_FOUND, "Application not found".to_string()))
    }

    pub async fn list_competences(&self) -> Result<Vec<Competence>> {
        let competences = self.store.list_competences().await?;
        if competences.is_empty() {
            return Err(Error::NotFound(
                codes::NOT_FOUND,
                "No competences found".to_string(),
            ));
        }
        Ok(competences)
    }

    /// Applies a status change only if nobody changed the application since
    /// the caller read `observed`. Returns the new `last_updated`.
    pub async fn update_status(
        &self,
        update: StatusUpdate,
    ) -> std::result::Result<DateTime<Utc>, StatusUpdateError> {
        let outcome = self
            .store
            .update_status_if_unchanged(update.application_id, update.status, update.observed)
            .await?;

        match outcome {
            ConditionalUpdate::Applied(last_updated) => {
                info!(
                    application_id = update.application_id,
                    status = %update.status,
                    last_updated = %time::to_canonical(last_updated),
                    "Application status updated"
                );
                Ok(last_updated)
            }
            ConditionalUpdate::Stale => {
                info!(application_id = update.application_id, "Status update lost to a concurrent edit");
                Err(StatusUpdateError::Conflict)
            }
            ConditionalUpdate::Missing => Err(StatusUpdateError::NotFound),
        }
    }

    pub async fn submit(&self, identity: Identity, req: SubmitApplicationRequest) -> Result<()> {
        let submission = parse_submission(identity, &req, Utc::now().date_naive())?;
        debug!(
            person_id = submission.person_id,
            expertise = submission.expertise.len(),
            availability = submission.availability.len(),
            "Submitting application"
        );

        match self.store.submit_application(&submission).await? {
            SubmitOutcome::Submitted(_) => {
                info!(person_id = submission.person_id, "Application submitted");
                Ok(())
            }
            SubmitOutcome::AlreadySubmitted => Err(Error::Conflict(
                codes::APPLICATION_EXISTS,
                "An application has already been submitted".to_string(),
            )),
            SubmitOutcome::Missing => Err(Error::NotFound(
                codes::USER_NOT_FOUND,
                "Applicant not found".to_string(),
            )),
        }
    }
}

/// Numbers may arrive as JSON numbers or numeric strings.
fn number(value: &JsonValue) -> Option<f64> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

fn parse_expertise(item: &ExpertiseInput) -> Option<ExpertiseEntry> {
    let competence_id = number(&item.competence_id)?;
    let years = number(&item.years_of_experience)?;
    if competence_id <= 0.0 || competence_id.fract() != 0.0 || competence_id > f64::from(i32::MAX) {
        return None;
    }
    if !(0.0..=MAX_YEARS_OF_EXPERIENCE).contains(&years) {
        return None;
    }
    Some(ExpertiseEntry {
        competence_id: competence_id as i32,
        years_of_experience: years,
    })
}

fn parse_period(period: &AvailabilityInput, today: NaiveDate) -> Result<AvailabilityPeriod> {
    let (Some(from), Some(to)) = (period.from_date.as_deref(), period.to_date.as_deref()) else {
        return Err(Error::bad_request(
            "Each availability period must have a from_date and to_date.",
        ));
    };
    let parse = |raw: &str| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d");
    let (Ok(from_date), Ok(to_date)) = (parse(from), parse(to)) else {
        return Err(Error::bad_request(
            "Invalid date format. Please provide valid dates.",
        ));
    };
    if from_date < today {
        return Err(Error::bad_request("Start date cannot be in the past."));
    }
    if from_date > to_date {
        return Err(Error::bad_request("from_date cannot be later than to_date."));
    }
    Ok(AvailabilityPeriod { from_date, to_date })
}

fn parse_submission(
    identity: Identity,
    req: &SubmitApplicationRequest,
    today: NaiveDate,
) -> Result<ApplicationSubmission> {
    let person_id = req
        .user_id
        .as_ref()
        .and_then(JsonValue::as_i64)
        .filter(|id| *id > 0)
        .and_then(|id| i32::try_from(id).ok())
        .ok_or_else(|| Error::bad_request("Invalid userId. It must be a positive number."))?;

    if identity.person_id != person_id {
        return Err(Error::Forbidden(
            "Unauthorized. You can only submit applications for yourself.".to_string(),
        ));
    }

    let expertise = match req.expertise.as_deref() {
        Some(items) if !items.is_empty() => items,
        _ => return Err(Error::bad_request("Expertise must be a non-empty array.")),
    };
    let expertise = expertise
        .iter()
        .map(parse_expertise)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| {
            Error::bad_request(
                "Each expertise item must have a valid competence_id and years_of_experience (0-99).",
            )
        })?;

    let availability = match req.availability.as_deref() {
        Some(items) if !items.is_empty() => items,
        _ => return Err(Error::bad_request("Availability must be a non-empty array.")),
    };
    let availability = availability
        .iter()
        .map(|p| parse_period(p, today))
        .collect::<Result<Vec<_>>>()?;

    Ok(ApplicationSubmission {
        person_id,
        expertise,
        availability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::person::{NewPerson, Role};
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn update_request(body: JsonValue) -> UpdateStatusRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn status_request_validation() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let ok = StatusUpdate::parse(
            &update_request(json!({"application_id": 4, "status": "accepted", "lastUpdated": "2024-01-01T00:00:00Z"})),
            now,
        )
        .unwrap();
        assert_eq!(ok.application_id, 4);
        assert_eq!(ok.status, ApplicationStatus::Accepted);

        let cases = [
            json!({"application_id": 0, "status": "accepted", "lastUpdated": "2024-01-01"}),
            json!({"application_id": "4", "status": "accepted", "lastUpdated": "2024-01-01"}),
            json!({"application_id": 4, "status": "unsent", "lastUpdated": "2024-01-01"}),
            json!({"application_id": 4, "status": "hired", "lastUpdated": "2024-01-01"}),
            json!({"application_id": 4, "status": "accepted", "lastUpdated": "soon"}),
            json!({"application_id": 4, "status": "accepted", "lastUpdated": "2030-01-01T00:00:00Z"}),
            json!({"status": "accepted", "lastUpdated": "2024-01-01"}),
        ];
        for body in cases {
            assert!(
                matches!(
                    StatusUpdate::parse(&update_request(body.clone()), now),
                    Err(StatusUpdateError::InvalidInput(_))
                ),
                "accepted {}",
                body
            );
        }
    }

    fn submit_request(user_id: i32, from: NaiveDate) -> SubmitApplicationRequest {
        serde_json::from_value(json!({
            "userId": user_id,
            "expertise": [{"competence_id": 1, "years_of_experience": "3.5"}],
            "availability": [{"from_date": from.to_string(), "to_date": (from + Duration::days(10)).to_string()}],
        }))
        .unwrap()
    }

    #[test]
    fn submission_validation() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let me = Identity { person_id: 5, role: Role::Applicant };

        let parsed = parse_submission(me, &submit_request(5, today), today).unwrap();
        assert_eq!(parsed.expertise[0].years_of_experience, 3.5);

        let other = parse_submission(me, &submit_request(6, today), today).unwrap_err();
        assert!(matches!(other, Error::Forbidden(_)));

        let past = parse_submission(me, &submit_request(5, today - Duration::days(1)), today).unwrap_err();
        assert_eq!(past.code(), codes::INVALID_INPUT);

        let mut too_senior = submit_request(5, today);
        too_senior.expertise.as_mut().unwrap()[0].years_of_experience = json!(100);
        assert!(parse_submission(me, &too_senior, today).is_err());

        let mut empty = submit_request(5, today);
        empty.availability = Some(vec![]);
        assert!(parse_submission(me, &empty, today).is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_updates_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let person = store
            .create_person(NewPerson {
                first_name: "Race".into(),
                last_name: "Condition".into(),
                personal_number: "19800101-0001".into(),
                email: "race@example.com".into(),
                username: "race".into(),
                password_hash: "x".into(),
                role: Role::Applicant,
            })
            .await
            .unwrap();
        let from = Utc::now().date_naive() + Duration::days(1);
        store
            .submit_application(&ApplicationSubmission {
                person_id: person.person_id,
                expertise: vec![ExpertiseEntry { competence_id: 1, years_of_experience: 1.0 }],
                availability: vec![AvailabilityPeriod { from_date: from, to_date: from }],
            })
            .await
            .unwrap();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store.seed_last_updated(person.person_id, t0).await;

        let application_id = person.person_id;
        let svc = ApplicationService::new(store);
        let mut handles = Vec::new();
        for i in 0..16 {
            let svc = svc.clone();
            let status = if i % 2 == 0 { ApplicationStatus::Accepted } else { ApplicationStatus::Rejected };
            handles.push(tokio::spawn(async move {
                svc.update_status(StatusUpdate {
                    application_id,
                    status,
                    observed: t0,
                })
                .await
            }));
        }

        let mut wins = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(StatusUpdateError::Conflict) => conflicts += 1,
                Err(other) => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(conflicts, 15);
    }
}
