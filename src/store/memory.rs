use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex as TokioMutex;
use tracing::debug;

use super::{
    ConditionalUpdate, CredentialUpdate, DuplicateField, PersonStore, StoreError, StoreResult,
    SubmitOutcome,
};
use crate::models::{
    application::{ApplicationSubmission, ApplicationSummary, AvailabilityPeriod, CompetenceExperience, ExpertiseEntry},
    competence::Competence,
    person::{ApplicationStatus, NewPerson, Person, Role},
};
use crate::utils::time;

/// Competences seeded by the initial migration.
const DEFAULT_COMPETENCES: [&str; 3] = ["ticket sales", "lotteries", "roller coaster operation"];

struct StoreData {
    persons: BTreeMap<i32, Person>,
    competences: BTreeMap<i32, String>,
    expertise: BTreeMap<i32, Vec<ExpertiseEntry>>,
    availability: BTreeMap<i32, Vec<AvailabilityPeriod>>,
    next_person_id: i32,
    next_competence_id: i32,
}

impl StoreData {
    fn new() -> Self {
        Self {
            persons: BTreeMap::new(),
            competences: BTreeMap::new(),
            expertise: BTreeMap::new(),
            availability: BTreeMap::new(),
            next_person_id: 1,
            next_competence_id: 1,
        }
    }

    fn add_competence(&mut self, name: &str) -> Competence {
        let competence_id = self.next_competence_id;
        self.next_competence_id += 1;
        self.competences.insert(competence_id, name.to_string());
        Competence {
            competence_id,
            name: name.to_string(),
        }
    }

    fn has_application(person: &Person) -> bool {
        person.role == Role::Applicant && person.status != ApplicationStatus::Unsent
    }

    fn summary(&self, person: &Person) -> ApplicationSummary {
        let mut competences: Vec<CompetenceExperience> = self
            .expertise
            .get(&person.person_id)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| CompetenceExperience {
                        competence_id: e.competence_id,
                        name: self.competences.get(&e.competence_id).cloned().unwrap_or_default(),
                        years_of_experience: e.years_of_experience,
                    })
                    .collect()
            })
            .unwrap_or_default();
        competences.sort_by(|a, b| a.name.cmp(&b.name));

        let mut availability = self
            .availability
            .get(&person.person_id)
            .cloned()
            .unwrap_or_default();
        availability.sort_by_key(|p| p.from_date);

        ApplicationSummary {
            application_id: person.person_id,
            name: person.first_name.clone(),
            surname: person.last_name.clone(),
            email: person.email.clone(),
            application_status: person.status,
            competences,
            availability,
            last_updated: person.last_updated,
        }
    }
}

/// In-process store used by the test suite and `DATABASE_URL=memory` runs.
///
/// Every operation holds the single lock for its whole duration, which makes
/// each compare-and-write atomic.
pub struct MemoryStore {
    data: TokioMutex<StoreData>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Empty store seeded with the default competences.
    pub fn new() -> Self {
        let mut data = StoreData::new();
        for name in DEFAULT_COMPETENCES {
            data.add_competence(name);
        }
        Self {
            data: TokioMutex::new(data),
        }
    }

    /// Overwrites a stored `last_updated`, for seeding fixtures at a known version.
    pub async fn seed_last_updated(&self, person_id: i32, at: DateTime<Utc>) -> bool {
        let mut data = self.data.lock().await;
        match data.persons.get_mut(&person_id) {
            Some(person) => {
                person.last_updated = at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl PersonStore for MemoryStore {
    async fn find_by_id(&self, person_id: i32) -> StoreResult<Option<Person>> {
        Ok(self.data.lock().await.persons.get(&person_id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Person>> {
        let data = self.data.lock().await;
        Ok(data.persons.values().find(|p| p.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Person>> {
        let data = self.data.lock().await;
        Ok(data.persons.values().find(|p| p.email == email).cloned())
    }

    async fn find_by_personal_number(&self, personal_number: &str) -> StoreResult<Option<Person>> {
        let data = self.data.lock().await;
        Ok(data
            .persons
            .values()
            .find(|p| p.personal_number == personal_number)
            .cloned())
    }

    async fn create_person(&self, person: NewPerson) -> StoreResult<Person> {
        let mut data = self.data.lock().await;
        for existing in data.persons.values() {
            if existing.username == person.username {
                return Err(StoreError::Duplicate(DuplicateField::Username));
            }
            if existing.email == person.email {
                return Err(StoreError::Duplicate(DuplicateField::Email));
            }
            if existing.personal_number == person.personal_number {
                return Err(StoreError::Duplicate(DuplicateField::PersonalNumber));
            }
        }

        let person_id = data.next_person_id;
        data.next_person_id += 1;
        let stored = Person {
            person_id,
            first_name: person.first_name,
            last_name: person.last_name,
            personal_number: person.personal_number,
            email: person.email,
            username: person.username,
            password_hash: person.password_hash,
            role: person.role,
            status: ApplicationStatus::Unsent,
            last_updated: time::now(),
        };
        data.persons.insert(person_id, stored.clone());
        debug!(person_id, "Person created in memory store");
        Ok(stored)
    }

    async fn update_credentials(
        &self,
        person_id: i32,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> StoreResult<CredentialUpdate> {
        let mut data = self.data.lock().await;
        let taken = data
            .persons
            .values()
            .any(|p| p.username == username && p.email != email);

        let Some(person) = data
            .persons
            .get_mut(&person_id)
            .filter(|p| p.email == email)
        else {
            return Ok(CredentialUpdate::Missing);
        };
        if taken {
            return Ok(CredentialUpdate::UsernameTaken);
        }

        person.username = username.to_string();
        person.password_hash = password_hash.to_string();
        Ok(CredentialUpdate::Applied)
    }

    async fn list_applications(&self) -> StoreResult<Vec<ApplicationSummary>> {
        let data = self.data.lock().await;
        Ok(data
            .persons
            .values()
            .filter(|p| StoreData::has_application(p))
            .map(|p| data.summary(p))
            .collect())
    }

    async fn find_application(&self, person_id: i32) -> StoreResult<Option<ApplicationSummary>> {
        let data = self.data.lock().await;
        Ok(data
            .persons
            .get(&person_id)
            .filter(|p| StoreData::has_application(p))
            .map(|p| data.summary(p)))
    }

    async fn update_status_if_unchanged(
        &self,
        application_id: i32,
        status: ApplicationStatus,
        observed: DateTime<Utc>,
    ) -> StoreResult<ConditionalUpdate> {
        let mut data = self.data.lock().await;
        let Some(person) = data
            .persons
            .get_mut(&application_id)
            .filter(|p| StoreData::has_application(p))
        else {
            return Ok(ConditionalUpdate::Missing);
        };

        if person.last_updated != observed {
            return Ok(ConditionalUpdate::Stale);
        }

        person.status = status;
        person.last_updated = time::next_version(person.last_updated, time::now());
        Ok(ConditionalUpdate::Applied(person.last_updated))
    }

    async fn submit_application(&self, submission: &ApplicationSubmission) -> StoreResult<SubmitOutcome> {
        let mut data = self.data.lock().await;

        if let Some(unknown) = submission
            .expertise
            .iter()
            .find(|e| !data.competences.contains_key(&e.competence_id))
        {
            return Err(StoreError::ForeignKey(format!(
                "Competence {} does not exist",
                unknown.competence_id
            )));
        }

        let Some(person) = data
            .persons
            .get_mut(&submission.person_id)
            .filter(|p| p.role == Role::Applicant)
        else {
            return Ok(SubmitOutcome::Missing);
        };
        if person.status != ApplicationStatus::Unsent {
            return Ok(SubmitOutcome::AlreadySubmitted);
        }

        person.status = ApplicationStatus::Unhandled;
        person.last_updated = time::next_version(person.last_updated, time::now());
        let last_updated = person.last_updated;

        data.expertise
            .insert(submission.person_id, submission.expertise.clone());
        data.availability
            .insert(submission.person_id, submission.availability.clone());
        Ok(SubmitOutcome::Submitted(last_updated))
    }

    async fn list_competences(&self) -> StoreResult<Vec<Competence>> {
        let data = self.data.lock().await;
        Ok(data
            .competences
            .iter()
            .map(|(id, name)| Competence {
                competence_id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn list_stored_passwords(&self) -> StoreResult<Vec<(i32, String)>> {
        let data = self.data.lock().await;
        Ok(data
            .persons
            .values()
            .map(|p| (p.person_id, p.password_hash.clone()))
            .collect())
    }

    async fn set_password_hash(&self, person_id: i32, password_hash: &str) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        if let Some(person) = data.persons.get_mut(&person_id) {
            person.password_hash = password_hash.to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn applicant(n: u32) -> NewPerson {
        NewPerson {
            first_name: format!("First{}", n),
            last_name: "Tester".into(),
            personal_number: format!("19900101-{:04}", n),
            email: format!("applicant{}@example.com", n),
            username: format!("applicant{}", n),
            password_hash: "hash".into(),
            role: Role::Applicant,
        }
    }

    fn submission(person_id: i32) -> ApplicationSubmission {
        let from = NaiveDate::from_ymd_opt(2030, 6, 1).unwrap();
        ApplicationSubmission {
            person_id,
            expertise: vec![ExpertiseEntry {
                competence_id: 1,
                years_of_experience: 2.5,
            }],
            availability: vec![AvailabilityPeriod {
                from_date: from,
                to_date: from + Duration::days(30),
            }],
        }
    }

    #[tokio::test]
    async fn duplicates_are_reported_per_field() {
        let store = MemoryStore::new();
        store.create_person(applicant(1)).await.unwrap();

        let mut same_email = applicant(2);
        same_email.email = "applicant1@example.com".into();
        assert!(matches!(
            store.create_person(same_email).await,
            Err(StoreError::Duplicate(DuplicateField::Email))
        ));

        let mut same_pnr = applicant(3);
        same_pnr.personal_number = "19900101-0001".into();
        assert!(matches!(
            store.create_person(same_pnr).await,
            Err(StoreError::Duplicate(DuplicateField::PersonalNumber))
        ));
    }

    #[tokio::test]
    async fn unsent_applicants_have_no_application() {
        let store = MemoryStore::new();
        let person = store.create_person(applicant(1)).await.unwrap();

        assert!(store.list_applications().await.unwrap().is_empty());
        let outcome = store
            .update_status_if_unchanged(person.person_id, ApplicationStatus::Accepted, person.last_updated)
            .await
            .unwrap();
        assert_eq!(outcome, ConditionalUpdate::Missing);
    }

    #[tokio::test]
    async fn conditional_update_detects_stale_snapshot() {
        let store = MemoryStore::new();
        let person = store.create_person(applicant(1)).await.unwrap();
        store.submit_application(&submission(person.person_id)).await.unwrap();

        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(store.seed_last_updated(person.person_id, t0).await);

        let first = store
            .update_status_if_unchanged(person.person_id, ApplicationStatus::Accepted, t0)
            .await
            .unwrap();
        let ConditionalUpdate::Applied(t1) = first else {
            panic!("expected applied, got {:?}", first);
        };
        assert!(t1 > t0);

        let second = store
            .update_status_if_unchanged(person.person_id, ApplicationStatus::Rejected, t0)
            .await
            .unwrap();
        assert_eq!(second, ConditionalUpdate::Stale);

        let summary = store.find_application(person.person_id).await.unwrap().unwrap();
        assert_eq!(summary.application_status, ApplicationStatus::Accepted);
        assert_eq!(summary.last_updated, t1);
    }

    #[tokio::test]
    async fn second_submission_is_refused() {
        let store = MemoryStore::new();
        let person = store.create_person(applicant(1)).await.unwrap();
        assert!(matches!(
            store.submit_application(&submission(person.person_id)).await.unwrap(),
            SubmitOutcome::Submitted(_)
        ));
        assert_eq!(
            store.submit_application(&submission(person.person_id)).await.unwrap(),
            SubmitOutcome::AlreadySubmitted
        );
    }

    #[tokio::test]
    async fn unknown_competence_is_rejected_without_changes() {
        let store = MemoryStore::new();
        let person = store.create_person(applicant(1)).await.unwrap();
        let mut bad = submission(person.person_id);
        bad.expertise[0].competence_id = 999;

        assert!(matches!(
            store.submit_application(&bad).await,
            Err(StoreError::ForeignKey(_))
        ));
        let stored = store.find_by_id(person.person_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Unsent);
    }

    #[tokio::test]
    async fn credentials_update_keeps_own_username() {
        let store = MemoryStore::new();
        let first = store.create_person(applicant(1)).await.unwrap();
        store.create_person(applicant(2)).await.unwrap();

        let taken = store
            .update_credentials(first.person_id, &first.email, "applicant2", "new")
            .await
            .unwrap();
        assert_eq!(taken, CredentialUpdate::UsernameTaken);

        let own = store
            .update_credentials(first.person_id, &first.email, "applicant1", "new")
            .await
            .unwrap();
        assert_eq!(own, CredentialUpdate::Applied);

        let wrong_email = store
            .update_credentials(first.person_id, "someone@else.com", "fresh", "new")
            .await
            .unwrap();
        assert_eq!(wrong_email, CredentialUpdate::Missing);
    }
}
