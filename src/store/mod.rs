//! Persistence seam for persons, applications and competences.
//!
//! `PgStore` is the production implementation. `MemoryStore` keeps everything in
//! process and backs the test suite and `DATABASE_URL=memory` runs.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use crate::models::{
    application::{ApplicationSubmission, ApplicationSummary},
    competence::Competence,
    person::{ApplicationStatus, NewPerson, Person},
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Column protected by a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Username,
    Email,
    PersonalNumber,
}

impl fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DuplicateField::Username => "Username",
            DuplicateField::Email => "Email",
            DuplicateField::PersonalNumber => "Personal number",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate {0}")]
    Duplicate(DuplicateField),

    #[error("{0}")]
    ForeignKey(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of the conditional status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalUpdate {
    Applied(DateTime<Utc>),
    /// The row exists but its `last_updated` differs from the caller's snapshot.
    Stale,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialUpdate {
    Applied,
    UsernameTaken,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(DateTime<Utc>),
    AlreadySubmitted,
    Missing,
}

#[async_trait]
pub trait PersonStore: Send + Sync {
    async fn find_by_id(&self, person_id: i32) -> StoreResult<Option<Person>>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Person>>;

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Person>>;

    async fn find_by_personal_number(&self, personal_number: &str) -> StoreResult<Option<Person>>;

    async fn create_person(&self, person: NewPerson) -> StoreResult<Person>;

    /// Replaces username and password hash of the person identified by both
    /// `person_id` and `email`, in one atomic step. A username held by another
    /// person yields `UsernameTaken` and changes nothing.
    async fn update_credentials(
        &self,
        person_id: i32,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> StoreResult<CredentialUpdate>;

    async fn list_applications(&self) -> StoreResult<Vec<ApplicationSummary>>;

    async fn find_application(&self, person_id: i32) -> StoreResult<Option<ApplicationSummary>>;

    /// Sets `status` and bumps `last_updated` only if the stored `last_updated`
    /// still equals `observed`. Compare and write happen as one atomic step.
    async fn update_status_if_unchanged(
        &self,
        application_id: i32,
        status: ApplicationStatus,
        observed: DateTime<Utc>,
    ) -> StoreResult<ConditionalUpdate>;

    /// Stores expertise and availability rows and moves the applicant from
    /// `unsent` to `unhandled`, all or nothing.
    async fn submit_application(&self, submission: &ApplicationSubmission) -> StoreResult<SubmitOutcome>;

    async fn list_competences(&self) -> StoreResult<Vec<Competence>>;

    /// `(person_id, stored password value)` for every person.
    async fn list_stored_passwords(&self) -> StoreResult<Vec<(i32, String)>>;

    async fn set_password_hash(&self, person_id: i32, password_hash: &str) -> StoreResult<()>;
}
