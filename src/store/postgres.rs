use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};

use super::{
    ConditionalUpdate, CredentialUpdate, DuplicateField, PersonStore, StoreError, StoreResult,
    SubmitOutcome,
};
use crate::models::{
    application::{ApplicationSubmission, ApplicationSummary, AvailabilityPeriod, CompetenceExperience},
    competence::Competence,
    person::{ApplicationStatus, NewPerson, Person, Role},
};

const PERSON_COLUMNS: &str =
    "person_id, name, surname, pnr, email, username, password, role_id, status, last_updated";

const APPLICATION_COLUMNS: &str =
    "application_id, name, surname, email, application_status, competences, availability, last_updated";

// Strictly later than the previous value even if the clock stalls or steps back.
const NEXT_VERSION: &str =
    "GREATEST(clock_timestamp(), last_updated + INTERVAL '1 microsecond')";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_person_where(&self, column: &str, value: &str) -> StoreResult<Option<Person>> {
        let sql = format!("SELECT {} FROM person WHERE {} = $1", PERSON_COLUMNS, column);
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(person_from_row).transpose()
    }
}

fn parse_status(raw: &str) -> StoreResult<ApplicationStatus> {
    raw.parse::<ApplicationStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn person_from_row(row: &PgRow) -> StoreResult<Person> {
    let role_id: i32 = row.try_get("role_id")?;
    let status: String = row.try_get("status")?;
    Ok(Person {
        person_id: row.try_get("person_id")?,
        first_name: row.try_get("name")?,
        last_name: row.try_get("surname")?,
        personal_number: row.try_get("pnr")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password")?,
        role: Role::try_from(role_id).map_err(|e| StoreError::Corrupt(e.to_string()))?,
        status: parse_status(&status)?,
        last_updated: row.try_get("last_updated")?,
    })
}

fn application_from_row(row: &PgRow) -> StoreResult<ApplicationSummary> {
    let status: String = row.try_get("application_status")?;
    let Json(competences): Json<Vec<CompetenceExperience>> = row.try_get("competences")?;
    let Json(availability): Json<Vec<AvailabilityPeriod>> = row.try_get("availability")?;
    Ok(ApplicationSummary {
        application_id: row.try_get("application_id")?,
        name: row.try_get("name")?,
        surname: row.try_get("surname")?,
        email: row.try_get("email")?,
        application_status: parse_status(&status)?,
        competences,
        availability,
        last_updated: row.try_get("last_updated")?,
    })
}

/// Maps constraint violations onto typed store errors.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(c) if c.contains("username") => Some(DuplicateField::Username),
                Some(c) if c.contains("email") => Some(DuplicateField::Email),
                Some(c) if c.contains("pnr") => Some(DuplicateField::PersonalNumber),
                _ => None,
            };
            if let Some(field) = field {
                return StoreError::Duplicate(field);
            }
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::ForeignKey("Referenced competence does not exist".to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl PersonStore for PgStore {
    async fn find_by_id(&self, person_id: i32) -> StoreResult<Option<Person>> {
        let sql = format!("SELECT {} FROM person WHERE person_id = $1", PERSON_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(person_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(person_from_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Person>> {
        self.find_person_where("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Person>> {
        self.find_person_where("email", email).await
    }

    async fn find_by_personal_number(&self, personal_number: &str) -> StoreResult<Option<Person>> {
        self.find_person_where("pnr", personal_number).await
    }

    async fn create_person(&self, person: NewPerson) -> StoreResult<Person> {
        let sql = format!(
            r#"
            INSERT INTO person (name, surname, email, pnr, username, password, role_id, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'unsent')
            RETURNING {}
            "#,
            PERSON_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&person.first_name)
            .bind(&person.last_name)
            .bind(&person.email)
            .bind(&person.personal_number)
            .bind(&person.username)
            .bind(&person.password_hash)
            .bind(person.role.id())
            .fetch_one(&self.pool)
            .await
            .map_err(classify)?;
        person_from_row(&row)
    }

    async fn update_credentials(
        &self,
        person_id: i32,
        email: &str,
        username: &str,
        password_hash: &str,
    ) -> StoreResult<CredentialUpdate> {
        let mut tx = self.pool.begin().await?;

        let target = sqlx::query("SELECT person_id FROM person WHERE person_id = $1 AND email = $2 FOR UPDATE")
            .bind(person_id)
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
        if target.is_none() {
            return Ok(CredentialUpdate::Missing);
        }

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM person WHERE username = $1 AND email <> $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            return Ok(CredentialUpdate::UsernameTaken);
        }

        let updated = sqlx::query("UPDATE person SET username = $1, password = $2 WHERE person_id = $3")
            .bind(username)
            .bind(password_hash)
            .bind(person_id)
            .execute(&mut *tx)
            .await
            .map_err(classify);

        match updated {
            Ok(_) => {
                tx.commit().await?;
                Ok(CredentialUpdate::Applied)
            }
            // A concurrent restore grabbed the name between the check and the write.
            Err(StoreError::Duplicate(DuplicateField::Username)) => Ok(CredentialUpdate::UsernameTaken),
            Err(other) => Err(other),
        }
    }

    async fn list_applications(&self) -> StoreResult<Vec<ApplicationSummary>> {
        let sql = format!(
            "SELECT {} FROM application_view ORDER BY application_id",
            APPLICATION_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(application_from_row).collect()
    }

    async fn find_application(&self, person_id: i32) -> StoreResult<Option<ApplicationSummary>> {
        let sql = format!(
            "SELECT {} FROM application_view WHERE application_id = $1",
            APPLICATION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(person_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(application_from_row).transpose()
    }

    async fn update_status_if_unchanged(
        &self,
        application_id: i32,
        status: ApplicationStatus,
        observed: DateTime<Utc>,
    ) -> StoreResult<ConditionalUpdate> {
        let sql = format!(
            r#"
            UPDATE person
            SET status = $1, last_updated = {}
            WHERE person_id = $2 AND role_id = $3 AND status <> 'unsent' AND last_updated = $4
            RETURNING last_updated
            "#,
            NEXT_VERSION
        );
        let updated: Option<DateTime<Utc>> = sqlx::query_scalar(&sql)
            .bind(status.as_str())
            .bind(application_id)
            .bind(Role::Applicant.id())
            .bind(observed)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(last_updated) = updated {
            return Ok(ConditionalUpdate::Applied(last_updated));
        }

        // The write already lost; this only decides which failure to report.
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM person WHERE person_id = $1 AND role_id = $2 AND status <> 'unsent')",
        )
        .bind(application_id)
        .bind(Role::Applicant.id())
        .fetch_one(&self.pool)
        .await?;

        Ok(if exists {
            ConditionalUpdate::Stale
        } else {
            ConditionalUpdate::Missing
        })
    }

    async fn submit_application(&self, submission: &ApplicationSubmission) -> StoreResult<SubmitOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> = sqlx::query_scalar(
            "SELECT status FROM person WHERE person_id = $1 AND role_id = $2 FOR UPDATE",
        )
        .bind(submission.person_id)
        .bind(Role::Applicant.id())
        .fetch_optional(&mut *tx)
        .await?;

        match current.as_deref() {
            None => return Ok(SubmitOutcome::Missing),
            Some("unsent") => {}
            Some(_) => return Ok(SubmitOutcome::AlreadySubmitted),
        }

        for entry in &submission.expertise {
            sqlx::query(
                "INSERT INTO competence_profile (person_id, competence_id, years_of_experience) VALUES ($1, $2, $3)",
            )
            .bind(submission.person_id)
            .bind(entry.competence_id)
            .bind(entry.years_of_experience)
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        }

        for period in &submission.availability {
            sqlx::query("INSERT INTO availability (person_id, from_date, to_date) VALUES ($1, $2, $3)")
                .bind(submission.person_id)
                .bind(period.from_date)
                .bind(period.to_date)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }

        let sql = format!(
            "UPDATE person SET status = 'unhandled', last_updated = {} WHERE person_id = $1 RETURNING last_updated",
            NEXT_VERSION
        );
        let last_updated: DateTime<Utc> = sqlx::query_scalar(&sql)
            .bind(submission.person_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(SubmitOutcome::Submitted(last_updated))
    }

    async fn list_competences(&self) -> StoreResult<Vec<Competence>> {
        let competences = sqlx::query_as::<_, Competence>(
            "SELECT competence_id, name FROM competence ORDER BY competence_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(competences)
    }

    async fn list_stored_passwords(&self) -> StoreResult<Vec<(i32, String)>> {
        let rows = sqlx::query_as::<_, (i32, String)>("SELECT person_id, password FROM person ORDER BY person_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn set_password_hash(&self, person_id: i32, password_hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE person SET password = $1 WHERE person_id = $2")
            .bind(password_hash)
            .bind(person_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
