//! Runs against a disposable Postgres database:
//! `DATABASE_URL=postgres://... cargo test --test pg_status_update_test -- --ignored`

use std::sync::Arc;

use chrono::{Duration, Utc};
use hireflow_backend::{
    database::pool::run_migrations,
    models::{
        application::{ApplicationSubmission, AvailabilityPeriod, ExpertiseEntry},
        person::{ApplicationStatus, NewPerson, Role},
    },
    store::{ConditionalUpdate, PersonStore, PgStore, SubmitOutcome},
};
use sqlx::postgres::PgPoolOptions;

async fn store() -> Arc<PgStore> {
    dotenvy::dotenv().ok();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
    let pool = PgPoolOptions::new()
        .max_connections(16)
        .connect(&url)
        .await
        .expect("pool");
    run_migrations(&pool).await.expect("migrations");
    Arc::new(PgStore::new(pool))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn one_of_many_conditional_updates_wins() {
    let store = store().await;
    let suffix = Utc::now().timestamp_micros() % 10_000;
    let person = store
        .create_person(NewPerson {
            first_name: "Pg".into(),
            last_name: "Race".into(),
            personal_number: format!("19990909-{:04}", suffix),
            email: format!("pg-race-{}@example.com", suffix),
            username: format!("pg-race-{}", suffix),
            password_hash: "unused".into(),
            role: Role::Applicant,
        })
        .await
        .expect("create person");

    let competence = store.list_competences().await.unwrap()[0].competence_id;
    let from = Utc::now().date_naive() + Duration::days(1);
    let outcome = store
        .submit_application(&ApplicationSubmission {
            person_id: person.person_id,
            expertise: vec![ExpertiseEntry {
                competence_id: competence,
                years_of_experience: 3.0,
            }],
            availability: vec![AvailabilityPeriod {
                from_date: from,
                to_date: from,
            }],
        })
        .await
        .unwrap();
    let SubmitOutcome::Submitted(observed) = outcome else {
        panic!("submission refused: {:?}", outcome);
    };

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        let id = person.person_id;
        handles.push(tokio::spawn(async move {
            store
                .update_status_if_unchanged(id, ApplicationStatus::Accepted, observed)
                .await
                .unwrap()
        }));
    }

    let mut applied = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            ConditionalUpdate::Applied(at) => applied.push(at),
            ConditionalUpdate::Stale => {}
            ConditionalUpdate::Missing => panic!("application vanished"),
        }
    }
    assert_eq!(applied.len(), 1);
    assert!(applied[0] > observed);

    let stored = store.find_application(person.person_id).await.unwrap().unwrap();
    assert_eq!(stored.application_status, ApplicationStatus::Accepted);
    assert_eq!(stored.last_updated, applied[0]);
}
