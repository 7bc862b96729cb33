#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::Value as JsonValue;
use tower::ServiceExt;
use url::Url;

use hireflow_backend::{
    config::Config,
    models::{
        application::{ApplicationSubmission, AvailabilityPeriod, ExpertiseEntry},
        person::{NewPerson, Person, Role},
    },
    routes,
    services::{mail_service::LogMailer, token_service::TokenService},
    store::{MemoryStore, PersonStore},
    utils::crypto,
    AppState,
};

pub const SECRET: &str = "integration-test-secret-0123456789";
pub const PASSWORD: &str = "LiZ98qvL8Lw";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub tokens: TokenService,
}

pub fn test_config(auth_rps: u32) -> Config {
    Config {
        server_address: "127.0.0.1:0".into(),
        database_url: "memory".into(),
        jwt_secret: SECRET.into(),
        frontend_url: Url::parse("http://localhost:5173").unwrap(),
        auth_rps,
        mail_webhook_url: None,
        database_max_connections: 1,
    }
}

pub fn app_with_rps(auth_rps: u32) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(test_config(auth_rps), store.clone(), Arc::new(LogMailer));
    TestApp {
        router: routes::router(state),
        store,
        tokens: TokenService::new(SECRET),
    }
}

pub fn app() -> TestApp {
    app_with_rps(10_000)
}

impl TestApp {
    pub async fn send(&self, req: Request<Body>) -> (StatusCode, JsonValue) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    /// Stores a person directly, bypassing signup. `n` keeps unique columns apart.
    pub async fn person(&self, n: u32, role: Role) -> Person {
        self.store
            .create_person(NewPerson {
                first_name: format!("First{}", n),
                last_name: format!("Last{}", n),
                personal_number: format!("19900101-{:04}", n),
                email: format!("person{}@example.com", n),
                username: format!("user{}", n),
                password_hash: crypto::hash_password(PASSWORD).unwrap(),
                role,
            })
            .await
            .unwrap()
    }

    pub async fn submitted_applicant(&self, n: u32) -> Person {
        let person = self.person(n, Role::Applicant).await;
        let from = Utc::now().date_naive() + Duration::days(7);
        self.store
            .submit_application(&ApplicationSubmission {
                person_id: person.person_id,
                expertise: vec![ExpertiseEntry {
                    competence_id: 1,
                    years_of_experience: 2.0,
                }],
                availability: vec![AvailabilityPeriod {
                    from_date: from,
                    to_date: from + Duration::days(30),
                }],
            })
            .await
            .unwrap();
        person
    }

    pub fn session(&self, person: &Person) -> String {
        self.tokens
            .issue_session_token(person.person_id, person.role, false)
            .unwrap()
    }
}

pub fn post_json(uri: &str, body: JsonValue, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}
