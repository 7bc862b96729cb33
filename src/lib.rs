pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use crate::config::Config;
use crate::services::{
    application_service::ApplicationService, auth_service::AuthService, mail_service::Mailer,
    restore_service::RestoreService, token_service::TokenService,
};
use crate::store::PersonStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: TokenService,
    pub auth_service: AuthService,
    pub restore_service: RestoreService,
    pub application_service: ApplicationService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn PersonStore>, mailer: Arc<dyn Mailer>) -> Self {
        let tokens = TokenService::new(&config.jwt_secret);

        let auth_service = AuthService::new(store.clone(), tokens.clone());
        let restore_service = RestoreService::new(
            store.clone(),
            tokens.clone(),
            mailer,
            config.frontend_url.clone(),
        );
        let application_service = ApplicationService::new(store);

        Self {
            config: Arc::new(config),
            tokens,
            auth_service,
            restore_service,
            application_service,
        }
    }
}
