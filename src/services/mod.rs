pub mod application_service;
pub mod auth_service;
pub mod mail_service;
pub mod password_migration;
pub mod restore_service;
pub mod token_service;
