pub mod application;
pub mod competence;
pub mod person;
