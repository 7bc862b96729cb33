use std::sync::Arc;
use tracing::{info, warn};

use crate::dto::auth_dto::{
    LoginRequest, LoginResponse, LoginUser, MessageResponse, SignupRequest, SignupResponse,
    VerifyPersonNumberRequest,
};
use crate::error::{codes, Error, Result};
use crate::models::person::{NewPerson, Role};
use crate::services::token_service::TokenService;
use crate::store::PersonStore;
use crate::utils::{crypto, validation};

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn PersonStore>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(store: Arc<dyn PersonStore>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse> {
        let username = validation::non_blank(&req.username);
        let password = req.password.as_deref().filter(|p| !p.is_empty());
        let (Some(username), Some(password)) = (username, password) else {
            return Err(Error::BadRequest(
                codes::MISSING_CREDENTIALS,
                "Username and password are required".to_string(),
            ));
        };

        let Some(person) = self.store.find_by_username(username).await? else {
            info!(%username, "Login rejected, unknown username");
            return Err(invalid_credentials());
        };

        if !crypto::is_password_hash(&person.password_hash) {
            return Err(Error::Security(format!(
                "person {} has an unhashed password on record",
                person.person_id
            )));
        }

        let matches =
            crypto::verify_password_off_thread(password.to_string(), person.password_hash.clone())
                .await?;
        if !matches {
            info!(person_id = person.person_id, "Login rejected, wrong password");
            return Err(invalid_credentials());
        }

        let extended = req.remember_me.unwrap_or(false);
        let token = self
            .tokens
            .issue_session_token(person.person_id, person.role, extended)
            .map_err(|e| Error::Internal(format!("token signing failed: {}", e)))?;

        info!(person_id = person.person_id, role = %person.role, extended, "Login successful");
        Ok(LoginResponse {
            success: true,
            message: "Login successful".to_string(),
            token,
            user: LoginUser {
                application_status: person.application_status(),
                username: person.username,
                person_id: person.person_id,
                role: person.role,
            },
        })
    }

    /// Registers a new applicant and logs them in.
    pub async fn signup(&self, req: SignupRequest) -> Result<SignupResponse> {
        let fields = (
            validation::non_blank(&req.first_name),
            validation::non_blank(&req.last_name),
            validation::non_blank(&req.email),
            validation::non_blank(&req.person_number),
            validation::non_blank(&req.username),
            req.password.as_deref().filter(|p| !p.is_empty()),
        );
        let (Some(first_name), Some(last_name), Some(email), Some(person_number), Some(username), Some(password)) =
            fields
        else {
            return Err(Error::BadRequest(
                codes::MISSING_FIELDS,
                "All fields are required".to_string(),
            ));
        };

        validation::validate(&req)?;

        let email = validation::normalize_email(email);
        if !validation::is_valid_email(&email) {
            return Err(Error::bad_request("Invalid email format"));
        }
        let Some(personal_number) = validation::normalize_personal_number(person_number) else {
            return Err(Error::bad_request(
                "Invalid person number, expected yyyyMMdd-xxxx",
            ));
        };

        if self.store.find_by_username(username).await?.is_some() {
            return Err(Error::Conflict(
                codes::USERNAME_TAKEN,
                "Username is already taken".to_string(),
            ));
        }

        let password_hash = crypto::hash_password_off_thread(password.to_string()).await?;
        let person = self
            .store
            .create_person(NewPerson {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                personal_number,
                email,
                username: username.to_string(),
                password_hash,
                role: Role::Applicant,
            })
            .await?;

        let token = self
            .tokens
            .issue_session_token(person.person_id, person.role, false)
            .map_err(|e| Error::Internal(format!("token signing failed: {}", e)))?;

        info!(person_id = person.person_id, "Applicant registered");
        Ok(SignupResponse {
            success: true,
            message: "User created successfully".to_string(),
            user_id: person.person_id,
            token,
        })
    }

    pub async fn verify_personal_number(&self, req: VerifyPersonNumberRequest) -> Result<MessageResponse> {
        let Some(personal_number) = validation::non_blank(&req.person_number)
            .and_then(validation::normalize_personal_number)
        else {
            return Err(Error::BadRequest(
                codes::INVALID_FORMAT,
                "Invalid person number format".to_string(),
            ));
        };

        match self.store.find_by_personal_number(&personal_number).await? {
            Some(_) => Ok(MessageResponse::ok("Person number verified")),
            None => {
                warn!("Person number lookup found no match");
                Err(Error::NotFound(
                    codes::NOT_FOUND,
                    "Person number not found".to_string(),
                ))
            }
        }
    }
}

fn invalid_credentials() -> Error {
    Error::Unauthorized(codes::INVALID_CREDENTIALS, "Invalid credentials".to_string())
}
