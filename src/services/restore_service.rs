use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::dto::auth_dto::{
    EmailRequest, MessageResponse, SendUpdateEmailResponse, UpdateCredentialsRequest,
};
use crate::error::{codes, Error, Result};
use crate::models::person::Person;
use crate::services::mail_service::{MailMessage, Mailer};
use crate::services::token_service::{TokenError, TokenService, RESTORE_TTL_MINUTES};
use crate::store::{CredentialUpdate, PersonStore};
use crate::utils::{crypto, validation};

/// Email verification, restore link delivery and credential replacement.
#[derive(Clone)]
pub struct RestoreService {
    store: Arc<dyn PersonStore>,
    tokens: TokenService,
    mailer: Arc<dyn Mailer>,
    frontend_url: Url,
}

impl RestoreService {
    pub fn new(
        store: Arc<dyn PersonStore>,
        tokens: TokenService,
        mailer: Arc<dyn Mailer>,
        frontend_url: Url,
    ) -> Self {
        Self {
            store,
            tokens,
            mailer,
            frontend_url,
        }
    }

    pub async fn verify_email(&self, req: EmailRequest) -> Result<MessageResponse> {
        self.lookup_email(&req).await?;
        Ok(MessageResponse::ok("Email verified"))
    }

    pub async fn send_restore_email(&self, req: EmailRequest) -> Result<SendUpdateEmailResponse> {
        let person = self.lookup_email(&req).await?;

        let token = self
            .tokens
            .issue_restore_token(person.person_id, &person.email)
            .map_err(|e| Error::Internal(format!("token signing failed: {}", e)))?;
        let link = restore_link(&self.frontend_url, &token)?;
        let email_text = format!(
            "Hello {},\n\nUse the link below to choose a new username and password. \
             The link is valid for {} minutes.\n\n{}\n",
            person.first_name, RESTORE_TTL_MINUTES, link
        );

        let message = MailMessage {
            to: person.email.clone(),
            subject: "Update your credentials".to_string(),
            body: email_text.clone(),
        };
        // The link is echoed in the response, so a failed relay does not fail the request.
        if let Err(e) = self.mailer.send(message).await {
            warn!(person_id = person.person_id, error = %e, "Restore mail dispatch failed");
        }

        info!(person_id = person.person_id, "Restore link issued");
        Ok(SendUpdateEmailResponse {
            success: true,
            message: "An email with a link to update your credentials has been sent".to_string(),
            email_text,
        })
    }

    pub async fn update_credentials(&self, req: UpdateCredentialsRequest) -> Result<MessageResponse> {
        let token = validation::non_blank(&req.token);
        let username = validation::non_blank(&req.username);
        let new_password = req.new_password.as_deref().filter(|p| !p.is_empty());
        let (Some(token), Some(username), Some(new_password)) = (token, username, new_password) else {
            return Err(Error::BadRequest(
                codes::MISSING_FIELDS,
                "Token, username and new password are required".to_string(),
            ));
        };

        let grant = self.tokens.verify_restore(token).map_err(|e| match e {
            TokenError::Expired => Error::BadRequest(
                codes::TOKEN_EXPIRED,
                "The restore link has expired. Request a new one.".to_string(),
            ),
            TokenError::Invalid => {
                Error::BadRequest(codes::INVALID_TOKEN, "Invalid restore link".to_string())
            }
        })?;

        // Skip the hashing cost when the answer is already known.
        if let Some(holder) = self.store.find_by_username(username).await? {
            if holder.email != grant.email {
                return Err(username_taken());
            }
        }

        let password_hash = crypto::hash_password_off_thread(new_password.to_string()).await?;
        match self
            .store
            .update_credentials(grant.person_id, &grant.email, username, &password_hash)
            .await?
        {
            CredentialUpdate::Applied => {
                info!(person_id = grant.person_id, "Credentials updated through restore link");
                Ok(MessageResponse::ok("Credentials updated successfully"))
            }
            CredentialUpdate::UsernameTaken => Err(username_taken()),
            CredentialUpdate::Missing => Err(Error::NotFound(
                codes::USER_NOT_FOUND,
                "User not found".to_string(),
            )),
        }
    }

    async fn lookup_email(&self, req: &EmailRequest) -> Result<Person> {
        let email = validation::non_blank(&req.email)
            .map(validation::normalize_email)
            .filter(|e| validation::is_valid_email(e));
        let Some(email) = email else {
            return Err(Error::BadRequest(
                codes::INVALID_FORMAT,
                "Invalid email format".to_string(),
            ));
        };

        self.store
            .find_by_email(&email)
            .await?
            .ok_or_else(|| Error::NotFound(codes::EMAIL_NOT_FOUND, "Email not found".to_string()))
    }
}

fn username_taken() -> Error {
    Error::Conflict(codes::USERNAME_TAKEN, "Username is already taken".to_string())
}

/// `<frontend>/update-credentials?token=<token>`, keeping any base path of the frontend.
pub fn restore_link(frontend: &Url, token: &str) -> Result<Url> {
    let mut link = frontend.clone();
    link.set_query(None);
    link.set_fragment(None);
    link.path_segments_mut()
        .map_err(|_| Error::Config("FRONTEND_URL cannot serve as a base URL".to_string()))?
        .pop_if_empty()
        .push("update-credentials");
    link.query_pairs_mut().append_pair("token", token);
    Ok(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::person::{NewPerson, Role};
    use crate::services::mail_service::MockMailer;
    use crate::store::MemoryStore;

    const SECRET: &str = "unit-test-secret-0123456789";

    async fn store_with_person() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .create_person(NewPerson {
                first_name: "Leroy".into(),
                last_name: "Crane".into(),
                personal_number: "19710307-2168".into(),
                email: "l_crane118@finnsinte.se".into(),
                username: "leroy".into(),
                password_hash: crypto::hash_password("old-password").unwrap(),
                role: Role::Applicant,
            })
            .await
            .unwrap();
        store
    }

    fn service(store: Arc<MemoryStore>, mailer: MockMailer) -> RestoreService {
        RestoreService::new(
            store,
            TokenService::new(SECRET),
            Arc::new(mailer),
            Url::parse("http://localhost:5173").unwrap(),
        )
    }

    fn email(value: &str) -> EmailRequest {
        EmailRequest {
            email: Some(value.into()),
        }
    }

    #[test]
    fn link_keeps_frontend_base_path() {
        let root = restore_link(&Url::parse("http://localhost:5173").unwrap(), "abc").unwrap();
        assert_eq!(root.as_str(), "http://localhost:5173/update-credentials?token=abc");

        let nested = restore_link(&Url::parse("https://hire.example/app/").unwrap(), "a.b").unwrap();
        assert_eq!(nested.as_str(), "https://hire.example/app/update-credentials?token=a.b");
    }

    #[tokio::test]
    async fn restore_mail_carries_link() {
        let store = store_with_person().await;
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|m| {
                m.to == "l_crane118@finnsinte.se"
                    && m.body.contains("http://localhost:5173/update-credentials?token=")
            })
            .times(1)
            .returning(|_| Ok(()));

        let resp = service(store, mailer)
            .send_restore_email(email("L_Crane118@finnsinte.se"))
            .await
            .unwrap();
        assert!(resp.email_text.contains("update-credentials?token="));
    }

    #[tokio::test]
    async fn relay_failure_still_returns_link() {
        let store = store_with_person().await;
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(1)
            .returning(|_| Err(Error::Internal("relay down".into())));

        let resp = service(store, mailer)
            .send_restore_email(email("l_crane118@finnsinte.se"))
            .await
            .unwrap();
        assert!(resp.success);
    }

    #[tokio::test]
    async fn unknown_or_malformed_email() {
        let store = store_with_person().await;
        let mut mailer = MockMailer::new();
        mailer.expect_send().never();
        let svc = service(store, mailer);

        let missing = svc.verify_email(email("nobody@example.com")).await.unwrap_err();
        assert_eq!(missing.code(), codes::EMAIL_NOT_FOUND);
        let malformed = svc.send_restore_email(email("not-an-email")).await.unwrap_err();
        assert_eq!(malformed.code(), codes::INVALID_FORMAT);
    }

    #[tokio::test]
    async fn session_token_cannot_restore() {
        let store = store_with_person().await;
        let svc = service(store, MockMailer::new());
        let session = TokenService::new(SECRET)
            .issue_session_token(1, Role::Applicant, false)
            .unwrap();

        let err = svc
            .update_credentials(UpdateCredentialsRequest {
                token: Some(session),
                username: Some("fresh".into()),
                new_password: Some("new-password".into()),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_TOKEN);
    }
}
