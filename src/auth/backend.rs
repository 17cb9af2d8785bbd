use crate::{
    auth::SignInValidationError,
    config::AdminCredentials,
    error::{BcryptSnafu, JoinBlockingSnafu, PortalError, PortalResult},
};
use async_trait::async_trait;
use axum_login::{AuthUser, AuthnBackend, UserId};
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use std::sync::Arc;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

/// The one account allowed into the portal.
#[derive(Clone)]
pub struct AdminUser {
    pub username: String,
    bcrypt_hashed_password: Arc<str>,
}

impl std::fmt::Debug for AdminUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminUser")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl AuthUser for AdminUser {
    type Id = String;

    fn id(&self) -> Self::Id {
        self.username.clone()
    }

    fn session_auth_hash(&self) -> &[u8] {
        self.bcrypt_hashed_password.as_bytes()
    }
}

#[derive(Clone)]
pub struct PortalAuthCredentials {
    pub username: String,
    pub password: SecretString,
}

#[derive(Clone, Debug)]
pub struct PortalAuthBackend {
    admin: AdminUser,
}

impl PortalAuthBackend {
    /// Hashes the configured password once so it never sits around in plain text afterwards.
    pub fn new(credentials: &AdminCredentials) -> PortalResult<Self> {
        let hashed = bcrypt::hash(credentials.password.expose_secret(), HASH_COST)
            .context(BcryptSnafu)?;

        Ok(Self {
            admin: AdminUser {
                username: credentials.user.clone(),
                bcrypt_hashed_password: hashed.into(),
            },
        })
    }

    /// Which fields of the attempt are wrong. Each field is judged on its own.
    pub async fn judge(&self, creds: &PortalAuthCredentials) -> PortalResult<SignInValidationError> {
        let mut errors = SignInValidationError::empty();

        if creds.username != self.admin.username {
            errors |= SignInValidationError::USER_WRONG;
        }

        let password = creds.password.clone();
        let hash = self.admin.bcrypt_hashed_password.clone();
        let password_matches =
            tokio::task::spawn_blocking(move || bcrypt::verify(password.expose_secret(), &hash))
                .await
                .context(JoinBlockingSnafu)?
                .context(BcryptSnafu)?;
        if !password_matches {
            errors |= SignInValidationError::PASSWORD_WRONG;
        }

        Ok(errors)
    }
}

#[async_trait]
impl AuthnBackend for PortalAuthBackend {
    type User = AdminUser;
    type Credentials = PortalAuthCredentials;
    type Error = PortalError;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> Result<Option<Self::User>, Self::Error> {
        Ok(if self.judge(&creds).await?.is_empty() {
            Some(self.admin.clone())
        } else {
            None
        })
    }

    async fn get_user(&self, user_id: &UserId<Self>) -> Result<Option<Self::User>, Self::Error> {
        Ok((*user_id == self.admin.username).then(|| self.admin.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> PortalAuthBackend {
        PortalAuthBackend::new(&AdminCredentials {
            user: "admin".into(),
            password: SecretString::from("admin"),
        })
        .unwrap()
    }

    fn creds(username: &str, password: &str) -> PortalAuthCredentials {
        PortalAuthCredentials {
            username: username.into(),
            password: SecretString::from(password),
        }
    }

    #[tokio::test]
    async fn only_the_configured_pair_signs_in() {
        let backend = backend();

        let user = backend.authenticate(creds("admin", "admin")).await.unwrap();
        assert_eq!(user.map(|u| u.username), Some("admin".to_string()));

        assert!(backend.authenticate(creds("admin", "nimda")).await.unwrap().is_none());
        assert!(backend.authenticate(creds("root", "admin")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn each_field_is_judged_independently() {
        let backend = backend();

        assert_eq!(
            backend.judge(&creds("root", "admin")).await.unwrap(),
            SignInValidationError::USER_WRONG
        );
        assert_eq!(
            backend.judge(&creds("admin", "x")).await.unwrap(),
            SignInValidationError::PASSWORD_WRONG
        );
        assert_eq!(
            backend.judge(&creds("root", "x")).await.unwrap(),
            SignInValidationError::USER_WRONG | SignInValidationError::PASSWORD_WRONG
        );
    }

    #[tokio::test]
    async fn sessions_resolve_back_to_the_admin() {
        let backend = backend();
        assert!(backend.get_user(&"admin".to_string()).await.unwrap().is_some());
        assert!(backend.get_user(&"someone".to_string()).await.unwrap().is_none());
    }
}
