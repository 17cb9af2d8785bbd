use crate::auth::backend::PortalAuthBackend;
use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_login::AuthSession;
use bitflags::bitflags;
use reqwest::Url;

pub mod backend;

pub type PortalSession = AuthSession<PortalAuthBackend>;

/// Sessions end after a day without requests.
pub const SESSION_IDLE_SECS: i64 = 24 * 60 * 60;

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct SignInValidationError: u8 {
        const USER_EMPTY =     0b0000_0001;
        const USER_WRONG =     0b0000_0010;
        const PASSWORD_EMPTY = 0b0000_0100;
        const PASSWORD_WRONG = 0b0000_1000;
    }
}

impl SignInValidationError {
    pub fn username_message(self) -> Option<&'static str> {
        if self.contains(Self::USER_EMPTY) {
            Some("Username is required")
        } else if self.contains(Self::USER_WRONG) {
            Some("Wrong user")
        } else {
            None
        }
    }

    pub fn password_message(self) -> Option<&'static str> {
        if self.contains(Self::PASSWORD_EMPTY) {
            Some("Password is required")
        } else if self.contains(Self::PASSWORD_WRONG) {
            Some("Wrong password")
        } else {
            None
        }
    }
}

/// Route guard: `Checking` until the session has been looked at, then one of the other two.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Authorized,
    Unauthorized,
}

impl GuardState {
    /// Presence of a signed-in user is all that counts; expiry is the session layer's job.
    #[must_use]
    pub const fn resolve(self, signed_in: bool) -> Self {
        match (self, signed_in) {
            (Self::Checking, true) => Self::Authorized,
            (Self::Checking, false) => Self::Unauthorized,
            (settled, _) => settled,
        }
    }
}

/// `/login` with its query properly encoded. Empty values are left out.
pub fn login_path(next: Option<&str>, errors: SignInValidationError, username: Option<&str>) -> String {
    let Ok(mut url) = Url::parse("http://portal.invalid/login") else {
        return "/login".to_string();
    };

    {
        let mut query = url.query_pairs_mut();
        if !errors.is_empty() {
            query.append_pair("validation_errors", &errors.bits().to_string());
        }
        if let Some(username) = username.filter(|u| !u.is_empty()) {
            query.append_pair("username", username);
        }
        if let Some(next) = next.filter(|n| !n.is_empty()) {
            query.append_pair("to", next);
        }
    }

    match url.query().filter(|q| !q.is_empty()) {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_string(),
    }
}

fn sign_in_path(request: &Request) -> String {
    let next = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|next| !next.starts_with("/internal"));
    login_path(next, SignInValidationError::empty(), None)
}

pub async fn require_sign_in(session: PortalSession, request: Request, next: Next) -> Response {
    match GuardState::Checking.resolve(session.user.is_some()) {
        GuardState::Authorized => next.run(request).await,
        GuardState::Checking | GuardState::Unauthorized => {
            let to = sign_in_path(&request);
            debug!(?to, "Unauthorised request sent to sign-in");

            // htmx swaps fragments, so it has to be told to leave the page instead
            if request.headers().contains_key("HX-Request") {
                match HeaderValue::from_str(&to) {
                    Ok(location) => (StatusCode::OK, [("HX-Redirect", location)]).into_response(),
                    Err(_) => StatusCode::UNAUTHORIZED.into_response(),
                }
            } else {
                Redirect::to(&to).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_settles_once() {
        assert_eq!(GuardState::Checking.resolve(true), GuardState::Authorized);
        assert_eq!(GuardState::Checking.resolve(false), GuardState::Unauthorized);
        assert_eq!(GuardState::Authorized.resolve(false), GuardState::Authorized);
        assert_eq!(GuardState::Unauthorized.resolve(true), GuardState::Unauthorized);
    }

    #[test]
    fn empty_field_message_beats_wrong_field_message() {
        let errors = SignInValidationError::USER_EMPTY
            | SignInValidationError::USER_WRONG
            | SignInValidationError::PASSWORD_WRONG;
        assert_eq!(errors.username_message(), Some("Username is required"));
        assert_eq!(errors.password_message(), Some("Wrong password"));
        assert_eq!(SignInValidationError::empty().username_message(), None);
    }

    #[test]
    fn login_path_encodes_its_query() {
        assert_eq!(login_path(None, SignInValidationError::empty(), None), "/login");
        assert_eq!(
            login_path(Some("/students?page=2&x=1"), SignInValidationError::empty(), None),
            "/login?to=%2Fstudents%3Fpage%3D2%26x%3D1"
        );
        assert_eq!(
            login_path(
                None,
                SignInValidationError::USER_WRONG | SignInValidationError::PASSWORD_WRONG,
                Some("a b")
            ),
            "/login?validation_errors=10&username=a+b"
        );
    }

    #[test]
    fn round_trips_through_a_query_number() {
        let errors = SignInValidationError::USER_WRONG | SignInValidationError::PASSWORD_EMPTY;
        assert_eq!(SignInValidationError::from_bits_truncate(errors.bits()), errors);
    }
}
