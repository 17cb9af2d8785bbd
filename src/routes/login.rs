use crate::{
    auth::{PortalSession, SignInValidationError, backend::PortalAuthCredentials, login_path},
    error::PortalResult,
    maud_conveniences::{form_submit_button, title},
    routes::sequence_owner,
    state::PortalState,
};
use axum::{
    Form,
    body::Body,
    extract::{Query, State},
    http::Response,
    response::{IntoResponse, Redirect},
};
use axum_login::tower_sessions::Session;
use maud::{Markup, html};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

const INPUT_CLASSES: &str = "shadow appearance-none border rounded w-full py-2 px-3 leading-tight focus:outline-none focus:shadow-outline bg-gray-700 border-gray-600";

#[derive(Deserialize)]
pub struct LoginOptions {
    pub to: Option<String>,
    pub validation_errors: Option<u8>,
    pub username: Option<String>,
}

fn sign_in_field(
    name: &'static str,
    label: &'static str,
    kind: &'static str,
    value: &str,
    error: Option<&'static str>,
) -> Markup {
    html! {
        div class="mb-4" {
            label for=(name) class="block text-sm font-bold mb-2 text-gray-300" {(label)}
            input id=(name) name=(name) type=(kind) value=(value) class=(INPUT_CLASSES);
            @if let Some(error) = error {
                p class="text-red-400 text-xs italic mt-1" {(error)}
            }
        }
    }
}

/// Only same-site paths are followed after sign-in.
fn safe_next(next: Option<&str>) -> &str {
    next.filter(|next| next.starts_with('/') && !next.starts_with("//"))
        .unwrap_or("/dashboard")
}

pub async fn get_login(
    State(state): State<PortalState>,
    session: PortalSession,
    Query(LoginOptions {
        to,
        validation_errors,
        username,
    }): Query<LoginOptions>,
) -> Response<Body> {
    if session.user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let validation_errors = validation_errors.map_or_else(
        SignInValidationError::empty,
        SignInValidationError::from_bits_truncate,
    );

    state.render(None, html! {
        div class="bg-gray-800 shadow-md rounded px-8 pt-6 pb-8 mt-16 w-full max-w-sm" {
            (title("School Vaccination Portal"))
            form method="post" action="/login" {
                @if let Some(to) = to {
                    input type="hidden" name="next" value=(to);
                }
                (sign_in_field("username", "User", "text", username.as_deref().unwrap_or_default(), validation_errors.username_message()))
                (sign_in_field("password", "Password", "password", "", validation_errors.password_message()))
                (form_submit_button(Some("Sign In")))
            }
        }
    }).into_response()
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    password: SecretString,
    next: Option<String>,
}

pub async fn post_login(
    mut session: PortalSession,
    Form(LoginForm {
        username,
        password,
        next,
    }): Form<LoginForm>,
) -> PortalResult<Redirect> {
    let mut errors = SignInValidationError::empty();
    if username.trim().is_empty() {
        errors |= SignInValidationError::USER_EMPTY;
    }
    if password.expose_secret().is_empty() {
        errors |= SignInValidationError::PASSWORD_EMPTY;
    }

    let creds = PortalAuthCredentials { username, password };

    if errors.is_empty() {
        if let Some(user) = session.authenticate(creds.clone()).await? {
            session.login(&user).await?;
            info!(username = %user.username, "Signed in");
            return Ok(Redirect::to(safe_next(next.as_deref())));
        }
        errors |= session.backend.judge(&creds).await?;
    }

    Ok(Redirect::to(&login_path(
        next.as_deref(),
        errors,
        Some(&creds.username),
    )))
}

pub async fn post_logout(
    State(state): State<PortalState>,
    mut auth_session: PortalSession,
    session: Session,
) -> PortalResult<impl IntoResponse> {
    state.sequencer().forget(&sequence_owner(&session));
    auth_session.logout().await?;
    Ok(Redirect::to("/login"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/students")), "/students");
        assert_eq!(safe_next(Some("//evil.example")), "/dashboard");
        assert_eq!(safe_next(Some("https://evil.example")), "/dashboard");
        assert_eq!(safe_next(None), "/dashboard");
    }
}
