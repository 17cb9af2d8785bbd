use crate::{
    api::{
        UploadedFile,
        envelope::{ApiResponse, SuccessEnvelope},
    },
    error::{MissingUploadFileSnafu, MultipartSnafu, PortalResult, RecordNotInListSnafu},
    toast::Toast,
};
use axum::{
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_login::tower_sessions::Session;
use maud::{Markup, html};
use snafu::{OptionExt, ResultExt};

pub mod dashboard;
pub mod drives;
pub mod index;
pub mod login;
pub mod reports;
pub mod students;

pub async fn get_empty() -> Markup {
    html! {}
}

/// Who a request sequence belongs to. Signed-in requests always carry a stored session id.
pub fn sequence_owner(session: &Session) -> String {
    session.id().map(|id| id.to_string()).unwrap_or_default()
}

/// Answer for a list response that a newer request has overtaken. htmx leaves the page alone on a 204.
pub fn superseded(resource: &'static str) -> Response {
    debug!(resource, "Dropping superseded list response");
    StatusCode::NO_CONTENT.into_response()
}

/// Turns the result of a create/update call into a toast.
///
/// On success the dialog is emptied and `refresh_event` is fired so the list reloads; on failure
/// `retry` is rendered back into the dialog so nothing typed is lost.
pub fn mutation_outcome<T>(
    rsp: &ApiResponse<SuccessEnvelope<T>>,
    refresh_event: &'static str,
    retry: impl FnOnce() -> Markup,
) -> Response {
    let toast = Toast::from(rsp);

    if rsp.is_success() {
        ([("HX-Trigger", refresh_event)], html! { (toast) }).into_response()
    } else {
        html! {
            (retry())
            (toast)
        }
        .into_response()
    }
}

pub fn find_record<T>(records: &[T], id: u64, id_of: impl Fn(&T) -> Option<u64>) -> PortalResult<&T> {
    records
        .iter()
        .find(|record| id_of(record) == Some(id))
        .context(RecordNotInListSnafu { id })
}

/// First non-empty file in the form.
pub async fn first_upload(mut multipart: Multipart) -> PortalResult<UploadedFile> {
    while let Some(field) = multipart.next_field().await.context(MultipartSnafu)? {
        let Some(file_name) = field.file_name().map(ToString::to_string) else {
            continue;
        };
        let bytes = field.bytes().await.context(MultipartSnafu)?;
        if bytes.is_empty() {
            continue;
        }

        return Ok(UploadedFile {
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    MissingUploadFileSnafu.fail()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::envelope::ErrorEnvelope;
    use axum::body::to_bytes;

    async fn body_of(rsp: Response) -> String {
        String::from_utf8(to_bytes(rsp.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn success_fires_refresh_and_closes_dialog() {
        let rsp = mutation_outcome(
            &ApiResponse::Success(SuccessEnvelope::<()> {
                data: None,
                message_string: "Student added".into(),
            }),
            "students-changed",
            || html! { form id="retry" {} },
        );

        assert_eq!(rsp.headers()["HX-Trigger"], "students-changed");
        let body = body_of(rsp).await;
        assert!(body.contains("Student added"));
        assert!(!body.contains("retry"));
    }

    #[tokio::test]
    async fn failure_keeps_dialog_open() {
        let rsp = mutation_outcome(
            &ApiResponse::<SuccessEnvelope<()>>::Failure(ErrorEnvelope {
                error_string: "Duplicate".into(),
                message_string: "Roll number already exists".into(),
            }),
            "students-changed",
            || html! { form id="retry" {} },
        );

        assert!(rsp.headers().get("HX-Trigger").is_none());
        let body = body_of(rsp).await;
        assert!(body.contains(r#"id="retry""#));
        assert!(body.contains("Roll number already exists"));
    }

    #[test]
    fn find_record_by_id() {
        let records = [(Some(1), "a"), (None, "b"), (Some(3), "c")];
        assert_eq!(find_record(&records, 3, |r| r.0).unwrap().1, "c");
        assert!(find_record(&records, 2, |r| r.0).is_err());
    }
}
