use crate::api::envelope::{ApiResponse, SuccessEnvelope};
use maud::{Markup, Render, html};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

/// A notification that lands in the page's toast stack via an out-of-band swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    id: Uuid,
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: ToastKind::Success,
            title: "Success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: ToastKind::Error,
            title: title.into(),
            message: message.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.kind, ToastKind::Success)
    }
}

impl<T> From<&ApiResponse<SuccessEnvelope<T>>> for Toast {
    fn from(rsp: &ApiResponse<SuccessEnvelope<T>>) -> Self {
        match rsp {
            ApiResponse::Success(envelope) => Self::success(envelope.message_string.clone()),
            ApiResponse::Failure(e) => Self::error(e.error_string.clone(), e.message_string.clone()),
        }
    }
}

impl Render for Toast {
    fn render(&self) -> Markup {
        let colours = match self.kind {
            ToastKind::Success => "bg-green-100 border-green-400 text-green-800",
            ToastKind::Error => "bg-red-100 border-red-400 text-red-700",
        };
        let id = format!("toast-{}", self.id);

        html! {
            div hx-swap-oob="afterbegin:#toasts" {
                div id=(id) role="alert" class={"border px-4 py-3 rounded shadow-md w-80 " (colours)}
                    hx-get="/internal/empty" hx-trigger="load delay:5s" hx-target="this" hx-swap="outerHTML" {
                    strong class="font-bold block" {(self.title)}
                    @if !self.message.is_empty() {
                        span class="block text-sm" {(self.message)}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::envelope::ErrorEnvelope;

    #[test]
    fn success_toast_uses_message_string() {
        let rsp = ApiResponse::Success(SuccessEnvelope::<()> {
            data: None,
            message_string: "Drive created".into(),
        });
        let toast = Toast::from(&rsp);
        assert!(toast.is_success());
        assert_eq!(toast.message, "Drive created");
    }

    #[test]
    fn failure_toast_is_titled_with_error_string() {
        let rsp = ApiResponse::<SuccessEnvelope<()>>::Failure(ErrorEnvelope {
            error_string: "Duplicate".into(),
            message_string: "Roll number already exists".into(),
        });
        let toast = Toast::from(&rsp);
        assert!(!toast.is_success());
        assert_eq!(toast.title, "Duplicate");

        let unknown = Toast::from(&ApiResponse::<SuccessEnvelope<()>>::unknown());
        assert_eq!(unknown.title, "Unknown Error");
        assert_eq!(unknown.message, "An unknown error occurred");
    }

    #[test]
    fn renders_as_out_of_band_swap() {
        let html = Toast::error("Nope", "<script>").render().into_string();
        assert!(html.contains(r##"hx-swap-oob="afterbegin:#toasts""##));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("bg-red-100"));
    }
}
