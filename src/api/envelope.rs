use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

pub const UNKNOWN_ERROR_TITLE: &str = "Unknown Error";
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Structured failure body the API sends for rejected requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error_string: String,
    #[serde(default)]
    pub message_string: String,
}

impl ErrorEnvelope {
    /// Stand-in for failures that came back without a usable body.
    pub fn unknown() -> Self {
        Self {
            error_string: UNKNOWN_ERROR_TITLE.to_string(),
            message_string: UNKNOWN_ERROR_MESSAGE.to_string(),
        }
    }
}

/// A 2xx body without `error_string`. `data` is best effort: a payload of another shape
/// still counts as success and is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct SuccessEnvelope<T> {
    #[serde(default, deserialize_with = "lenient_data")]
    pub data: Option<T>,
    #[serde(default)]
    pub message_string: String,
}

fn lenient_data<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| {
        serde_json::from_value(raw)
            .inspect_err(|e| debug!(?e, "Success data has an unexpected shape, ignoring it"))
            .ok()
    }))
}

/// Outcome of a call that changes something upstream.
///
/// Errors are data here, never `Err`: callers look at the variant before trusting the payload.
/// `Failure` is tried first so anything carrying `error_string` is treated as a failure even on a 2xx.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse<T> {
    Failure(ErrorEnvelope),
    Success(T),
}

impl<T> ApiResponse<T> {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn unknown() -> Self {
        Self::Failure(ErrorEnvelope::unknown())
    }
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Normalises whatever came back from the wire.
    ///
    /// `None` means the request never produced a response at all.
    pub fn from_wire(status_is_success: bool, body: Option<&[u8]>) -> Self {
        let Some(body) = body.filter(|b| !b.is_empty()) else {
            return Self::unknown();
        };

        if status_is_success {
            serde_json::from_slice::<Self>(body).unwrap_or_else(|e| {
                warn!(?e, "Unable to decode successful API body");
                Self::unknown()
            })
        } else {
            serde_json::from_slice::<ErrorEnvelope>(body).map_or_else(|_| Self::unknown(), Self::Failure)
        }
    }
}

/// Link to a generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLink {
    pub file: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    type StudentResponse = ApiResponse<SuccessEnvelope<serde_json::Value>>;

    #[test]
    fn missing_body_is_unknown_error() {
        assert_eq!(StudentResponse::from_wire(false, None), StudentResponse::unknown());
        assert_eq!(StudentResponse::from_wire(false, Some(b"")), StudentResponse::unknown());
        assert_eq!(StudentResponse::from_wire(true, None), StudentResponse::unknown());
    }

    #[test]
    fn unstructured_error_body_is_unknown_error() {
        let rsp = StudentResponse::from_wire(false, Some(b"<html>502 Bad Gateway</html>"));
        assert_eq!(rsp, StudentResponse::unknown());

        let ApiResponse::Failure(e) = rsp else { unreachable!() };
        assert_eq!(e.error_string, "Unknown Error");
        assert_eq!(e.message_string, "An unknown error occurred");
    }

    #[test]
    fn structured_error_is_passed_through() {
        let rsp = StudentResponse::from_wire(
            false,
            Some(br#"{"error_string":"Duplicate","message_string":"Roll number already exists"}"#),
        );

        assert_eq!(
            rsp,
            ApiResponse::Failure(ErrorEnvelope {
                error_string: "Duplicate".into(),
                message_string: "Roll number already exists".into(),
            })
        );
    }

    #[test]
    fn success_body_is_discriminated_from_error_body() {
        let rsp = StudentResponse::from_wire(
            true,
            Some(br#"{"data":{"id":4},"message_string":"Student added"}"#),
        );
        let ApiResponse::Success(envelope) = rsp else {
            panic!("expected success");
        };
        assert_eq!(envelope.message_string, "Student added");
        assert_eq!(envelope.data, Some(serde_json::json!({"id": 4})));

        let rsp = StudentResponse::from_wire(
            true,
            Some(br#"{"error_string":"Nope","message_string":"Rejected"}"#),
        );
        assert!(!rsp.is_success());
    }

    #[test]
    fn success_does_not_depend_on_the_data_shape() {
        type VaccinateResponse = ApiResponse<SuccessEnvelope<crate::data::student::Student>>;

        let rsp = VaccinateResponse::from_wire(
            true,
            Some(br#"{"data":{"id":1,"student_id":7,"drive_id":3},"message_string":"Student vaccinated"}"#),
        );
        let ApiResponse::Success(envelope) = rsp else {
            panic!("expected success");
        };
        assert_eq!(envelope.message_string, "Student vaccinated");
        assert_eq!(envelope.data, None);

        let rsp = VaccinateResponse::from_wire(
            true,
            Some(br#"{"data":{"id":5},"message_string":"Student added"}"#),
        );
        assert!(rsp.is_success());

        let rsp = VaccinateResponse::from_wire(true, Some(br#"{"message_string":"Done"}"#));
        assert!(rsp.is_success());
    }

    #[test]
    fn error_string_alone_is_a_failure() {
        let rsp = StudentResponse::from_wire(true, Some(br#"{"error_string":"Nope"}"#));
        assert_eq!(
            rsp,
            ApiResponse::Failure(ErrorEnvelope {
                error_string: "Nope".into(),
                message_string: String::new(),
            })
        );
    }

    #[test]
    fn file_link_decodes() {
        let rsp = ApiResponse::<FileLink>::from_wire(true, Some(br#"{"file":"http://x/r.csv"}"#));
        assert_eq!(
            rsp,
            ApiResponse::Success(FileLink {
                file: "http://x/r.csv".into()
            })
        );
    }
}
