use crate::auth::backend::PortalAuthBackend;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use maud::html;
use snafu::Snafu;
use std::num::ParseIntError;

pub type PortalResult<T> = Result<T, PortalError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PortalError {
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse `{}` as a number", name))]
    ParseNumber {
        source: ParseIntError,
        name: &'static str,
    },
    #[snafu(display("`{}` is not a valid API base URL", url))]
    InvalidApiUrl { url: String },
    #[snafu(display("`{}` is not a valid host rewrite, expected `from=to`", provided))]
    InvalidHostRewrite { provided: String },
    #[snafu(display("Unable to build HTTP client"))]
    BuildHttpClient { source: reqwest::Error },
    #[snafu(display("Error calling API at {}", path))]
    ApiRequest {
        source: reqwest::Error,
        path: String,
    },
    #[snafu(display("API at {} answered with status {}", path, status))]
    ApiStatus { path: String, status: u16 },
    #[snafu(display("Unable to decode API response from {}", path))]
    DecodeApiBody {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid locale: {:?}", provided))]
    InvalidLocale {
        source: icu::locale::ParseError,
        provided: String,
    },
    #[snafu(display("Invalid timezone: {:?}", tz))]
    InvalidTimezone { source: jiff::Error, tz: String },
    #[snafu(display("Invalid hour cycle: {:?}", provided))]
    InvalidHourCycle { provided: String },
    #[snafu(display("Invalid calendar algorithm: {:?}", provided))]
    InvalidCalendarAlgorithm { provided: String },
    #[snafu(display("Date is outside the range the portal time zone can represent"))]
    CivilDateOutOfRange { source: jiff::Error },
    #[snafu(display("Unable to create date formatter"))]
    BadDateTimeFormatter {
        source: icu::datetime::DateTimeFormatterLoadError,
    },
    #[snafu(display("Error serialising with rmp_serde"))]
    RmpSerdeEncode { source: rmp_serde::encode::Error },
    #[snafu(display("Error deserialising with rmp_serde"))]
    RmpSerdeDecode { source: rmp_serde::decode::Error },
    #[snafu(display("Error decoding Base64"))]
    B64 { source: base64::DecodeError },
    #[snafu(display("Error with hashing/password verification"))]
    Bcrypt { source: bcrypt::BcryptError },
    #[snafu(display("Unable to join blocking task"))]
    JoinBlocking { source: tokio::task::JoinError },
    #[snafu(display("Error with sessions"))]
    TowerSession {
        source: axum_login::tower_sessions::session::Error,
    },
    #[snafu(display("Error with multipart form input"))]
    Multipart {
        source: axum::extract::multipart::MultipartError,
    },
    #[snafu(display("No file was attached to the upload"))]
    MissingUploadFile,
    #[snafu(display("Record {} is not on the current page", id))]
    RecordNotInList { id: u64 },
}

impl From<axum_login::Error<PortalAuthBackend>> for PortalError {
    fn from(value: axum_login::Error<PortalAuthBackend>) -> Self {
        match value {
            axum_login::Error::Session(source) => Self::TowerSession { source },
            axum_login::Error::Backend(backend) => backend,
        }
    }
}

impl IntoResponse for PortalError {
    #[allow(clippy::match_same_arms)]
    fn into_response(self) -> Response {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const BG: StatusCode = StatusCode::BAD_GATEWAY; //upstream api misbehaved
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input

        let basic_error = |desc| {
            html! {
                div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" role="alert" {
                    strong class="font-bold" {"Portal Error "}
                    span {(desc)}
                }
            }
        };

        let status_code = match &self {
            Self::BadEnvVar { .. } | Self::ParseNumber { .. } => ISE,
            Self::InvalidApiUrl { .. } | Self::InvalidHostRewrite { .. } => ISE,
            Self::BuildHttpClient { .. } => ISE,
            Self::ApiRequest { .. } | Self::ApiStatus { .. } | Self::DecodeApiBody { .. } => BG,
            Self::InvalidLocale { .. }
            | Self::InvalidTimezone { .. }
            | Self::InvalidHourCycle { .. }
            | Self::InvalidCalendarAlgorithm { .. }
            | Self::CivilDateOutOfRange { .. }
            | Self::BadDateTimeFormatter { .. } => ISE,
            Self::RmpSerdeEncode { .. } => ISE,
            Self::RmpSerdeDecode { .. } => BI,
            Self::B64 { .. } => BI,
            Self::Bcrypt { .. } | Self::JoinBlocking { .. } => ISE,
            Self::TowerSession { .. } => ISE,
            Self::Multipart { source } => source.status(),
            Self::MissingUploadFile | Self::RecordNotInList { .. } => BI,
        };

        error!(?self, "Error!");
        (status_code, Html(basic_error(self.to_string()))).into_response()
    }
}
