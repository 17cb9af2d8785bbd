use crate::{
    api::envelope::ApiResponse,
    config::ApiConfig,
    error::{ApiRequestSnafu, ApiStatusSnafu, BuildHttpClientSnafu, DecodeApiBodySnafu, PortalResult},
};
use reqwest::{
    Client, RequestBuilder,
    multipart::{Form, Part},
};
use serde::{Serialize, de::DeserializeOwned};
use snafu::ResultExt;
use std::sync::Arc;

pub mod envelope;

pub const API_PREFIX: &str = "/school-vaccine-portal";

/// An upload received from the browser, on its way to the API untouched.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    fn mime_type(&self) -> &'static str {
        infer::get(&self.bytes).map_or("application/octet-stream", |kind| kind.mime_type())
    }

    fn part(&self) -> Result<Part, reqwest::Error> {
        Part::bytes(self.bytes.clone())
            .file_name(self.file_name.clone())
            .mime_str(self.mime_type())
    }
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    config: Arc<ApiConfig>,
}

impl ApiClient {
    pub fn new(config: Arc<ApiConfig>) -> PortalResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .context(BuildHttpClientSnafu)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.config.base_url())
    }

    /// Plain read. Failures are real errors here and get folded into list state by the caller.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> PortalResult<T> {
        let rsp = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .context(ApiRequestSnafu { path })?;

        let status = rsp.status();
        snafu::ensure!(
            status.is_success(),
            ApiStatusSnafu {
                path,
                status: status.as_u16()
            }
        );

        let bytes = rsp.bytes().await.context(ApiRequestSnafu { path })?;
        serde_json::from_slice(&bytes).context(DecodeApiBodySnafu { path })
    }

    pub async fn get_enveloped<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> ApiResponse<T> {
        self.send_enveloped(path, self.http.get(self.url(path)).query(query))
            .await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.send_enveloped(path, self.http.post(self.url(path)).json(body))
            .await
    }

    pub async fn patch_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.send_enveloped(path, self.http.patch(self.url(path)).json(body))
            .await
    }

    /// The import endpoints have read the file from either field name over time, so it goes under both.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        file: &UploadedFile,
    ) -> ApiResponse<T> {
        let form = match (file.part(), file.part()) {
            (Ok(file_part), Ok(data_file_part)) => Form::new()
                .part("file", file_part)
                .part("dataFile", data_file_part),
            (Err(e), _) | (_, Err(e)) => {
                warn!(?e, path, "Unable to build multipart upload");
                return ApiResponse::unknown();
            }
        };

        self.send_enveloped(path, self.http.post(self.url(path)).multipart(form))
            .await
    }

    async fn send_enveloped<T: DeserializeOwned>(
        &self,
        path: &str,
        request: RequestBuilder,
    ) -> ApiResponse<T> {
        let rsp = match request.header("Accept", "application/json").send().await {
            Ok(rsp) => rsp,
            Err(e) => {
                warn!(?e, path, "API request failed before a response arrived");
                return ApiResponse::unknown();
            }
        };

        let status = rsp.status();
        let body = match rsp.bytes().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(?e, path, "Unable to read API response body");
                None
            }
        };

        let outcome = ApiResponse::from_wire(status.is_success(), body.as_deref());
        if !outcome.is_success() {
            warn!(path, %status, "API call was rejected");
        }
        outcome
    }
}
