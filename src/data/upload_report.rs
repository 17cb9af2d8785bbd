use crate::{
    api::ApiClient,
    data::{Listing, Pagination},
    error::PortalResult,
};
use serde::{Deserialize, Serialize};

pub const REPORTS_PAGE_SIZE: u32 = 5;
const JOBS_PATH: &str = "/bulk-upload";

/// One bulk import job and how far it got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedRecordReport {
    #[serde(rename = "Id", default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub processed_records: u64,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub request_id: String,
    #[serde(rename = "request_Type", default)]
    pub request_type: String,
}

impl UploadedRecordReport {
    pub async fn fetch_page(
        client: &ApiClient,
        pagination: Pagination,
    ) -> PortalResult<(Vec<Self>, u64)> {
        let (mut records, total) = client
            .get_json::<Listing<Self>>(JOBS_PATH, &pagination.query())
            .await
            .map(Listing::into_parts)?;

        for record in &mut records {
            record.file_path = client.config().rewrite_download_link(&record.file_path);
        }

        Ok((records, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::fake_api;
    use axum::{Json, Router, extract::Query, routing::get};
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn wire_names_are_kept() {
        let report: UploadedRecordReport = serde_json::from_value(json!({
            "Id": 9,
            "file_name": "roster.xlsx",
            "file_path": "http://minio-school:9000/uploads/roster.xlsx",
            "status": "COMPLETED",
            "error_message": null,
            "processed_records": 40,
            "total_records": 42,
            "request_id": "req-9",
            "request_Type": "STUDENT_UPLOAD"
        }))
        .unwrap();

        assert_eq!(report.id, Some(9));
        assert_eq!(report.request_type, "STUDENT_UPLOAD");
        assert_eq!(report.error_message, None);
        assert_eq!(report.processed_records, 40);
    }

    #[tokio::test]
    async fn fetch_page_pages_by_five_and_rewrites_links() {
        let client = fake_api(Router::new().route(
            "/school-vaccine-portal/bulk-upload",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                Json(json!({
                    "data": [{
                        "file_name": "roster.xlsx",
                        "file_path": "http://minio-school:9000/uploads/roster.xlsx",
                        "status": "FAILED",
                        "error_message": "Row 3 has no class",
                        "request_id": format!("{}-{}", q["limit"], q["offset"]),
                        "request_Type": "VACCINE_UPLOAD"
                    }],
                    "total": 11
                }))
            }),
        ))
        .await;

        let (records, total) =
            UploadedRecordReport::fetch_page(&client, Pagination::new(3, REPORTS_PAGE_SIZE))
                .await
                .unwrap();

        assert_eq!(total, 11);
        assert_eq!(records[0].request_id, "5-10");
        assert_eq!(
            records[0].file_path,
            "http://localhost:9000/uploads/roster.xlsx"
        );
    }
}
