use crate::{api::ApiClient, error::PortalResult};
use serde::Deserialize;

const DASHBOARD_PATH: &str = "/student-management/vaccine-records/dashboard";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub total_students: u64,
    #[serde(default)]
    pub vaccinated_students: u64,
}

impl DashboardStats {
    pub async fn fetch(client: &ApiClient) -> PortalResult<Self> {
        client.get_json(DASHBOARD_PATH, &[]).await
    }

    /// Share of vaccinated students, formatted to two decimals. An empty school reads as 0.00.
    pub fn vaccinated_percentage(&self) -> String {
        #[allow(clippy::cast_precision_loss)]
        let percentage =
            self.vaccinated_students as f64 / self.total_students.max(1) as f64 * 100.0;
        format!("{percentage:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::fake_api;
    use axum::{Json, Router, routing::get};
    use serde_json::json;

    #[test]
    fn percentage_has_two_decimals() {
        let stats = |vaccinated_students, total_students| DashboardStats {
            total_students,
            vaccinated_students,
        };

        assert_eq!(stats(0, 0).vaccinated_percentage(), "0.00");
        assert_eq!(stats(1, 3).vaccinated_percentage(), "33.33");
        assert_eq!(stats(2, 3).vaccinated_percentage(), "66.67");
        assert_eq!(stats(40, 40).vaccinated_percentage(), "100.00");
    }

    #[tokio::test]
    async fn fetch_reads_bare_counts() {
        let client = fake_api(Router::new().route(
            "/school-vaccine-portal/student-management/vaccine-records/dashboard",
            get(|| async { Json(json!({"total_students": 120, "vaccinated_students": 45})) }),
        ))
        .await;

        let stats = DashboardStats::fetch(&client).await.unwrap();
        assert_eq!(stats.total_students, 120);
        assert_eq!(stats.vaccinated_percentage(), "37.50");
    }
}
