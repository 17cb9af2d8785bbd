use crate::{
    config::date_locale::DateLocaleConfig,
    data::{
        Pagination, ResourceList,
        upload_report::{REPORTS_PAGE_SIZE, UploadedRecordReport},
    },
    error::PortalResult,
    maud_conveniences::{error_label, loading_indicator, pagination, render_table, title},
    routes::{sequence_owner, superseded},
    state::{NavItem, PortalState},
};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use jiff::Timestamp;
use axum_login::tower_sessions::Session;
use maud::{Markup, html};
use serde::Deserialize;

const LIST_KEY: &str = "reports.list";
const RESOURCE: &str = "reports";

#[derive(Deserialize, Default)]
pub struct ReportsQuery {
    page: Option<u32>,
}

fn uploaded_at(report: &UploadedRecordReport, date_locale: &DateLocaleConfig) -> String {
    let Some(raw) = report.created_at.as_deref() else {
        return String::new();
    };
    raw.parse::<Timestamp>()
        .ok()
        .and_then(|ts| date_locale.short_ymdt(ts).ok())
        .unwrap_or_else(|| raw.to_string())
}

fn reports_table(
    list: &ResourceList<UploadedRecordReport>,
    page: Pagination,
    date_locale: &DateLocaleConfig,
) -> Markup {
    let rows = list
        .records
        .iter()
        .map(|report| {
            [
                html! {(report.request_id)},
                html! {(report.file_name)},
                html! {(uploaded_at(report, date_locale))},
                html! {
                    a href=(report.file_path) target="_blank" rel="noopener noreferrer" class="text-blue-400 hover:underline" {"Download"}
                },
                html! {(report.status)},
                html! {(report.processed_records)},
                html! {(report.total_records)},
                html! {(report.request_type)},
                html! {(report.error_message.as_deref().unwrap_or_default())},
            ]
        })
        .collect();

    html! {
        @if list.error.is_some() {
            div class="mb-2" {(error_label())}
        }
        (render_table(
            ["ID", "File", "Uploaded", "Link", "Status", "Processed Records", "Total Records", "Request Type", "Error"],
            rows,
            "No uploads yet",
        ))
        (pagination("/internal/reports", "#reports", None, page.page(), page.page_count(list.total)))
    }
}

pub async fn internal_get_reports(
    State(state): State<PortalState>,
    session: Session,
    Query(ReportsQuery { page }): Query<ReportsQuery>,
) -> PortalResult<Response> {
    let ticket = state.sequencer().issue(sequence_owner(&session), RESOURCE);
    let page = Pagination::new(page.unwrap_or(1), REPORTS_PAGE_SIZE);

    let mut list = ResourceList::<UploadedRecordReport>::load(&session, LIST_KEY).await?;
    let fetched = UploadedRecordReport::fetch_page(state.api(), page).await;

    if !state.sequencer().is_current(&ticket) {
        return Ok(superseded(RESOURCE));
    }
    list.finish(fetched);
    list.save(&session, LIST_KEY).await?;

    Ok(reports_table(&list, page, &state.config().date_locale()).into_response())
}

pub async fn get_reports(State(state): State<PortalState>) -> Markup {
    state.render(Some(NavItem::Reports), html! {
        div class="container mx-auto flex flex-col" {
            div class="flex flex-row items-center" {
                (title("Reports"))
                (loading_indicator("reports-loading"))
            }
            div id="reports" hx-get="/internal/reports" hx-trigger="load" hx-indicator="#reports-loading" {
                span class="text-gray-400" {"Loading..."}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_keeps_rows_when_latest_fetch_failed() {
        let list = ResourceList {
            records: vec![UploadedRecordReport {
                id: Some(1),
                file_name: "roster.xlsx".into(),
                file_path: "http://localhost:9000/roster.xlsx".into(),
                status: "COMPLETED".into(),
                error_message: None,
                created_at: Some("2025-06-14T09:30:00Z".into()),
                updated_at: None,
                processed_records: 3,
                total_records: 3,
                request_id: "req-1".into(),
                request_type: "STUDENT_UPLOAD".into(),
            }],
            total: 6,
            error: Some("API at /bulk-upload answered with status 500".into()),
        };

        let date_locale =
            DateLocaleConfig::new("UTC".into(), "en-GB".into(), "h23".into(), "gregorian".into())
                .unwrap();
        let html = reports_table(&list, Pagination::new(1, REPORTS_PAGE_SIZE), &date_locale)
            .into_string();
        assert!(html.contains("req-1"));
        assert!(html.contains(">Error<"));
        assert!(html.contains("Page 1 of 2"));
        assert!(html.contains("Download"));
        assert!(html.contains("09:30"));
    }
}
