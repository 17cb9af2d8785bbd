use crate::{
    data::{dashboard::DashboardStats, drive::VaccinationDrive},
    maud_conveniences::{error_label, render_table, title},
    state::{NavItem, PortalState},
};
use axum::extract::State;
use jiff::Timestamp;
use maud::{Markup, html};

const UPCOMING_WINDOW_DAYS: i64 = 30;

fn stat_card(label: &str, value: Markup) -> Markup {
    html! {
        div class="bg-gray-800 rounded shadow-md p-6 flex flex-col space-y-2" {
            span class="text-gray-400 text-sm uppercase tracking-wide" {(label)}
            span class="text-3xl font-semibold" {(value)}
        }
    }
}

pub async fn get_dashboard(State(state): State<PortalState>) -> Markup {
    let (stats, drives) = futures::join!(
        DashboardStats::fetch(state.api()),
        VaccinationDrive::fetch_all(state.api())
    );

    let (total, vaccinated) = match stats {
        Ok(stats) => (
            html! {(stats.total_students)},
            html! {(stats.vaccinated_students) " (" (stats.vaccinated_percentage()) "%)"},
        ),
        Err(e) => {
            warn!(?e, "Unable to fetch dashboard figures");
            (error_label(), error_label())
        }
    };

    let date_locale = state.config().date_locale();
    let drives = match drives {
        Ok(drives) => {
            let rows = VaccinationDrive::upcoming(drives, Timestamp::now(), UPCOMING_WINDOW_DAYS)
                .into_iter()
                .map(|drive| {
                    let date = drive
                        .calendar_date()
                        .and_then(|date| date_locale.short_date(date).ok())
                        .unwrap_or_else(|| drive.drive_date.clone());
                    [html! {(drive.vaccine_name)}, html! {(date)}]
                })
                .collect();
            render_table(
                ["Vaccine Name", "Drive Date"],
                rows,
                "No vaccination drives scheduled in the next 30 days.",
            )
        }
        Err(e) => {
            warn!(?e, "Unable to fetch drives for dashboard");
            error_label()
        }
    };

    state.render(Some(NavItem::Dashboard), html! {
        div class="container mx-auto flex flex-col space-y-8" {
            div class="grid grid-cols-1 md:grid-cols-2 gap-4" {
                (stat_card("Total Students", total))
                (stat_card("Vaccinated Students", vaccinated))
            }
            div {
                (title("Upcoming Vaccination Drives"))
                (drives)
            }
        }
    })
}
