use crate::{
    data::{
        ApiResource, FieldErrors, IdForm, ResourceList, VACCINES, classes, decode_snapshot,
        drive::{DriveForm, NewDrive, VaccinationDrive},
        encode_snapshot,
    },
    error::PortalResult,
    maud_conveniences::{
        InputField, SelectField, dialog, error_label, form_submit_button, min_date_form_element,
        loading_indicator, render_table, select_element, simple_form_element, title,
    },
    routes::{find_record, mutation_outcome, sequence_owner, superseded},
    state::{NavItem, PortalState},
};
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Response},
};
use jiff::{Timestamp, civil::Date};
use axum_login::tower_sessions::Session;
use maud::{Markup, html};

const LIST_KEY: &str = "drives.list";
const RESOURCE: &str = "drives";
const REFRESH_EVENT: &str = "drives-changed";

fn drives_table(state: &PortalState, list: &ResourceList<VaccinationDrive>, now: Timestamp) -> Markup {
    let date_locale = state.config().date_locale();

    let rows = list
        .records
        .iter()
        .map(|drive| {
            let date = drive
                .calendar_date()
                .and_then(|date| date_locale.short_date(date).ok())
                .unwrap_or_else(|| drive.drive_date.clone());
            let edit = drive.id.map_or_else(
                || html! {},
                |id| {
                    html! {
                        button class="bg-blue-600 hover:bg-blue-800 py-1 px-2 rounded disabled:opacity-50"
                            disabled[!drive.is_editable(now)]
                            hx-get="/internal/drives/edit" hx-vals={"{\"id\": " (id) "}"} hx-target="#dialog" {"Edit"}
                    }
                },
            );

            [
                html! {(drive.id.map(|id| id.to_string()).unwrap_or_default())},
                html! {(drive.vaccine_name)},
                html! {(date)},
                html! {(drive.doses)},
                html! {(drive.classes)},
                edit,
            ]
        })
        .collect();

    html! {
        @if list.error.is_some() {
            div class="mb-2" {(error_label())}
        }
        (render_table(
            ["ID", "Vaccine Name", "Date", "Doses", "Classes", "Actions"],
            rows,
            "No drives scheduled",
        ))
    }
}

pub async fn internal_get_drives(
    State(state): State<PortalState>,
    session: Session,
) -> PortalResult<Response> {
    let ticket = state.sequencer().issue(sequence_owner(&session), RESOURCE);

    let mut list = ResourceList::<VaccinationDrive>::load(&session, LIST_KEY).await?;
    let fetched = VaccinationDrive::fetch_all(state.api())
        .await
        .map(|drives| {
            let total = drives.len() as u64;
            (drives, total)
        });

    if !state.sequencer().is_current(&ticket) {
        return Ok(superseded(RESOURCE));
    }
    list.finish(fetched);
    list.save(&session, LIST_KEY).await?;

    Ok(drives_table(&state, &list, Timestamp::now()).into_response())
}

pub async fn get_drives(State(state): State<PortalState>) -> Markup {
    state.render(Some(NavItem::Drives), html! {
        div class="container mx-auto flex flex-col" {
            div class="flex flex-row justify-between items-center mb-4" {
                div class="flex flex-row items-center" {
                    (title("Drive Management"))
                    (loading_indicator("drives-loading"))
                }
                button class="bg-green-600 hover:bg-green-800 font-bold py-2 px-4 rounded"
                    hx-get="/internal/drives/new" hx-target="#dialog" {"Add Drive"}
            }
            div id="drives-table" hx-get="/internal/drives" hx-trigger="load, drives-changed from:body"
                hx-indicator="#drives-loading" {
                span class="text-gray-400" {"Loading..."}
            }
        }
    })
}

/// Add/edit drive dialog. The date picker of a new drive starts at the minimum lead time from `today`.
fn drive_form(
    existing: Option<&VaccinationDrive>,
    form: &DriveForm,
    today: Date,
    errors: &FieldErrors,
) -> PortalResult<Markup> {
    let earliest = NewDrive::earliest_date(today).to_string();
    let original = existing.map(encode_snapshot).transpose()?;
    let selected_classes: Vec<&str> = form.classes.iter().map(String::as_str).collect();
    let date_field = InputField::text("drive_date", "Drive Date", &form.drive_date);

    let fields = html! {
        @if let Some(original) = original {
            input type="hidden" name="original" value=(original);
        }
        (select_element(SelectField {
            name: "vaccine_name",
            label: "Vaccine Name",
            options: VACCINES,
            selected: &[form.vaccine_name.as_str()],
            multiple: false,
            disabled: false,
            blank: Some("Select a vaccine"),
        }, errors))
        @if existing.is_some() {
            (simple_form_element(&date_field.of_kind("date"), errors))
        } @else {
            (min_date_form_element(&date_field, &earliest, errors))
        }
        (simple_form_element(&InputField::text("doses", "Doses", &form.doses).of_kind("number"), errors))
        (select_element(SelectField {
            name: "classes",
            label: "Classes",
            options: classes(),
            selected: &selected_classes,
            multiple: true,
            disabled: false,
            blank: None,
        }, errors))
    };

    Ok(match existing {
        Some(_) => dialog("Edit Drive", html! {
            form hx-patch="/internal/drives" hx-target="#dialog" {
                (fields)
                (form_submit_button(Some("Save Changes")))
            }
        }),
        None => dialog("Add Drive", html! {
            form hx-put="/internal/drives" hx-target="#dialog" {
                (fields)
                (form_submit_button(Some("Add Drive")))
            }
        }),
    })
}

pub async fn internal_get_new_drive_form(State(state): State<PortalState>) -> PortalResult<Markup> {
    let today = state.config().date_locale().today();
    let form = DriveForm {
        drive_date: NewDrive::earliest_date(today).to_string(),
        ..DriveForm::default()
    };

    drive_form(None, &form, today, &FieldErrors::default())
}

pub async fn internal_put_new_drive(
    State(state): State<PortalState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> PortalResult<Response> {
    let form = DriveForm::from_pairs(pairs);
    let today = state.config().date_locale().today();

    let new_drive = match form.validate_new(today) {
        Ok(new_drive) => new_drive,
        Err(errors) => return Ok(drive_form(None, &form, today, &errors)?.into_response()),
    };

    let rsp = VaccinationDrive::create(state.api(), &new_drive).await;
    let retry = drive_form(None, &form, today, &FieldErrors::default())?;
    Ok(mutation_outcome(&rsp, REFRESH_EVENT, || retry))
}

pub async fn internal_get_edit_drive_form(
    State(state): State<PortalState>,
    session: Session,
    Query(IdForm { id }): Query<IdForm>,
) -> PortalResult<Markup> {
    let list = ResourceList::<VaccinationDrive>::load(&session, LIST_KEY).await?;
    let drive = find_record(&list.records, id, |d| d.id)?;

    drive_form(
        Some(drive),
        &DriveForm::from_drive(drive),
        state.config().date_locale().today(),
        &FieldErrors::default(),
    )
}

pub async fn internal_patch_drive(
    State(state): State<PortalState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> PortalResult<Response> {
    let form = DriveForm::from_pairs(pairs);
    let original: VaccinationDrive = decode_snapshot(form.original.as_deref().unwrap_or_default())?;
    let today = state.config().date_locale().today();

    if !original.is_editable(Timestamp::now()) {
        let mut errors = FieldErrors::default();
        errors.add("drive_date", "Past drives cannot be edited");
        return Ok(drive_form(Some(&original), &form, today, &errors)?.into_response());
    }

    let patch = match form.validate() {
        Ok(edited) => edited.patch_against(&original),
        Err(errors) => {
            return Ok(drive_form(Some(&original), &form, today, &errors)?.into_response());
        }
    };

    if patch.is_empty() {
        debug!(id = ?patch.id, "Saving drive with no changed fields");
    }

    let rsp = VaccinationDrive::update(state.api(), &patch).await;
    let retry = drive_form(Some(&original), &form, today, &FieldErrors::default())?;
    Ok(mutation_outcome(&rsp, REFRESH_EVENT, || retry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfiguration;
    use std::env::VarError;

    fn state() -> PortalState {
        let config = RuntimeConfiguration::from_lookup(|name| match name {
            "PORTAL_API_URL" => Ok("http://127.0.0.1:9".to_string()),
            _ => Err(dotenvy::Error::EnvVar(VarError::NotPresent)),
        })
        .unwrap();
        PortalState::new(config).unwrap()
    }

    fn drive(id: u64, date: &str) -> VaccinationDrive {
        VaccinationDrive {
            id: Some(id),
            vaccine_name: "covishield".into(),
            drive_date: date.into(),
            doses: 30,
            classes: "Grade 5, Grade 6".into(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn past_drives_cannot_be_edited() {
        let list = ResourceList {
            records: vec![drive(1, "2025-04-01"), drive(2, "2025-06-01")],
            total: 2,
            error: None,
        };
        let now: Timestamp = "2025-05-01T00:00:00Z".parse().unwrap();

        let html = drives_table(&state(), &list, now).into_string();
        assert_eq!(html.matches("disabled hx-get=\"/internal/drives/edit\"").count(), 1);
        assert!(html.contains("Grade 5, Grade 6"));
    }

    #[test]
    fn new_drive_form_sets_minimum_date() {
        let today: Date = "2025-05-01".parse().unwrap();
        let html = drive_form(None, &DriveForm::default(), today, &FieldErrors::default())
            .unwrap()
            .into_string();
        assert!(html.contains(r#"min="2025-05-17""#));
        assert!(html.contains("hx-put"));
        assert!(html.contains("multiple"));
    }
}
