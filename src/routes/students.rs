use crate::{
    api::{
        UploadedFile,
        envelope::{ApiResponse, SuccessEnvelope},
    },
    data::{
        ApiResource, FieldErrors, GENDERS, IdForm, ResourceList, VACCINES, classes,
        decode_snapshot, encode_snapshot,
        student::{
            NewStudent, Student, StudentFilters, StudentListQuery, StudentPageState,
            StudentPatch, VaccinateForm, vaccination_to_ui,
        },
    },
    error::PortalResult,
    maud_conveniences::{
        InputField, SelectField, dialog, error_label, form_submit_button, loading_indicator,
        pagination, render_table, select_element, simple_form_element, title,
    },
    routes::{find_record, first_upload, mutation_outcome, sequence_owner, superseded},
    state::{NavItem, PortalState},
    toast::Toast,
};
use axum::{
    Form,
    extract::{Multipart, Query, State},
    response::{IntoResponse, Response},
};
use axum_login::tower_sessions::Session;
use maud::{Markup, Render, html};
use serde::Deserialize;

const LIST_KEY: &str = "students.list";
const RESOURCE: &str = "students";
const REFRESH_EVENT: &str = "students-changed";

fn filter_form(filters: &StudentFilters) -> Markup {
    let text_filter = |name: &'static str, placeholder: &'static str, value: &str| {
        html! {
            input type="search" name=(name) placeholder=(placeholder) value=(value)
                class="shadow border rounded py-2 px-3 bg-gray-700 border-gray-600";
        }
    };
    let select_filter = |name: &'static str, blank: &'static str, options: Vec<String>, selected: &str| {
        html! {
            select name=(name) class="shadow border rounded py-2 px-3 bg-gray-700 border-gray-600" {
                option value="" selected[selected.is_empty()] {(blank)}
                @for choice in &options {
                    option value=(choice) selected[choice == selected] {(choice)}
                }
            }
        }
    };

    html! {
        form id="student-filters" hx-get="/internal/students" hx-target="#students-table" hx-trigger="input changed delay:400ms" hx-indicator="#students-loading"
            class="flex flex-row flex-wrap gap-2 mb-4" {
            (text_filter("roll_no", "Roll No", &filters.roll_no))
            (text_filter("name", "Name", &filters.name))
            (select_filter("class", "Any class", classes().collect(), &filters.class))
            (select_filter("vaccination", "Vaccinated?", vec!["Yes".into(), "No".into()], vaccination_to_ui(filters.vaccination)))
            (select_filter("vaccine_name", "Any vaccine", VACCINES.map(String::from).to_vec(), &filters.vaccine_name))
        }
    }
}

fn students_table(list: &ResourceList<Student>, page_state: &StudentPageState) -> Markup {
    let page = page_state.pagination();
    let rows = list
        .records
        .iter()
        .map(|student| {
            let actions = student.id.map_or_else(
                || html! {},
                |id| {
                    html! {
                        div class="flex flex-row space-x-2" {
                            button class="bg-blue-600 hover:bg-blue-800 py-1 px-2 rounded"
                                hx-get="/internal/students/edit" hx-vals={"{\"id\": " (id) "}"} hx-target="#dialog" {"Edit"}
                            button class="bg-purple-600 hover:bg-purple-800 py-1 px-2 rounded disabled:opacity-50"
                                disabled[student.is_vaccinated()]
                                hx-get="/internal/students/vaccinate" hx-vals={"{\"id\": " (id) "}"} hx-target="#dialog" {"Vaccinate"}
                        }
                    }
                },
            );

            [
                html! {(student.id.map(|id| id.to_string()).unwrap_or_default())},
                html! {(student.roll_no)},
                html! {(student.name)},
                html! {(student.class)},
                html! {(student.gender)},
                html! {(student.phone_no)},
                html! {(if student.is_vaccinated() { "Yes" } else { "No" })},
                html! {(student.vaccine_date.as_deref().unwrap_or_default())},
                html! {(student.vaccine_name.as_deref().unwrap_or_default())},
                actions,
            ]
        })
        .collect();

    html! {
        @if list.error.is_some() {
            div class="mb-2" {(error_label())}
        }
        (render_table(
            ["ID", "Roll No", "Name", "Class", "Gender", "Phone No", "Vaccinated", "Vaccine date", "Vaccine", "Actions"],
            rows,
            "No students found",
        ))
        (pagination("/internal/students", "#students-table", Some("#student-filters"), page.page(), page.page_count(list.total)))
    }
}

pub async fn get_students(
    State(state): State<PortalState>,
    session: Session,
) -> PortalResult<Markup> {
    let page_state = StudentPageState::load(&session).await?;

    Ok(state.render(Some(NavItem::Students), html! {
        div class="container mx-auto flex flex-col" {
            div class="flex flex-row flex-wrap justify-between items-center mb-4 gap-2" {
                div class="flex flex-row items-center" {
                    (title("Student Management"))
                    (loading_indicator("students-loading"))
                }
                div class="flex flex-row flex-wrap gap-2" {
                    button class="bg-green-600 hover:bg-green-800 font-bold py-2 px-4 rounded"
                        hx-get="/internal/students/new" hx-target="#dialog" {"Add Student"}
                    (upload_form("/internal/students/bulk_upload", "Upload Bulk Student"))
                    (upload_form("/internal/students/bulk_vaccine_records", "Upload Vaccine Records"))
                    button class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded"
                        hx-get="/internal/students/report" hx-target="#dialog" {"Generate Report"}
                }
            }
            (filter_form(&page_state.filters))
            div id="students-table" hx-get="/internal/students" hx-trigger="load, students-changed from:body"
                hx-include="#student-filters" hx-indicator="#students-loading" {
                span class="text-gray-400" {"Loading..."}
            }
        }
    }))
}

fn upload_form(path: &str, label: &str) -> Markup {
    html! {
        form hx-post=(path) hx-encoding="multipart/form-data" hx-trigger="change" hx-swap="none" {
            label class="cursor-pointer bg-blue-600 hover:bg-blue-800 font-bold py-2 px-4 rounded inline-block" {
                (label)
                input type="file" name="file" accept=".csv,.xls,.xlsx" class="hidden";
            }
        }
    }
}

/// Nothing is written to the session until the fetch is known to be the latest one.
pub async fn internal_get_students(
    State(state): State<PortalState>,
    session: Session,
    Query(query): Query<StudentListQuery>,
) -> PortalResult<Response> {
    let ticket = state.sequencer().issue(sequence_owner(&session), RESOURCE);

    let mut page_state = StudentPageState::load(&session).await?;
    let (filters, page) = query.into_parts();
    page_state.apply(filters, page);

    let mut list = ResourceList::<Student>::load(&session, LIST_KEY).await?;
    let fetched =
        Student::fetch_page(state.api(), &page_state.filters, page_state.pagination()).await;

    if !state.sequencer().is_current(&ticket) {
        return Ok(superseded(RESOURCE));
    }
    list.finish(fetched);
    page_state.save(&session).await?;
    list.save(&session, LIST_KEY).await?;

    Ok(students_table(&list, &page_state).into_response())
}

/// The add/edit dialog body. `existing` switches it into edit mode.
fn student_form(
    existing: Option<&Student>,
    draft: &NewStudent,
    errors: &FieldErrors,
) -> PortalResult<Markup> {
    let editing = existing.is_some();
    let original = existing.map(encode_snapshot).transpose()?;
    let class_options: Vec<String> = classes().collect();

    let fields = html! {
        @if let Some(original) = original {
            input type="hidden" name="original" value=(original);
        }
        (simple_form_element(&InputField::text("name", "Name", &draft.name), errors))
        (select_element(SelectField {
            name: "class",
            label: "Class",
            options: class_options,
            selected: &[draft.class.as_str()],
            multiple: false,
            disabled: false,
            blank: Some("Select a class"),
        }, errors))
        (select_element(SelectField {
            name: "gender",
            label: "Gender",
            options: GENDERS,
            selected: &[draft.gender.as_str()],
            multiple: false,
            disabled: editing,
            blank: Some("Select a gender"),
        }, errors))
        (simple_form_element(&InputField::text("roll_no", "Roll No", &draft.roll_no).disabled(editing), errors))
        (simple_form_element(&InputField::text("phone_no", "Phone No", &draft.phone_no).of_kind("tel"), errors))
    };

    Ok(if editing {
        dialog("Edit Student", html! {
            form hx-patch="/internal/students" hx-target="#dialog" {
                (fields)
                (form_submit_button(Some("Save Changes")))
            }
        })
    } else {
        dialog("Add Student", html! {
            form hx-put="/internal/students" hx-target="#dialog" {
                (fields)
                (form_submit_button(Some("Add Student")))
            }
        })
    })
}

pub async fn internal_get_new_student_form() -> PortalResult<Markup> {
    student_form(None, &NewStudent::default(), &FieldErrors::default())
}

pub async fn internal_put_new_student(
    State(state): State<PortalState>,
    Form(draft): Form<NewStudent>,
) -> PortalResult<Response> {
    let errors = draft.validate();
    if !errors.is_empty() {
        return Ok(student_form(None, &draft, &errors)?.into_response());
    }

    let rsp = Student::create(state.api(), &draft).await;
    let retry = student_form(None, &draft, &FieldErrors::default())?;
    Ok(mutation_outcome(&rsp, REFRESH_EVENT, || retry))
}

pub async fn internal_get_edit_student_form(
    session: Session,
    Query(IdForm { id }): Query<IdForm>,
) -> PortalResult<Markup> {
    let list = ResourceList::<Student>::load(&session, LIST_KEY).await?;
    let student = find_record(&list.records, id, |s| s.id)?;

    student_form(
        Some(student),
        &NewStudent::from(student),
        &FieldErrors::default(),
    )
}

#[derive(Deserialize)]
pub struct StudentEditForm {
    original: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    class: String,
    #[serde(default)]
    gender: String,
    #[serde(default)]
    roll_no: String,
    #[serde(default)]
    phone_no: String,
}

pub async fn internal_patch_student(
    State(state): State<PortalState>,
    Form(form): Form<StudentEditForm>,
) -> PortalResult<Response> {
    let original: Student = decode_snapshot(&form.original)?;
    let edited = NewStudent {
        name: form.name,
        class: form.class,
        gender: form.gender,
        roll_no: form.roll_no,
        phone_no: form.phone_no,
    };

    let errors = edited.validate();
    if !errors.is_empty() {
        return Ok(student_form(Some(&original), &edited, &errors)?.into_response());
    }

    let retry = student_form(Some(&original), &edited, &FieldErrors::default())?;
    let patch = StudentPatch::between(&original, edited);
    if patch.is_empty() {
        debug!(id = ?patch.id, "Saving student with no changed fields");
    }
    let rsp = Student::update(state.api(), &patch).await;
    Ok(mutation_outcome(&rsp, REFRESH_EVENT, || retry))
}

fn vaccinate_form(student: &Student, drive_id: &str, errors: &FieldErrors) -> Markup {
    dialog("Vaccinate Student", html! {
        p class="mb-4 text-gray-300" {(student.name) " (" (student.class) ", Roll No " (student.roll_no) ")"}
        form hx-post="/internal/students/vaccinate" hx-target="#dialog" {
            input type="hidden" name="student_id" value=[student.id];
            (simple_form_element(&InputField::text("drive_id", "Drive ID", drive_id), errors))
            (form_submit_button(Some("Vaccinate")))
        }
    })
}

pub async fn internal_get_vaccinate_form(
    session: Session,
    Query(IdForm { id }): Query<IdForm>,
) -> PortalResult<Markup> {
    let list = ResourceList::<Student>::load(&session, LIST_KEY).await?;
    let student = find_record(&list.records, id, |s| s.id)?;

    Ok(vaccinate_form(student, "", &FieldErrors::default()))
}

pub async fn internal_post_vaccinate(
    State(state): State<PortalState>,
    session: Session,
    Form(form): Form<VaccinateForm>,
) -> PortalResult<Response> {
    let list = ResourceList::<Student>::load(&session, LIST_KEY).await?;
    let student = form
        .student_id
        .and_then(|id| find_record(&list.records, id, |s| s.id).ok());

    let request = match form.validate() {
        Ok(request) => request,
        Err(errors) => {
            return Ok(match student {
                Some(student) => vaccinate_form(student, &form.drive_id, &errors).into_response(),
                None => Toast::error("Vaccination failed", "Student id is required")
                    .render()
                    .into_response(),
            });
        }
    };

    let rsp = Student::vaccinate(state.api(), request).await;
    Ok(mutation_outcome(&rsp, REFRESH_EVENT, || {
        student.map_or_else(
            || html! {},
            |student| vaccinate_form(student, &form.drive_id, &FieldErrors::default()),
        )
    }))
}

async fn forward_upload<F, Fut>(multipart: Multipart, send: F) -> Response
where
    F: FnOnce(UploadedFile) -> Fut,
    Fut: Future<Output = ApiResponse<SuccessEnvelope<serde_json::Value>>>,
{
    match first_upload(multipart).await {
        Ok(file) => {
            info!(file_name = %file.file_name, size = file.bytes.len(), "Forwarding bulk upload");
            let rsp = send(file).await;
            mutation_outcome(&rsp, REFRESH_EVENT, || html! {})
        }
        Err(e) => {
            warn!(?e, "Unusable bulk upload");
            Toast::error("Upload failed", e.to_string()).render().into_response()
        }
    }
}

pub async fn internal_post_bulk_upload(
    State(state): State<PortalState>,
    multipart: Multipart,
) -> Response {
    forward_upload(multipart, |file| async move {
        Student::bulk_upload(state.api(), &file).await
    })
    .await
}

pub async fn internal_post_bulk_vaccine_records(
    State(state): State<PortalState>,
    multipart: Multipart,
) -> Response {
    forward_upload(multipart, |file| async move {
        Student::bulk_upload_vaccine_records(state.api(), &file).await
    })
    .await
}

pub async fn internal_get_report_dialog(session: Session) -> PortalResult<Markup> {
    let StudentPageState { filters, .. } = StudentPageState::load(&session).await?;
    let scope = filters.report_query();

    Ok(dialog("Generate Report", html! {
        p class="mb-4 text-gray-300" {
            @if scope.is_empty() {
                "All students"
            } @else {
                @for (key, value) in &scope {
                    span class="mr-2" {(key) ": " (value)}
                }
            }
        }
        div id="report-result" class="mb-4" {}
        form hx-post="/internal/students/report" hx-target="#report-result" {
            (form_submit_button(Some("Generate Report")))
        }
    }))
}

pub async fn internal_post_report(
    State(state): State<PortalState>,
    session: Session,
) -> PortalResult<Markup> {
    let StudentPageState { filters, .. } = StudentPageState::load(&session).await?;

    Ok(match Student::generate_report(state.api(), &filters).await {
        ApiResponse::Success(link) => {
            let href = state.api().config().rewrite_download_link(&link.file);
            html! {
                a href=(href) target="_blank" rel="noopener noreferrer" class="text-blue-400 hover:underline" {"Download Report"}
            }
        }
        ApiResponse::Failure(e) => {
            warn!(?e, "Report generation failed");
            html! {
                span class="text-red-400" {"Failed to generate report"}
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: u64, vaccinated: bool) -> Student {
        Student {
            id: Some(id),
            name: format!("Student {id}"),
            class: "Grade 3".into(),
            gender: "Male".into(),
            roll_no: format!("R-{id}"),
            phone_no: "9876543210".into(),
            vaccination: Some(vaccinated),
            vaccine_name: vaccinated.then(|| "covaxin".to_string()),
            vaccine_date: None,
        }
    }

    #[test]
    fn vaccinate_button_disabled_for_vaccinated_students() {
        let list = ResourceList {
            records: vec![student(1, true)],
            total: 1,
            error: None,
        };
        let html = students_table(&list, &StudentPageState::default()).into_string();
        assert!(html.contains(r#"disabled hx-get="/internal/students/vaccinate""#));

        let list = ResourceList {
            records: vec![student(2, false)],
            ..list
        };
        let html = students_table(&list, &StudentPageState::default()).into_string();
        assert!(!html.contains(r#"disabled hx-get="/internal/students/vaccinate""#));
    }

    #[test]
    fn edit_form_locks_gender_and_roll_number() {
        let existing = student(4, false);
        let html = student_form(Some(&existing), &NewStudent::from(&existing), &FieldErrors::default())
            .unwrap()
            .into_string();

        assert!(html.contains("hx-patch"));
        assert!(html.contains(r#"name="original""#));
        assert!(html.contains(r#"type="hidden" name="roll_no" value="R-4""#));
        assert!(html.contains(r#"type="hidden" name="gender" value="Male""#));

        let new = student_form(None, &NewStudent::default(), &FieldErrors::default())
            .unwrap()
            .into_string();
        assert!(new.contains("hx-put"));
        assert!(!new.contains(r#"name="original""#));
    }

    #[test]
    fn filter_form_reflects_session_filters() {
        let html = filter_form(&StudentFilters {
            class: "Grade 3".into(),
            vaccination: Some(false),
            ..StudentFilters::default()
        })
        .into_string();

        assert!(html.contains(r#"<option value="Grade 3" selected>"#));
        assert!(html.contains(r#"<option value="No" selected>"#));
    }
}
