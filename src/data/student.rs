use crate::{
    api::{
        ApiClient, UploadedFile,
        envelope::{ApiResponse, FileLink, SuccessEnvelope},
    },
    data::{ApiResource, FieldErrors, Listing, Pagination, clean_query},
    error::{PortalResult, TowerSessionSnafu},
};
use axum_login::tower_sessions::Session;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

pub const STUDENTS_PAGE_SIZE: u32 = 5;

const LIST_PATH: &str = "/student-management/vaccine-records/students";
const VACCINATE_PATH: &str = "/student-management/vaccine-records";
const BULK_STUDENTS_PATH: &str = "/bulk-upload/students";
const BULK_VACCINE_RECORDS_PATH: &str = "/bulk-upload/vaccine-records";
const REPORT_PATH: &str = "/student-management/vaccine-records/genrate-report";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    pub class: String,
    pub gender: String,
    pub roll_no: String,
    pub phone_no: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vaccination: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vaccine_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vaccine_date: Option<String>,
}

impl Student {
    pub fn is_vaccinated(&self) -> bool {
        self.vaccination.unwrap_or(false)
    }
}

/// The editable part of a student, as typed into the add/edit dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStudent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub roll_no: String,
    #[serde(default)]
    pub phone_no: String,
}

impl NewStudent {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();

        if self.name.is_empty() {
            errors.add("name", "Name is required");
        } else if self.name.chars().count() < 3 {
            errors.add("name", "Name should be at least 3 characters long");
        }
        if self.class.is_empty() {
            errors.add("class", "Class is required");
        }
        if self.gender.is_empty() {
            errors.add("gender", "Gender is required");
        }
        if self.roll_no.is_empty() {
            errors.add("roll_no", "Roll No is required");
        }
        if self.phone_no.is_empty() {
            errors.add("phone_no", "Phone No is required");
        }

        errors
    }
}

impl From<&Student> for NewStudent {
    fn from(student: &Student) -> Self {
        Self {
            name: student.name.clone(),
            class: student.class.clone(),
            gender: student.gender.clone(),
            roll_no: student.roll_no.clone(),
            phone_no: student.phone_no.clone(),
        }
    }
}

/// Only the fields that changed, plus the id to change them on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentPatch {
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_no: Option<String>,
}

impl StudentPatch {
    pub fn between(original: &Student, edited: NewStudent) -> Self {
        let changed = |before: &str, after: String| (before != after).then_some(after);

        Self {
            id: original.id,
            name: changed(&original.name, edited.name),
            class: changed(&original.class, edited.class),
            gender: changed(&original.gender, edited.gender),
            roll_no: changed(&original.roll_no, edited.roll_no),
            phone_no: changed(&original.phone_no, edited.phone_no),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.class.is_none()
            && self.gender.is_none()
            && self.roll_no.is_none()
            && self.phone_no.is_none()
    }
}

impl ApiResource for Student {
    type Draft = NewStudent;
    type Patch = StudentPatch;

    const PATH: &'static str = "/student-management/students";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VaccinateRequest {
    pub student_id: u64,
    pub drive_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VaccinateForm {
    pub student_id: Option<u64>,
    #[serde(default)]
    pub drive_id: String,
}

impl VaccinateForm {
    pub fn validate(&self) -> Result<VaccinateRequest, FieldErrors> {
        let mut errors = FieldErrors::default();

        if self.student_id.is_none() {
            errors.add("student_id", "Student id is required");
        }
        let drive_id = self.drive_id.trim();
        let drive_id = if drive_id.is_empty() {
            errors.add("drive_id", "Drive id is required");
            None
        } else if let Ok(id) = drive_id.parse() {
            Some(id)
        } else {
            errors.add("drive_id", "Please enter numerical value");
            None
        };

        match (self.student_id, drive_id) {
            (Some(student_id), Some(drive_id)) if errors.is_empty() => Ok(VaccinateRequest {
                student_id,
                drive_id,
            }),
            _ => Err(errors),
        }
    }
}

/// The dropdown shows "Yes"/"No"/nothing; the API wants true/false/absent.
pub fn vaccination_from_ui(value: &str) -> Option<bool> {
    match value {
        "Yes" => Some(true),
        "No" => Some(false),
        _ => None,
    }
}

pub const fn vaccination_to_ui(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentFilters {
    pub name: String,
    pub class: String,
    pub gender: String,
    pub roll_no: String,
    pub phone_no: String,
    pub vaccine_name: String,
    pub vaccination: Option<bool>,
}

impl StudentFilters {
    fn pairs(&self) -> [(&'static str, Option<String>); 7] {
        [
            ("name", Some(self.name.clone())),
            ("class", Some(self.class.clone())),
            ("gender", Some(self.gender.clone())),
            ("roll_no", Some(self.roll_no.clone())),
            ("phone_no", Some(self.phone_no.clone())),
            ("vaccine_name", Some(self.vaccine_name.clone())),
            ("vaccination", self.vaccination.map(|v| v.to_string())),
        ]
    }

    pub fn list_query(&self, pagination: Pagination) -> Vec<(&'static str, String)> {
        let mut query = pagination.query();
        query.extend(clean_query(self.pairs()));
        query
    }

    /// The report endpoint only understands class and vaccine.
    pub fn report_query(&self) -> Vec<(&'static str, String)> {
        clean_query(
            self.pairs()
                .into_iter()
                .filter(|(key, _)| matches!(*key, "class" | "vaccine_name")),
        )
    }
}

/// Filter row and pager as sent by the students table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StudentListQuery {
    pub name: String,
    pub class: String,
    pub gender: String,
    pub roll_no: String,
    pub phone_no: String,
    pub vaccine_name: String,
    pub vaccination: String,
    pub page: Option<u32>,
}

impl StudentListQuery {
    pub fn into_parts(self) -> (StudentFilters, Option<u32>) {
        (
            StudentFilters {
                name: self.name,
                class: self.class,
                gender: self.gender,
                roll_no: self.roll_no,
                phone_no: self.phone_no,
                vaccine_name: self.vaccine_name,
                vaccination: vaccination_from_ui(&self.vaccination),
            },
            self.page,
        )
    }
}

/// Filters and current page of the students screen, kept for the life of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentPageState {
    pub filters: StudentFilters,
    pub page: u32,
}

impl Default for StudentPageState {
    fn default() -> Self {
        Self {
            filters: StudentFilters::default(),
            page: 1,
        }
    }
}

impl StudentPageState {
    const SESSION_KEY: &'static str = "students.page_state";

    /// Any change to the filters sends the user back to page 1, whatever page was asked for.
    pub fn apply(&mut self, filters: StudentFilters, requested_page: Option<u32>) {
        if filters != self.filters {
            self.filters = filters;
            self.page = 1;
        } else if let Some(page) = requested_page {
            self.page = page.max(1);
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, STUDENTS_PAGE_SIZE)
    }

    pub async fn load(session: &Session) -> PortalResult<Self> {
        Ok(session
            .get(Self::SESSION_KEY)
            .await
            .context(TowerSessionSnafu)?
            .unwrap_or_default())
    }

    pub async fn save(&self, session: &Session) -> PortalResult<()> {
        session
            .insert(Self::SESSION_KEY, self)
            .await
            .context(TowerSessionSnafu)
    }
}

impl Student {
    pub async fn fetch_page(
        client: &ApiClient,
        filters: &StudentFilters,
        pagination: Pagination,
    ) -> PortalResult<(Vec<Self>, u64)> {
        client
            .get_json::<Listing<Self>>(LIST_PATH, &filters.list_query(pagination))
            .await
            .map(Listing::into_parts)
    }

    pub async fn vaccinate(
        client: &ApiClient,
        request: VaccinateRequest,
    ) -> ApiResponse<SuccessEnvelope<Self>> {
        client.post_json(VACCINATE_PATH, &request).await
    }

    pub async fn bulk_upload(
        client: &ApiClient,
        file: &UploadedFile,
    ) -> ApiResponse<SuccessEnvelope<serde_json::Value>> {
        client.post_multipart(BULK_STUDENTS_PATH, file).await
    }

    pub async fn bulk_upload_vaccine_records(
        client: &ApiClient,
        file: &UploadedFile,
    ) -> ApiResponse<SuccessEnvelope<serde_json::Value>> {
        client.post_multipart(BULK_VACCINE_RECORDS_PATH, file).await
    }

    pub async fn generate_report(
        client: &ApiClient,
        filters: &StudentFilters,
    ) -> ApiResponse<FileLink> {
        client
            .get_enveloped(REPORT_PATH, &filters.report_query())
            .await
    }
}
