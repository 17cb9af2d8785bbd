use crate::{
    api::ApiClient,
    data::{ApiResource, FieldErrors},
    error::PortalResult,
};
use jiff::{SignedDuration, Timestamp, ToSpan, civil::Date, tz::TimeZone};
use serde::{Deserialize, Serialize};

const DRIVES_PATH: &str = "/vaccine-inventory/drives";
/// New drives are scheduled at least this far out.
pub const MIN_LEAD_DAYS: i64 = 16;
pub const CLASS_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaccinationDrive {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub vaccine_name: String,
    pub drive_date: String,
    pub doses: u32,
    pub classes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Reads either an RFC 3339 instant or a bare `YYYY-MM-DD` (taken as UTC midnight).
pub fn parse_drive_date(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    raw.parse::<Timestamp>().ok().or_else(|| {
        raw.get(..10)?
            .parse::<Date>()
            .ok()?
            .to_zoned(TimeZone::UTC)
            .ok()
            .map(|zoned| zoned.timestamp())
    })
}

/// The wire format the drives endpoint expects.
pub fn format_drive_date(date: Date) -> String {
    format!("{date}T00:00:00+00:00")
}

impl VaccinationDrive {
    pub fn date(&self) -> Option<Timestamp> {
        parse_drive_date(&self.drive_date)
    }

    /// The calendar day as written, with no time zone applied.
    pub fn calendar_date(&self) -> Option<Date> {
        self.drive_date.trim().get(..10)?.parse().ok()
    }

    /// Past drives are locked. Unreadable dates are treated as past.
    pub fn is_editable(&self, now: Timestamp) -> bool {
        self.date().is_some_and(|date| date >= now)
    }

    /// Drives dated from `now` up to `days` ahead, soonest first.
    pub fn upcoming(drives: Vec<Self>, now: Timestamp, days: i64) -> Vec<Self> {
        let horizon = now
            .checked_add(SignedDuration::from_hours(days.saturating_mul(24)))
            .unwrap_or(Timestamp::MAX);

        let mut upcoming: Vec<_> = drives
            .into_iter()
            .filter_map(|drive| Some((drive.date()?, drive)))
            .filter(|(date, _)| (now..=horizon).contains(date))
            .collect();
        upcoming.sort_by_key(|(date, _)| *date);
        upcoming.into_iter().map(|(_, drive)| drive).collect()
    }

    pub fn class_list(&self) -> Vec<String> {
        self.classes
            .split(',')
            .map(str::trim)
            .filter(|class| !class.is_empty())
            .map(ToString::to_string)
            .collect()
    }

    pub async fn fetch_all(client: &ApiClient) -> PortalResult<Vec<Self>> {
        client
            .get_json::<DriveListing>(DRIVES_PATH, &[])
            .await
            .map(DriveListing::into_records)
    }
}

/// The drives endpoint sometimes answers with a lone object rather than a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

#[derive(Debug, Deserialize)]
struct DriveListing {
    #[serde(default)]
    data: Option<OneOrMany<VaccinationDrive>>,
}

impl DriveListing {
    fn into_records(self) -> Vec<VaccinationDrive> {
        match self.data {
            Some(OneOrMany::Many(drives)) => drives,
            Some(OneOrMany::One(drive)) => vec![drive],
            None => vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewDrive {
    pub vaccine_name: String,
    pub drive_date: String,
    pub doses: u32,
    pub classes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrivePatch {
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vaccine_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<String>,
}

impl DrivePatch {
    pub const fn is_empty(&self) -> bool {
        self.vaccine_name.is_none()
            && self.drive_date.is_none()
            && self.doses.is_none()
            && self.classes.is_none()
    }
}

impl ApiResource for VaccinationDrive {
    type Draft = NewDrive;
    type Patch = DrivePatch;

    const PATH: &'static str = DRIVES_PATH;
}

/// The add/edit drive dialog as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveForm {
    pub vaccine_name: String,
    pub drive_date: String,
    pub doses: String,
    pub classes: Vec<String>,
    pub original: Option<String>,
}

impl DriveForm {
    /// Built from raw pairs because the classes multi-select repeats its field name.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "vaccine_name" => form.vaccine_name = value,
                "drive_date" => form.drive_date = value,
                "doses" => form.doses = value,
                "classes" if !value.is_empty() => form.classes.push(value),
                "original" if !value.is_empty() => form.original = Some(value),
                _ => {}
            }
        }
        form
    }

    pub fn from_drive(drive: &VaccinationDrive) -> Self {
        Self {
            vaccine_name: drive.vaccine_name.clone(),
            drive_date: drive
                .calendar_date()
                .map(|date| date.to_string())
                .unwrap_or_default(),
            doses: drive.doses.to_string(),
            classes: drive.class_list(),
            original: None,
        }
    }

    pub fn validate(&self) -> Result<NewDrive, FieldErrors> {
        let mut errors = FieldErrors::default();

        if self.vaccine_name.trim().is_empty() {
            errors.add("vaccine_name", "Vaccine name cannot be empty");
        }

        let date = if self.drive_date.trim().is_empty() {
            errors.add("drive_date", "Drive date cannot be empty");
            None
        } else if let Ok(date) = self.drive_date.trim().parse::<Date>() {
            Some(date)
        } else {
            errors.add("drive_date", "Please enter a valid date");
            None
        };

        let doses = match self.doses.trim().parse::<i64>() {
            Err(_) if self.doses.trim().is_empty() => {
                errors.add("doses", "doses No cannot be empty");
                None
            }
            Err(_) => {
                errors.add("doses", "Please enter numerical value");
                None
            }
            Ok(doses) if doses <= 0 => {
                errors.add("doses", "Please enter positive numerical value");
                None
            }
            Ok(doses) => match u32::try_from(doses) {
                Ok(doses) => Some(doses),
                Err(_) => {
                    errors.add("doses", "Please enter numerical value");
                    None
                }
            },
        };

        if self.classes.is_empty() {
            errors.add("classes", "Classes No cannot be empty");
        }

        match (date, doses) {
            (Some(date), Some(doses)) if errors.is_empty() => Ok(NewDrive {
                vaccine_name: self.vaccine_name.trim().to_string(),
                drive_date: format_drive_date(date),
                doses,
                classes: self.classes.join(CLASS_SEPARATOR),
            }),
            _ => Err(errors),
        }
    }
}

impl DriveForm {
    /// `validate`, plus the minimum lead time new drives must respect.
    pub fn validate_new(&self, today: Date) -> Result<NewDrive, FieldErrors> {
        let earliest = NewDrive::earliest_date(today);
        let too_soon = self
            .drive_date
            .trim()
            .parse::<Date>()
            .is_ok_and(|date| date < earliest);

        match self.validate() {
            Ok(_) if too_soon => {
                let mut errors = FieldErrors::default();
                errors.add("drive_date", "Drive date must be at least 16 days from today");
                Err(errors)
            }
            Err(mut errors) if too_soon => {
                errors.add("drive_date", "Drive date must be at least 16 days from today");
                Err(errors)
            }
            outcome => outcome,
        }
    }
}

impl NewDrive {
    /// Default date for a new drive, also the earliest one the picker offers.
    pub fn earliest_date(today: Date) -> Date {
        today.saturating_add(MIN_LEAD_DAYS.days())
    }

    pub fn patch_against(&self, original: &VaccinationDrive) -> DrivePatch {
        let original_date = original.calendar_date().map(format_drive_date);
        let original_classes = original.class_list().join(CLASS_SEPARATOR);

        DrivePatch {
            id: original.id,
            vaccine_name: (self.vaccine_name != original.vaccine_name)
                .then(|| self.vaccine_name.clone()),
            drive_date: (Some(&self.drive_date) != original_date.as_ref())
                .then(|| self.drive_date.clone()),
            doses: (self.doses != original.doses).then_some(self.doses),
            classes: (self.classes != original_classes).then(|| self.classes.clone()),
        }
    }
}
