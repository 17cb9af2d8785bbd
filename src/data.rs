use crate::{
    api::{
        ApiClient,
        envelope::{ApiResponse, SuccessEnvelope},
    },
    error::{
        B64Snafu, PortalResult, RmpSerdeDecodeSnafu, RmpSerdeEncodeSnafu, TowerSessionSnafu,
    },
};
use axum_login::tower_sessions::Session;
use base64::{Engine, prelude::BASE64_URL_SAFE};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use snafu::ResultExt;
use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

pub mod dashboard;
pub mod drive;
pub mod student;
pub mod upload_report;

pub const VACCINES: [&str; 3] = ["pfizer shield", "covishield", "covaxin"];
pub const GENDERS: [&str; 2] = ["Male", "Female"];

pub fn classes() -> impl Iterator<Item = String> {
    (1..=12).map(|grade| format!("Grade {grade}"))
}

#[derive(Deserialize)]
pub struct IdForm {
    pub id: u64,
}

/// Packs a record into a form-safe string so an edit form can carry the version it started from.
pub fn encode_snapshot<T: Serialize>(value: &T) -> PortalResult<String> {
    Ok(BASE64_URL_SAFE.encode(rmp_serde::to_vec_named(value).context(RmpSerdeEncodeSnafu)?))
}

pub fn decode_snapshot<T: DeserializeOwned>(encoded: &str) -> PortalResult<T> {
    rmp_serde::from_slice(&BASE64_URL_SAFE.decode(encoded).context(B64Snafu)?)
        .context(RmpSerdeDecodeSnafu)
}

/// Inline validation messages keyed by form field name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, &'static str>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.entry(field).or_insert(message);
    }

    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.get(field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A resource the API lets us create and patch at a single collection path.
pub trait ApiResource: Sized + DeserializeOwned {
    type Draft: Serialize + Send + Sync;
    type Patch: Serialize + Send + Sync;

    const PATH: &'static str;

    async fn create(client: &ApiClient, draft: &Self::Draft) -> ApiResponse<SuccessEnvelope<Self>> {
        client.post_json(Self::PATH, draft).await
    }

    async fn update(client: &ApiClient, patch: &Self::Patch) -> ApiResponse<SuccessEnvelope<Self>> {
        client.patch_json(Self::PATH, patch).await
    }
}

/// 1-based page plus page size.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub const fn page(&self) -> u32 {
        self.page
    }

    pub const fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset().to_string()),
        ]
    }
}

/// Drops absent and empty values so they never reach a query string.
pub fn clean_query<I, V>(pairs: I) -> Vec<(&'static str, String)>
where
    I: IntoIterator<Item = (&'static str, Option<V>)>,
    V: ToString,
{
    pairs
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v.to_string())))
        .filter(|(_, value)| !value.is_empty())
        .collect()
}

/// Shape of the API's paged list responses.
#[derive(Debug, Deserialize)]
pub struct Listing<T> {
    pub data: Option<Vec<T>>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl<T> Listing<T> {
    pub fn into_parts(self) -> (Vec<T>, u64) {
        (self.data.unwrap_or_default(), self.total.unwrap_or_default())
    }
}

/// What a list screen remembers between requests: the last good records, and whether the latest fetch failed.
///
/// In-flight state is not kept here; the list containers show an htmx indicator while a fetch runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceList<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub error: Option<String>,
}

impl<T> Default for ResourceList<T> {
    fn default() -> Self {
        Self {
            records: vec![],
            total: 0,
            error: None,
        }
    }
}

impl<T: Serialize + DeserializeOwned> ResourceList<T> {
    pub async fn load(session: &Session, key: &str) -> PortalResult<Self> {
        Ok(session
            .get(key)
            .await
            .context(TowerSessionSnafu)?
            .unwrap_or_default())
    }

    pub async fn save(&self, session: &Session, key: &str) -> PortalResult<()> {
        session.insert(key, self).await.context(TowerSessionSnafu)
    }
}

impl<T> ResourceList<T> {
    /// A failed fetch keeps the previous records so the table doesn't blank out.
    pub fn finish(&mut self, result: PortalResult<(Vec<T>, u64)>) {
        match result {
            Ok((records, total)) => {
                self.records = records;
                self.total = total;
                self.error = None;
            }
            Err(e) => {
                warn!(?e, "List fetch failed");
                self.error = Some(e.to_string());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    owner: String,
    resource: &'static str,
    seq: u64,
}

/// Hands out increasing tickets per (owner, resource) so a slow, superseded response can be spotted and dropped.
///
/// Owners idle for longer than `idle_ttl` are dropped, matching how long their session survives.
#[derive(Debug)]
pub struct RequestSequencer {
    next: AtomicU64,
    idle_ttl: Duration,
    latest: Mutex<HashMap<(String, &'static str), (u64, Instant)>>,
}

impl Default for RequestSequencer {
    fn default() -> Self {
        Self::new(Duration::from_secs(crate::auth::SESSION_IDLE_SECS.unsigned_abs()))
    }
}

impl RequestSequencer {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            next: AtomicU64::new(0),
            idle_ttl,
            latest: Mutex::default(),
        }
    }

    pub fn issue(&self, owner: impl Into<String>, resource: &'static str) -> RequestTicket {
        self.issue_at(owner, resource, Instant::now())
    }

    fn issue_at(&self, owner: impl Into<String>, resource: &'static str, now: Instant) -> RequestTicket {
        let seq = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        let owner = owner.into();

        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cutoff) = now.checked_sub(self.idle_ttl) {
            latest.retain(|_, (_, touched)| *touched >= cutoff);
        }
        latest.insert((owner.clone(), resource), (seq, now));

        RequestTicket {
            owner,
            resource,
            seq,
        }
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(ticket.owner.clone(), ticket.resource))
            .is_none_or(|(latest, _)| *latest == ticket.seq)
    }

    pub fn forget(&self, owner: &str) {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(o, _), _| o != owner);
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PortalError;

    #[test]
    fn offset_is_page_minus_one_times_limit() {
        for page in 1..=20 {
            for limit in [1, 5, 10, 25] {
                assert_eq!(
                    Pagination::new(page, limit).offset(),
                    u64::from((page - 1) * limit)
                );
            }
        }
        assert_eq!(Pagination::new(2, 5).offset(), 5);
    }

    #[test]
    fn page_zero_is_treated_as_first_page() {
        assert_eq!(Pagination::new(0, 5).page(), 1);
        assert_eq!(Pagination::new(0, 5).offset(), 0);
    }

    #[test]
    fn page_count_rounds_up() {
        let p = Pagination::new(1, 5);
        assert_eq!(p.page_count(0), 0);
        assert_eq!(p.page_count(5), 1);
        assert_eq!(p.page_count(6), 2);
        assert_eq!(p.page_count(23), 5);
    }

    #[test]
    fn empty_and_missing_values_never_reach_the_query() {
        let cleaned = clean_query([
            ("name", Some(String::new())),
            ("class", Some("Grade 3".to_string())),
            ("gender", None),
            ("roll_no", Some("17".to_string())),
        ]);

        assert_eq!(
            cleaned,
            vec![("class", "Grade 3".to_string()), ("roll_no", "17".to_string())]
        );
        assert!(clean_query::<_, String>([("a", None), ("b", Some(String::new()))]).is_empty());
    }

    #[test]
    fn failed_fetch_keeps_previous_records() {
        let mut list = ResourceList::<u32>::default();
        list.finish(Ok((vec![1, 2, 3], 3)));
        assert_eq!(list.records, vec![1, 2, 3]);

        list.finish(Err(PortalError::ApiStatus {
            path: "/bulk-upload".into(),
            status: 500,
        }));
        assert_eq!(list.records, vec![1, 2, 3]);
        assert_eq!(list.total, 3);
        assert!(list.error.is_some());

        list.finish(Ok((vec![4], 1)));
        assert_eq!(list.error, None);
    }

    #[test]
    fn superseded_tickets_are_stale() {
        let sequencer = RequestSequencer::default();

        let first = sequencer.issue("session-a", "students");
        let other_session = sequencer.issue("session-b", "students");
        let other_resource = sequencer.issue("session-a", "reports");
        assert!(sequencer.is_current(&first));

        let second = sequencer.issue("session-a", "students");
        assert!(!sequencer.is_current(&first));
        assert!(sequencer.is_current(&second));
        assert!(sequencer.is_current(&other_session));
        assert!(sequencer.is_current(&other_resource));

        sequencer.forget("session-a");
        assert!(sequencer.is_current(&first));
    }

    #[test]
    fn idle_owners_are_dropped() {
        let sequencer = RequestSequencer::new(Duration::from_secs(60));
        let start = Instant::now();

        sequencer.issue_at("expired-session", "students", start);
        sequencer.issue_at("expired-session", "drives", start);
        sequencer.issue_at("active-session", "students", start + Duration::from_secs(50));
        assert_eq!(sequencer.tracked(), 3);

        let ticket = sequencer.issue_at("active-session", "reports", start + Duration::from_secs(90));
        assert_eq!(sequencer.tracked(), 2);
        assert!(sequencer.is_current(&ticket));
    }

    #[test]
    fn snapshot_survives_a_form_round_trip() {
        let encoded = encode_snapshot(&("Grade 4", 12_u32)).unwrap();
        assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '='));
        assert_eq!(decode_snapshot::<(String, u32)>(&encoded).unwrap(), ("Grade 4".to_string(), 12));
        assert!(decode_snapshot::<(String, u32)>("!!not base64!!").is_err());
    }

    #[test]
    fn first_error_per_field_wins() {
        let mut errors = FieldErrors::default();
        assert!(errors.is_empty());
        errors.add("doses", "Please enter numerical value");
        errors.add("doses", "doses No cannot be empty");
        assert_eq!(errors.get("doses"), Some("Please enter numerical value"));
        assert_eq!(errors.get("classes"), None);
    }

    #[test]
    fn listing_tolerates_null_or_missing_data() {
        let listing: Listing<u32> = serde_json::from_str(r#"{"data":null,"total":null}"#).unwrap();
        assert_eq!(listing.into_parts(), (vec![], 0));

        let listing: Listing<u32> = serde_json::from_str("{}").unwrap();
        assert_eq!(listing.into_parts(), (vec![], 0));
    }

    #[derive(Debug, PartialEq, Deserialize)]
    struct NoDefault {
        id: u64,
    }

    #[test]
    fn listing_of_records_without_default() {
        let listing: Listing<NoDefault> =
            serde_json::from_str(r#"{"data":[{"id":4}],"total":9}"#).unwrap();
        assert_eq!(listing.into_parts(), (vec![NoDefault { id: 4 }], 9));
    }
}
