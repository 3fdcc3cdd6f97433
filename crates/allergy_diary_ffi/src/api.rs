//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose diary and profile use-cases to Dart via FRB.
//! - Own the single per-process store instances shared by all calls.
//!
//! # Invariants
//! - Exported functions must not panic across the FFI boundary.
//! - Failures are reported through `ok=false` envelopes or error strings.
//! - The database path is fixed once the stores are first opened.

use allergy_diary_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, open_kv,
    ping as ping_inner, DiaryStore, FamilyMember, PersonalProfile, ProfileSelection,
    ProfileStore, ReactionCategory, ReactionDuration, ReactionRecord, RecordQuery,
    SqliteKvStore,
};
use chrono::{NaiveDate, Utc};
use log::warn;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

const DB_FILE_NAME: &str = "allergy_diary.sqlite3";
const DB_PATH_ENV: &str = "ALLERGY_DIARY_DB_PATH";
const DATE_FORMAT: &str = "%Y-%m-%d";

static DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static STORES: OnceLock<AppStores> = OnceLock::new();

struct AppStores {
    diary: DiaryStore<Arc<SqliteKvStore>>,
    profile: ProfileStore<Arc<SqliteKvStore>>,
}

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Pins the database file used by all subsequent calls.
///
/// Must run before the first diary/profile call. Repeating the same path is
/// accepted; a different path after the first one is rejected.
/// Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_db_path(path: String) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "db path cannot be empty".to_string();
    }
    let requested = PathBuf::from(trimmed);
    let active = DB_PATH.get_or_init(|| requested.clone());
    if *active == requested {
        String::new()
    } else {
        format!(
            "db path already set to `{}`; refusing to switch to `{}`",
            active.display(),
            requested.display()
        )
    }
}

/// Flat record view for list/detail screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryRecordItem {
    pub id: String,
    /// `food|medication|plants`.
    pub category: String,
    pub name: String,
    pub amount: Option<String>,
    pub preparation_method: Option<String>,
    pub reaction: String,
    pub reaction_score: u8,
    pub skin_reaction: u8,
    pub digestive_reaction: u8,
    pub respiratory_reaction: u8,
    /// Time of day (`HH:MM[:SS]`) or whole hours rendered as `<n>h`.
    pub reaction_duration: Option<String>,
    /// RFC 3339 timestamp when known.
    pub recorded_at: Option<String>,
}

/// Input shape for `diary_append`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryRecordInput {
    pub category: String,
    pub name: String,
    pub amount: Option<String>,
    pub preparation_method: Option<String>,
    pub reaction: String,
    pub reaction_score: u8,
    pub skin_reaction: u8,
    pub digestive_reaction: u8,
    pub respiratory_reaction: u8,
    /// `HH:MM[:SS]` time of day.
    pub reaction_time: Option<String>,
    /// Whole hours, used when `reaction_time` is absent.
    pub reaction_hours: Option<u32>,
}

/// List response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiaryListResponse {
    pub ok: bool,
    pub items: Vec<DiaryRecordItem>,
    /// Non-empty when stored data was unreadable or the store failed to open.
    pub message: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Affected record ID when applicable.
    pub record_id: Option<String>,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, record_id: Option<String>) -> Self {
        Self {
            ok: true,
            record_id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            record_id: None,
            message: message.into(),
        }
    }
}

/// Personal profile view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalProfileItem {
    pub name: String,
    /// Age as of today (recomputed when the birth date is known).
    pub age: u32,
    /// `YYYY-MM-DD` when known.
    pub birth_date: Option<String>,
}

/// Family member view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyMemberItem {
    pub name: String,
    pub birth_date: String,
    pub relation: String,
    pub age: Option<u32>,
}

/// Lists diary records, optionally filtered by category label.
#[flutter_rust_bridge::frb(sync)]
pub fn diary_list(category: Option<String>) -> DiaryListResponse {
    let stores = match stores() {
        Ok(stores) => stores,
        Err(message) => {
            return DiaryListResponse {
                ok: false,
                items: Vec::new(),
                message,
            }
        }
    };

    let category = match category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(label) => match ReactionCategory::parse(label) {
            Some(category) => Some(category),
            None => {
                return DiaryListResponse {
                    ok: false,
                    items: Vec::new(),
                    message: format!("unknown category `{label}`"),
                }
            }
        },
        None => None,
    };

    let items = stores
        .diary
        .query(&RecordQuery {
            category,
            ..RecordQuery::default()
        })
        .into_iter()
        .map(to_record_item)
        .collect::<Vec<_>>();
    let message = stores
        .diary
        .load_warning()
        .map(|warning| warning.to_string())
        .unwrap_or_default();

    DiaryListResponse {
        ok: true,
        items,
        message,
    }
}

/// Returns one record by ID for the detail screen.
#[flutter_rust_bridge::frb(sync)]
pub fn diary_get(record_id: String) -> Option<DiaryRecordItem> {
    let id = Uuid::parse_str(record_id.trim()).ok()?;
    let stores = stores().ok()?;
    stores.diary.get(id).map(to_record_item)
}

/// Validates and appends a record.
#[flutter_rust_bridge::frb(sync)]
pub fn diary_append(input: DiaryRecordInput) -> ActionResponse {
    let record = match to_record(input) {
        Ok(record) => record,
        Err(message) => return ActionResponse::failure(message),
    };
    let record_id = record.id.to_string();

    match stores().and_then(|stores| stores.diary.append(record).map_err(|err| err.to_string())) {
        Ok(()) => ActionResponse::success("Record added.", Some(record_id)),
        Err(message) => ActionResponse::failure(format!("diary_append failed: {message}")),
    }
}

/// Removes every diary record.
#[flutter_rust_bridge::frb(sync)]
pub fn diary_clear() -> ActionResponse {
    match stores().and_then(|stores| stores.diary.clear().map_err(|err| err.to_string())) {
        Ok(()) => ActionResponse::success("Diary cleared.", None),
        Err(message) => ActionResponse::failure(format!("diary_clear failed: {message}")),
    }
}

/// Returns `personal|family|unset`.
#[flutter_rust_bridge::frb(sync)]
pub fn profile_get() -> String {
    match stores() {
        Ok(stores) => stores.profile.get().as_str().to_string(),
        Err(message) => {
            warn!("event=ffi_profile_get module=ffi status=degraded error={message}");
            ProfileSelection::Unset.as_str().to_string()
        }
    }
}

/// Persists `personal|family|unset`.
#[flutter_rust_bridge::frb(sync)]
pub fn profile_set(selection: String) -> ActionResponse {
    let Some(selection) = ProfileSelection::parse(&selection) else {
        return ActionResponse::failure(format!("unknown profile type `{selection}`"));
    };
    match stores().and_then(|stores| stores.profile.set(selection).map_err(|err| err.to_string()))
    {
        Ok(()) => ActionResponse::success("Profile type saved.", None),
        Err(message) => ActionResponse::failure(format!("profile_set failed: {message}")),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn personal_profile_get() -> Option<PersonalProfileItem> {
    let profile = stores().ok()?.profile.personal_profile()?;
    let today = Utc::now().date_naive();
    Some(PersonalProfileItem {
        age: profile.age_on(today),
        birth_date: profile.birth_date.map(format_date),
        name: profile.name,
    })
}

/// Creates the personal profile from a `YYYY-MM-DD` birth date.
#[flutter_rust_bridge::frb(sync)]
pub fn personal_profile_set(name: String, birth_date: String) -> ActionResponse {
    let result = parse_date(&birth_date).and_then(|birth_date| {
        let profile = PersonalProfile::from_birth_date(&name, birth_date, Utc::now().date_naive())
            .map_err(|err| err.to_string())?;
        stores()?
            .profile
            .set_personal_profile(&profile)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(()) => ActionResponse::success("Personal profile saved.", None),
        Err(message) => ActionResponse::failure(format!("personal_profile_set failed: {message}")),
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn family_list() -> Vec<FamilyMemberItem> {
    let Ok(stores) = stores() else {
        return Vec::new();
    };
    let today = Utc::now().date_naive();
    stores
        .profile
        .family_members()
        .into_iter()
        .map(|member| FamilyMemberItem {
            age: member.age_on(today),
            birth_date: format_date(member.birth_date),
            name: member.name,
            relation: member.relation,
        })
        .collect()
}

/// Adds a family member; blank `relation` uses the default label.
#[flutter_rust_bridge::frb(sync)]
pub fn family_add(name: String, birth_date: String, relation: String) -> ActionResponse {
    let result = parse_date(&birth_date).and_then(|birth_date| {
        let member = FamilyMember::new(&name, birth_date, &relation);
        stores()?
            .profile
            .add_family_member(member, Utc::now().date_naive())
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(()) => ActionResponse::success("Family member saved.", None),
        Err(message) => ActionResponse::failure(format!("family_add failed: {message}")),
    }
}

fn stores() -> Result<&'static AppStores, String> {
    if let Some(stores) = STORES.get() {
        return Ok(stores);
    }

    let path = resolve_db_path();
    let kv = Arc::new(open_kv(&path).map_err(|err| format!("diary DB open failed: {err}"))?);
    let diary = DiaryStore::open(Arc::clone(&kv))
        .map_err(|err| format!("diary store open failed: {err}"))?;
    let profile = ProfileStore::new(kv);

    // A racing caller may have won; its stores are the ones every later
    // call sees.
    Ok(STORES.get_or_init(|| AppStores { diary, profile }))
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(DB_FILE_NAME)
        })
        .clone()
}

fn to_record(input: DiaryRecordInput) -> Result<ReactionRecord, String> {
    let category = ReactionCategory::parse(&input.category)
        .ok_or_else(|| format!("unknown category `{}`", input.category))?;
    let mut record = ReactionRecord::new(category, input.name);
    record.amount = input.amount;
    record.preparation_method = input.preparation_method;
    record.reaction = input.reaction;
    record.reaction_score = input.reaction_score;
    record.skin_reaction = input.skin_reaction;
    record.digestive_reaction = input.digestive_reaction;
    record.respiratory_reaction = input.respiratory_reaction;
    record.reaction_duration = match (input.reaction_time, input.reaction_hours) {
        (Some(time), _) if !time.trim().is_empty() => Some(ReactionDuration::TimeOfDay(time)),
        (_, Some(hours)) => Some(ReactionDuration::Hours(hours)),
        _ => None,
    };
    Ok(record)
}

fn to_record_item(record: ReactionRecord) -> DiaryRecordItem {
    DiaryRecordItem {
        id: record.id.to_string(),
        category: record.category.as_str().to_string(),
        name: record.name,
        amount: record.amount,
        preparation_method: record.preparation_method,
        reaction: record.reaction,
        reaction_score: record.reaction_score,
        skin_reaction: record.skin_reaction,
        digestive_reaction: record.digestive_reaction,
        respiratory_reaction: record.respiratory_reaction,
        reaction_duration: record.reaction_duration.map(|duration| match duration {
            ReactionDuration::Hours(hours) => format!("{hours}h"),
            ReactionDuration::TimeOfDay(time) => time,
        }),
        recorded_at: record.recorded_at.map(|at| at.to_rfc3339()),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|err| format!("invalid date `{value}` (expected YYYY-MM-DD): {err}"))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
