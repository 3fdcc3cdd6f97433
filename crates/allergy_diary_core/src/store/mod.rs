//! Stores owning the serialized diary and profile values.
//!
//! # Responsibility
//! - Map domain values to the documented key-value keys.
//! - Validate before every write and degrade gracefully on unreadable data.
//!
//! # Invariants
//! - Every write replaces the whole value under its key.
//! - A failed write leaves in-memory state untouched.
//! - Malformed stored JSON never aborts a load; it yields a `LoadWarning`
//!   and the raw value is copied to `<key>.corrupt` first. A failed copy is
//!   flagged by `LoadWarning::backed_up == false`.

use crate::kv::{KeyValueStore, KvError};
use crate::model::profile::ProfileValidationError;
use crate::model::record::{RecordId, RecordValidationError};
use log::{error, warn};
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod diary_store;
pub mod profile_store;

/// JSON array of reaction records.
pub const RECORDS_KEY: &str = "allergyRecords";
/// `"personal"` / `"family"`; absence means unset.
pub const PROFILE_TYPE_KEY: &str = "profileType";
/// JSON personal profile singleton.
pub const PERSONAL_PROFILE_KEY: &str = "personalProfile";
/// JSON array of family members.
pub const FAMILY_MEMBERS_KEY: &str = "familyMembers";

const CORRUPT_SUFFIX: &str = ".corrupt";

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error for validation and persistence failures.
#[derive(Debug)]
pub enum StoreError {
    /// Record rejected by the append policy; nothing was written.
    InvalidRecord(RecordValidationError),
    /// Profile value rejected; nothing was written.
    InvalidProfile(ProfileValidationError),
    /// A record with the same id is already stored.
    DuplicateRecord(RecordId),
    /// Underlying medium failed to read or write.
    Persistence(KvError),
    /// Value could not be serialized for storage.
    Encode(serde_json::Error),
}

impl StoreError {
    /// Whether the caller can fix this by changing its input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidRecord(_) | Self::InvalidProfile(_) | Self::DuplicateRecord(_)
        )
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidRecord(err) => write!(f, "invalid record: {err}"),
            Self::InvalidProfile(err) => write!(f, "invalid profile: {err}"),
            Self::DuplicateRecord(id) => write!(f, "record already exists: {id}"),
            Self::Persistence(err) => write!(f, "storage failure: {err}"),
            Self::Encode(err) => write!(f, "failed to encode value: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRecord(err) => Some(err),
            Self::InvalidProfile(err) => Some(err),
            Self::DuplicateRecord(_) => None,
            Self::Persistence(err) => Some(err),
            Self::Encode(err) => Some(err),
        }
    }
}

impl From<RecordValidationError> for StoreError {
    fn from(value: RecordValidationError) -> Self {
        Self::InvalidRecord(value)
    }
}

impl From<ProfileValidationError> for StoreError {
    fn from(value: ProfileValidationError) -> Self {
        Self::InvalidProfile(value)
    }
}

impl From<KvError> for StoreError {
    fn from(value: KvError) -> Self {
        Self::Persistence(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Non-fatal notice that a stored value was unreadable, fully or in part,
/// and what was loaded in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub key: &'static str,
    pub message: String,
    /// Whether the raw value was copied to [`corrupt_backup_key`]. When
    /// `false`, the next write under `key` replaces the only copy.
    pub backed_up: bool,
}

impl Display for LoadWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "stored `{}` is unreadable: {}", self.key, self.message)
    }
}

/// Loaded value plus the warning raised while decoding it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    pub value: T,
    pub warning: Option<LoadWarning>,
}

impl<T> Loaded<T> {
    pub(crate) fn clean(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }
}

/// Key holding the last unreadable value of `key`.
pub fn corrupt_backup_key(key: &str) -> String {
    format!("{key}{CORRUPT_SUFFIX}")
}

/// Reads and decodes a JSON value, falling back to `T::default()`.
///
/// Read failures propagate. Decode failures back up the raw value and
/// return the default together with a warning.
pub(crate) fn load_json<K, T>(kv: &K, key: &'static str) -> StoreResult<Loaded<T>>
where
    K: KeyValueStore,
    T: DeserializeOwned + Default,
{
    let Some(raw) = kv.get(key)? else {
        return Ok(Loaded::clean(T::default()));
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Ok(Loaded::clean(value)),
        Err(err) => Ok(Loaded {
            value: T::default(),
            warning: Some(degraded_load(kv, key, &raw, err.to_string())),
        }),
    }
}

/// Copies `raw` to the backup key and builds the warning for a load that
/// could not keep everything stored under `key`.
///
/// A failed backup is reported in the warning instead of failing the load.
pub(crate) fn degraded_load<K: KeyValueStore>(
    kv: &K,
    key: &'static str,
    raw: &str,
    reason: String,
) -> LoadWarning {
    warn!(
        "event=store_load module=store status=degraded key={} error_code=parse_failed error={}",
        key, reason
    );

    let backup_key = corrupt_backup_key(key);
    match kv.set(&backup_key, raw) {
        Ok(()) => LoadWarning {
            key,
            message: reason,
            backed_up: true,
        },
        Err(err) => {
            error!(
                "event=store_backup module=store status=error key={} error_code=backup_failed error={}",
                key, err
            );
            LoadWarning {
                key,
                message: format!("{reason}; backup to `{backup_key}` failed: {err}"),
                backed_up: false,
            }
        }
    }
}
