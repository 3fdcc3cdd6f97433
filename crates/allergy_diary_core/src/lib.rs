//! Core persistence for the allergy diary.
//! Stores own their serialized values; UI layers hold transient copies only.

pub mod kv;
pub mod logging;
pub mod model;
pub mod store;

pub use kv::{open_kv, open_kv_in_memory, KeyValueStore, KvError, KvResult, SqliteKvStore};
pub use logging::{default_log_level, init_logging, logging_status, LogSettings};
pub use model::profile::{
    age_in_years, FamilyMember, PersonalProfile, ProfileSelection, ProfileValidationError,
};
pub use model::record::{
    ReactionCategory, ReactionDuration, ReactionRecord, RecordId, RecordValidationError,
    MAX_SEVERITY,
};
pub use store::diary_store::{DiaryStore, RecordQuery};
pub use store::profile_store::ProfileStore;
pub use store::{LoadWarning, Loaded, StoreError, StoreResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
