//! Diary store: the ordered, append-only list of reaction records.
//!
//! # Responsibility
//! - Load `allergyRecords` once and serve reads from memory.
//! - Validate and append records with a full-list rewrite per mutation.
//!
//! # Invariants
//! - `list()` returns records in insertion order (oldest first).
//! - Writes are serialized: the list mutex is held across
//!   read-modify-persist, so concurrent appends cannot lose updates.
//! - Memory only changes after the medium accepted the new list.
//! - Loaded records satisfy the same invariants as appended ones: each is
//!   normalized, scores are capped, and entries that still fail validation
//!   are skipped with a `LoadWarning` after the raw value is backed up.
//!
//! Each append rewrites the whole array, so its cost grows with the number
//! of stored records. Diary volumes stay in the hundreds.

use crate::kv::KeyValueStore;
use crate::model::record::{ReactionCategory, ReactionRecord, RecordId};
use crate::store::{degraded_load, LoadWarning, Loaded, StoreError, StoreResult, RECORDS_KEY};
use log::{error, info, warn};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Filter and paging options for [`DiaryStore::query`].
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub category: Option<ReactionCategory>,
    /// Minimum overall `reaction_score`, inclusive.
    pub min_score: Option<u8>,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl RecordQuery {
    fn matches(&self, record: &ReactionRecord) -> bool {
        self.category.map_or(true, |category| record.category == category)
            && self
                .min_score
                .map_or(true, |min_score| record.reaction_score >= min_score)
    }
}

/// Store for reaction records over any [`KeyValueStore`].
pub struct DiaryStore<K: KeyValueStore> {
    kv: K,
    state: Mutex<DiaryState>,
}

struct DiaryState {
    records: Vec<ReactionRecord>,
    /// Cleared by the first successful write, which replaces the stored value.
    load_warning: Option<LoadWarning>,
}

impl<K: KeyValueStore> DiaryStore<K> {
    /// Loads the diary from `kv`.
    ///
    /// # Errors
    /// - `Persistence` when the medium cannot be read.
    ///
    /// Malformed stored JSON is not an error. An unreadable array opens
    /// empty; unreadable entries inside a readable array are skipped. In
    /// both cases [`Self::load_warning`] reports what happened.
    pub fn open(kv: K) -> StoreResult<Self> {
        let started_at = Instant::now();
        let loaded = match load_records(&kv) {
            Ok(loaded) => loaded,
            Err(err) => {
                error!(
                    "event=diary_open module=store status=error duration_ms={} error_code=read_failed error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };

        info!(
            "event=diary_open module=store status={} records={} duration_ms={}",
            if loaded.warning.is_some() { "degraded" } else { "ok" },
            loaded.value.len(),
            started_at.elapsed().as_millis()
        );

        Ok(Self {
            kv,
            state: Mutex::new(DiaryState {
                records: loaded.value,
                load_warning: loaded.warning,
            }),
        })
    }

    /// Warning raised while opening, until a write replaces the stored list.
    pub fn load_warning(&self) -> Option<LoadWarning> {
        self.lock().load_warning.clone()
    }

    /// Returns all records, oldest first. Never fails.
    pub fn list(&self) -> Vec<ReactionRecord> {
        self.lock().records.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Finds one record by id.
    pub fn get(&self, id: RecordId) -> Option<ReactionRecord> {
        self.lock()
            .records
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    /// Returns matching records in insertion order, after paging.
    pub fn query(&self, query: &RecordQuery) -> Vec<ReactionRecord> {
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        self.lock()
            .records
            .iter()
            .filter(|record| query.matches(record))
            .skip(query.offset as usize)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Normalizes, validates and appends `record`, then rewrites the list.
    ///
    /// # Errors
    /// - `InvalidRecord` when the record fails validation.
    /// - `DuplicateRecord` when a record with the same id exists.
    /// - `Persistence` / `Encode` when the write fails; the in-memory list
    ///   is left exactly as before the call.
    pub fn append(&self, record: ReactionRecord) -> StoreResult<()> {
        let started_at = Instant::now();
        let record = record.normalized();
        if let Err(err) = record.validate() {
            warn!(
                "event=diary_append module=store status=rejected category={} error_code=validation_failed error={}",
                record.category.as_str(),
                err
            );
            return Err(err.into());
        }

        let mut state = self.lock();
        if state.records.iter().any(|existing| existing.id == record.id) {
            warn!(
                "event=diary_append module=store status=rejected error_code=duplicate_id id={}",
                record.id
            );
            return Err(StoreError::DuplicateRecord(record.id));
        }

        let category = record.category;
        state.records.push(record);
        if let Err(err) = self.persist(&state.records) {
            state.records.pop();
            error!(
                "event=diary_append module=store status=error records={} duration_ms={} error_code=write_failed error={}",
                state.records.len(),
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err);
        }

        state.load_warning = None;
        info!(
            "event=diary_append module=store status=ok category={} records={} duration_ms={}",
            category.as_str(),
            state.records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Removes every record and persists the empty list.
    ///
    /// # Errors
    /// - `Persistence` / `Encode` when the write fails; records stay loaded.
    pub fn clear(&self) -> StoreResult<()> {
        let mut state = self.lock();
        if let Err(err) = self.persist(&[]) {
            error!(
                "event=diary_clear module=store status=error records={} error_code=write_failed error={}",
                state.records.len(),
                err
            );
            return Err(err);
        }

        let removed = state.records.len();
        state.records.clear();
        state.load_warning = None;
        info!("event=diary_clear module=store status=ok removed={removed}");
        Ok(())
    }

    fn persist(&self, records: &[ReactionRecord]) -> StoreResult<()> {
        let json = serde_json::to_string(records)?;
        self.kv.set(RECORDS_KEY, &json)?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, DiaryState> {
        // Memory is only mutated after a successful write, so a poisoned
        // list still matches what the medium holds.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Loads `allergyRecords` entry by entry.
///
/// Read failures propagate. A value that is not a JSON array opens empty.
/// Any skipped or repaired entry backs up the raw value and yields a warning.
fn load_records<K: KeyValueStore>(kv: &K) -> StoreResult<Loaded<Vec<ReactionRecord>>> {
    let Some(raw) = kv.get(RECORDS_KEY)? else {
        return Ok(Loaded::clean(Vec::new()));
    };

    let entries = match serde_json::from_str::<Vec<Value>>(&raw) {
        Ok(entries) => entries,
        Err(err) => {
            return Ok(Loaded {
                value: Vec::new(),
                warning: Some(degraded_load(kv, RECORDS_KEY, &raw, err.to_string())),
            })
        }
    };

    let mut records = Vec::with_capacity(entries.len());
    let mut seen_ids = HashSet::with_capacity(entries.len());
    let mut skipped = Vec::new();
    let mut clamped = 0usize;
    for (index, entry) in entries.into_iter().enumerate() {
        match restore_record(entry) {
            Ok((record, _)) if !seen_ids.insert(record.id) => {
                skipped.push(format!("#{index}: duplicate id {}", record.id));
            }
            Ok((record, was_clamped)) => {
                clamped += usize::from(was_clamped);
                records.push(record);
            }
            Err(reason) => skipped.push(format!("#{index}: {reason}")),
        }
    }

    if skipped.is_empty() && clamped == 0 {
        return Ok(Loaded::clean(records));
    }

    let mut notes = Vec::new();
    if !skipped.is_empty() {
        notes.push(format!(
            "skipped {} unreadable record(s) ({})",
            skipped.len(),
            skipped.join("; ")
        ));
    }
    if clamped > 0 {
        notes.push(format!("capped scores on {clamped} record(s)"));
    }
    let warning = degraded_load(kv, RECORDS_KEY, &raw, notes.join(", "));
    Ok(Loaded {
        value: records,
        warning: Some(warning),
    })
}

/// Decodes one stored entry into the canonical form `append` would write.
///
/// Returns the record and whether any score had to be capped.
fn restore_record(entry: Value) -> Result<(ReactionRecord, bool), String> {
    let mut record = serde_json::from_value::<ReactionRecord>(entry)
        .map_err(|err| err.to_string())?
        .normalized();
    let clamped = record.clamp_scores();
    record.validate().map_err(|err| err.to_string())?;
    Ok((record, clamped))
}
