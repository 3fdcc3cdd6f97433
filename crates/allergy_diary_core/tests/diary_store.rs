use allergy_diary_core::kv::{KeyValueStore, KvError, KvResult};
use allergy_diary_core::store::{corrupt_backup_key, RECORDS_KEY};
use allergy_diary_core::{
    open_kv, open_kv_in_memory, DiaryStore, ReactionCategory, ReactionDuration, ReactionRecord,
    RecordValidationError, SqliteKvStore, StoreError, MAX_SEVERITY,
};
use rusqlite::Connection;
use std::sync::Arc;
use std::thread;

fn food(name: &str, score: u8) -> ReactionRecord {
    let mut record = ReactionRecord::new(ReactionCategory::Food, name);
    record.reaction_score = score;
    record
}

#[test]
fn empty_medium_lists_nothing() {
    let store = DiaryStore::open(open_kv_in_memory().unwrap()).unwrap();
    assert!(store.list().is_empty());
    assert!(store.is_empty());
    assert!(store.load_warning().is_none());
}

#[test]
fn append_places_record_last_and_grows_by_one() {
    let store = DiaryStore::open(open_kv_in_memory().unwrap()).unwrap();
    store.append(food("egg", 1)).unwrap();

    let record = food("walnut", 2);
    let before = store.list().len();
    store.append(record.clone()).unwrap();

    let records = store.list();
    assert_eq!(records.len(), before + 1);
    assert_eq!(records.last(), Some(&record));
}

#[test]
fn peanut_record_round_trips_without_preparation_method() {
    let kv = Arc::new(open_kv_in_memory().unwrap());
    let store = DiaryStore::open(Arc::clone(&kv)).unwrap();

    let mut record = ReactionRecord::new(ReactionCategory::Food, "peanut");
    record.amount = Some("10g".to_string());
    record.reaction = "hives".to_string();
    record.reaction_score = 3;
    store.append(record.clone()).unwrap();

    let records = store.list();
    assert_eq!(records, vec![record.clone()]);
    assert_eq!(records[0].preparation_method, None);

    let raw = kv.get(RECORDS_KEY).unwrap().expect("records should be stored");
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json[0]["category"], "food");
    assert_eq!(json[0]["name"], "peanut");
    assert_eq!(json[0]["amount"], "10g");
    assert_eq!(json[0]["reaction"], "hives");
    assert_eq!(json[0]["reactionScore"], 3);
    assert!(json[0].get("preparationMethod").is_none());
    assert!(json[0].get("reactionDuration").is_none());

    let reopened = DiaryStore::open(kv).unwrap();
    assert_eq!(reopened.list(), vec![record]);
}

#[test]
fn invalid_records_are_rejected_and_list_is_unchanged() {
    let store = DiaryStore::open(open_kv_in_memory().unwrap()).unwrap();
    store.append(food("soy", 1)).unwrap();
    let before = store.list();

    let blank = food("   ", 2);
    let err = store.append(blank).unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidRecord(RecordValidationError::EmptyName)
    ));
    assert!(err.is_validation());

    let too_severe = food("sesame", 6);
    let err = store.append(too_severe).unwrap_err();
    assert!(matches!(
        err,
        StoreError::InvalidRecord(RecordValidationError::ScoreOutOfRange {
            field: "reactionScore",
            value: 6
        })
    ));

    let mut bad_skin = food("kiwi", 1);
    bad_skin.skin_reaction = 9;
    assert!(store.append(bad_skin).is_err());

    let mut bad_duration = food("mango", 1);
    bad_duration.reaction_duration = Some(ReactionDuration::Hours(25));
    assert!(store.append(bad_duration).is_err());

    assert_eq!(store.list(), before);
}

#[test]
fn append_normalizes_fields_for_non_food_categories() {
    let store = DiaryStore::open(open_kv_in_memory().unwrap()).unwrap();
    let mut record = ReactionRecord::new(ReactionCategory::Medication, "  amoxicillin   500 ");
    record.amount = Some("1 tablet".to_string());
    record.reaction_duration = Some(ReactionDuration::TimeOfDay("08:15".to_string()));
    store.append(record).unwrap();

    let stored = &store.list()[0];
    assert_eq!(stored.name, "amoxicillin 500");
    assert_eq!(stored.amount, None);
    assert_eq!(
        stored.reaction_duration,
        Some(ReactionDuration::TimeOfDay("08:15".to_string()))
    );
}

#[test]
fn duplicate_id_is_rejected() {
    let store = DiaryStore::open(open_kv_in_memory().unwrap()).unwrap();
    let record = food("oat", 0);
    store.append(record.clone()).unwrap();

    let err = store.append(record.clone()).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateRecord(id) if id == record.id));
    assert_eq!(store.len(), 1);
}

#[test]
fn list_is_idempotent_without_mutations() {
    let store = DiaryStore::open(open_kv_in_memory().unwrap()).unwrap();
    store.append(food("egg", 1)).unwrap();
    store.append(food("fish", 4)).unwrap();

    assert_eq!(store.list(), store.list());
}

#[test]
fn clear_empties_memory_and_medium() {
    let kv = Arc::new(open_kv_in_memory().unwrap());
    let store = DiaryStore::open(Arc::clone(&kv)).unwrap();
    store.append(food("egg", 1)).unwrap();
    store.append(food("fish", 2)).unwrap();

    store.clear().unwrap();
    assert!(store.list().is_empty());
    assert_eq!(kv.get(RECORDS_KEY).unwrap().as_deref(), Some("[]"));
    assert!(DiaryStore::open(kv).unwrap().list().is_empty());
}

#[test]
fn back_to_back_appends_keep_call_order() {
    let kv = Arc::new(open_kv_in_memory().unwrap());
    let store = DiaryStore::open(Arc::clone(&kv)).unwrap();
    store.append(food("first", 1)).unwrap();
    store.append(food("second", 2)).unwrap();

    let names = DiaryStore::open(kv)
        .unwrap()
        .list()
        .into_iter()
        .map(|record| record.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["first", "second"]);
}

#[test]
fn concurrent_appends_lose_no_records() {
    let kv = Arc::new(open_kv_in_memory().unwrap());
    let store = Arc::new(DiaryStore::open(Arc::clone(&kv)).unwrap());

    let handles = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for index in 0..10 {
                    store
                        .append(food(&format!("item-{worker}-{index}"), 1))
                        .unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), 80);
    assert_eq!(DiaryStore::open(kv).unwrap().len(), 80);
}

#[test]
fn failed_write_leaves_memory_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.sqlite3");
    let store = DiaryStore::open(open_kv(&path).unwrap()).unwrap();
    store.append(food("egg", 1)).unwrap();

    let saboteur = Connection::open(&path).unwrap();
    saboteur
        .execute_batch("ALTER TABLE kv_entries RENAME TO kv_entries_offline;")
        .unwrap();

    let err = store.append(food("fish", 2)).unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    assert!(store.clear().is_err());
    let names = store
        .list()
        .into_iter()
        .map(|record| record.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["egg"]);

    saboteur
        .execute_batch("ALTER TABLE kv_entries_offline RENAME TO kv_entries;")
        .unwrap();
    store.append(food("rice", 0)).unwrap();
    assert_eq!(store.len(), 2);
}

#[test]
fn corrupt_json_opens_empty_with_warning_and_backup() {
    let kv = Arc::new(open_kv_in_memory().unwrap());
    kv.set(RECORDS_KEY, "[{\"category\":\"food\",").unwrap();

    let store = DiaryStore::open(Arc::clone(&kv)).unwrap();
    assert!(store.list().is_empty());
    let warning = store.load_warning().expect("corrupt data should warn");
    assert_eq!(warning.key, RECORDS_KEY);
    assert!(warning.backed_up);

    assert_eq!(
        kv.get(&corrupt_backup_key(RECORDS_KEY)).unwrap().as_deref(),
        Some("[{\"category\":\"food\",")
    );

    store.append(food("egg", 1)).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.load_warning().is_none());
}

#[test]
fn legacy_records_without_ids_load() {
    let kv = Arc::new(open_kv_in_memory().unwrap());
    let legacy = serde_json::json!([
        {
            "category": "food",
            "name": "strawberry",
            "amount": "",
            "preparationMethod": "raw",
            "reaction": "itching",
            "reactionScore": 2,
            "skinReaction": 3,
            "digestiveReaction": 0,
            "respiratoryReaction": 0,
            "reactionDuration": 4
        },
        {
            "category": "plants",
            "name": "nettle",
            "reaction": "rash",
            "reactionScore": 1,
            "skinReaction": 1,
            "digestiveReaction": 0,
            "respiratoryReaction": 0,
            "reactionDuration": "14:30:00"
        }
    ]);
    kv.set(RECORDS_KEY, &legacy.to_string()).unwrap();

    let store = DiaryStore::open(Arc::clone(&kv)).unwrap();
    assert!(store.load_warning().is_none());

    let records = store.list();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].reaction_duration, Some(ReactionDuration::Hours(4)));
    assert_eq!(records[0].amount, None);
    assert_eq!(records[0].preparation_method.as_deref(), Some("raw"));
    assert_eq!(records[0].recorded_at, None);
    assert_eq!(records[1].category, ReactionCategory::Plants);
    assert!(records[1].reaction_duration.as_ref().unwrap().as_time().is_some());
    assert_ne!(records[0].id, records[1].id);

    store.append(food("pear", 0)).unwrap();
    let ids = store.list().iter().map(|record| record.id).collect::<Vec<_>>();
    let reopened_ids = DiaryStore::open(kv)
        .unwrap()
        .list()
        .iter()
        .map(|record| record.id)
        .collect::<Vec<_>>();
    assert_eq!(ids, reopened_ids);
}

#[test]
fn stored_records_are_normalized_and_scores_capped_on_load() {
    let kv = Arc::new(open_kv_in_memory().unwrap());
    let stored = serde_json::json!([
        {
            "category": "food",
            "name": "egg",
            "amount": "",
            "preparationMethod": "",
            "reactionScore": 9
        },
        {
            "category": "medication",
            "name": "aspirin",
            "amount": "1 tab"
        }
    ]);
    kv.set(RECORDS_KEY, &stored.to_string()).unwrap();

    let store = DiaryStore::open(Arc::clone(&kv)).unwrap();
    let records = store.list();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].reaction_score, MAX_SEVERITY);
    assert_eq!(records[0].amount, None);
    assert_eq!(records[0].preparation_method, None);
    assert_eq!(records[1].amount, None);
    assert!(records.iter().all(|record| record.validate().is_ok()));

    let warning = store.load_warning().expect("capped scores should warn");
    assert!(warning.message.contains("capped"));
    assert_eq!(
        kv.get(&corrupt_backup_key(RECORDS_KEY)).unwrap(),
        Some(stored.to_string())
    );

    store.append(food("rice", 0)).unwrap();
    let raw = kv.get(RECORDS_KEY).unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json[0]["reactionScore"], 5);
    assert!(json[0].get("amount").is_none());
    assert!(json[1].get("amount").is_none());
}

#[test]
fn unreadable_entries_are_skipped_and_the_rest_kept() {
    let kv = Arc::new(open_kv_in_memory().unwrap());
    let stored = serde_json::json!([
        { "category": "food", "name": "egg", "reactionScore": 1 },
        { "category": "food", "name": "milk", "reactionDuration": 1.5 },
        { "category": "plants", "name": "   " },
        { "category": "plants", "name": "birch", "skinReaction": 2 }
    ]);
    kv.set(RECORDS_KEY, &stored.to_string()).unwrap();

    let store = DiaryStore::open(Arc::clone(&kv)).unwrap();
    let names = store
        .list()
        .into_iter()
        .map(|record| record.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["egg", "birch"]);

    let warning = store.load_warning().expect("skipped entries should warn");
    assert!(warning.message.contains("skipped 2"));
    assert!(warning.backed_up);
    assert_eq!(
        kv.get(&corrupt_backup_key(RECORDS_KEY)).unwrap(),
        Some(stored.to_string())
    );
}

#[test]
fn duplicate_stored_ids_keep_the_first_entry() {
    let kv = Arc::new(open_kv_in_memory().unwrap());
    let first = food("egg", 1);
    let mut second = food("milk", 2);
    second.id = first.id;
    kv.set(RECORDS_KEY, &serde_json::to_string(&vec![first.clone(), second]).unwrap())
        .unwrap();

    let store = DiaryStore::open(kv).unwrap();
    assert_eq!(store.list(), vec![first]);
    assert!(store.load_warning().unwrap().message.contains("duplicate id"));
}

/// Medium whose backup keys cannot be written.
struct NoBackupKv(SqliteKvStore);

impl KeyValueStore for NoBackupKv {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.0.get(key)
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        if key.ends_with(".corrupt") {
            return Err(KvError::Sqlite(rusqlite::Error::InvalidQuery));
        }
        self.0.set(key, value)
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        self.0.remove(key)
    }
}

#[test]
fn failed_backup_is_reported_in_the_warning() {
    let kv = NoBackupKv(open_kv_in_memory().unwrap());
    kv.set(RECORDS_KEY, "not json").unwrap();

    let store = DiaryStore::open(&kv).unwrap();
    assert!(store.is_empty());
    let warning = store.load_warning().expect("corrupt data should warn");
    assert!(!warning.backed_up);
    assert!(warning.message.contains("backup"));
    assert_eq!(kv.get(&corrupt_backup_key(RECORDS_KEY)).unwrap(), None);
}

#[test]
fn clear_drops_the_load_warning() {
    let kv = Arc::new(open_kv_in_memory().unwrap());
    kv.set(RECORDS_KEY, "{").unwrap();

    let store = DiaryStore::open(Arc::clone(&kv)).unwrap();
    assert!(store.load_warning().is_some());
    store.clear().unwrap();
    assert!(store.load_warning().is_none());
}
