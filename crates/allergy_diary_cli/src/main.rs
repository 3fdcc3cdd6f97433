//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `allergy_diary_core` linkage and store wiring end to end.
//! - Keep output deterministic for quick local sanity checks.

use allergy_diary_core::{
    open_kv_in_memory, DiaryStore, ProfileSelection, ProfileStore, ReactionCategory,
    ReactionRecord,
};
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    println!("allergy_diary_core ping={}", allergy_diary_core::ping());
    println!(
        "allergy_diary_core version={}",
        allergy_diary_core::core_version()
    );

    match probe_stores() {
        Ok(records) => {
            println!("allergy_diary_core store_probe=ok records={records}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("allergy_diary_core store_probe=error error={err}");
            ExitCode::FAILURE
        }
    }
}

/// Runs one append/list cycle and a profile write against a scratch medium.
fn probe_stores() -> Result<usize, Box<dyn std::error::Error>> {
    let kv = Arc::new(open_kv_in_memory()?);
    let diary = DiaryStore::open(Arc::clone(&kv))?;
    let profile = ProfileStore::new(kv);

    let mut record = ReactionRecord::new(ReactionCategory::Food, "probe");
    record.reaction_score = 1;
    diary.append(record)?;
    profile.set(ProfileSelection::Personal)?;

    if profile.get() != ProfileSelection::Personal {
        return Err("profile selection did not persist".into());
    }
    Ok(diary.list().len())
}
