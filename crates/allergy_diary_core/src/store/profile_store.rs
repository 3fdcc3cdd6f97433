//! Profile store: tracking mode, personal profile and family roster.
//!
//! # Responsibility
//! - Persist the profile selection under `profileType`.
//! - Persist the optional personal profile and the family roster.
//!
//! # Invariants
//! - Reads always go to the medium; nothing is cached.
//! - `Unset` is stored as key absence.
//! - Roster writes are serialized through one mutex.

use crate::kv::KeyValueStore;
use crate::model::profile::{FamilyMember, PersonalProfile, ProfileSelection};
use crate::store::{
    load_json, LoadWarning, Loaded, StoreResult, FAMILY_MEMBERS_KEY, PERSONAL_PROFILE_KEY,
    PROFILE_TYPE_KEY,
};
use chrono::NaiveDate;
use log::{error, info, warn};
use std::sync::{Mutex, PoisonError};

/// Store for profile values over any [`KeyValueStore`].
pub struct ProfileStore<K: KeyValueStore> {
    kv: K,
    roster_write: Mutex<()>,
}

impl<K: KeyValueStore> ProfileStore<K> {
    pub fn new(kv: K) -> Self {
        Self {
            kv,
            roster_write: Mutex::new(()),
        }
    }

    /// Returns the persisted selection, `Unset` when absent.
    ///
    /// Never fails: read errors and unknown literals are logged and read
    /// as `Unset`. Use [`Self::load`] to observe them.
    pub fn get(&self) -> ProfileSelection {
        match self.load() {
            Ok(loaded) => loaded.value,
            Err(err) => {
                error!(
                    "event=profile_get module=store status=error error_code=read_failed error={}",
                    err
                );
                ProfileSelection::Unset
            }
        }
    }

    /// Reads the selection, surfacing read errors and parse warnings.
    pub fn load(&self) -> StoreResult<Loaded<ProfileSelection>> {
        let Some(raw) = self.kv.get(PROFILE_TYPE_KEY)? else {
            return Ok(Loaded::clean(ProfileSelection::Unset));
        };

        match parse_stored_selection(&raw) {
            Some(selection) => Ok(Loaded::clean(selection)),
            None => {
                warn!(
                    "event=profile_get module=store status=degraded error_code=unknown_literal"
                );
                Ok(Loaded {
                    value: ProfileSelection::Unset,
                    warning: Some(LoadWarning {
                        key: PROFILE_TYPE_KEY,
                        message: format!("unknown profile type `{raw}`"),
                        backed_up: false,
                    }),
                })
            }
        }
    }

    /// Persists `selection` immediately; `Unset` removes the key.
    pub fn set(&self, selection: ProfileSelection) -> StoreResult<()> {
        let result = match selection.stored_literal() {
            Some(literal) => self.kv.set(PROFILE_TYPE_KEY, literal),
            None => self.kv.remove(PROFILE_TYPE_KEY),
        };
        match result {
            Ok(()) => {
                info!(
                    "event=profile_set module=store status=ok selection={}",
                    selection.as_str()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=profile_set module=store status=error selection={} error_code=write_failed error={}",
                    selection.as_str(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Returns the personal profile; unreadable values read as `None`.
    pub fn personal_profile(&self) -> Option<PersonalProfile> {
        match self.load_personal_profile() {
            Ok(loaded) => loaded.value,
            Err(err) => {
                error!(
                    "event=personal_profile_get module=store status=error error_code=read_failed error={}",
                    err
                );
                None
            }
        }
    }

    pub fn load_personal_profile(&self) -> StoreResult<Loaded<Option<PersonalProfile>>> {
        load_json(&self.kv, PERSONAL_PROFILE_KEY)
    }

    /// Validates and replaces the personal profile.
    pub fn set_personal_profile(&self, profile: &PersonalProfile) -> StoreResult<()> {
        profile.validate()?;
        let json = serde_json::to_string(profile)?;
        self.kv.set(PERSONAL_PROFILE_KEY, &json)?;
        info!("event=personal_profile_set module=store status=ok");
        Ok(())
    }

    pub fn clear_personal_profile(&self) -> StoreResult<()> {
        self.kv.remove(PERSONAL_PROFILE_KEY)?;
        Ok(())
    }

    /// Returns the family roster in insertion order; unreadable values read
    /// as empty.
    pub fn family_members(&self) -> Vec<FamilyMember> {
        match self.load_family_members() {
            Ok(loaded) => loaded.value,
            Err(err) => {
                error!(
                    "event=family_list module=store status=error error_code=read_failed error={}",
                    err
                );
                Vec::new()
            }
        }
    }

    pub fn load_family_members(&self) -> StoreResult<Loaded<Vec<FamilyMember>>> {
        load_json(&self.kv, FAMILY_MEMBERS_KEY)
    }

    /// Validates `member` as of `today` and appends it to the roster.
    ///
    /// # Errors
    /// - `InvalidProfile` when the member fails validation.
    /// - `Persistence` when the roster cannot be read or written.
    pub fn add_family_member(&self, member: FamilyMember, today: NaiveDate) -> StoreResult<()> {
        member.validate(today)?;

        let _guard = self
            .roster_write
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut members = self.load_family_members()?.value;
        members.push(member);
        let json = serde_json::to_string(&members)?;
        self.kv.set(FAMILY_MEMBERS_KEY, &json)?;

        info!(
            "event=family_add module=store status=ok members={}",
            members.len()
        );
        Ok(())
    }

    pub fn clear_family(&self) -> StoreResult<()> {
        let _guard = self
            .roster_write
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.kv.remove(FAMILY_MEMBERS_KEY)?;
        Ok(())
    }
}

/// Only the two persisted literals are valid; `unset` is never written.
fn parse_stored_selection(raw: &str) -> Option<ProfileSelection> {
    match raw {
        "personal" => Some(ProfileSelection::Personal),
        "family" => Some(ProfileSelection::Family),
        _ => None,
    }
}
