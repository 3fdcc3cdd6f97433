//! Profile model: tracking mode, personal profile and family roster.
//!
//! # Invariants
//! - `ProfileSelection::Unset` has no stored literal; it is key absence.
//! - `PersonalProfile::age` is computed birthday-aware when created.
//! - Birth dates are never later than the date used to validate them.

use crate::model::normalize_text;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound for a plausible age, in years.
pub const MAX_AGE_YEARS: u32 = 150;
/// Relation label used when the caller does not provide one.
pub const DEFAULT_RELATION: &str = "family member";

/// User-chosen tracking mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProfileSelection {
    Personal,
    Family,
    #[default]
    Unset,
}

impl ProfileSelection {
    /// Literal persisted under `profileType`; `None` for `Unset`.
    pub fn stored_literal(self) -> Option<&'static str> {
        match self {
            Self::Personal => Some("personal"),
            Self::Family => Some("family"),
            Self::Unset => None,
        }
    }

    /// Stable label including `unset`, for display and FFI.
    pub fn as_str(self) -> &'static str {
        self.stored_literal().unwrap_or("unset")
    }

    /// Parses any label produced by [`Self::as_str`].
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "personal" => Some(Self::Personal),
            "family" => Some(Self::Family),
            "unset" | "" => Some(Self::Unset),
            _ => None,
        }
    }
}

/// Single personal profile shown on the home screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalProfile {
    pub name: String,
    /// Age in full years at creation time.
    pub age: u32,
    /// Absent in profiles saved before birth dates were kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
}

impl PersonalProfile {
    /// Builds a profile, computing `age` from `birth_date` as of `today`.
    ///
    /// # Errors
    /// - `EmptyName` when `name` is blank.
    /// - `BirthDateInFuture` when `birth_date > today`.
    /// - `AgeOutOfRange` when the resulting age exceeds [`MAX_AGE_YEARS`].
    pub fn from_birth_date(
        name: impl AsRef<str>,
        birth_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Self, ProfileValidationError> {
        let name = normalize_text(name.as_ref());
        if name.is_empty() {
            return Err(ProfileValidationError::EmptyName);
        }
        let age = age_in_years(birth_date, today)?;
        let profile = Self {
            name,
            age,
            birth_date: Some(birth_date),
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Current age as of `today`.
    ///
    /// Recomputed from `birth_date` when known; legacy profiles report the
    /// stored `age` unchanged.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        self.birth_date
            .and_then(|birth_date| today.years_since(birth_date))
            .unwrap_or(self.age)
    }

    pub fn validate(&self) -> Result<(), ProfileValidationError> {
        if self.name.trim().is_empty() {
            return Err(ProfileValidationError::EmptyName);
        }
        if self.age > MAX_AGE_YEARS {
            return Err(ProfileValidationError::AgeOutOfRange(self.age));
        }
        Ok(())
    }
}

/// One member of the family roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub name: String,
    pub birth_date: NaiveDate,
    pub relation: String,
}

impl FamilyMember {
    /// Creates a member; a blank `relation` falls back to [`DEFAULT_RELATION`].
    pub fn new(name: impl AsRef<str>, birth_date: NaiveDate, relation: impl AsRef<str>) -> Self {
        let relation = normalize_text(relation.as_ref());
        Self {
            name: normalize_text(name.as_ref()),
            birth_date,
            relation: if relation.is_empty() {
                DEFAULT_RELATION.to_string()
            } else {
                relation
            },
        }
    }

    pub fn age_on(&self, today: NaiveDate) -> Option<u32> {
        today.years_since(self.birth_date)
    }

    pub fn validate(&self, today: NaiveDate) -> Result<(), ProfileValidationError> {
        if self.name.trim().is_empty() {
            return Err(ProfileValidationError::EmptyName);
        }
        if self.relation.trim().is_empty() {
            return Err(ProfileValidationError::EmptyRelation);
        }
        age_in_years(self.birth_date, today).map(|_| ())
    }
}

/// Full years between `birth_date` and `today`.
pub fn age_in_years(birth_date: NaiveDate, today: NaiveDate) -> Result<u32, ProfileValidationError> {
    let age = today
        .years_since(birth_date)
        .ok_or(ProfileValidationError::BirthDateInFuture { birth_date, today })?;
    if age > MAX_AGE_YEARS {
        return Err(ProfileValidationError::AgeOutOfRange(age));
    }
    Ok(age)
}

/// Reasons a profile value is rejected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileValidationError {
    EmptyName,
    EmptyRelation,
    BirthDateInFuture {
        birth_date: NaiveDate,
        today: NaiveDate,
    },
    AgeOutOfRange(u32),
}

impl Display for ProfileValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "profile name must not be empty"),
            Self::EmptyRelation => write!(f, "family relation must not be empty"),
            Self::BirthDateInFuture { birth_date, today } => {
                write!(f, "birth date {birth_date} is after {today}")
            }
            Self::AgeOutOfRange(age) => {
                write!(f, "age ({age}) must be within 0..={MAX_AGE_YEARS}")
            }
        }
    }
}

impl Error for ProfileValidationError {}

#[cfg(test)]
mod tests {
    use super::{
        age_in_years, FamilyMember, ProfileSelection, ProfileValidationError, DEFAULT_RELATION,
    };
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_only_completed_years() {
        assert_eq!(age_in_years(date(1990, 6, 15), date(2024, 6, 14)), Ok(33));
        assert_eq!(age_in_years(date(1990, 6, 15), date(2024, 6, 15)), Ok(34));
    }

    #[test]
    fn future_birth_date_is_rejected() {
        let err = age_in_years(date(2030, 1, 1), date(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, ProfileValidationError::BirthDateInFuture { .. }));
    }

    #[test]
    fn selection_labels_round_trip() {
        for selection in [
            ProfileSelection::Personal,
            ProfileSelection::Family,
            ProfileSelection::Unset,
        ] {
            assert_eq!(ProfileSelection::parse(selection.as_str()), Some(selection));
        }
        assert_eq!(ProfileSelection::Unset.stored_literal(), None);
        assert_eq!(ProfileSelection::parse("friends"), None);
    }

    #[test]
    fn family_member_defaults_blank_relation() {
        let member = FamilyMember::new("Anna", date(2015, 3, 1), "  ");
        assert_eq!(member.relation, DEFAULT_RELATION);
        assert_eq!(member.age_on(date(2024, 3, 1)), Some(9));
    }
}
