//! Reaction record model.
//!
//! # Responsibility
//! - Define the canonical shape of one logged allergic reaction.
//! - Provide the single validation policy used by every write path.
//!
//! # Invariants
//! - All four severity scores are within `0..=MAX_SEVERITY` (0 = unset).
//! - `amount` and `preparation_method` are only present for food records.
//! - `name` is non-empty after trimming.

use crate::model::{normalize_optional_text, normalize_text};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier used by detail views.
pub type RecordId = Uuid;

/// Highest value accepted by any severity score.
pub const MAX_SEVERITY: u8 = 5;
/// Longest reaction duration accepted in whole-hours form.
pub const MAX_DURATION_HOURS: u32 = 24;

const TIME_OF_DAY_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Allergen source classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionCategory {
    /// Food diary entry; enables `amount` and `preparation_method`.
    Food,
    /// Medication intake.
    Medication,
    /// Plant contact.
    #[serde(alias = "plant")]
    Plants,
}

impl ReactionCategory {
    /// Wire label as stored in JSON.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Medication => "medication",
            Self::Plants => "plants",
        }
    }

    /// Parses a wire label. Accepts `plant` as an alias of `plants`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "food" => Some(Self::Food),
            "medication" => Some(Self::Medication),
            "plants" | "plant" => Some(Self::Plants),
            _ => None,
        }
    }

    /// Whether portion/preparation fields apply to this category.
    pub fn has_food_fields(self) -> bool {
        matches!(self, Self::Food)
    }
}

/// How long (or when) a reaction lasted.
///
/// Both shapes are persisted untagged: a JSON number is whole hours, a JSON
/// string is a 24h time of day (`HH:MM` or `HH:MM:SS`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReactionDuration {
    Hours(u32),
    TimeOfDay(String),
}

impl ReactionDuration {
    /// Builds a canonical `HH:MM:SS` time-of-day value.
    pub fn time_of_day(time: NaiveTime) -> Self {
        Self::TimeOfDay(time.format("%H:%M:%S").to_string())
    }

    /// Parses the time-of-day form, if this value has one.
    pub fn as_time(&self) -> Option<NaiveTime> {
        match self {
            Self::Hours(_) => None,
            Self::TimeOfDay(value) => parse_time_of_day(value),
        }
    }

    fn validate(&self) -> Result<(), RecordValidationError> {
        match self {
            Self::Hours(hours) if *hours > MAX_DURATION_HOURS => {
                Err(RecordValidationError::DurationHoursOutOfRange(*hours))
            }
            Self::Hours(_) => Ok(()),
            Self::TimeOfDay(value) => match parse_time_of_day(value) {
                Some(_) => Ok(()),
                None => Err(RecordValidationError::InvalidTimeOfDay(value.clone())),
            },
        }
    }
}

/// One logged allergic reaction event.
///
/// Fields not applicable to `category` stay `None` and are omitted from the
/// serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionRecord {
    /// Entries written before ids existed receive a fresh id on load; it
    /// becomes durable with the next full-list write.
    #[serde(default = "Uuid::new_v4")]
    pub id: RecordId,
    pub category: ReactionCategory,
    /// Substance or contact description.
    pub name: String,
    /// Portion size. Food only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Food only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation_method: Option<String>,
    /// Free-form description; may be empty.
    #[serde(default)]
    pub reaction: String,
    /// Overall severity.
    #[serde(default)]
    pub reaction_score: u8,
    #[serde(default)]
    pub skin_reaction: u8,
    #[serde(default)]
    pub digestive_reaction: u8,
    #[serde(default)]
    pub respiratory_reaction: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_duration: Option<ReactionDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl ReactionRecord {
    /// Creates a record with a generated id and `recorded_at = now`.
    ///
    /// All scores start at 0 (unset) and optional fields at `None`.
    pub fn new(category: ReactionCategory, name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), category, name)
    }

    /// Creates a record with a caller-provided id.
    pub fn with_id(id: RecordId, category: ReactionCategory, name: impl Into<String>) -> Self {
        Self {
            id,
            category,
            name: name.into(),
            amount: None,
            preparation_method: None,
            reaction: String::new(),
            reaction_score: 0,
            skin_reaction: 0,
            digestive_reaction: 0,
            respiratory_reaction: 0,
            reaction_duration: None,
            recorded_at: Some(Utc::now()),
        }
    }

    /// Returns the canonical form written by the diary store.
    ///
    /// - text fields are trimmed with whitespace runs collapsed;
    /// - blank optional text becomes `None`;
    /// - food-only fields are dropped for other categories.
    pub fn normalized(mut self) -> Self {
        self.name = normalize_text(&self.name);
        self.reaction = self.reaction.trim().to_string();
        if self.category.has_food_fields() {
            self.amount = normalize_optional_text(self.amount);
            self.preparation_method = normalize_optional_text(self.preparation_method);
        } else {
            self.amount = None;
            self.preparation_method = None;
        }
        self.reaction_duration = match self.reaction_duration.take() {
            Some(ReactionDuration::TimeOfDay(value)) => match value.trim() {
                "" => None,
                trimmed => Some(ReactionDuration::TimeOfDay(trimmed.to_string())),
            },
            other => other,
        };
        self
    }

    /// Validates the record against the append policy.
    ///
    /// # Errors
    /// - `NilId` when `id` is the nil UUID.
    /// - `EmptyName` when `name` is blank.
    /// - `ScoreOutOfRange` when any score exceeds [`MAX_SEVERITY`].
    /// - `FoodFieldOnNonFood` when a food-only field is set on another category.
    /// - `DurationHoursOutOfRange` / `InvalidTimeOfDay` for a bad duration.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        if self.id.is_nil() {
            return Err(RecordValidationError::NilId);
        }
        if self.name.trim().is_empty() {
            return Err(RecordValidationError::EmptyName);
        }

        for (field, value) in self.scores() {
            if value > MAX_SEVERITY {
                return Err(RecordValidationError::ScoreOutOfRange { field, value });
            }
        }

        if !self.category.has_food_fields() {
            if self.amount.is_some() {
                return Err(RecordValidationError::FoodFieldOnNonFood {
                    field: "amount",
                    category: self.category,
                });
            }
            if self.preparation_method.is_some() {
                return Err(RecordValidationError::FoodFieldOnNonFood {
                    field: "preparationMethod",
                    category: self.category,
                });
            }
        }

        if let Some(duration) = &self.reaction_duration {
            duration.validate()?;
        }

        Ok(())
    }

    /// Caps every score at [`MAX_SEVERITY`]. Returns whether any changed.
    pub fn clamp_scores(&mut self) -> bool {
        let mut changed = false;
        for score in [
            &mut self.reaction_score,
            &mut self.skin_reaction,
            &mut self.digestive_reaction,
            &mut self.respiratory_reaction,
        ] {
            if *score > MAX_SEVERITY {
                *score = MAX_SEVERITY;
                changed = true;
            }
        }
        changed
    }

    /// Highest of the overall and per-system scores.
    pub fn peak_severity(&self) -> u8 {
        self.scores()
            .into_iter()
            .map(|(_, value)| value)
            .max()
            .unwrap_or(0)
    }

    fn scores(&self) -> [(&'static str, u8); 4] {
        [
            ("reactionScore", self.reaction_score),
            ("skinReaction", self.skin_reaction),
            ("digestiveReaction", self.digestive_reaction),
            ("respiratoryReaction", self.respiratory_reaction),
        ]
    }
}

/// Reasons a record is rejected before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    NilId,
    EmptyName,
    ScoreOutOfRange {
        field: &'static str,
        value: u8,
    },
    FoodFieldOnNonFood {
        field: &'static str,
        category: ReactionCategory,
    },
    DurationHoursOutOfRange(u32),
    InvalidTimeOfDay(String),
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "record id must not be nil"),
            Self::EmptyName => write!(f, "record name must not be empty"),
            Self::ScoreOutOfRange { field, value } => {
                write!(f, "{field} ({value}) must be within 0..={MAX_SEVERITY}")
            }
            Self::FoodFieldOnNonFood { field, category } => write!(
                f,
                "{field} is only allowed for food records, got category `{}`",
                category.as_str()
            ),
            Self::DurationHoursOutOfRange(hours) => write!(
                f,
                "reactionDuration ({hours}h) must be within 0..={MAX_DURATION_HOURS} hours"
            ),
            Self::InvalidTimeOfDay(value) => write!(
                f,
                "reactionDuration `{value}` is not a 24h time of day (HH:MM or HH:MM:SS)"
            ),
        }
    }
}

impl Error for RecordValidationError {}

fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    TIME_OF_DAY_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(value.trim(), format).ok())
}
