//! # Primitives
//!
//! Shared identifiers, calendar scalars, and bounds for the Rollcall CORE.
//!
//! All scalars are integers. Dates are day-granularity (`EpochDay`) and are
//! always supplied by the caller; the CORE never reads the wall clock.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};

// =============================================================================
// BOUNDS
// =============================================================================

/// Maximum byte length of a name component (given/preferred/family).
pub const MAX_NAME_LEN: usize = 128;

/// Maximum byte length of a free-text note (accommodations, IEP notes).
pub const MAX_NOTE_LEN: usize = 4096;

/// Length of a trial license in days.
pub const TRIAL_LENGTH_DAYS: u64 = 14;

/// Default number of seats provisioned per district pool.
pub const DEFAULT_SEAT_POOL: u32 = 50;

/// Maximum number of goals a single IEP document may carry.
pub const MAX_IEP_GOALS: usize = 32;

/// Youngest plausible enrollment age in whole years (early-intervention PreK).
pub const MIN_ENROLL_AGE_YEARS: u64 = 3;

/// Oldest plausible enrollment age in whole years (IDEA services run to 22).
pub const MAX_ENROLL_AGE_YEARS: u64 = 22;

/// Days per year for integer age arithmetic. Leap days are noise at the
/// granularity the age-band check needs.
pub const DAYS_PER_YEAR: u64 = 365;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Tenant (school or family account) identifier.
///
/// Tenants are implicit: any id scopes its own keyspace.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TenantId(pub u64);

/// Finalized student record identifier, unique within a tenant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct StudentId(pub u64);

/// Open wizard draft identifier, unique within a tenant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct DraftId(pub u64);

/// District identifier, global across tenants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct DistrictId(pub u64);

// =============================================================================
// EPOCH DAY
// =============================================================================

/// Day-granularity date: whole days since the Unix epoch.
///
/// The CORE does arithmetic on days only. Callers (the app layer, tests)
/// convert wall-clock time to an `EpochDay` at the boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EpochDay(pub u64);

impl EpochDay {
    /// Add a number of days, saturating at the top of the range.
    #[must_use]
    pub fn plus_days(self, days: u64) -> Self {
        Self(self.0.saturating_add(days))
    }

    /// Whole days elapsed since `earlier`, or 0 if `earlier` is later.
    #[must_use]
    pub fn days_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// =============================================================================
// ZIP CODE
// =============================================================================

/// A validated 5-digit US ZIP code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Zip(String);

impl Zip {
    /// Parse a ZIP code, requiring exactly five ASCII digits.
    pub fn new(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.len() != 5 || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidField {
                field: "zip",
                reason: format!("expected 5 digits, got {trimmed:?}"),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The ZIP code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Zip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// GRADE LEVEL
// =============================================================================

/// K-12 grade level, ordered from PreK through grade 12.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    PreK,
    Kindergarten,
    Grade1,
    Grade2,
    Grade3,
    Grade4,
    Grade5,
    Grade6,
    Grade7,
    Grade8,
    Grade9,
    Grade10,
    Grade11,
    Grade12,
}

impl Grade {
    /// All grades in ascending order.
    pub const ALL: [Grade; 14] = [
        Grade::PreK,
        Grade::Kindergarten,
        Grade::Grade1,
        Grade::Grade2,
        Grade::Grade3,
        Grade::Grade4,
        Grade::Grade5,
        Grade::Grade6,
        Grade::Grade7,
        Grade::Grade8,
        Grade::Grade9,
        Grade::Grade10,
        Grade::Grade11,
        Grade::Grade12,
    ];

    /// Zero-based position in the PreK..12 sequence.
    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            Grade::PreK => 0,
            Grade::Kindergarten => 1,
            Grade::Grade1 => 2,
            Grade::Grade2 => 3,
            Grade::Grade3 => 4,
            Grade::Grade4 => 5,
            Grade::Grade5 => 6,
            Grade::Grade6 => 7,
            Grade::Grade7 => 8,
            Grade::Grade8 => 9,
            Grade::Grade9 => 10,
            Grade::Grade10 => 11,
            Grade::Grade11 => 12,
            Grade::Grade12 => 13,
        }
    }

    /// Short label as used in rosters ("PK", "K", "1".."12").
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Grade::PreK => "PK",
            Grade::Kindergarten => "K",
            Grade::Grade1 => "1",
            Grade::Grade2 => "2",
            Grade::Grade3 => "3",
            Grade::Grade4 => "4",
            Grade::Grade5 => "5",
            Grade::Grade6 => "6",
            Grade::Grade7 => "7",
            Grade::Grade8 => "8",
            Grade::Grade9 => "9",
            Grade::Grade10 => "10",
            Grade::Grade11 => "11",
            Grade::Grade12 => "12",
        }
    }

    /// Parse a roster label ("PK", "K", "1".."12").
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let normalized = raw.trim().to_ascii_uppercase();
        Grade::ALL
            .iter()
            .copied()
            .find(|g| g.label() == normalized)
            .ok_or_else(|| CoreError::InvalidField {
                field: "grade",
                reason: format!("unknown grade label {raw:?}"),
            })
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_accepts_five_digits() {
        let zip = Zip::new("30301");
        assert!(zip.is_ok());
        assert_eq!(zip.map(|z| z.to_string()).ok(), Some("30301".to_string()));
    }

    #[test]
    fn zip_rejects_bad_input() {
        assert!(Zip::new("3030").is_err());
        assert!(Zip::new("303011").is_err());
        assert!(Zip::new("3o301").is_err());
        assert!(Zip::new("").is_err());
    }

    #[test]
    fn zip_trims_whitespace() {
        let zip = Zip::new(" 98101 ");
        assert_eq!(zip.map(|z| z.to_string()).ok(), Some("98101".to_string()));
    }

    #[test]
    fn grades_are_ordered() {
        assert!(Grade::PreK < Grade::Kindergarten);
        assert!(Grade::Kindergarten < Grade::Grade1);
        assert!(Grade::Grade11 < Grade::Grade12);
    }

    #[test]
    fn grade_labels_roundtrip() {
        for grade in Grade::ALL {
            let parsed = Grade::parse(grade.label());
            assert_eq!(parsed.ok(), Some(grade));
        }
    }

    #[test]
    fn grade_parse_is_case_insensitive() {
        assert_eq!(Grade::parse("k").ok(), Some(Grade::Kindergarten));
        assert_eq!(Grade::parse("pk").ok(), Some(Grade::PreK));
    }

    #[test]
    fn grade_parse_rejects_unknown() {
        assert!(Grade::parse("13").is_err());
        assert!(Grade::parse("first").is_err());
    }

    #[test]
    fn epoch_day_arithmetic() {
        let day = EpochDay(20_000);
        assert_eq!(day.plus_days(14), EpochDay(20_014));
        assert_eq!(day.plus_days(14).days_since(day), 14);
        assert_eq!(day.days_since(day.plus_days(14)), 0);
    }
}
