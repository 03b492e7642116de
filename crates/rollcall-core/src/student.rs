//! # Student Model
//!
//! The student draft accumulator and the finalized enrollment record.
//!
//! A `StudentDraft` collects one optional section per wizard step. Sections
//! merge independently: re-submitting a step overwrites that section only and
//! never clears the others. The draft becomes a `StudentRecord` exactly once,
//! when every section validates at finalization.

use crate::consent::{ConsentForm, ConsentRecord, NotificationTiming};
use crate::district::DistrictAssignment;
use crate::error::CoreError;
use crate::license::{LicenseGrant, LicenseKind};
use crate::primitives::{
    DAYS_PER_YEAR, EpochDay, Grade, MAX_ENROLL_AGE_YEARS, MAX_NAME_LEN, MAX_NOTE_LEN,
    MIN_ENROLL_AGE_YEARS, StudentId, TenantId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// NAME
// =============================================================================

/// A student's name: legal given and family names plus an optional
/// preferred (call-me) name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentName {
    pub given: String,
    pub preferred: Option<String>,
    pub family: String,
}

impl StudentName {
    /// Create a validated name.
    pub fn new(
        given: impl Into<String>,
        preferred: Option<String>,
        family: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let given = given.into();
        let family = family.into();
        check_name_component("given_name", &given)?;
        check_name_component("family_name", &family)?;
        if let Some(p) = &preferred {
            check_name_component("preferred_name", p)?;
        }
        Ok(Self {
            given,
            preferred,
            family,
        })
    }

    /// The name used when addressing the student.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.preferred.as_deref().unwrap_or(&self.given)
    }
}

fn check_name_component(field: &'static str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::invalid(field, "must not be empty"));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(CoreError::invalid(
            field,
            format!("length {} exceeds {}", value.len(), MAX_NAME_LEN),
        ));
    }
    Ok(())
}

// =============================================================================
// BIRTH DATE
// =============================================================================

/// A calendar birth date with integer fields.
///
/// Construction validates the calendar (month lengths, leap years) and the
/// representable year range. Plausibility against the enrollment age band is
/// checked at finalization, when a reference day is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BirthDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl BirthDate {
    /// Create a validated calendar date. Years before 1970 are rejected;
    /// day arithmetic is anchored at the Unix epoch.
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self, CoreError> {
        if !(1970..=2199).contains(&year) {
            return Err(CoreError::invalid(
                "birth_date",
                format!("year {year} out of range 1970..=2199"),
            ));
        }
        if !(1..=12).contains(&month) {
            return Err(CoreError::invalid(
                "birth_date",
                format!("month {month} out of range 1..=12"),
            ));
        }
        let max_day = days_in_month(year, month);
        if day == 0 || day > max_day {
            return Err(CoreError::invalid(
                "birth_date",
                format!("day {day} out of range 1..={max_day} for {year}-{month:02}"),
            ));
        }
        Ok(Self { year, month, day })
    }

    /// Convert to whole days since the Unix epoch.
    #[must_use]
    pub fn to_epoch_day(self) -> EpochDay {
        // Civil-calendar day count (Gregorian), anchored so that
        // 1970-01-01 maps to day 0. Years are validated >= 1970, so the
        // result is non-negative.
        let y = i64::from(self.year) - i64::from(self.month <= 2);
        let era = y.div_euclid(400);
        let yoe = y.rem_euclid(400) as u64;
        let mp = (u64::from(self.month) + 9) % 12;
        let doy = (153 * mp + 2) / 5 + u64::from(self.day) - 1;
        let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
        let civil = era * 146_097 + doe as i64 - 719_468;
        EpochDay(civil.max(0) as u64)
    }

    /// Whole years of age on the given day.
    #[must_use]
    pub fn age_years_on(self, today: EpochDay) -> u64 {
        today.days_since(self.to_epoch_day()) / DAYS_PER_YEAR
    }

    /// Check that the date puts the student in the plausible K-12 age band
    /// on the given day.
    pub fn check_enrollable_on(self, today: EpochDay) -> Result<(), CoreError> {
        if self.to_epoch_day() > today {
            return Err(CoreError::invalid("birth_date", "is in the future"));
        }
        let age = self.age_years_on(today);
        if !(MIN_ENROLL_AGE_YEARS..=MAX_ENROLL_AGE_YEARS).contains(&age) {
            return Err(CoreError::invalid(
                "birth_date",
                format!(
                    "age {age} outside enrollable band {MIN_ENROLL_AGE_YEARS}..={MAX_ENROLL_AGE_YEARS}"
                ),
            ));
        }
        Ok(())
    }
}

fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        _ => 28,
    }
}

fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

// =============================================================================
// LEARNING PROFILE
// =============================================================================

/// IDEA disability categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DisabilityCategory {
    Autism,
    DeafBlindness,
    Deafness,
    EmotionalDisturbance,
    HearingImpairment,
    IntellectualDisability,
    MultipleDisabilities,
    OrthopedicImpairment,
    OtherHealthImpairment,
    SpecificLearningDisability,
    SpeechLanguageImpairment,
    TraumaticBrainInjury,
    VisualImpairment,
}

/// Modality the student learns best through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LearningPreference {
    Visual,
    Auditory,
    Kinesthetic,
    ReadingWriting,
}

/// The learning-profile section of the draft: disability categories,
/// preferred modalities, and free-text accommodation notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningProfile {
    pub disabilities: BTreeSet<DisabilityCategory>,
    pub preferences: BTreeSet<LearningPreference>,
    pub accommodations: Vec<String>,
}

impl LearningProfile {
    /// An empty profile (no identified disabilities or preferences).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate free-text bounds.
    pub fn validate(&self) -> Result<(), CoreError> {
        for note in &self.accommodations {
            if note.trim().is_empty() {
                return Err(CoreError::invalid("accommodations", "empty note"));
            }
            if note.len() > MAX_NOTE_LEN {
                return Err(CoreError::invalid(
                    "accommodations",
                    format!("note length {} exceeds {}", note.len(), MAX_NOTE_LEN),
                ));
            }
        }
        Ok(())
    }
}

// =============================================================================
// BASIC INFO
// =============================================================================

/// The first wizard section: who the student is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub name: StudentName,
    pub birth_date: BirthDate,
    pub grade: Grade,
}

// =============================================================================
// DRAFT
// =============================================================================

/// The five draft sections, one per wizard step.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DraftSection {
    BasicInfo,
    Location,
    LearningProfile,
    Consent,
    License,
}

/// The wizard accumulator: partial student data merged across steps.
///
/// Each section is independent. Merging a section overwrites that slot and
/// leaves every other slot untouched, so stepping back and re-submitting
/// never loses data entered elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDraft {
    basic: Option<BasicInfo>,
    location: Option<DistrictAssignment>,
    profile: Option<LearningProfile>,
    consent: Option<ConsentForm>,
    license: Option<LicenseKind>,
}

impl StudentDraft {
    /// An empty draft with no sections filled in.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn merge_basic(&mut self, basic: BasicInfo) {
        self.basic = Some(basic);
    }

    pub fn merge_location(&mut self, assignment: DistrictAssignment) {
        self.location = Some(assignment);
    }

    pub fn merge_profile(&mut self, profile: LearningProfile) {
        self.profile = Some(profile);
    }

    pub fn merge_consent(&mut self, form: ConsentForm) {
        self.consent = Some(form);
    }

    pub fn merge_license(&mut self, requested: LicenseKind) {
        self.license = Some(requested);
    }

    #[must_use]
    pub fn basic(&self) -> Option<&BasicInfo> {
        self.basic.as_ref()
    }

    #[must_use]
    pub fn location(&self) -> Option<&DistrictAssignment> {
        self.location.as_ref()
    }

    #[must_use]
    pub fn profile(&self) -> Option<&LearningProfile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn consent(&self) -> Option<&ConsentForm> {
        self.consent.as_ref()
    }

    #[must_use]
    pub fn license(&self) -> Option<LicenseKind> {
        self.license
    }

    /// Sections still required before the draft can finalize,
    /// in wizard order.
    #[must_use]
    pub fn missing_sections(&self) -> Vec<DraftSection> {
        let mut missing = Vec::new();
        if self.basic.is_none() {
            missing.push(DraftSection::BasicInfo);
        }
        if self.location.is_none() {
            missing.push(DraftSection::Location);
        }
        if self.profile.is_none() {
            missing.push(DraftSection::LearningProfile);
        }
        if self.consent.is_none() {
            missing.push(DraftSection::Consent);
        }
        if self.license.is_none() {
            missing.push(DraftSection::License);
        }
        missing
    }

    /// True once every section has been merged at least once.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_sections().is_empty()
    }
}

// =============================================================================
// FINALIZED RECORD
// =============================================================================

/// An immutable, finalized enrollment record.
///
/// Produced exactly once per draft, by `EnrollmentWizard::finalize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: StudentId,
    pub tenant: TenantId,
    pub name: StudentName,
    pub birth_date: BirthDate,
    pub grade: Grade,
    pub district: DistrictAssignment,
    pub profile: LearningProfile,
    pub consent: ConsentRecord,
    pub license: LicenseGrant,
    pub enrolled_on: EpochDay,
    pub notification: NotificationTiming,
}

// =============================================================================
// TESTS
// =============================================================================
