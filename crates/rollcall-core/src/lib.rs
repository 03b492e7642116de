//! # Rollcall Core - The Logic
//!
//! The deterministic enrollment engine for the Rollcall K-12 platform.
//!
//! Everything in this crate is pure and replayable: collections are
//! `BTreeMap`/`BTreeSet`, arithmetic is integer-only, and the wall clock
//! never appears — callers pass an [`EpochDay`] wherever a date matters.
//! The app layer (`apps/rollcall`) owns async, networking, and real time.
//!
//! ## Layout
//!
//! - [`wizard`] — the five-step onboarding state machine
//! - [`student`] — the draft accumulator and finalized records
//! - [`district`] — ZIP resolution with the manual-entry fallback
//! - [`consent`] — required/optional consent gating
//! - [`license`] — seat pools and the license decision table
//! - [`iep`] — the IEP document model and its invariants
//! - [`roster`] — the facade the app layer drives
//! - [`cache`] — LRU cache of hot wizard sessions
//! - [`formats`] — canonical binary snapshots
//! - [`storage`] — redb-backed persistence

pub mod cache;
pub mod consent;
pub mod district;
pub mod error;
pub mod formats;
pub mod iep;
pub mod license;
pub mod primitives;
pub mod roster;
pub mod storage;
pub mod student;
pub mod wizard;

pub use cache::{CacheStats, WizardCache};
pub use consent::{ConsentForm, ConsentRecord, NotificationTiming, RequiredConsent};
pub use district::{
    CurriculumFramework, District, DistrictAssignment, DistrictDirectory, ManualDistrict,
    builtin_directory,
};
pub use error::CoreError;
pub use iep::{IepDocument, IepGoal, IepStatus, Placement};
pub use license::{
    Activation, LicenseGrant, LicenseKind, SeatPool, allocate_license, confirm_payment, roll_trial,
};
pub use primitives::{DistrictId, DraftId, EpochDay, Grade, StudentId, TenantId, Zip};
pub use roster::{Roster, RosterStats};
pub use storage::{RedbStore, StoreError};
pub use student::{
    BasicInfo, BirthDate, DisabilityCategory, DraftSection, LearningPreference, LearningProfile,
    StudentDraft, StudentName, StudentRecord,
};
pub use wizard::{EnrollmentWizard, StepData, WizardProgress, WizardStep};
