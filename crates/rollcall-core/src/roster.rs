//! # Roster
//!
//! The in-memory session over the enrollment universe: the district
//! directory, per-district seat pools, open wizards, finalized students, and
//! stored IEPs. The app layer owns exactly one `Roster` at a time and
//! persists it through the storage or snapshot modules.
//!
//! All collections are `BTreeMap` keyed by `(tenant, id)`, so iteration,
//! stats, and serialization are deterministic and tenants never observe each
//! other's records.

use crate::district::{District, DistrictDirectory};
use crate::error::CoreError;
use crate::iep::IepDocument;
use crate::license::{LicenseKind, SeatPool, confirm_payment, roll_trial};
use crate::primitives::{DistrictId, DraftId, EpochDay, StudentId, TenantId, Zip};
use crate::student::StudentRecord;
use crate::wizard::{EnrollmentWizard, StepData, WizardProgress, WizardStep};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// ROSTER
// =============================================================================

/// The enrollment universe for one deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    directory: DistrictDirectory,
    pools: BTreeMap<DistrictId, SeatPool>,
    wizards: BTreeMap<(TenantId, DraftId), EnrollmentWizard>,
    students: BTreeMap<(TenantId, StudentId), StudentRecord>,
    ieps: BTreeMap<(TenantId, StudentId), IepDocument>,
    next_draft_id: u64,
    next_student_id: u64,
}

impl Roster {
    /// An empty roster with an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A roster seeded with the built-in district directory and default
    /// seat pools.
    #[must_use]
    pub fn with_builtin_directory() -> Self {
        let mut roster = Self::new();
        roster.directory = crate::district::builtin_directory();
        roster.seed_default_pools();
        roster
    }

    // -------------------------------------------------------------------------
    // Districts & seats
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn directory(&self) -> &DistrictDirectory {
        &self.directory
    }

    /// Register a district and the ZIPs it serves.
    pub fn register_district(&mut self, district: District, zips: Vec<Zip>) {
        self.directory.register(district, zips);
    }

    /// Resolve a ZIP against the directory.
    #[must_use]
    pub fn resolve_zip(&self, zip: &Zip) -> Option<&District> {
        self.directory.resolve_zip(zip)
    }

    /// Provision (or resize) the seat pool for a district.
    pub fn provision_seats(&mut self, district: DistrictId, total: u32) {
        self.pools
            .entry(district)
            .and_modify(|p| p.total = total)
            .or_insert_with(|| SeatPool::new(district, total));
    }

    /// Provision default-size pools for every district in the directory
    /// that lacks one.
    pub fn seed_default_pools(&mut self) {
        let ids: Vec<DistrictId> = self.directory.districts().map(|d| d.id).collect();
        for id in ids {
            self.pools
                .entry(id)
                .or_insert_with(|| SeatPool::new(id, crate::primitives::DEFAULT_SEAT_POOL));
        }
    }

    #[must_use]
    pub fn seat_pool(&self, district: DistrictId) -> Option<&SeatPool> {
        self.pools.get(&district)
    }

    /// All seat pools in district order.
    pub fn seat_pools(&self) -> impl Iterator<Item = &SeatPool> {
        self.pools.values()
    }

    /// Restore a pool verbatim, allocation count included (storage load).
    pub fn restore_pool(&mut self, pool: SeatPool) {
        self.pools.insert(pool.district, pool);
    }

    // -------------------------------------------------------------------------
    // Wizards
    // -------------------------------------------------------------------------

    /// Open a new onboarding wizard for a tenant.
    pub fn begin_wizard(&mut self, tenant: TenantId) -> &EnrollmentWizard {
        self.next_draft_id = self.next_draft_id.saturating_add(1);
        let id = DraftId(self.next_draft_id);
        let wizard = EnrollmentWizard::open(id, tenant);
        self.wizards.entry((tenant, id)).or_insert(wizard)
    }

    /// Look up an open wizard.
    pub fn wizard(&self, tenant: TenantId, draft: DraftId) -> Result<&EnrollmentWizard, CoreError> {
        self.wizards
            .get(&(tenant, draft))
            .ok_or(CoreError::DraftNotFound(draft))
    }

    /// Submit the current step of an open wizard.
    ///
    /// `expected_revision` is the optimistic-concurrency token; pass `None`
    /// to skip the check.
    pub fn submit_step(
        &mut self,
        tenant: TenantId,
        draft: DraftId,
        data: StepData,
        expected_revision: Option<u64>,
    ) -> Result<WizardProgress, CoreError> {
        let wizard = self
            .wizards
            .get_mut(&(tenant, draft))
            .ok_or(CoreError::DraftNotFound(draft))?;
        wizard.ensure_revision(expected_revision)?;
        wizard.submit(data, &self.directory)
    }

    /// Step an open wizard backward.
    pub fn step_back(
        &mut self,
        tenant: TenantId,
        draft: DraftId,
    ) -> Result<WizardProgress, CoreError> {
        let wizard = self
            .wizards
            .get_mut(&(tenant, draft))
            .ok_or(CoreError::DraftNotFound(draft))?;
        Ok(wizard.back())
    }

    /// Terminal action: finalize an open wizard into a student record.
    ///
    /// On success the wizard is closed and the record stored. On failure the
    /// wizard (and any seat pool) is left untouched.
    pub fn finalize_wizard(
        &mut self,
        tenant: TenantId,
        draft: DraftId,
        today: EpochDay,
    ) -> Result<StudentRecord, CoreError> {
        let wizard = self
            .wizards
            .get(&(tenant, draft))
            .ok_or(CoreError::DraftNotFound(draft))?;

        let id = StudentId(self.next_student_id.saturating_add(1));
        let pool = wizard
            .draft()
            .location()
            .and_then(|l| l.detected_id())
            .and_then(|d| self.pools.get_mut(&d));
        let record = wizard.finalize(id, &self.directory, pool, today)?;

        self.next_student_id = self.next_student_id.saturating_add(1);
        self.wizards.remove(&(tenant, draft));
        self.students.insert((tenant, id), record.clone());
        Ok(record)
    }

    /// Open wizards for one tenant, in draft order.
    pub fn wizards_for(&self, tenant: TenantId) -> impl Iterator<Item = &EnrollmentWizard> {
        self.wizards
            .range((tenant, DraftId(0))..=(tenant, DraftId(u64::MAX)))
            .map(|(_, w)| w)
    }

    /// All open wizards in key order (snapshot export, storage save).
    pub fn wizards(&self) -> impl Iterator<Item = &EnrollmentWizard> {
        self.wizards.values()
    }

    /// Restore an open wizard verbatim (storage load). Keeps the draft id
    /// counter ahead of every restored id.
    pub fn restore_wizard(&mut self, wizard: EnrollmentWizard) {
        if wizard.id().0 > self.next_draft_id {
            self.next_draft_id = wizard.id().0;
        }
        self.wizards.insert((wizard.tenant(), wizard.id()), wizard);
    }

    // -------------------------------------------------------------------------
    // Students
    // -------------------------------------------------------------------------

    /// Read a student record as stored.
    pub fn student(&self, tenant: TenantId, id: StudentId) -> Result<&StudentRecord, CoreError> {
        self.students
            .get(&(tenant, id))
            .ok_or(CoreError::StudentNotFound(id))
    }

    /// Read a student record, lazily converting an expired trial first.
    pub fn student_refreshed(
        &mut self,
        tenant: TenantId,
        id: StudentId,
        today: EpochDay,
    ) -> Result<&StudentRecord, CoreError> {
        let record = self
            .students
            .get_mut(&(tenant, id))
            .ok_or(CoreError::StudentNotFound(id))?;
        record.license = roll_trial(record.license, today);
        Ok(record)
    }

    /// Mark a pending parent purchase as paid.
    pub fn confirm_student_payment(
        &mut self,
        tenant: TenantId,
        id: StudentId,
    ) -> Result<&StudentRecord, CoreError> {
        let record = self
            .students
            .get_mut(&(tenant, id))
            .ok_or(CoreError::StudentNotFound(id))?;
        record.license = confirm_payment(record.license);
        Ok(record)
    }

    /// Students for one tenant, in id order.
    pub fn students_for(&self, tenant: TenantId) -> impl Iterator<Item = &StudentRecord> {
        self.students
            .range((tenant, StudentId(0))..=(tenant, StudentId(u64::MAX)))
            .map(|(_, s)| s)
    }

    /// All finalized students in key order (snapshot export, storage save).
    pub fn all_students(&self) -> impl Iterator<Item = &StudentRecord> {
        self.students.values()
    }

    /// Import an already-finalized record (batch enrollment, snapshots).
    /// Keeps the id counter ahead of every imported id.
    pub fn import_student(&mut self, record: StudentRecord) {
        if record.id.0 > self.next_student_id {
            self.next_student_id = record.id.0;
        }
        self.students.insert((record.tenant, record.id), record);
    }

    // -------------------------------------------------------------------------
    // IEPs
    // -------------------------------------------------------------------------

    /// Validate and store an IEP for an enrolled student.
    pub fn upsert_iep(
        &mut self,
        tenant: TenantId,
        document: IepDocument,
    ) -> Result<(), CoreError> {
        let student = document.student;
        if !self.students.contains_key(&(tenant, student)) {
            return Err(CoreError::StudentNotFound(student));
        }
        document.validate()?;
        self.ieps.insert((tenant, student), document);
        Ok(())
    }

    /// Read a stored IEP.
    pub fn iep(&self, tenant: TenantId, student: StudentId) -> Result<&IepDocument, CoreError> {
        self.ieps
            .get(&(tenant, student))
            .ok_or(CoreError::StudentNotFound(student))
    }

    /// All IEPs in key order (snapshot export).
    pub fn ieps(&self) -> impl Iterator<Item = (&(TenantId, StudentId), &IepDocument)> {
        self.ieps.iter()
    }

    // -------------------------------------------------------------------------
    // Stats
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn student_count(&self) -> usize {
        self.students.len()
    }

    #[must_use]
    pub fn open_draft_count(&self) -> usize {
        self.wizards.len()
    }

    /// Funnel statistics across the whole roster.
    #[must_use]
    pub fn stats(&self) -> RosterStats {
        let mut by_step = StepCounts::default();
        for wizard in self.wizards.values() {
            match wizard.step() {
                WizardStep::BasicInfo => by_step.basic_info += 1,
                WizardStep::Location => by_step.location += 1,
                WizardStep::LearningProfile => by_step.learning_profile += 1,
                WizardStep::Consent => by_step.consent += 1,
                WizardStep::License => by_step.license += 1,
            }
        }

        let mut licenses = LicenseCounts::default();
        for record in self.students.values() {
            match record.license.kind {
                LicenseKind::DistrictSeat => licenses.district_seats += 1,
                LicenseKind::ParentPurchase => licenses.parent_purchases += 1,
                LicenseKind::Trial => licenses.trials += 1,
            }
        }

        let seats_total: u64 = self.pools.values().map(|p| u64::from(p.total)).sum();
        let seats_allocated: u64 = self.pools.values().map(|p| u64::from(p.allocated)).sum();

        let students = self.students.len();
        let open_drafts = self.wizards.len();
        let denominator = students.saturating_add(open_drafts);
        let completion_percent = if denominator == 0 {
            0
        } else {
            ((students.saturating_mul(100)) / denominator) as u8
        };

        RosterStats {
            students,
            open_drafts,
            drafts_by_step: by_step,
            licenses,
            districts: self.directory.len(),
            seats_total,
            seats_allocated,
            completion_percent,
        }
    }
}

// =============================================================================
// STATS TYPES
// =============================================================================

/// Open drafts by wizard step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepCounts {
    pub basic_info: usize,
    pub location: usize,
    pub learning_profile: usize,
    pub consent: usize,
    pub license: usize,
}

/// Finalized licenses by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseCounts {
    pub district_seats: usize,
    pub parent_purchases: usize,
    pub trials: usize,
}

/// Funnel statistics for status surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterStats {
    pub students: usize,
    pub open_drafts: usize,
    pub drafts_by_step: StepCounts,
    pub licenses: LicenseCounts,
    pub districts: usize,
    pub seats_total: u64,
    pub seats_allocated: u64,
    /// Finalized share of all started enrollments, 0..=100.
    pub completion_percent: u8,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::ConsentForm;
    use crate::district::DistrictAssignment;
    use crate::iep::{IepDocument, IepStatus, Placement};
    use crate::license::Activation;
    use crate::primitives::Grade;
    use crate::student::{BirthDate, LearningProfile, StudentName};

    const TODAY: EpochDay = EpochDay(20_000);

    fn complete_wizard(roster: &mut Roster, tenant: TenantId) -> DraftId {
        let draft = roster.begin_wizard(tenant).id();
        let steps = [
            StepData::BasicInfo {
                name: StudentName {
                    given: "Ada".to_string(),
                    preferred: None,
                    family: "Byrne".to_string(),
                },
                birth_date: BirthDate {
                    year: 2013,
                    month: 3,
                    day: 14,
                },
                grade: Grade::Grade5,
            },
            StepData::Location {
                assignment: DistrictAssignment::Detected {
                    district: DistrictId(1),
                },
            },
            StepData::LearningProfile {
                profile: LearningProfile::empty(),
            },
            StepData::Consent {
                form: ConsentForm::granted_required(),
            },
            StepData::License {
                requested: LicenseKind::DistrictSeat,
            },
        ];
        for step in steps {
            let result = roster.submit_step(tenant, draft, step, None);
            assert!(result.is_ok(), "submit failed: {result:?}");
        }
        draft
    }

    #[test]
    fn begin_assigns_distinct_ids() {
        let mut roster = Roster::with_builtin_directory();
        let a = roster.begin_wizard(TenantId(1)).id();
        let b = roster.begin_wizard(TenantId(1)).id();
        assert_ne!(a, b);
        assert_eq!(roster.open_draft_count(), 2);
    }

    #[test]
    fn finalize_closes_wizard_and_stores_student() {
        let mut roster = Roster::with_builtin_directory();
        let tenant = TenantId(1);
        let draft = complete_wizard(&mut roster, tenant);

        let record = roster.finalize_wizard(tenant, draft, TODAY);
        assert!(record.is_ok());

        assert_eq!(roster.open_draft_count(), 0);
        assert_eq!(roster.student_count(), 1);
        if let Ok(record) = record {
            assert!(roster.student(tenant, record.id).is_ok());
            // A district seat was consumed.
            assert_eq!(
                roster.seat_pool(DistrictId(1)).map(|p| p.allocated),
                Some(1)
            );
        }
    }

    #[test]
    fn finalize_failure_leaves_wizard_open() {
        let mut roster = Roster::with_builtin_directory();
        let tenant = TenantId(1);
        let draft = roster.begin_wizard(tenant).id();

        let result = roster.finalize_wizard(tenant, draft, TODAY);
        assert!(result.is_err());
        assert_eq!(roster.open_draft_count(), 1);
        assert_eq!(roster.student_count(), 0);
    }

    #[test]
    fn tenants_are_isolated() {
        let mut roster = Roster::with_builtin_directory();
        let draft = complete_wizard(&mut roster, TenantId(1));
        let record = roster.finalize_wizard(TenantId(1), draft, TODAY);
        assert!(record.is_ok());

        if let Ok(record) = record {
            assert!(roster.student(TenantId(2), record.id).is_err());
            assert_eq!(roster.students_for(TenantId(2)).count(), 0);
            assert_eq!(roster.students_for(TenantId(1)).count(), 1);
        }
    }

    #[test]
    fn stale_revision_is_rejected() {
        let mut roster = Roster::with_builtin_directory();
        let tenant = TenantId(1);
        let draft = roster.begin_wizard(tenant).id();

        let result = roster.submit_step(
            tenant,
            draft,
            StepData::BasicInfo {
                name: StudentName {
                    given: "Ada".to_string(),
                    preferred: None,
                    family: "Byrne".to_string(),
                },
                birth_date: BirthDate {
                    year: 2013,
                    month: 3,
                    day: 14,
                },
                grade: Grade::Grade5,
            },
            Some(7),
        );
        assert!(matches!(result, Err(CoreError::StaleRevision { .. })));
    }

    #[test]
    fn trial_rolls_on_refreshed_read() {
        let mut roster = Roster::with_builtin_directory();
        let tenant = TenantId(1);
        let draft = roster.begin_wizard(tenant).id();
        let steps = [
            StepData::BasicInfo {
                name: StudentName {
                    given: "Ben".to_string(),
                    preferred: None,
                    family: "Okafor".to_string(),
                },
                birth_date: BirthDate {
                    year: 2012,
                    month: 7,
                    day: 4,
                },
                grade: Grade::Grade6,
            },
            StepData::Location {
                assignment: DistrictAssignment::Detected {
                    district: DistrictId(2),
                },
            },
            StepData::LearningProfile {
                profile: LearningProfile::empty(),
            },
            StepData::Consent {
                form: ConsentForm::granted_required(),
            },
            StepData::License {
                requested: LicenseKind::Trial,
            },
        ];
        for step in steps {
            assert!(roster.submit_step(tenant, draft, step, None).is_ok());
        }
        let id = roster.finalize_wizard(tenant, draft, TODAY).map(|r| r.id);
        assert!(id.is_ok());

        if let Ok(id) = id {
            let later = TODAY.plus_days(30);
            let refreshed = roster.student_refreshed(tenant, id, later);
            assert_eq!(
                refreshed.as_ref().map(|r| r.license.kind).ok(),
                Some(LicenseKind::ParentPurchase)
            );
            assert_eq!(
                refreshed.map(|r| r.license.activation).ok(),
                Some(Activation::Immediate)
            );
        }
    }

    #[test]
    fn iep_requires_enrolled_student() {
        let mut roster = Roster::with_builtin_directory();
        let doc = IepDocument {
            student: StudentId(99),
            effective: TODAY,
            review_due: TODAY.plus_days(365),
            goals: vec![],
            services: vec![],
            placement: Placement::general_education(),
            team: vec![],
            meetings: vec![],
            status: IepStatus::Draft,
        };
        assert!(matches!(
            roster.upsert_iep(TenantId(1), doc),
            Err(CoreError::StudentNotFound(_))
        ));
    }

    #[test]
    fn iep_roundtrip() {
        let mut roster = Roster::with_builtin_directory();
        let tenant = TenantId(1);
        let draft = complete_wizard(&mut roster, tenant);
        let id = roster.finalize_wizard(tenant, draft, TODAY).map(|r| r.id);
        assert!(id.is_ok());

        if let Ok(student) = id {
            let doc = IepDocument {
                student,
                effective: TODAY,
                review_due: TODAY.plus_days(365),
                goals: vec![],
                services: vec![],
                placement: Placement::general_education(),
                team: vec![],
                meetings: vec![],
                status: IepStatus::Draft,
            };
            assert!(roster.upsert_iep(tenant, doc.clone()).is_ok());
            assert_eq!(roster.iep(tenant, student).ok(), Some(&doc));
            // Other tenants cannot see it.
            assert!(roster.iep(TenantId(2), student).is_err());
        }
    }

    #[test]
    fn stats_track_funnel() {
        let mut roster = Roster::with_builtin_directory();
        let tenant = TenantId(1);
        let _ = roster.begin_wizard(tenant);
        let draft = complete_wizard(&mut roster, tenant);
        let finalized = roster.finalize_wizard(tenant, draft, TODAY);
        assert!(finalized.is_ok());

        let stats = roster.stats();
        assert_eq!(stats.students, 1);
        assert_eq!(stats.open_drafts, 1);
        assert_eq!(stats.drafts_by_step.basic_info, 1);
        assert_eq!(stats.licenses.district_seats, 1);
        assert_eq!(stats.completion_percent, 50);
        assert_eq!(stats.districts, 5);
        assert_eq!(stats.seats_allocated, 1);
    }

    #[test]
    fn import_keeps_id_counter_ahead() {
        let mut roster = Roster::with_builtin_directory();
        let tenant = TenantId(1);
        let draft = complete_wizard(&mut roster, tenant);
        let record = roster.finalize_wizard(tenant, draft, TODAY);
        assert!(record.is_ok());

        if let Ok(mut record) = record {
            record.id = StudentId(50);
            roster.import_student(record);

            let draft = complete_wizard(&mut roster, tenant);
            let next = roster.finalize_wizard(tenant, draft, TODAY);
            assert_eq!(next.map(|r| r.id).ok(), Some(StudentId(51)));
        }
    }
}
