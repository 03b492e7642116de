//! # Onboarding Wizard
//!
//! The five-step student onboarding state machine.
//!
//! Steps are strictly linear: `BasicInfo → Location → LearningProfile →
//! Consent → License`. A submission must match the current step; it is
//! validated, merged into the draft accumulator, and the wizard advances.
//! Stepping back never discards merged data. The terminal action,
//! `finalize`, assembles the immutable `StudentRecord` — consent and
//! license semantics are enforced there, server-side, not left to a client.

use crate::consent::ConsentForm;
use crate::district::{DistrictAssignment, DistrictDirectory};
use crate::error::CoreError;
use crate::license::{LicenseGrant, LicenseKind, SeatPool, allocate_license};
use crate::primitives::{DraftId, EpochDay, Grade, StudentId, TenantId};
use crate::student::{
    BasicInfo, BirthDate, LearningProfile, StudentDraft, StudentName, StudentRecord,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// STEPS
// =============================================================================

/// The five wizard steps, in order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    BasicInfo,
    Location,
    LearningProfile,
    Consent,
    License,
}

impl WizardStep {
    /// All steps in wizard order.
    pub const ALL: [WizardStep; 5] = [
        WizardStep::BasicInfo,
        WizardStep::Location,
        WizardStep::LearningProfile,
        WizardStep::Consent,
        WizardStep::License,
    ];

    /// Zero-based position in the sequence.
    #[must_use]
    pub fn position(self) -> usize {
        match self {
            WizardStep::BasicInfo => 0,
            WizardStep::Location => 1,
            WizardStep::LearningProfile => 2,
            WizardStep::Consent => 3,
            WizardStep::License => 4,
        }
    }

    /// The following step, or `None` at the end of the sequence.
    #[must_use]
    pub fn next(self) -> Option<WizardStep> {
        WizardStep::ALL.get(self.position() + 1).copied()
    }

    /// The preceding step, or `None` at the start.
    #[must_use]
    pub fn previous(self) -> Option<WizardStep> {
        self.position()
            .checked_sub(1)
            .and_then(|i| WizardStep::ALL.get(i).copied())
    }

    /// True for the last step in the sequence.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Stable name used in errors and API payloads.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            WizardStep::BasicInfo => "basic_info",
            WizardStep::Location => "location",
            WizardStep::LearningProfile => "learning_profile",
            WizardStep::Consent => "consent",
            WizardStep::License => "license",
        }
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// STEP PAYLOADS
// =============================================================================

/// A submission for one wizard step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepData {
    BasicInfo {
        name: StudentName,
        birth_date: BirthDate,
        grade: Grade,
    },
    Location {
        assignment: DistrictAssignment,
    },
    LearningProfile {
        profile: LearningProfile,
    },
    Consent {
        form: ConsentForm,
    },
    License {
        requested: LicenseKind,
    },
}

impl StepData {
    /// The step this payload belongs to.
    #[must_use]
    pub fn step(&self) -> WizardStep {
        match self {
            StepData::BasicInfo { .. } => WizardStep::BasicInfo,
            StepData::Location { .. } => WizardStep::Location,
            StepData::LearningProfile { .. } => WizardStep::LearningProfile,
            StepData::Consent { .. } => WizardStep::Consent,
            StepData::License { .. } => WizardStep::License,
        }
    }
}

/// Where the wizard stands after a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardProgress {
    pub step: WizardStep,
    pub complete: bool,
    pub revision: u64,
}

// =============================================================================
// WIZARD
// =============================================================================

/// An open onboarding wizard for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentWizard {
    id: DraftId,
    tenant: TenantId,
    step: WizardStep,
    draft: StudentDraft,
    /// Bumped on every mutation; the API layer uses it for
    /// optimistic-concurrency checks.
    revision: u64,
}

impl EnrollmentWizard {
    /// Open a fresh wizard at the first step.
    #[must_use]
    pub fn open(id: DraftId, tenant: TenantId) -> Self {
        Self {
            id,
            tenant,
            step: WizardStep::BasicInfo,
            draft: StudentDraft::empty(),
            revision: 0,
        }
    }

    #[must_use]
    pub fn id(&self) -> DraftId {
        self.id
    }

    #[must_use]
    pub fn tenant(&self) -> TenantId {
        self.tenant
    }

    #[must_use]
    pub fn step(&self) -> WizardStep {
        self.step
    }

    #[must_use]
    pub fn draft(&self) -> &StudentDraft {
        &self.draft
    }

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn progress(&self) -> WizardProgress {
        WizardProgress {
            step: self.step,
            complete: self.draft.is_complete(),
            revision: self.revision,
        }
    }

    /// Reject callers holding a stale view of the wizard.
    pub fn ensure_revision(&self, expected: Option<u64>) -> Result<(), CoreError> {
        match expected {
            Some(e) if e != self.revision => Err(CoreError::StaleRevision {
                expected: e,
                actual: self.revision,
            }),
            _ => Ok(()),
        }
    }

    /// Submit the payload for the current step.
    ///
    /// The payload is validated, merged into the draft, and the wizard
    /// advances. Submitting the terminal step re-merges in place. A payload
    /// for any other step is rejected without touching the draft.
    pub fn submit(
        &mut self,
        data: StepData,
        directory: &DistrictDirectory,
    ) -> Result<WizardProgress, CoreError> {
        if data.step() != self.step {
            return Err(CoreError::StepMismatch {
                expected: self.step,
                submitted: data.step(),
            });
        }

        match data {
            StepData::BasicInfo {
                name,
                birth_date,
                grade,
            } => {
                // Re-run the constructors: payloads may arrive through serde,
                // which does not validate.
                let name = StudentName::new(name.given, name.preferred, name.family)?;
                let birth_date =
                    BirthDate::new(birth_date.year, birth_date.month, birth_date.day)?;
                self.draft.merge_basic(BasicInfo {
                    name,
                    birth_date,
                    grade,
                });
            }
            StepData::Location { assignment } => {
                if let Some(id) = assignment.detected_id() {
                    if directory.get(id).is_none() {
                        return Err(CoreError::UnknownDistrict(id));
                    }
                }
                self.draft.merge_location(assignment);
            }
            StepData::LearningProfile { profile } => {
                profile.validate()?;
                self.draft.merge_profile(profile);
            }
            StepData::Consent { form } => {
                // The consent step cannot pass while any required flag is
                // false.
                let missing = form.missing();
                if !missing.is_empty() {
                    return Err(CoreError::ConsentIncomplete { missing });
                }
                self.draft.merge_consent(form);
            }
            StepData::License { requested } => {
                self.draft.merge_license(requested);
            }
        }

        if let Some(next) = self.step.next() {
            self.step = next;
        }
        self.revision = self.revision.saturating_add(1);
        Ok(self.progress())
    }

    /// Step backward. Already-entered data is retained.
    pub fn back(&mut self) -> WizardProgress {
        if let Some(previous) = self.step.previous() {
            self.step = previous;
            self.revision = self.revision.saturating_add(1);
        }
        self.progress()
    }

    /// Terminal action: assemble the finalized record.
    ///
    /// Requires every section, verifies consent, resolves the district
    /// assignment, checks the enrollment age band, and runs the license
    /// decision table. `pool` is the seat pool for the student's district,
    /// when one exists; it is consumed from only if a seat is granted.
    pub fn finalize(
        &self,
        id: StudentId,
        directory: &DistrictDirectory,
        pool: Option<&mut SeatPool>,
        today: EpochDay,
    ) -> Result<StudentRecord, CoreError> {
        let missing = self.draft.missing_sections();
        if !missing.is_empty() {
            return Err(CoreError::DraftIncomplete { missing });
        }

        // All sections present past this point.
        let (Some(basic), Some(district), Some(profile), Some(form), Some(requested)) = (
            self.draft.basic().cloned(),
            self.draft.location().cloned(),
            self.draft.profile().cloned(),
            self.draft.consent().copied(),
            self.draft.license(),
        ) else {
            return Err(CoreError::DraftIncomplete {
                missing: self.draft.missing_sections(),
            });
        };

        basic.birth_date.check_enrollable_on(today)?;

        if let Some(district_id) = district.detected_id() {
            if directory.get(district_id).is_none() {
                return Err(CoreError::UnknownDistrict(district_id));
            }
        }

        let consent = form.verify(today)?;
        let notification = form.notification_timing();
        let license: LicenseGrant = allocate_license(requested, pool, today);

        Ok(StudentRecord {
            id,
            tenant: self.tenant,
            name: basic.name,
            birth_date: basic.birth_date,
            grade: basic.grade,
            district,
            profile,
            consent,
            license,
            enrolled_on: today,
            notification,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::district::builtin_directory;
    use crate::license::Activation;
    use crate::primitives::Zip;
    use proptest::prelude::*;

    const TODAY: EpochDay = EpochDay(20_000);

    fn basic_payload() -> StepData {
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
        }
    }

    fn location_payload(directory: &DistrictDirectory) -> StepData {
        let district = Zip::new("30301")
            .ok()
            .and_then(|z| directory.resolve_zip(&z))
            .map(|d| d.id)
            .unwrap_or_default();
        StepData::Location {
            assignment: DistrictAssignment::Detected { district },
        }
    }

    fn run_to_terminal(wizard: &mut EnrollmentWizard, directory: &DistrictDirectory) {
        let steps = [
            basic_payload(),
            location_payload(directory),
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
            let result = wizard.submit(step, directory);
            assert!(result.is_ok(), "submit failed: {result:?}");
        }
    }

    #[test]
    fn steps_are_linear() {
        assert_eq!(WizardStep::BasicInfo.next(), Some(WizardStep::Location));
        assert_eq!(WizardStep::License.next(), None);
        assert_eq!(WizardStep::BasicInfo.previous(), None);
        assert!(WizardStep::License.is_terminal());
        for pair in WizardStep::ALL.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert_eq!(pair[1].previous(), Some(pair[0]));
        }
    }

    #[test]
    fn submit_wrong_step_is_rejected() {
        let directory = builtin_directory();
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));

        let result = wizard.submit(
            StepData::License {
                requested: LicenseKind::Trial,
            },
            &directory,
        );
        assert_eq!(
            result,
            Err(CoreError::StepMismatch {
                expected: WizardStep::BasicInfo,
                submitted: WizardStep::License,
            })
        );
        assert_eq!(wizard.revision(), 0);
        assert!(wizard.draft().license().is_none());
    }

    #[test]
    fn full_run_reaches_terminal_step() {
        let directory = builtin_directory();
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
        run_to_terminal(&mut wizard, &directory);

        assert_eq!(wizard.step(), WizardStep::License);
        assert!(wizard.draft().is_complete());
        assert_eq!(wizard.revision(), 5);
    }

    #[test]
    fn back_never_discards_data() {
        let directory = builtin_directory();
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
        run_to_terminal(&mut wizard, &directory);

        let before = wizard.draft().clone();
        wizard.back();
        wizard.back();
        assert_eq!(wizard.step(), WizardStep::LearningProfile);
        assert_eq!(wizard.draft(), &before);
    }

    #[test]
    fn back_stops_at_first_step() {
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
        let progress = wizard.back();
        assert_eq!(progress.step, WizardStep::BasicInfo);
        assert_eq!(progress.revision, 0);
    }

    #[test]
    fn resubmit_after_back_revalidates_and_advances() {
        let directory = builtin_directory();
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
        run_to_terminal(&mut wizard, &directory);

        wizard.back(); // License -> Consent
        wizard.back(); // Consent -> LearningProfile
        let mut profile = LearningProfile::empty();
        profile
            .accommodations
            .push("frequent movement breaks".to_string());
        let result = wizard.submit(StepData::LearningProfile { profile }, &directory);
        assert!(result.is_ok());
        assert_eq!(wizard.step(), WizardStep::Consent);
        // Consent entered earlier is still there.
        assert!(wizard.draft().consent().is_some());
    }

    #[test]
    fn incomplete_consent_does_not_advance() {
        let directory = builtin_directory();
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
        for step in [
            basic_payload(),
            location_payload(&directory),
            StepData::LearningProfile {
                profile: LearningProfile::empty(),
            },
        ] {
            assert!(wizard.submit(step, &directory).is_ok());
        }

        let result = wizard.submit(
            StepData::Consent {
                form: ConsentForm {
                    parental_consent: true,
                    ..ConsentForm::default()
                },
            },
            &directory,
        );
        assert!(matches!(result, Err(CoreError::ConsentIncomplete { .. })));
        assert_eq!(wizard.step(), WizardStep::Consent);
        assert!(wizard.draft().consent().is_none());
    }

    #[test]
    fn unknown_detected_district_is_rejected() {
        let directory = builtin_directory();
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
        assert!(wizard.submit(basic_payload(), &directory).is_ok());

        let result = wizard.submit(
            StepData::Location {
                assignment: DistrictAssignment::Detected {
                    district: crate::primitives::DistrictId(999),
                },
            },
            &directory,
        );
        assert!(matches!(result, Err(CoreError::UnknownDistrict(_))));
    }

    #[test]
    fn invalid_serde_payload_is_caught_on_submit() {
        let directory = builtin_directory();
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));

        // A birth date that serde would happily deserialize.
        let result = wizard.submit(
            StepData::BasicInfo {
                name: StudentName {
                    given: "Ada".to_string(),
                    preferred: None,
                    family: "Byrne".to_string(),
                },
                birth_date: BirthDate {
                    year: 2013,
                    month: 13,
                    day: 40,
                },
                grade: Grade::Grade5,
            },
            &directory,
        );
        assert!(matches!(result, Err(CoreError::InvalidField { .. })));
        assert_eq!(wizard.step(), WizardStep::BasicInfo);
    }

    #[test]
    fn finalize_requires_complete_draft() {
        let directory = builtin_directory();
        let wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
        let result = wizard.finalize(StudentId(1), &directory, None, TODAY);
        assert!(matches!(result, Err(CoreError::DraftIncomplete { .. })));
    }

    #[test]
    fn finalize_assembles_record() {
        let directory = builtin_directory();
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
        run_to_terminal(&mut wizard, &directory);

        let mut pool = SeatPool::new(crate::primitives::DistrictId(1), 5);
        let record = wizard.finalize(StudentId(42), &directory, Some(&mut pool), TODAY);
        assert!(record.is_ok());
        if let Ok(record) = record {
            assert_eq!(record.id, StudentId(42));
            assert_eq!(record.license.kind, LicenseKind::DistrictSeat);
            assert_eq!(record.license.activation, Activation::Immediate);
            assert_eq!(record.enrolled_on, TODAY);
            assert_eq!(
                record.notification,
                crate::consent::NotificationTiming::Held
            );
        }
        assert_eq!(pool.allocated, 1);
    }

    #[test]
    fn finalize_seat_fallback_when_pool_exhausted() {
        let directory = builtin_directory();
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
        run_to_terminal(&mut wizard, &directory);

        let mut pool = SeatPool::new(crate::primitives::DistrictId(1), 0);
        let record = wizard.finalize(StudentId(1), &directory, Some(&mut pool), TODAY);
        assert_eq!(
            record.map(|r| r.license.kind).ok(),
            Some(LicenseKind::Trial)
        );
    }

    #[test]
    fn revision_check() {
        let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
        assert!(wizard.ensure_revision(None).is_ok());
        assert!(wizard.ensure_revision(Some(0)).is_ok());
        wizard.back(); // no-op at first step, revision unchanged
        assert!(wizard.ensure_revision(Some(0)).is_ok());
        assert!(matches!(
            wizard.ensure_revision(Some(3)),
            Err(CoreError::StaleRevision { .. })
        ));
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    proptest! {
        /// Arbitrary interleavings of valid submits and backs never lose
        /// already-merged sections.
        #[test]
        fn sections_are_monotone(moves in proptest::collection::vec(any::<bool>(), 0..40)) {
            let directory = builtin_directory();
            let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
            let mut filled = 0usize;

            for go_forward in moves {
                if go_forward {
                    let payload = match wizard.step() {
                        WizardStep::BasicInfo => basic_payload(),
                        WizardStep::Location => location_payload(&directory),
                        WizardStep::LearningProfile => StepData::LearningProfile {
                            profile: LearningProfile::empty(),
                        },
                        WizardStep::Consent => StepData::Consent {
                            form: ConsentForm::granted_required(),
                        },
                        WizardStep::License => StepData::License {
                            requested: LicenseKind::Trial,
                        },
                    };
                    prop_assert!(wizard.submit(payload, &directory).is_ok());
                } else {
                    wizard.back();
                }
                let now_filled = 5 - wizard.draft().missing_sections().len();
                prop_assert!(now_filled >= filled, "merged sections went backwards");
                filled = now_filled;
            }
        }

        /// The wizard can never finalize unless all required consents were
        /// granted on the consent step.
        #[test]
        fn no_finalize_without_consent(consent_bits in any::<[bool; 3]>()) {
            let directory = builtin_directory();
            let mut wizard = EnrollmentWizard::open(DraftId(1), TenantId(1));
            prop_assert!(wizard.submit(basic_payload(), &directory).is_ok());
            prop_assert!(wizard.submit(location_payload(&directory), &directory).is_ok());
            let profile_ok = wizard.submit(StepData::LearningProfile {
                profile: LearningProfile::empty(),
            }, &directory).is_ok();
            prop_assert!(profile_ok);

            let form = ConsentForm {
                parental_consent: consent_bits[0],
                ferpa_acknowledged: consent_bits[1],
                district_approval: consent_bits[2],
                ..ConsentForm::default()
            };
            let all_granted = consent_bits.iter().all(|b| *b);
            let submitted = wizard.submit(StepData::Consent { form }, &directory);
            prop_assert_eq!(submitted.is_ok(), all_granted);

            if all_granted {
                let license_ok = wizard.submit(StepData::License {
                    requested: LicenseKind::Trial,
                }, &directory).is_ok();
                prop_assert!(license_ok);
                prop_assert!(wizard.finalize(StudentId(1), &directory, None, TODAY).is_ok());
            } else {
                let result = wizard.finalize(StudentId(1), &directory, None, TODAY);
                prop_assert!(result.is_err());
            }
        }
    }
}
