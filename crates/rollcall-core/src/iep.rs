//! # IEP Documents
//!
//! The Individualized Education Program data model.
//!
//! The document is mostly declarative: goals, services, placement, team,
//! and meeting history. `IepDocument::validate` enforces the invariants a
//! compliant document must satisfy before it is stored. All percentages
//! are integers 0..=100.

use crate::error::CoreError;
use crate::primitives::{EpochDay, MAX_IEP_GOALS, MAX_NAME_LEN, MAX_NOTE_LEN, StudentId};
use serde::{Deserialize, Serialize};

// =============================================================================
// ENUMS
// =============================================================================

/// The domain a goal targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum GoalArea {
    Academic,
    Behavioral,
    Communication,
    MotorSkills,
    SocialEmotional,
    AdaptiveDailyLiving,
}

/// How goal progress is measured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementMethod {
    CurriculumBasedAssessment,
    TeacherObservation,
    WorkSamples,
    StandardizedTest,
    BehaviorFrequencyData,
}

/// A related or special-education service.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    SpecializedInstruction,
    SpeechLanguageTherapy,
    OccupationalTherapy,
    PhysicalTherapy,
    Counseling,
    AssistiveTechnology,
}

/// Where a service is delivered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ServiceLocation {
    GeneralEducationClassroom,
    ResourceRoom,
    SeparateClassroom,
    Teletherapy,
}

/// A role on the IEP team.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Parent,
    CaseManager,
    SpecialEducationTeacher,
    GeneralEducationTeacher,
    SchoolPsychologist,
    RelatedServiceProvider,
    DistrictRepresentative,
}

/// The kind of a recorded IEP meeting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MeetingKind {
    Initial,
    AnnualReview,
    Amendment,
    TriennialReevaluation,
}

/// Document lifecycle state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IepStatus {
    Draft,
    Active,
    Expired,
}

// =============================================================================
// COMPONENTS
// =============================================================================

/// A measurable annual goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IepGoal {
    pub id: u32,
    pub area: GoalArea,
    pub description: String,
    /// Present level of performance the goal starts from.
    pub baseline: String,
    /// The measurable target.
    pub target: String,
    pub measurement: MeasurementMethod,
    /// Progress toward the target, 0..=100.
    pub progress_percent: u8,
}

/// A scheduled service commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub kind: ServiceKind,
    pub minutes_per_week: u32,
    pub location: ServiceLocation,
    pub provider: TeamRole,
}

/// Time split across settings. The three integer percentages must sum to
/// exactly 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub general_education_percent: u8,
    pub special_education_percent: u8,
    pub related_services_percent: u8,
}

impl Placement {
    /// A fully mainstreamed placement.
    #[must_use]
    pub fn general_education() -> Self {
        Self {
            general_education_percent: 100,
            special_education_percent: 0,
            related_services_percent: 0,
        }
    }

    fn sum(&self) -> u16 {
        u16::from(self.general_education_percent)
            + u16::from(self.special_education_percent)
            + u16::from(self.related_services_percent)
    }
}

/// A member of the IEP team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub role: TeamRole,
}

/// A held IEP meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub held_on: EpochDay,
    pub kind: MeetingKind,
    pub attendees: Vec<TeamMember>,
    pub notes: String,
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// One student's IEP document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IepDocument {
    pub student: StudentId,
    pub effective: EpochDay,
    /// Annual review deadline; must fall after the effective day.
    pub review_due: EpochDay,
    pub goals: Vec<IepGoal>,
    pub services: Vec<ServiceEntry>,
    pub placement: Placement,
    pub team: Vec<TeamMember>,
    pub meetings: Vec<MeetingRecord>,
    pub status: IepStatus,
}

impl IepDocument {
    /// Check every document invariant.
    ///
    /// Draft documents may be sparse; an Active document must carry at
    /// least one goal and a case manager.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.review_due <= self.effective {
            return Err(CoreError::IepInvalid(
                "review_due must fall after the effective day".to_string(),
            ));
        }
        if self.placement.sum() != 100 {
            return Err(CoreError::IepInvalid(format!(
                "placement percentages sum to {}, expected 100",
                self.placement.sum()
            )));
        }
        if self.goals.len() > MAX_IEP_GOALS {
            return Err(CoreError::IepInvalid(format!(
                "{} goals exceeds the maximum of {MAX_IEP_GOALS}",
                self.goals.len()
            )));
        }

        let mut seen_goal_ids = std::collections::BTreeSet::new();
        for goal in &self.goals {
            if goal.progress_percent > 100 {
                return Err(CoreError::IepInvalid(format!(
                    "goal {} progress {}% exceeds 100",
                    goal.id, goal.progress_percent
                )));
            }
            if goal.description.trim().is_empty() || goal.description.len() > MAX_NOTE_LEN {
                return Err(CoreError::IepInvalid(format!(
                    "goal {} description empty or too long",
                    goal.id
                )));
            }
            if !seen_goal_ids.insert(goal.id) {
                return Err(CoreError::IepInvalid(format!(
                    "duplicate goal id {}",
                    goal.id
                )));
            }
        }

        for member in &self.team {
            if member.name.trim().is_empty() || member.name.len() > MAX_NAME_LEN {
                return Err(CoreError::IepInvalid(
                    "team member name empty or too long".to_string(),
                ));
            }
        }

        for meeting in &self.meetings {
            if meeting.notes.len() > MAX_NOTE_LEN {
                return Err(CoreError::IepInvalid(
                    "meeting notes too long".to_string(),
                ));
            }
        }

        if self.status == IepStatus::Active {
            if self.goals.is_empty() {
                return Err(CoreError::IepInvalid(
                    "an active IEP needs at least one goal".to_string(),
                ));
            }
            if !self.team.iter().any(|m| m.role == TeamRole::CaseManager) {
                return Err(CoreError::IepInvalid(
                    "an active IEP needs a case manager".to_string(),
                ));
            }
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
