//! # Core Errors
//!
//! Domain error taxonomy for the enrollment engine.
//!
//! Every fallible CORE operation returns `Result<_, CoreError>`. Storage and
//! snapshot-format failures have their own enums (`storage::StoreError`,
//! `formats::FormatError`) so the app layer can map them to distinct
//! responses.

use crate::consent::RequiredConsent;
use crate::primitives::{DistrictId, DraftId, StudentId};
use crate::student::DraftSection;
use crate::wizard::WizardStep;
use thiserror::Error;

/// Errors produced by the deterministic enrollment engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A field failed validation.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    /// A step payload was submitted out of order.
    #[error("wizard is at step {expected}, payload was for {submitted}")]
    StepMismatch {
        expected: WizardStep,
        submitted: WizardStep,
    },

    /// Finalization was attempted before every section was filled in.
    #[error("draft incomplete, missing sections: {missing:?}")]
    DraftIncomplete { missing: Vec<DraftSection> },

    /// One or more required consents were not granted.
    #[error("consent incomplete, missing: {missing:?}")]
    ConsentIncomplete { missing: Vec<RequiredConsent> },

    /// A ZIP-detected district id no longer resolves in the directory.
    #[error("district {0:?} is not in the directory")]
    UnknownDistrict(DistrictId),

    /// A seat allocation was requested against an exhausted pool.
    #[error("no seats available in district {0:?}")]
    SeatPoolExhausted(DistrictId),

    /// No open wizard with the given id.
    #[error("draft {0:?} not found")]
    DraftNotFound(DraftId),

    /// No finalized student with the given id.
    #[error("student {0:?} not found")]
    StudentNotFound(StudentId),

    /// An IEP document violated one of its invariants.
    #[error("invalid IEP: {0}")]
    IepInvalid(String),

    /// Optimistic-concurrency check failed: the wizard moved underneath
    /// the caller.
    #[error("stale revision: expected {expected}, wizard is at {actual}")]
    StaleRevision { expected: u64, actual: u64 },
}

impl CoreError {
    /// Convenience constructor for field validation failures.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}
