//! # Consent & Compliance
//!
//! Consent gating for student enrollment.
//!
//! Three consents are required before a record may finalize: parental
//! consent, FERPA acknowledgement, and district approval. Two more are
//! optional opt-ins. Verification is a pure function over the flags; the
//! result carries the day it was verified so the record is auditable.

use crate::error::CoreError;
use crate::primitives::EpochDay;
use serde::{Deserialize, Serialize};

// =============================================================================
// CONSENT FORM
// =============================================================================

/// The consents a guardian grants during onboarding.
///
/// COPPA parental consent for students under 13 is subsumed by
/// `parental_consent`, which is required at every age.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentForm {
    /// Required: a parent or guardian consents to the enrollment.
    pub parental_consent: bool,
    /// Required: FERPA disclosure acknowledged.
    pub ferpa_acknowledged: bool,
    /// Required: the district has approved the account.
    pub district_approval: bool,
    /// Optional: share progress data with the district.
    pub data_sharing_opt_in: bool,
    /// Optional: allow anonymized usage analytics.
    pub anonymous_analytics_opt_in: bool,
}

/// The required consents, named for reporting what is missing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RequiredConsent {
    ParentalConsent,
    FerpaAcknowledgement,
    DistrictApproval,
}

impl ConsentForm {
    /// A form with every flag granted.
    #[must_use]
    pub fn granted_all() -> Self {
        Self {
            parental_consent: true,
            ferpa_acknowledged: true,
            district_approval: true,
            data_sharing_opt_in: true,
            anonymous_analytics_opt_in: true,
        }
    }

    /// A form with only the three required flags granted.
    #[must_use]
    pub fn granted_required() -> Self {
        Self {
            parental_consent: true,
            ferpa_acknowledged: true,
            district_approval: true,
            data_sharing_opt_in: false,
            anonymous_analytics_opt_in: false,
        }
    }

    /// Required consents that have not been granted, in a stable order.
    #[must_use]
    pub fn missing(&self) -> Vec<RequiredConsent> {
        let mut missing = Vec::new();
        if !self.parental_consent {
            missing.push(RequiredConsent::ParentalConsent);
        }
        if !self.ferpa_acknowledged {
            missing.push(RequiredConsent::FerpaAcknowledgement);
        }
        if !self.district_approval {
            missing.push(RequiredConsent::DistrictApproval);
        }
        missing
    }

    /// True when every required consent is granted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Verify the form, producing an auditable record, or report exactly
    /// which required consents are missing.
    pub fn verify(self, today: EpochDay) -> Result<ConsentRecord, CoreError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(CoreError::ConsentIncomplete { missing });
        }
        Ok(ConsentRecord {
            form: self,
            verified_on: today,
        })
    }

    /// When the welcome notification may be sent.
    ///
    /// Notifications go out immediately only when the required consents AND
    /// the data-sharing opt-in are granted; otherwise they are held until a
    /// guardian revisits the consent settings.
    #[must_use]
    pub fn notification_timing(&self) -> NotificationTiming {
        if self.is_complete() && self.data_sharing_opt_in {
            NotificationTiming::Immediate
        } else {
            NotificationTiming::Held
        }
    }
}

// =============================================================================
// VERIFIED RECORD
// =============================================================================

/// A consent form that passed verification, stamped with the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub form: ConsentForm,
    pub verified_on: EpochDay,
}

/// Whether enrollment notifications are sent immediately or held.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTiming {
    Immediate,
    Held,
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_form_is_incomplete() {
        let form = ConsentForm::default();
        assert!(!form.is_complete());
        assert_eq!(form.missing().len(), 3);
    }

    #[test]
    fn missing_lists_exact_flags() {
        let form = ConsentForm {
            parental_consent: true,
            ferpa_acknowledged: false,
            district_approval: true,
            ..ConsentForm::default()
        };
        assert_eq!(form.missing(), vec![RequiredConsent::FerpaAcknowledgement]);
    }

    #[test]
    fn verify_requires_all_required_flags() {
        let today = EpochDay(20_000);
        let incomplete = ConsentForm {
            parental_consent: true,
            ..ConsentForm::default()
        };
        let err = incomplete.verify(today);
        assert!(matches!(err, Err(CoreError::ConsentIncomplete { .. })));

        let record = ConsentForm::granted_required().verify(today);
        assert!(record.is_ok());
        assert_eq!(record.map(|r| r.verified_on).ok(), Some(today));
    }

    #[test]
    fn optional_flags_do_not_gate_verification() {
        let form = ConsentForm::granted_required();
        assert!(!form.data_sharing_opt_in);
        assert!(form.verify(EpochDay(1)).is_ok());
    }

    #[test]
    fn notification_gated_on_data_sharing() {
        assert_eq!(
            ConsentForm::granted_all().notification_timing(),
            NotificationTiming::Immediate
        );
        assert_eq!(
            ConsentForm::granted_required().notification_timing(),
            NotificationTiming::Held
        );
        assert_eq!(
            ConsentForm::default().notification_timing(),
            NotificationTiming::Held
        );
    }
}
