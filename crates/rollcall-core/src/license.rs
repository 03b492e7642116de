//! # License Allocation
//!
//! The three mutually exclusive billing paths for enabling a student
//! account, and the decision table that picks between them.
//!
//! - District seat: consumed from a finite per-district pool, active
//!   immediately, billed to the district.
//! - Parent purchase: activation deferred until billing confirms.
//! - Trial: active immediately for 14 days, then auto-converts to a parent
//!   purchase.
//!
//! A district-seat request against an exhausted (or absent) pool falls back
//! to a trial rather than failing the enrollment.

use crate::error::CoreError;
use crate::primitives::{DistrictId, EpochDay, TRIAL_LENGTH_DAYS};
use serde::{Deserialize, Serialize};

// =============================================================================
// KINDS & ACTIVATION
// =============================================================================

/// The billing path backing a student license.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum LicenseKind {
    DistrictSeat,
    ParentPurchase,
    Trial,
}

/// When the license becomes (or became) usable.
// Externally tagged so the postcard snapshot path can decode it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Usable now.
    Immediate,
    /// Waiting on a confirmed payment.
    PendingPayment,
    /// Usable now, until the given day (exclusive).
    TrialUntil { expires: EpochDay },
}

// =============================================================================
// SEAT POOL
// =============================================================================

/// A finite pool of district-funded seats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatPool {
    pub district: DistrictId,
    pub total: u32,
    pub allocated: u32,
}

impl SeatPool {
    /// Create a pool with no seats allocated.
    #[must_use]
    pub fn new(district: DistrictId, total: u32) -> Self {
        Self {
            district,
            total,
            allocated: 0,
        }
    }

    /// Seats still available.
    #[must_use]
    pub fn available(&self) -> u32 {
        self.total.saturating_sub(self.allocated)
    }

    /// Consume one seat.
    pub fn allocate(&mut self) -> Result<(), CoreError> {
        if self.available() == 0 {
            return Err(CoreError::SeatPoolExhausted(self.district));
        }
        self.allocated = self.allocated.saturating_add(1);
        Ok(())
    }

    /// Return one seat, e.g. when a student transfers out.
    pub fn release(&mut self) {
        self.allocated = self.allocated.saturating_sub(1);
    }
}

// =============================================================================
// GRANT
// =============================================================================

/// A resolved license: the outcome of the allocation decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseGrant {
    pub kind: LicenseKind,
    pub activation: Activation,
    pub granted_on: EpochDay,
    /// What the grant turns into when it runs out (trials only).
    pub converts_to: Option<LicenseKind>,
}

impl LicenseGrant {
    /// Whether the license is usable on the given day.
    #[must_use]
    pub fn is_active(&self, today: EpochDay) -> bool {
        match self.activation {
            Activation::Immediate => true,
            Activation::PendingPayment => false,
            Activation::TrialUntil { expires } => today < expires,
        }
    }

    /// The day a trial runs out, if this is a trial grant.
    #[must_use]
    pub fn trial_expiry(&self) -> Option<EpochDay> {
        match self.activation {
            Activation::TrialUntil { expires } => Some(expires),
            _ => None,
        }
    }
}

fn trial_grant(today: EpochDay) -> LicenseGrant {
    LicenseGrant {
        kind: LicenseKind::Trial,
        activation: Activation::TrialUntil {
            expires: today.plus_days(TRIAL_LENGTH_DAYS),
        },
        granted_on: today,
        converts_to: Some(LicenseKind::ParentPurchase),
    }
}

// =============================================================================
// DECISION TABLE
// =============================================================================

/// Resolve a requested license kind into a grant.
///
/// `pool` is the seat pool for the student's district, when one exists.
/// The pool is mutated only when a seat is actually consumed.
#[must_use]
pub fn allocate_license(
    requested: LicenseKind,
    pool: Option<&mut SeatPool>,
    today: EpochDay,
) -> LicenseGrant {
    match requested {
        LicenseKind::DistrictSeat => {
            // Seat if one remains, otherwise fall back to a trial.
            let seat = pool.map_or(
                Err(CoreError::invalid("seat_pool", "no pool for district")),
                SeatPool::allocate,
            );
            match seat {
                Ok(()) => LicenseGrant {
                    kind: LicenseKind::DistrictSeat,
                    activation: Activation::Immediate,
                    granted_on: today,
                    converts_to: None,
                },
                Err(_) => trial_grant(today),
            }
        }
        LicenseKind::ParentPurchase => LicenseGrant {
            kind: LicenseKind::ParentPurchase,
            activation: Activation::PendingPayment,
            granted_on: today,
            converts_to: None,
        },
        LicenseKind::Trial => trial_grant(today),
    }
}

/// Convert an expired trial into its follow-on grant.
///
/// Conversion is lazy: callers run this whenever a grant is read. Before
/// expiry (and for non-trials) the grant passes through unchanged.
#[must_use]
pub fn roll_trial(grant: LicenseGrant, today: EpochDay) -> LicenseGrant {
    match (grant.activation, grant.converts_to) {
        (Activation::TrialUntil { expires }, Some(next)) if today >= expires => LicenseGrant {
            kind: next,
            // Auto-conversion starts billing without a new checkout.
            activation: Activation::Immediate,
            granted_on: expires,
            converts_to: None,
        },
        _ => grant,
    }
}

/// Mark a pending parent purchase as paid.
#[must_use]
pub fn confirm_payment(grant: LicenseGrant) -> LicenseGrant {
    match grant.activation {
        Activation::PendingPayment => LicenseGrant {
            activation: Activation::Immediate,
            ..grant
        },
        _ => grant,
    }
}

// =============================================================================
// TESTS
// =============================================================================
