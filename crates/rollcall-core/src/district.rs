//! # District Resolution
//!
//! ZIP-to-district lookup with a manual-entry fallback.
//!
//! The directory is a deterministic in-memory table (`BTreeMap` only). A hit
//! resolves to a registered district; a miss forces the caller onto the
//! manual-entry path. The two outcomes are mutually exclusive by construction:
//! a location section holds either a detected district id or a validated
//! manual record, never both.

use crate::error::CoreError;
use crate::primitives::{DistrictId, MAX_NAME_LEN, Zip};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// CURRICULUM
// =============================================================================

/// Curriculum framework a district teaches against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CurriculumFramework {
    /// Common Core State Standards.
    CommonCore,
    /// Texas Essential Knowledge and Skills.
    Teks,
    /// Florida B.E.S.T. standards.
    Best,
    /// A state framework not modeled individually.
    StateSpecific,
}

// =============================================================================
// DISTRICT
// =============================================================================

/// A registered school district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    pub id: DistrictId,
    pub name: String,
    /// Two-letter USPS state code.
    pub state: String,
    pub framework: CurriculumFramework,
    /// Ordered standards list for the framework as adopted by the district.
    pub standards: Vec<String>,
}

impl District {
    /// Create a validated district record.
    pub fn new(
        id: DistrictId,
        name: impl Into<String>,
        state: &str,
        framework: CurriculumFramework,
        standards: Vec<String>,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() || name.len() > MAX_NAME_LEN {
            return Err(CoreError::invalid("district_name", "empty or too long"));
        }
        Ok(Self {
            id,
            name,
            state: check_state_code(state)?,
            framework,
            standards,
        })
    }
}

fn check_state_code(raw: &str) -> Result<String, CoreError> {
    let trimmed = raw.trim();
    if trimmed.len() != 2 || !trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(CoreError::invalid(
            "state",
            format!("expected two-letter USPS code, got {raw:?}"),
        ));
    }
    Ok(trimmed.to_ascii_uppercase())
}

// =============================================================================
// MANUAL ENTRY
// =============================================================================

/// A district entered by hand after ZIP detection missed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualDistrict {
    /// Two-letter USPS state code.
    pub state: String,
    pub name: String,
    pub framework: CurriculumFramework,
}

impl ManualDistrict {
    /// Create a validated manual entry. State, district name, and a
    /// curriculum selection are all required.
    pub fn new(
        state: &str,
        name: impl Into<String>,
        framework: CurriculumFramework,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() || name.len() > MAX_NAME_LEN {
            return Err(CoreError::invalid("district_name", "empty or too long"));
        }
        Ok(Self {
            state: check_state_code(state)?,
            name,
            framework,
        })
    }
}

// =============================================================================
// ASSIGNMENT
// =============================================================================

/// The location section of a draft: exactly one of ZIP-detected or manual.
// Externally tagged so the postcard snapshot path can decode it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistrictAssignment {
    /// Resolved by ZIP lookup against the directory.
    Detected { district: DistrictId },
    /// Entered by hand after a directory miss.
    Manual { entry: ManualDistrict },
}

impl DistrictAssignment {
    /// The detected district id, if this assignment came from ZIP lookup.
    #[must_use]
    pub fn detected_id(&self) -> Option<DistrictId> {
        match self {
            Self::Detected { district } => Some(*district),
            Self::Manual { .. } => None,
        }
    }
}

// =============================================================================
// DIRECTORY
// =============================================================================

/// The ZIP-to-district lookup table.
///
/// Both indexes are `BTreeMap` so iteration and serialization are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictDirectory {
    districts: BTreeMap<DistrictId, District>,
    by_zip: BTreeMap<Zip, DistrictId>,
}

impl DistrictDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a district and the ZIP codes it serves. Re-registering an
    /// id replaces the district; ZIP mappings accumulate.
    pub fn register(&mut self, district: District, zips: Vec<Zip>) {
        let id = district.id;
        self.districts.insert(id, district);
        for zip in zips {
            self.by_zip.insert(zip, id);
        }
    }

    /// Resolve a ZIP code to its district. A miss means the caller must
    /// collect a manual entry instead.
    #[must_use]
    pub fn resolve_zip(&self, zip: &Zip) -> Option<&District> {
        let id = self.by_zip.get(zip)?;
        self.districts.get(id)
    }

    /// Look up a district by id.
    #[must_use]
    pub fn get(&self, id: DistrictId) -> Option<&District> {
        self.districts.get(&id)
    }

    /// All districts in id order.
    pub fn districts(&self) -> impl Iterator<Item = &District> {
        self.districts.values()
    }

    /// All ZIP mappings in ZIP order.
    pub fn zip_mappings(&self) -> impl Iterator<Item = (&Zip, DistrictId)> {
        self.by_zip.iter().map(|(z, id)| (z, *id))
    }

    /// Number of registered districts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.districts.len()
    }

    /// True if no districts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.districts.is_empty()
    }
}

/// The built-in seed directory.
///
/// A small representative table; deployments extend it via the seeding CLI.
#[must_use]
pub fn builtin_directory() -> DistrictDirectory {
    let mut directory = DistrictDirectory::new();
    let seeds: [(u64, &str, &str, CurriculumFramework, &[&str], &[&str]); 5] = [
        (
            1,
            "Atlanta Public Schools",
            "GA",
            CurriculumFramework::CommonCore,
            &["ELA.K12", "MATH.K12", "SCI.K12"],
            &["30301", "30303", "30310"],
        ),
        (
            2,
            "Austin Independent School District",
            "TX",
            CurriculumFramework::Teks,
            &["TEKS.ELAR", "TEKS.MATH", "TEKS.SCI"],
            &["78701", "78702", "78704"],
        ),
        (
            3,
            "Miami-Dade County Public Schools",
            "FL",
            CurriculumFramework::Best,
            &["BEST.ELA", "BEST.MATH"],
            &["33101", "33125", "33130"],
        ),
        (
            4,
            "Seattle Public Schools",
            "WA",
            CurriculumFramework::CommonCore,
            &["ELA.K12", "MATH.K12", "NGSS"],
            &["98101", "98103", "98115"],
        ),
        (
            5,
            "Denver Public Schools",
            "CO",
            CurriculumFramework::StateSpecific,
            &["CAS.READ", "CAS.MATH"],
            &["80202", "80205", "80211"],
        ),
    ];

    for (id, name, state, framework, standards, zips) in seeds {
        let standards = standards.iter().map(|s| (*s).to_string()).collect();
        let zips: Vec<Zip> = zips.iter().filter_map(|z| Zip::new(z).ok()).collect();
        if let Ok(district) = District::new(DistrictId(id), name, state, framework, standards) {
            directory.register(district, zips);
        }
    }

    directory
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_district(id: u64) -> District {
        District {
            id: DistrictId(id),
            name: format!("District {id}"),
            state: "GA".to_string(),
            framework: CurriculumFramework::CommonCore,
            standards: vec!["ELA.K12".to_string()],
        }
    }

    #[test]
    fn resolve_hit_returns_district() {
        let mut directory = DistrictDirectory::new();
        let zip = Zip::new("30301");
        assert!(zip.is_ok());
        if let Ok(zip) = zip {
            directory.register(sample_district(7), vec![zip.clone()]);
            let resolved = directory.resolve_zip(&zip);
            assert_eq!(resolved.map(|d| d.id), Some(DistrictId(7)));
        }
    }

    #[test]
    fn resolve_miss_returns_none() {
        let directory = builtin_directory();
        let zip = Zip::new("99999");
        assert!(zip.is_ok_and(|z| directory.resolve_zip(&z).is_none()));
    }

    #[test]
    fn builtin_directory_resolves_seeded_zips() {
        let directory = builtin_directory();
        assert_eq!(directory.len(), 5);

        let zip = Zip::new("78704");
        let resolved = zip.ok().and_then(|z| directory.resolve_zip(&z).cloned());
        assert_eq!(
            resolved.as_ref().map(|d| d.framework),
            Some(CurriculumFramework::Teks)
        );
        assert!(resolved.is_some_and(|d| !d.standards.is_empty()));
    }

    #[test]
    fn manual_entry_requires_all_fields() {
        assert!(ManualDistrict::new("GA", "", CurriculumFramework::CommonCore).is_err());
        assert!(ManualDistrict::new("Georgia", "Fulton County", CurriculumFramework::CommonCore).is_err());
        assert!(ManualDistrict::new("ga", "Fulton County", CurriculumFramework::CommonCore).is_ok());
    }

    #[test]
    fn state_codes_normalize_to_uppercase() {
        let entry = ManualDistrict::new("tx", "Round Rock ISD", CurriculumFramework::Teks);
        assert_eq!(entry.map(|e| e.state).ok(), Some("TX".to_string()));
    }

    #[test]
    fn assignment_is_exclusive() {
        let detected = DistrictAssignment::Detected {
            district: DistrictId(1),
        };
        assert_eq!(detected.detected_id(), Some(DistrictId(1)));

        let manual = ManualDistrict::new("CO", "Boulder Valley", CurriculumFramework::StateSpecific)
            .map(|entry| DistrictAssignment::Manual { entry });
        assert!(manual.is_ok_and(|a| a.detected_id().is_none()));
    }

    #[test]
    fn reregistering_replaces_district() {
        let mut directory = DistrictDirectory::new();
        directory.register(sample_district(1), vec![]);
        let mut replacement = sample_district(1);
        replacement.name = "Renamed".to_string();
        directory.register(replacement, vec![]);

        assert_eq!(directory.len(), 1);
        assert_eq!(
            directory.get(DistrictId(1)).map(|d| d.name.as_str()),
            Some("Renamed")
        );
    }
}
