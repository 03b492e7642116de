//! CLI commands.
//!
//! Commands operate on a roster database selected by `--db` and `--backend`
//! (`file` for snapshot files, `redb` for the embedded database). Each
//! command is a plain function so integration tests can drive them without
//! spawning a process.

use rollcall_core::consent::ConsentForm;
use rollcall_core::district::{CurriculumFramework, DistrictAssignment, ManualDistrict};
use rollcall_core::error::CoreError;
use rollcall_core::formats::{FormatError, export_snapshot, import_snapshot};
use rollcall_core::license::LicenseKind;
use rollcall_core::primitives::{EpochDay, Grade, StudentId, TenantId, Zip};
use rollcall_core::roster::Roster;
use rollcall_core::storage::{RedbStore, StoreError};
use rollcall_core::student::{BirthDate, LearningProfile, StudentName};
use rollcall_core::wizard::StepData;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

// =============================================================================
// ERRORS
// =============================================================================

/// CLI-level failures.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("snapshot error: {0}")]
    Format(#[from] FormatError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("server error: {0}")]
    Serve(#[from] crate::api::ServeError),

    #[error("{0}")]
    Usage(String),
}

fn usage(message: impl Into<String>) -> CliError {
    CliError::Usage(message.into())
}

// =============================================================================
// LOAD / SAVE
// =============================================================================

/// Load a roster from the given backend, or start an empty one if the
/// database does not exist yet.
pub fn load_or_create_roster(db_path: &Path, backend: &str) -> Result<Roster, CliError> {
    match backend {
        "file" => {
            if db_path.exists() {
                let bytes = std::fs::read(db_path)?;
                Ok(import_snapshot(&bytes)?)
            } else {
                Ok(Roster::new())
            }
        }
        "redb" => {
            if db_path.exists() {
                Ok(RedbStore::open(db_path)?.load()?)
            } else {
                let store = RedbStore::create(db_path)?;
                store.load().map_err(CliError::from)
            }
        }
        other => Err(usage(format!("unknown backend {other:?}"))),
    }
}

/// Persist a roster to the given backend.
pub fn save_roster(roster: &Roster, db_path: &Path, backend: &str) -> Result<(), CliError> {
    match backend {
        "file" => {
            let bytes = export_snapshot(roster)?;
            std::fs::write(db_path, bytes)?;
            Ok(())
        }
        "redb" => {
            let store = if db_path.exists() {
                RedbStore::open(db_path)?
            } else {
                RedbStore::create(db_path)?
            };
            store.save(roster)?;
            Ok(())
        }
        other => Err(usage(format!("unknown backend {other:?}"))),
    }
}

// =============================================================================
// INIT
// =============================================================================

/// Create an empty roster database. Fails if the path exists, unless
/// `force` is set.
pub fn cmd_init(db_path: &Path, backend: &str, force: bool) -> Result<(), CliError> {
    if db_path.exists() {
        if !force {
            return Err(usage(format!(
                "{} already exists (use --force to overwrite)",
                db_path.display()
            )));
        }
        std::fs::remove_file(db_path)?;
    }
    save_roster(&Roster::new(), db_path, backend)?;
    println!("initialized {} ({backend})", db_path.display());
    Ok(())
}

// =============================================================================
// SEED DISTRICTS
// =============================================================================

/// Merge the built-in district directory into the database and provision
/// default seat pools.
pub fn cmd_seed_districts(db_path: &Path, backend: &str) -> Result<(), CliError> {
    let mut roster = load_or_create_roster(db_path, backend)?;

    let builtin = rollcall_core::district::builtin_directory();
    let mut zips_by_district: BTreeMap<_, Vec<Zip>> = BTreeMap::new();
    for (zip, district) in builtin.zip_mappings() {
        zips_by_district.entry(district).or_default().push(zip.clone());
    }
    for district in builtin.districts() {
        let zips = zips_by_district.remove(&district.id).unwrap_or_default();
        roster.register_district(district.clone(), zips);
    }
    roster.seed_default_pools();

    save_roster(&roster, db_path, backend)?;
    println!(
        "seeded {} districts, {} seat pools",
        roster.directory().len(),
        roster.seat_pools().count()
    );
    Ok(())
}

// =============================================================================
// STATUS
// =============================================================================

/// Print roster statistics, as text or JSON.
pub fn cmd_status(db_path: &Path, backend: &str, json: bool) -> Result<(), CliError> {
    let roster = load_or_create_roster(db_path, backend)?;
    let stats = roster.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("students enrolled:   {}", stats.students);
        println!("open drafts:         {}", stats.open_drafts);
        println!("districts:           {}", stats.districts);
        println!(
            "seats:               {}/{} allocated",
            stats.seats_allocated, stats.seats_total
        );
        println!(
            "licenses:            {} district / {} parent / {} trial",
            stats.licenses.district_seats, stats.licenses.parent_purchases, stats.licenses.trials
        );
        println!("completion:          {}%", stats.completion_percent);
    }
    Ok(())
}

// =============================================================================
// ENROLL (BATCH IMPORT)
// =============================================================================

/// One row of a batch enrollment file.
///
/// Batch rows represent enrollments with paper consent already on file, so
/// the three required consents are recorded as granted.
#[derive(Debug, Deserialize)]
pub struct EnrollRow {
    pub tenant: u64,
    pub given: String,
    #[serde(default)]
    pub preferred: Option<String>,
    pub family: String,
    /// `YYYY-MM-DD`.
    pub birth_date: String,
    /// Roster label: `PK`, `K`, `1`..`12`.
    pub grade: String,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub framework: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
}

/// Batch-enroll students from a JSON or text file.
///
/// Rows run through the full wizard, so every invariant that guards the
/// HTTP path guards batch imports too. Rows that fail validation are
/// skipped and counted.
pub fn cmd_enroll(
    db_path: &Path,
    backend: &str,
    input: &Path,
    format: &str,
    today: EpochDay,
) -> Result<(), CliError> {
    let rows = match format {
        "json" => {
            let content = std::fs::read_to_string(input)?;
            serde_json::from_str::<Vec<EnrollRow>>(&content)?
        }
        "text" => {
            let content = std::fs::read_to_string(input)?;
            parse_text_rows(&content)?
        }
        other => return Err(usage(format!("unknown enroll format {other:?}"))),
    };

    let mut roster = load_or_create_roster(db_path, backend)?;
    let mut enrolled = 0usize;
    let mut skipped = 0usize;
    for (index, row) in rows.iter().enumerate() {
        match enroll_row(&mut roster, row, today) {
            Ok(_) => enrolled += 1,
            Err(err) => {
                warn!(row = index, error = %err, "enroll row skipped");
                skipped += 1;
            }
        }
    }

    save_roster(&roster, db_path, backend)?;
    println!("enrolled {enrolled} students ({skipped} skipped)");
    Ok(())
}

/// Text rows: `tenant:given:family:YYYY-MM-DD:grade:zip`, one per line.
fn parse_text_rows(content: &str) -> Result<Vec<EnrollRow>, CliError> {
    let mut rows = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(':').collect();
        let [tenant, given, family, birth_date, grade, zip] = fields.as_slice() else {
            return Err(usage(format!("malformed enroll line {line:?}")));
        };
        let tenant: u64 = tenant
            .parse()
            .map_err(|_| usage(format!("bad tenant id in line {line:?}")))?;
        rows.push(EnrollRow {
            tenant,
            given: (*given).to_string(),
            preferred: None,
            family: (*family).to_string(),
            birth_date: (*birth_date).to_string(),
            grade: (*grade).to_string(),
            zip: Some((*zip).to_string()),
            state: None,
            district: None,
            framework: None,
            license: None,
        });
    }
    Ok(rows)
}

fn parse_birth_date(raw: &str) -> Result<BirthDate, CoreError> {
    let parts: Vec<&str> = raw.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return Err(CoreError::invalid(
            "birth_date",
            format!("expected YYYY-MM-DD, got {raw:?}"),
        ));
    };
    let bad = |field: &str| CoreError::invalid("birth_date", format!("bad {field} in {raw:?}"));
    let year: u16 = year.parse().map_err(|_| bad("year"))?;
    let month: u8 = month.parse().map_err(|_| bad("month"))?;
    let day: u8 = day.parse().map_err(|_| bad("day"))?;
    BirthDate::new(year, month, day)
}

fn parse_framework(raw: &str) -> Result<CurriculumFramework, CoreError> {
    match raw {
        "common_core" => Ok(CurriculumFramework::CommonCore),
        "teks" => Ok(CurriculumFramework::Teks),
        "best" => Ok(CurriculumFramework::Best),
        "state_specific" => Ok(CurriculumFramework::StateSpecific),
        other => Err(CoreError::invalid(
            "framework",
            format!("unknown framework {other:?}"),
        )),
    }
}

fn parse_license(raw: Option<&str>) -> Result<LicenseKind, CoreError> {
    match raw {
        None | Some("district") => Ok(LicenseKind::DistrictSeat),
        Some("parent") => Ok(LicenseKind::ParentPurchase),
        Some("trial") => Ok(LicenseKind::Trial),
        Some(other) => Err(CoreError::invalid(
            "license",
            format!("unknown license kind {other:?}"),
        )),
    }
}

fn enroll_row(
    roster: &mut Roster,
    row: &EnrollRow,
    today: EpochDay,
) -> Result<StudentId, CoreError> {
    let tenant = TenantId(row.tenant);

    let name = StudentName::new(row.given.as_str(), row.preferred.clone(), row.family.as_str())?;
    let birth_date = parse_birth_date(&row.birth_date)?;
    let grade = Grade::parse(&row.grade)?;

    let assignment = match &row.zip {
        Some(zip) => {
            let zip = Zip::new(zip)?;
            match roster.resolve_zip(&zip) {
                Some(district) => DistrictAssignment::Detected {
                    district: district.id,
                },
                None => manual_assignment(row)?,
            }
        }
        None => manual_assignment(row)?,
    };
    let requested = parse_license(row.license.as_deref())?;

    let draft = roster.begin_wizard(tenant).id();
    let steps = [
        StepData::BasicInfo {
            name,
            birth_date,
            grade,
        },
        StepData::Location { assignment },
        StepData::LearningProfile {
            profile: LearningProfile::empty(),
        },
        StepData::Consent {
            form: ConsentForm::granted_required(),
        },
        StepData::License { requested },
    ];
    for step in steps {
        roster.submit_step(tenant, draft, step, None)?;
    }
    roster.finalize_wizard(tenant, draft, today).map(|r| r.id)
}

/// Build the manual-entry fallback from a row's optional fields.
fn manual_assignment(row: &EnrollRow) -> Result<DistrictAssignment, CoreError> {
    let (Some(state), Some(district)) = (&row.state, &row.district) else {
        return Err(CoreError::invalid(
            "district",
            "ZIP did not resolve and no manual entry (state, district) was provided",
        ));
    };
    let framework = match &row.framework {
        Some(raw) => parse_framework(raw)?,
        None => CurriculumFramework::StateSpecific,
    };
    Ok(DistrictAssignment::Manual {
        entry: ManualDistrict::new(state, district.as_str(), framework)?,
    })
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// JSON interchange view of a roster.
///
/// The roster's own maps are keyed by ids and tuples, which JSON cannot
/// express as object keys; this view flattens them into arrays.
#[derive(Serialize)]
struct JsonRosterView<'a> {
    districts: Vec<&'a rollcall_core::district::District>,
    zip_index: BTreeMap<String, u64>,
    seat_pools: Vec<&'a rollcall_core::license::SeatPool>,
    students: Vec<&'a rollcall_core::student::StudentRecord>,
    open_drafts: Vec<&'a rollcall_core::wizard::EnrollmentWizard>,
    ieps: Vec<JsonIepEntry<'a>>,
}

#[derive(Serialize)]
struct JsonIepEntry<'a> {
    tenant: u64,
    document: &'a rollcall_core::iep::IepDocument,
}

impl<'a> JsonRosterView<'a> {
    fn of(roster: &'a Roster) -> Self {
        Self {
            districts: roster.directory().districts().collect(),
            zip_index: roster
                .directory()
                .zip_mappings()
                .map(|(zip, id)| (zip.to_string(), id.0))
                .collect(),
            seat_pools: roster.seat_pools().collect(),
            students: roster.all_students().collect(),
            open_drafts: roster.wizards().collect(),
            ieps: roster
                .ieps()
                .map(|((tenant, _), document)| JsonIepEntry {
                    tenant: tenant.0,
                    document,
                })
                .collect(),
        }
    }
}

/// Export the roster to a canonical snapshot or JSON.
pub fn cmd_export(
    db_path: &Path,
    backend: &str,
    output: &Path,
    format: &str,
) -> Result<(), CliError> {
    let roster = load_or_create_roster(db_path, backend)?;
    let bytes = match format {
        "canonical" => export_snapshot(&roster)?,
        "json" => serde_json::to_vec_pretty(&JsonRosterView::of(&roster))?,
        other => return Err(usage(format!("unknown export format {other:?}"))),
    };
    std::fs::write(output, bytes)?;
    println!("exported {} ({format})", output.display());
    Ok(())
}

/// Import a canonical snapshot into the database, replacing its contents.
pub fn cmd_import(db_path: &Path, backend: &str, input: &Path) -> Result<(), CliError> {
    let bytes = std::fs::read(input)?;
    let roster = import_snapshot(&bytes)?;
    save_roster(&roster, db_path, backend)?;
    println!(
        "imported {} students, {} districts",
        roster.student_count(),
        roster.directory().len()
    );
    Ok(())
}
