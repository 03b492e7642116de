//! Benchmarks for the enrollment hot paths: full wizard runs and ZIP
//! resolution.

#![allow(clippy::unwrap_used, clippy::panic)]

use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use rollcall_core::consent::ConsentForm;
use rollcall_core::district::DistrictAssignment;
use rollcall_core::license::LicenseKind;
use rollcall_core::primitives::{DistrictId, EpochDay, Grade, TenantId, Zip};
use rollcall_core::roster::Roster;
use rollcall_core::student::{BirthDate, LearningProfile, StudentName};
use rollcall_core::wizard::StepData;

const TODAY: EpochDay = EpochDay(20_000);

fn wizard_steps() -> [StepData; 5] {
    [
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
    ]
}

fn bench_full_enrollment(c: &mut Criterion) {
    c.bench_function("enroll_one_student", |b| {
        b.iter(|| {
            let mut roster = Roster::with_builtin_directory();
            let tenant = TenantId(1);
            let draft = roster.begin_wizard(tenant).id();
            for step in wizard_steps() {
                roster.submit_step(tenant, draft, step, None).unwrap();
            }
            black_box(roster.finalize_wizard(tenant, draft, TODAY).unwrap())
        });
    });
}

fn bench_zip_resolution(c: &mut Criterion) {
    let roster = Roster::with_builtin_directory();
    let zip = Zip::new("78704").unwrap();
    c.bench_function("resolve_zip", |b| {
        b.iter(|| black_box(roster.resolve_zip(black_box(&zip))));
    });
}

criterion_group!(benches, bench_full_enrollment, bench_zip_resolution);
criterion_main!(benches);
