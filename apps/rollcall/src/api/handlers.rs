//! Route handlers.
//!
//! Handlers never panic: every failure path maps to an error envelope with a
//! stable code. Mutating handlers run guard checks (rate limit, API key)
//! before touching the roster.

use super::auth::guard_mutation;
use super::{
    AppState, PersistEvent, core_error_response, error_response, persist_failure_response, today,
};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rollcall_core::iep::IepDocument;
use rollcall_core::license::roll_trial;
use rollcall_core::primitives::{DraftId, StudentId, TenantId, Zip};
use rollcall_core::wizard::StepData;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

// =============================================================================
// HEALTH & STATUS
// =============================================================================

pub(crate) async fn health() -> Response {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

pub(crate) async fn version() -> Response {
    Json(json!({
        "name": "rollcall",
        "version": env!("CARGO_PKG_VERSION"),
        "snapshot_format_version": rollcall_core::formats::SNAPSHOT_VERSION,
    }))
    .into_response()
}

pub(crate) async fn status(State(state): State<AppState>) -> Response {
    let stats = state.inner.roster.read().await.stats();
    let cache = state.inner.cache.lock().await.stats();
    Json(json!({
        "success": true,
        "stats": stats,
        "session_cache": cache,
    }))
    .into_response()
}

// =============================================================================
// DISTRICT RESOLUTION
// =============================================================================

pub(crate) async fn resolve_district(
    State(state): State<AppState>,
    Path(zip): Path<String>,
) -> Response {
    let zip = match Zip::new(&zip) {
        Ok(zip) => zip,
        Err(err) => return core_error_response(&err),
    };

    let roster = state.inner.roster.read().await;
    match roster.resolve_zip(&zip) {
        Some(district) => Json(json!({
            "success": true,
            "district": district,
        }))
        .into_response(),
        None => {
            // A miss is not a failure of the request; it forces the
            // manual-entry path.
            let body = json!({
                "success": false,
                "manual_entry_required": true,
                "error": {
                    "code": "district_not_found",
                    "message": format!("no district registered for ZIP {zip}"),
                },
            });
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
    }
}

// =============================================================================
// WIZARD LIFECYCLE
// =============================================================================

pub(crate) async fn begin_draft(
    State(state): State<AppState>,
    Path(tenant): Path<u64>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = guard_mutation(&state, &headers) {
        return denied;
    }
    let tenant = TenantId(tenant);

    let mut roster = state.inner.roster.write().await;
    let wizard = roster.begin_wizard(tenant).clone();
    if let Err(err) = state.persist(&roster, &PersistEvent::Draft(&wizard)) {
        return persist_failure_response(&err);
    }
    drop(roster);

    info!(tenant = tenant.0, draft = wizard.id().0, "wizard opened");
    let progress = wizard.progress();
    state.inner.cache.lock().await.put(wizard.clone());

    Json(json!({
        "success": true,
        "draft_id": wizard.id().0,
        "step": progress.step,
        "revision": progress.revision,
    }))
    .into_response()
}

pub(crate) async fn get_draft(
    State(state): State<AppState>,
    Path((tenant, draft)): Path<(u64, u64)>,
) -> Response {
    let tenant = TenantId(tenant);
    let draft = DraftId(draft);

    // Fast path: a hot session dodges the roster lock entirely.
    if let Some(wizard) = state.inner.cache.lock().await.get(tenant, draft) {
        return draft_detail(wizard);
    }

    let roster = state.inner.roster.read().await;
    match roster.wizard(tenant, draft) {
        Ok(wizard) => {
            let wizard = wizard.clone();
            drop(roster);
            let response = draft_detail(&wizard);
            state.inner.cache.lock().await.put(wizard);
            response
        }
        Err(err) => core_error_response(&err),
    }
}

fn draft_detail(wizard: &rollcall_core::wizard::EnrollmentWizard) -> Response {
    let progress = wizard.progress();
    Json(json!({
        "success": true,
        "draft_id": wizard.id().0,
        "tenant": wizard.tenant().0,
        "step": progress.step,
        "complete": progress.complete,
        "revision": progress.revision,
        "missing_sections": wizard.draft().missing_sections(),
    }))
    .into_response()
}

/// Body for step submission.
#[derive(Debug, Deserialize)]
pub(crate) struct SubmitStepRequest {
    /// Optimistic-concurrency token from the last progress response.
    pub expected_revision: Option<u64>,
    pub data: StepData,
}

pub(crate) async fn submit_step(
    State(state): State<AppState>,
    Path((tenant, draft)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(request): Json<SubmitStepRequest>,
) -> Response {
    if let Err(denied) = guard_mutation(&state, &headers) {
        return denied;
    }
    let tenant = TenantId(tenant);
    let draft = DraftId(draft);

    let mut roster = state.inner.roster.write().await;
    let progress =
        match roster.submit_step(tenant, draft, request.data, request.expected_revision) {
            Ok(progress) => progress,
            Err(err) => return core_error_response(&err),
        };

    let wizard = match roster.wizard(tenant, draft) {
        Ok(wizard) => wizard.clone(),
        Err(err) => return core_error_response(&err),
    };
    if let Err(err) = state.persist(&roster, &PersistEvent::Draft(&wizard)) {
        return persist_failure_response(&err);
    }
    drop(roster);
    state.inner.cache.lock().await.put(wizard);

    Json(json!({
        "success": true,
        "step": progress.step,
        "complete": progress.complete,
        "revision": progress.revision,
    }))
    .into_response()
}

pub(crate) async fn step_back(
    State(state): State<AppState>,
    Path((tenant, draft)): Path<(u64, u64)>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = guard_mutation(&state, &headers) {
        return denied;
    }
    let tenant = TenantId(tenant);
    let draft = DraftId(draft);

    let mut roster = state.inner.roster.write().await;
    let progress = match roster.step_back(tenant, draft) {
        Ok(progress) => progress,
        Err(err) => return core_error_response(&err),
    };
    let wizard = match roster.wizard(tenant, draft) {
        Ok(wizard) => wizard.clone(),
        Err(err) => return core_error_response(&err),
    };
    if let Err(err) = state.persist(&roster, &PersistEvent::Draft(&wizard)) {
        return persist_failure_response(&err);
    }
    drop(roster);
    state.inner.cache.lock().await.put(wizard);

    Json(json!({
        "success": true,
        "step": progress.step,
        "revision": progress.revision,
    }))
    .into_response()
}

pub(crate) async fn finalize_draft(
    State(state): State<AppState>,
    Path((tenant, draft)): Path<(u64, u64)>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = guard_mutation(&state, &headers) {
        return denied;
    }
    let tenant = TenantId(tenant);
    let draft = DraftId(draft);

    let mut roster = state.inner.roster.write().await;
    let record = match roster.finalize_wizard(tenant, draft, today()) {
        Ok(record) => record,
        Err(err) => return core_error_response(&err),
    };

    let pool = record
        .district
        .detected_id()
        .and_then(|d| roster.seat_pool(d))
        .copied();
    let event = PersistEvent::Finalized {
        tenant,
        draft,
        student: &record,
        pool: pool.as_ref(),
    };
    if let Err(err) = state.persist(&roster, &event) {
        return persist_failure_response(&err);
    }
    drop(roster);
    state.inner.cache.lock().await.remove(tenant, draft);

    info!(
        tenant = tenant.0,
        student = record.id.0,
        license = ?record.license.kind,
        "enrollment finalized"
    );
    Json(json!({
        "success": true,
        "student": record,
    }))
    .into_response()
}

// =============================================================================
// STUDENTS
// =============================================================================

pub(crate) async fn list_students(
    State(state): State<AppState>,
    Path(tenant): Path<u64>,
) -> Response {
    let tenant = TenantId(tenant);
    let now = today();

    let roster = state.inner.roster.read().await;
    let students: Vec<_> = roster
        .students_for(tenant)
        .map(|record| {
            // Present expired trials as converted; the stored record rolls
            // on its next mutating touch.
            let mut view = record.clone();
            view.license = roll_trial(view.license, now);
            view
        })
        .collect();

    Json(json!({
        "success": true,
        "count": students.len(),
        "students": students,
    }))
    .into_response()
}

pub(crate) async fn get_student(
    State(state): State<AppState>,
    Path((tenant, student)): Path<(u64, u64)>,
) -> Response {
    let tenant = TenantId(tenant);
    let student = StudentId(student);
    let now = today();

    let mut roster = state.inner.roster.write().await;
    let before = roster.student(tenant, student).map(|r| r.license);
    let record = match roster.student_refreshed(tenant, student, now) {
        Ok(record) => record.clone(),
        Err(err) => return core_error_response(&err),
    };
    // Persist only when the lazy trial roll actually changed the grant.
    if before.ok() != Some(record.license) {
        if let Err(err) = state.persist(&roster, &PersistEvent::Student(&record)) {
            return persist_failure_response(&err);
        }
    }
    drop(roster);

    Json(json!({
        "success": true,
        "student": record,
    }))
    .into_response()
}

pub(crate) async fn confirm_payment(
    State(state): State<AppState>,
    Path((tenant, student)): Path<(u64, u64)>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = guard_mutation(&state, &headers) {
        return denied;
    }
    let tenant = TenantId(tenant);
    let student = StudentId(student);

    let mut roster = state.inner.roster.write().await;
    let record = match roster.confirm_student_payment(tenant, student) {
        Ok(record) => record.clone(),
        Err(err) => return core_error_response(&err),
    };
    if let Err(err) = state.persist(&roster, &PersistEvent::Student(&record)) {
        return persist_failure_response(&err);
    }
    drop(roster);

    Json(json!({
        "success": true,
        "student": record,
    }))
    .into_response()
}

// =============================================================================
// IEP
// =============================================================================

pub(crate) async fn put_iep(
    State(state): State<AppState>,
    Path((tenant, student)): Path<(u64, u64)>,
    headers: HeaderMap,
    Json(document): Json<IepDocument>,
) -> Response {
    if let Err(denied) = guard_mutation(&state, &headers) {
        return denied;
    }
    let tenant = TenantId(tenant);
    let student = StudentId(student);

    if document.student != student {
        return error_response(
            StatusCode::BAD_REQUEST,
            "student_mismatch",
            "document student id does not match the path",
        );
    }

    let mut roster = state.inner.roster.write().await;
    if let Err(err) = roster.upsert_iep(tenant, document.clone()) {
        return core_error_response(&err);
    }
    let event = PersistEvent::Iep {
        tenant,
        student,
        document: &document,
    };
    if let Err(err) = state.persist(&roster, &event) {
        return persist_failure_response(&err);
    }
    drop(roster);

    Json(json!({ "success": true })).into_response()
}

pub(crate) async fn get_iep(
    State(state): State<AppState>,
    Path((tenant, student)): Path<(u64, u64)>,
) -> Response {
    let roster = state.inner.roster.read().await;
    match roster.iep(TenantId(tenant), StudentId(student)) {
        Ok(document) => Json(json!({
            "success": true,
            "iep": document,
        }))
        .into_response(),
        Err(err) => core_error_response(&err),
    }
}

// =============================================================================
// EXPORT
// =============================================================================

pub(crate) async fn export_roster(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(denied) = guard_mutation(&state, &headers) {
        return denied;
    }

    let roster = state.inner.roster.read().await;
    match rollcall_core::formats::export_snapshot(&roster) {
        Ok(bytes) => Json(json!({
            "success": true,
            "format_version": rollcall_core::formats::SNAPSHOT_VERSION,
            "snapshot_base64": BASE64.encode(bytes),
        }))
        .into_response(),
        Err(err) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "export_failed",
            err.to_string(),
        ),
    }
}
