//! # HTTP API
//!
//! The axum server wrapping the enrollment engine.
//!
//! All domain decisions live in `rollcall-core`; this layer translates HTTP
//! to engine calls, converts wall-clock time to `EpochDay` at the boundary,
//! maps `CoreError` to stable status codes, and persists mutations through
//! the configured backend.

mod auth;
mod handlers;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use rollcall_core::cache::WizardCache;
use rollcall_core::error::CoreError;
use rollcall_core::formats::FormatError;
use rollcall_core::iep::IepDocument;
use rollcall_core::license::SeatPool;
use rollcall_core::primitives::{DraftId, StudentId, TenantId};
use rollcall_core::roster::Roster;
use rollcall_core::storage::{RedbStore, StoreError};
use rollcall_core::student::StudentRecord;
use rollcall_core::wizard::EnrollmentWizard;
use serde_json::json;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Requests allowed per client per minute on mutating routes.
const MUTATION_RATE_PER_MINUTE: u32 = 120;

/// Hard cap on request handling time.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

type ClientLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

// =============================================================================
// STATE
// =============================================================================

/// Where mutations are persisted.
pub enum StoreBackend {
    /// No persistence; state dies with the process.
    Memory,
    /// Full snapshot rewritten after each mutation.
    File(PathBuf),
    /// Incremental per-record writes.
    Redb(RedbStore),
}

pub(crate) struct AppInner {
    pub roster: RwLock<Roster>,
    /// Hot wizard sessions; keeps draft-progress polling off the roster lock.
    pub cache: Mutex<WizardCache>,
    pub backend: StoreBackend,
    pub api_key: Option<String>,
    pub limiter: ClientLimiter,
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub(crate) inner: Arc<AppInner>,
}

impl AppState {
    /// Build state around a loaded roster.
    #[must_use]
    pub fn new(roster: Roster, backend: StoreBackend, api_key: Option<String>) -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(MUTATION_RATE_PER_MINUTE).unwrap_or(NonZeroU32::MIN),
        );
        Self {
            inner: Arc::new(AppInner {
                roster: RwLock::new(roster),
                cache: Mutex::new(WizardCache::default()),
                backend,
                api_key,
                limiter: RateLimiter::keyed(quota),
            }),
        }
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// A persistence failure behind any backend.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("snapshot error: {0}")]
    Format(#[from] FormatError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// What changed, for backends that write incrementally.
pub(crate) enum PersistEvent<'a> {
    /// A wizard was opened or mutated.
    Draft(&'a EnrollmentWizard),
    /// A wizard finalized into a student (possibly consuming a seat).
    Finalized {
        tenant: TenantId,
        draft: DraftId,
        student: &'a StudentRecord,
        pool: Option<&'a SeatPool>,
    },
    /// A student record changed in place (trial roll, payment).
    Student(&'a StudentRecord),
    /// An IEP was stored.
    Iep {
        tenant: TenantId,
        student: StudentId,
        document: &'a IepDocument,
    },
}

impl AppState {
    pub(crate) fn persist(
        &self,
        roster: &Roster,
        event: &PersistEvent<'_>,
    ) -> Result<(), PersistError> {
        match &self.inner.backend {
            StoreBackend::Memory => Ok(()),
            StoreBackend::File(path) => {
                let bytes = rollcall_core::formats::export_snapshot(roster)?;
                std::fs::write(path, bytes)?;
                Ok(())
            }
            StoreBackend::Redb(store) => {
                match event {
                    PersistEvent::Draft(wizard) => store.put_draft(wizard)?,
                    PersistEvent::Finalized {
                        tenant,
                        draft,
                        student,
                        pool,
                    } => {
                        store.put_student(student)?;
                        store.delete_draft(*tenant, *draft)?;
                        if let Some(pool) = pool {
                            store.put_pool(pool)?;
                        }
                    }
                    PersistEvent::Student(record) => store.put_student(record)?,
                    PersistEvent::Iep {
                        tenant,
                        student,
                        document,
                    } => store.put_iep(*tenant, *student, document)?,
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

pub(crate) fn error_response(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> Response {
    let body = json!({
        "success": false,
        "error": { "code": code, "message": message.into() },
    });
    (status, Json(body)).into_response()
}

/// Map a domain error onto a stable status code and error code.
pub(crate) fn core_error_response(err: &CoreError) -> Response {
    let (status, code) = match err {
        CoreError::InvalidField { .. } => (StatusCode::BAD_REQUEST, "invalid_field"),
        CoreError::StepMismatch { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "step_mismatch"),
        CoreError::DraftIncomplete { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "draft_incomplete")
        }
        CoreError::ConsentIncomplete { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "consent_incomplete")
        }
        CoreError::UnknownDistrict(_) => (StatusCode::NOT_FOUND, "unknown_district"),
        CoreError::SeatPoolExhausted(_) => (StatusCode::CONFLICT, "seat_pool_exhausted"),
        CoreError::DraftNotFound(_) => (StatusCode::NOT_FOUND, "draft_not_found"),
        CoreError::StudentNotFound(_) => (StatusCode::NOT_FOUND, "student_not_found"),
        CoreError::IepInvalid(_) => (StatusCode::UNPROCESSABLE_ENTITY, "iep_invalid"),
        CoreError::StaleRevision { .. } => (StatusCode::CONFLICT, "stale_revision"),
    };
    error_response(status, code, err.to_string())
}

pub(crate) fn persist_failure_response(err: &PersistError) -> Response {
    warn!(error = %err, "persistence failed");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "persistence_failed",
        "mutation could not be persisted",
    )
}

// Handlers sample real time through the shared clock boundary.
pub(crate) use crate::clock::today;

// =============================================================================
// ROUTER & SERVER
// =============================================================================

/// Build the full route table over the given state.
#[must_use]
pub fn router(state: AppState) -> axum::Router {
    axum::Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/version", get(handlers::version))
        .route("/v1/districts/{zip}", get(handlers::resolve_district))
        .route("/v1/tenants/{tenant}/drafts", post(handlers::begin_draft))
        .route(
            "/v1/tenants/{tenant}/drafts/{draft}",
            get(handlers::get_draft),
        )
        .route(
            "/v1/tenants/{tenant}/drafts/{draft}/step",
            post(handlers::submit_step),
        )
        .route(
            "/v1/tenants/{tenant}/drafts/{draft}/back",
            post(handlers::step_back),
        )
        .route(
            "/v1/tenants/{tenant}/drafts/{draft}/finalize",
            post(handlers::finalize_draft),
        )
        .route(
            "/v1/tenants/{tenant}/students",
            get(handlers::list_students),
        )
        .route(
            "/v1/tenants/{tenant}/students/{student}",
            get(handlers::get_student),
        )
        .route(
            "/v1/tenants/{tenant}/students/{student}/payment",
            post(handlers::confirm_payment),
        )
        .route(
            "/v1/tenants/{tenant}/students/{student}/iep",
            put(handlers::put_iep).get(handlers::get_iep),
        )
        .route("/v1/export", post(handlers::export_roster))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Server configuration assembled by the CLI.
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub roster: Roster,
    pub backend: StoreBackend,
    pub api_key: Option<String>,
}

/// Serve failures.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("bind error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the HTTP server until ctrl-c.
pub async fn serve(config: ServeConfig) -> Result<(), ServeError> {
    let state = AppState::new(config.roster, config.backend, config.api_key);
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "rollcall server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;
    Ok(())
}
