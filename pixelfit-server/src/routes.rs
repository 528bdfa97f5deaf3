use std::path::Path;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Local, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use pixelfit_core::config::{PetConfig, ServerConfig};
use pixelfit_core::pet::{self, CareAction, CareOutcome, WeighIn, WorkoutOutcome};
use pixelfit_core::reconcile::{self, Reconciled};
use pixelfit_core::types::{NewActivityLog, NewChallenge, NewWeightLog, Snapshot};
use pixelfit_core::{PixelfitError, Store};

type Clock = dyn Fn() -> DateTime<Utc> + Send + Sync;

/// Shared handler state: the one store, economy tuning, and a clock.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<Store>>,
    pet: Arc<PetConfig>,
    clock: Arc<Clock>,
}

impl AppState {
    /// State over an open store, using the system clock.
    #[must_use]
    pub fn new(store: Store, pet: PetConfig) -> Self {
        Self::with_clock(store, pet, Utc::now)
    }

    /// State with an injected clock, for deterministic decay.
    #[must_use]
    pub fn with_clock<C>(store: Store, pet: PetConfig, clock: C) -> Self
    where
        C: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            store: Arc::new(Mutex::new(store)),
            pet: Arc::new(pet),
            clock: Arc::new(clock),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// The calendar day in the server's time zone.
    fn today(&self) -> NaiveDate {
        self.now().with_timezone(&Local).date_naive()
    }

    /// Run `f` against the store on the blocking pool, holding the lock for
    /// its whole duration.
    async fn with_store<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Store) -> pixelfit_core::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let guard = store.lock();
            f(&guard)
        })
        .await
        .map_err(ApiError::internal)?
        .map_err(ApiError::from)
    }
}

/// Build the full application: `/api` routes, health check, static files.
pub fn build_router(state: AppState, server: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/all", get(all))
        .route("/settings", post(put_setting))
        .route("/weight", post(add_weight))
        .route("/challenge", post(add_challenge))
        .route("/challenge/delete", post(delete_challenge))
        .route("/activity", post(add_activity))
        .route("/pet/reconcile", post(reconcile_pet))
        .route("/pet/feed", post(feed_pet))
        .route("/pet/play", post(play_pet))
        .route("/pet/workout", post(log_workout))
        .route("/pet/weigh-in", post(weigh_in))
        .route("/weigh-ins/missing", get(missing_weigh_ins))
        .fallback(api_not_found);

    let router = Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api)
        .fallback_service(ServeDir::new(Path::new(&server.static_dir)))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if server.cors_permissive {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
}

impl StatusResponse {
    fn ok(id: Option<i64>) -> Json<Self> {
        Json(Self { status: "ok", id })
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
struct SettingRequest {
    key: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DeleteRequest {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct WeighInRequest {
    #[serde(flatten)]
    log: NewWeightLog,
    #[serde(default)]
    backfill: bool,
}

#[derive(Debug, Serialize)]
struct WeighInResponse {
    status: &'static str,
    id: i64,
    credits: i64,
}

#[derive(Debug, Serialize)]
struct MissingWeighInsResponse {
    missing: Vec<NaiveDate>,
}

#[derive(Debug, Serialize)]
struct ReconcileResponse {
    #[serde(flatten)]
    reconciled: Reconciled,
    message: &'static str,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn all(State(state): State<AppState>) -> Result<Json<Snapshot>, ApiError> {
    state.with_store(Store::snapshot).await.map(Json)
}

async fn put_setting(
    State(state): State<AppState>,
    Json(request): Json<SettingRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .with_store(move |s| s.put_setting(&request.key, &request.value))
        .await?;
    Ok(StatusResponse::ok(None))
}

async fn add_weight(
    State(state): State<AppState>,
    Json(log): Json<NewWeightLog>,
) -> Result<Json<StatusResponse>, ApiError> {
    let id = state.with_store(move |s| s.add_weight(&log)).await?;
    Ok(StatusResponse::ok(Some(id)))
}

async fn add_challenge(
    State(state): State<AppState>,
    Json(challenge): Json<NewChallenge>,
) -> Result<Json<StatusResponse>, ApiError> {
    let id = state.with_store(move |s| s.add_challenge(&challenge)).await?;
    Ok(StatusResponse::ok(Some(id)))
}

async fn delete_challenge(
    State(state): State<AppState>,
    Json(request): Json<DeleteRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .with_store(move |s| s.delete_challenge(request.id))
        .await?;
    Ok(StatusResponse::ok(None))
}

async fn add_activity(
    State(state): State<AppState>,
    Json(log): Json<NewActivityLog>,
) -> Result<Json<StatusResponse>, ApiError> {
    let id = state.with_store(move |s| s.add_activity(&log)).await?;
    Ok(StatusResponse::ok(Some(id)))
}

async fn reconcile_pet(
    State(state): State<AppState>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let now = state.now();
    let today = state.today();
    let response = state
        .with_store(move |s| {
            let reconciled = reconcile::reconcile(s, now)?;
            let weighed_in = pet::weighed_in_on(&s.weight_logs()?, today);
            let message = pet::message(&reconciled.pet, weighed_in);
            Ok(ReconcileResponse {
                reconciled,
                message,
            })
        })
        .await?;
    Ok(Json(response))
}

async fn care(state: AppState, action: CareAction) -> Result<Json<CareOutcome>, ApiError> {
    let now = state.now();
    let config = Arc::clone(&state.pet);
    state
        .with_store(move |s| pet::perform_care(s, action, now, &config))
        .await
        .map(Json)
}

async fn feed_pet(State(state): State<AppState>) -> Result<Json<CareOutcome>, ApiError> {
    care(state, CareAction::Feed).await
}

async fn play_pet(State(state): State<AppState>) -> Result<Json<CareOutcome>, ApiError> {
    care(state, CareAction::Play).await
}

async fn log_workout(
    State(state): State<AppState>,
    Json(log): Json<NewActivityLog>,
) -> Result<Json<WorkoutOutcome>, ApiError> {
    let config = Arc::clone(&state.pet);
    state
        .with_store(move |s| pet::record_workout(s, &log, &config))
        .await
        .map(Json)
}

async fn weigh_in(
    State(state): State<AppState>,
    Json(request): Json<WeighInRequest>,
) -> Result<Json<WeighInResponse>, ApiError> {
    let config = Arc::clone(&state.pet);
    let today = state.today();
    let kind = if request.backfill {
        WeighIn::Backfill
    } else {
        WeighIn::Today
    };
    let (id, credits) = state
        .with_store(move |s| pet::record_weigh_in(s, &request.log, kind, today, &config))
        .await?;
    Ok(Json(WeighInResponse {
        status: "ok",
        id,
        credits,
    }))
}

async fn missing_weigh_ins(
    State(state): State<AppState>,
) -> Result<Json<MissingWeighInsResponse>, ApiError> {
    let today = state.today();
    let missing = state
        .with_store(move |s| Ok(pet::missing_weigh_ins(&s.weight_logs()?, today)))
        .await?;
    Ok(Json(MissingWeighInsResponse { missing }))
}

async fn api_not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "unknown API endpoint".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal<E: ToString>(err: E) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<PixelfitError> for ApiError {
    fn from(err: PixelfitError) -> Self {
        let status = match &err {
            e if e.is_domain_error() => StatusCode::BAD_REQUEST,
            PixelfitError::InsufficientCredits { .. } => StatusCode::CONFLICT,
            _ => {
                error!(error = %err, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}
