//! HTTP boundary: request parsing, validation and JSON responses.
//!
//! Handlers normalize input, call [`DataStore`] and the savings calculator,
//! and serialize the results. "No coverage" is a successful response, not an
//! error.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::{
    Router,
    extract::{Path, Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::savings::{self, BreakdownBasis};
use crate::store::DataStore;
use crate::types::{LocationInfo, Provider, SavingsCalculation, StatePolicy};
use crate::zipcode;

/// Rate used when neither a provider nor a rate is given
pub const DEFAULT_DISCOUNT_RATE: f64 = 10.0;

/// Application state shared across all requests
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DataStore>,
    pub breakdown: BreakdownBasis,
    metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(store: Arc<DataStore>, breakdown: BreakdownBasis) -> Self {
        Self {
            store,
            breakdown,
            metrics: Arc::new(Metrics {
                total_requests: AtomicU64::new(0),
                requests_in_flight: AtomicU64::new(0),
                lookups: AtomicU64::new(0),
                calculations: AtomicU64::new(0),
                start_time: Instant::now(),
            }),
        }
    }
}

/// Server metrics
struct Metrics {
    total_requests: AtomicU64,
    requests_in_flight: AtomicU64,
    lookups: AtomicU64,
    calculations: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    fn begin(&self) -> RequestGuard<'_> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.requests_in_flight.fetch_add(1, Ordering::Relaxed);
        RequestGuard(&self.requests_in_flight)
    }
}

/// RAII guard for tracking in-flight requests
struct RequestGuard<'a>(&'a AtomicU64);

impl<'a> Drop for RequestGuard<'a> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Build the Axum application with routes and middleware
pub fn build_app(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .route("/api/lookup", post(lookup))
        .route("/api/calculate", post(calculate))
        .route("/api/states", get(list_states))
        .route("/api/states/:slug", get(state_page))
        .route("/api/metrics", get(get_metrics))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::from_fn_with_state(state.clone(), track_requests)),
        )
        .with_state(state)
}

/// Count every routed request; the guard lives until the response is built
async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let _guard = state.metrics.begin();
    next.run(request).await
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Zip code as sent by the client; forms post strings, some clients numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum ZipInput {
    Text(String),
    Number(u64),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest {
    #[serde(default)]
    zip_code: Option<ZipInput>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    success: bool,
    available: bool,
    message: String,
    location: Option<LocationInfo>,
    providers: Vec<Provider>,
    state_policy: Option<StatePolicy>,
}

/// Resolve a zip code to location, providers and state policy
async fn lookup(
    State(state): State<AppState>,
    body: Result<Json<LookupRequest>, JsonRejection>,
) -> Result<Json<LookupResponse>, ApiError> {
    state.metrics.lookups.fetch_add(1, Ordering::Relaxed);

    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let raw = match request.zip_code {
        Some(ZipInput::Text(s)) if !s.trim().is_empty() => s,
        Some(ZipInput::Number(n)) => n.to_string(),
        _ => return Err(ApiError::BadRequest("Zip code is required".to_string())),
    };

    let zip = zipcode::normalize_zip(&raw);
    if !zipcode::is_valid_zip(&zip) {
        return Err(ApiError::BadRequest("Invalid zip code format".to_string()));
    }

    let Some(location) = state.store.lookup_zip_code(&zip).await else {
        tracing::info!(zip = %zip, "zip not covered");
        return Ok(Json(LookupResponse {
            success: true,
            available: false,
            message: format!(
                "We don't have community solar data for zip code {zip} yet. Community solar is available \
                 in 44 states - check back soon as we're constantly expanding our coverage!"
            ),
            location: None,
            providers: Vec::new(),
            state_policy: None,
        }));
    };

    let providers = state.store.get_providers_by_zip_code(&zip).await;
    let state_policy = state.store.get_state_policy(&location.state_code).await;

    tracing::info!(
        zip = %zip,
        location = %zipcode::format_location(&location),
        providers = providers.len(),
        "zip lookup"
    );

    let message = match providers.len() {
        0 => format!(
            "Community solar is available in {}, but we don't have specific providers for your area yet.",
            location.state
        ),
        1 => "Found 1 community solar provider in your area!".to_string(),
        n => format!("Found {n} community solar providers in your area!"),
    };

    Ok(Json(LookupResponse {
        success: true,
        available: !providers.is_empty(),
        message,
        location: Some(location),
        providers,
        state_policy,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalculateRequest {
    /// Number or numeric string; anything else is a missing bill
    #[serde(default)]
    monthly_bill: Option<serde_json::Value>,
    #[serde(default)]
    provider_id: Option<String>,
    #[serde(default)]
    discount_rate: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CalculateResponse {
    success: bool,
    calculation: SavingsCalculation,
    provider: Option<ProviderSummary>,
    display: SavingsDisplay,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderSummary {
    id: String,
    name: String,
    discount_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    subscription_fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    contract_length: Option<u32>,
}

impl ProviderSummary {
    fn from_provider(provider: &Provider) -> Self {
        Self {
            id: provider.id.clone(),
            name: provider.name.clone(),
            discount_rate: provider.pricing.discount_rate,
            subscription_fee: provider.pricing.subscription_fee,
            contract_length: provider.pricing.contract_length,
        }
    }
}

/// Pre-formatted figures for display
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavingsDisplay {
    current_annual_cost: String,
    estimated_savings: String,
    new_annual_cost: String,
    savings_percentage: String,
}

impl SavingsDisplay {
    fn from_calculation(calc: &SavingsCalculation) -> Self {
        Self {
            current_annual_cost: savings::format_currency(calc.current_annual_cost),
            estimated_savings: savings::format_currency(calc.estimated_savings),
            new_annual_cost: savings::format_currency(calc.new_annual_cost),
            savings_percentage: savings::format_percentage(calc.savings_percentage),
        }
    }
}

/// Estimate savings; a known provider's own rate wins over the caller's rate
async fn calculate(
    State(state): State<AppState>,
    body: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<Json<CalculateResponse>, ApiError> {
    state.metrics.calculations.fetch_add(1, Ordering::Relaxed);

    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let monthly_bill = request
        .monthly_bill
        .as_ref()
        .and_then(bill_amount)
        .filter(|bill| bill.is_finite() && *bill > 0.0)
        .ok_or_else(|| ApiError::BadRequest("Valid monthly bill amount is required".to_string()))?;

    if let Some(rate) = request.discount_rate
        && !(rate.is_finite() && rate > 0.0 && rate <= 100.0)
    {
        return Err(ApiError::BadRequest(
            "Discount rate must be greater than 0 and at most 100".to_string(),
        ));
    }

    let provider = match request.provider_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => {
            let found = state.store.get_provider_by_id(id, None).await;
            if found.is_none() {
                tracing::info!(provider_id = id, "unknown provider, using requested rate");
            }
            found
        }
        None => None,
    };

    let discount_rate = provider
        .as_ref()
        .map(|p| p.pricing.discount_rate)
        .or(request.discount_rate)
        .unwrap_or(DEFAULT_DISCOUNT_RATE);

    let calculation =
        savings::calculate_savings_with(monthly_bill, discount_rate, provider.as_ref(), state.breakdown);

    Ok(Json(CalculateResponse {
        success: true,
        display: SavingsDisplay::from_calculation(&calculation),
        calculation,
        provider: provider.as_ref().map(ProviderSummary::from_provider),
    }))
}

fn bill_amount(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Serialize)]
struct StateSummary {
    code: String,
    name: String,
    slug: String,
}

#[derive(Serialize)]
struct StatesResponse {
    success: bool,
    states: Vec<StateSummary>,
}

/// Supported states in display order
async fn list_states(State(state): State<AppState>) -> Json<StatesResponse> {
    let states = state
        .store
        .states()
        .iter()
        .map(|s| StateSummary {
            code: s.code.clone(),
            name: s.name.clone(),
            slug: s.slug.clone(),
        })
        .collect();

    Json(StatesResponse {
        success: true,
        states,
    })
}

#[derive(Serialize)]
struct StatePageResponse {
    success: bool,
    state: StateSummary,
    providers: Vec<Provider>,
    policy: Option<StatePolicy>,
}

/// Full roster and policy for a state page, e.g. `/api/states/new-york`
async fn state_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<StatePageResponse>, ApiError> {
    let config = state
        .store
        .states()
        .by_slug(&slug)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown state: {slug}")))?;

    let roster = state
        .store
        .get_providers_for_state(&config.code)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("No providers listed for {}", config.name)))?;
    let policy = state.store.get_state_policy(&config.code).await;

    Ok(Json(StatePageResponse {
        success: true,
        state: StateSummary {
            code: config.code.clone(),
            name: config.name.clone(),
            slug: config.slug.clone(),
        },
        providers: roster.providers.clone(),
        policy,
    }))
}

#[derive(Serialize)]
struct MetricsResponse {
    total_requests: u64,
    requests_in_flight: u64,
    lookups: u64,
    calculations: u64,
    uptime_seconds: u64,
}

/// Get server metrics
async fn get_metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let m = &state.metrics;
    Json(MetricsResponse {
        total_requests: m.total_requests.load(Ordering::Relaxed),
        requests_in_flight: m.requests_in_flight.load(Ordering::Relaxed),
        lookups: m.lookups.load(Ordering::Relaxed),
        calculations: m.calculations.load(Ordering::Relaxed),
        uptime_seconds: m.start_time.elapsed().as_secs(),
    })
}

/// API error types
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        let body = Json(serde_json::json!({
            "success": false,
            "error": message
        }));

        (status, body).into_response()
    }
}
