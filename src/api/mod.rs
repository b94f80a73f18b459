use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::any,
};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServeConfig;
use crate::core::{
    DEFAULT_SEED, MonteCarloResult, SimulationError, SimulationInput, YearlyData, run_monte_carlo,
    run_projection, validate_input,
};

const REQUIRED_FIELDS: [&str; 3] = ["initialAge", "endAge", "retirementAge"];

#[derive(Debug, Error, PartialEq)]
pub enum ApiError {
    #[error("Method not allowed; use POST")]
    MethodNotAllowed,
    #[error("{0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SimulationError> for ApiError {
    fn from(err: SimulationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = json_response(
            self.status(),
            ErrorResponse {
                message: self.to_string(),
            },
        );
        if self == ApiError::MethodNotAllowed {
            response
                .headers_mut()
                .insert(header::ALLOW, header::HeaderValue::from_static("POST"));
        }
        response
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedResponse {
    pub yearly_data: Vec<YearlyData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SimulateResponse {
    Fixed(FixedResponse),
    Stochastic(MonteCarloResult),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulateOptions {
    pub monte_carlo_runs: usize,
    /// Overrides `stressTest.seed` when set.
    pub seed: Option<u64>,
}

#[derive(Clone)]
struct AppState {
    options: SimulateOptions,
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError::BadRequest(msg.into())
}

/// Validates a request body and runs the projection it asks for.
pub fn process_request(
    method: &Method,
    body: &[u8],
    options: SimulateOptions,
) -> Result<SimulateResponse, ApiError> {
    if method != Method::POST {
        return Err(ApiError::MethodNotAllowed);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| bad_request(format!("Request body must be valid JSON: {e}")))?;
    simulate_value(value, options)
}

/// Runs a `{ inputParams }` document. Everything is checked before any projection work.
pub fn simulate_value(value: Value, options: SimulateOptions) -> Result<SimulateResponse, ApiError> {
    let params = match value.get("inputParams") {
        Some(params) if params.is_object() => params,
        Some(Value::Null) | None => return Err(bad_request("inputParams is required")),
        Some(_) => return Err(bad_request("inputParams must be an object")),
    };
    for field in REQUIRED_FIELDS {
        if params.get(field).is_none_or(Value::is_null) {
            return Err(bad_request(format!("inputParams.{field} is required")));
        }
    }

    let input: SimulationInput = serde_json::from_value(params.clone())
        .map_err(|e| bad_request(format!("Invalid inputParams: {e}")))?;
    if input.end_age <= input.initial_age {
        return Err(bad_request(format!(
            "endAge ({}) must be greater than initialAge ({})",
            input.end_age, input.initial_age
        )));
    }
    validate_input(&input)?;

    if input.is_stochastic() || input.stress_test.enabled {
        let seed = options
            .seed
            .or(input.stress_test.seed)
            .unwrap_or(DEFAULT_SEED);
        let result = run_monte_carlo(&input, options.monte_carlo_runs, seed)?;
        return Ok(SimulateResponse::Stochastic(result));
    }

    let yearly_data = run_projection(&input)?;
    Ok(SimulateResponse::Fixed(FixedResponse { yearly_data }))
}

pub fn router(options: SimulateOptions) -> Router {
    Router::new()
        .route("/api/simulate", any(simulate_handler))
        .fallback(not_found_handler)
        .with_state(AppState { options })
}

pub async fn run_http_server(config: &ServeConfig) -> std::io::Result<()> {
    let addr = SocketAddr::new(config.host, config.port);
    let app = router(SimulateOptions {
        monte_carlo_runs: config.monte_carlo_runs,
        seed: None,
    });

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, runs = config.monte_carlo_runs, "life-plan HTTP API listening");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        ErrorResponse {
            message: "Not found".to_string(),
        },
    )
}

async fn simulate_handler(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    let outcome = tokio::task::spawn_blocking(move || {
        process_request(&method, &body, state.options)
    })
    .await
    .unwrap_or_else(|e| Err(ApiError::Internal(e.to_string())));

    match outcome {
        Ok(response) => {
            match &response {
                SimulateResponse::Fixed(fixed) => {
                    info!(years = fixed.yearly_data.len(), "fixed projection served")
                }
                SimulateResponse::Stochastic(mc) => info!(
                    years = mc.yearly_data.len(),
                    bankruptcy_rate = mc.summary.bankruptcy_rate,
                    "monte-carlo projection served"
                ),
            }
            json_response(StatusCode::OK, response)
        }
        Err(err) => {
            warn!(status = err.status().as_u16(), %err, "simulation request rejected");
            err.into_response()
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}
