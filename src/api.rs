//! Solver HTTP API
//!
//! Operator status surface: intent lookup, lifecycle statistics and an
//! on-demand reconciliation check.

use crate::service::ReconciliationMonitor;
use crate::store::IntentStore;
use serde::Serialize;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use warp::Filter;

#[derive(Debug)]
struct QueryError(String);

impl warp::reject::Reject for QueryError {}

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// Builds the status API route tree.
///
/// Exposes:
/// - `GET /intent?id=<id>` - Single intent record lookup
/// - `GET /stats` - Lifecycle statistics from the reconciliation monitor
/// - `POST /check?id=<id>` - Immediate reconciliation check for one intent
///
/// Split out from the server so tests can drive it with `warp::test`.
///
/// # Arguments
///
/// * `store` - Shared intent store
/// * `monitor` - Shared reconciliation monitor
///
/// # Returns
///
/// - The composed route filter with rejection handling applied
pub fn status_routes(
    store: Arc<dyn IntentStore>,
    monitor: Arc<ReconciliationMonitor>,
) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
    let store_filter = warp::any().map(move || store.clone());
    let monitor_filter = warp::any().map(move || monitor.clone());

    let intent = warp::path("intent")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(store_filter)
        .and_then(get_intent_handler);

    let stats = warp::path("stats")
        .and(warp::get())
        .and(monitor_filter.clone())
        .and_then(get_stats_handler);

    let check = warp::path("check")
        .and(warp::post())
        .and(warp::query::<HashMap<String, String>>())
        .and(monitor_filter)
        .and_then(force_check_handler);

    // Normalize errors into JSON for callers.
    intent.or(stats).or(check).recover(handle_rejection)
}

/// Start the solver status API server.
///
/// # Arguments
///
/// * `store` - Shared intent store
/// * `monitor` - Shared reconciliation monitor
/// * `host` - Bind host for the status API
/// * `port` - Bind port for the status API
///
/// # Returns
///
/// - `()` - Runs until the process is stopped
pub async fn run_status_server(
    store: Arc<dyn IntentStore>,
    monitor: Arc<ReconciliationMonitor>,
    host: String,
    port: u16,
) {
    let routes = status_routes(store, monitor);
    // Fall back to loopback if host parsing fails.
    let ip: IpAddr = host
        .parse()
        .unwrap_or(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)));
    warp::serve(routes).run((ip, port)).await;
}

/// Handle `/intent` record lookups.
///
/// # Arguments
///
/// * `params` - Raw query parameters from the request
/// * `store` - Shared intent store
///
/// # Returns
///
/// - `Ok(reply)` - The intent record
/// - `Err(rejection)` - Missing id parameter or unknown intent
async fn get_intent_handler(
    params: HashMap<String, String>,
    store: Arc<dyn IntentStore>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let id = params
        .get("id")
        .ok_or_else(|| warp::reject::custom(QueryError("Missing id parameter".to_string())))?;

    let intent = store
        .get(id)
        .await
        .map_err(|e| warp::reject::custom(QueryError(e.to_string())))?
        .ok_or_else(|| warp::reject::custom(QueryError(format!("Intent {} not found", id))))?;

    Ok(warp::reply::json(&ApiResponse {
        success: true,
        data: Some(intent),
        error: None,
    }))
}

/// Handle `/stats` lifecycle statistics queries.
async fn get_stats_handler(
    monitor: Arc<ReconciliationMonitor>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let stats = monitor.stats().await;
    Ok(warp::reply::json(&ApiResponse {
        success: true,
        data: Some(stats),
        error: None,
    }))
}

/// Handle `/check` on-demand reconciliation requests.
///
/// # Arguments
///
/// * `params` - Raw query parameters from the request
/// * `monitor` - Shared reconciliation monitor
///
/// # Returns
///
/// - `Ok(reply)` - Check completed (the intent may or may not have advanced)
/// - `Err(rejection)` - Missing id parameter or check failure
async fn force_check_handler(
    params: HashMap<String, String>,
    monitor: Arc<ReconciliationMonitor>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let id = params
        .get("id")
        .ok_or_else(|| warp::reject::custom(QueryError("Missing id parameter".to_string())))?;

    monitor
        .force_check(id)
        .await
        .map_err(|e| warp::reject::custom(QueryError(format!("{:#}", e))))?;

    Ok(warp::reply::json(&ApiResponse::<()> {
        success: true,
        data: None,
        error: None,
    }))
}

/// Normalize rejections into a consistent JSON error response.
///
/// Unknown routes map to 404, query errors to 400, anything else to 500.
///
/// # Arguments
///
/// * `err` - Warp rejection
///
/// # Returns
///
/// - `Ok(reply)` - JSON error response with status
async fn handle_rejection(err: warp::Rejection) -> Result<impl warp::Reply, std::convert::Infallible> {
    let (status, message) = if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(QueryError(msg)) = err.find::<QueryError>() {
        (warp::http::StatusCode::BAD_REQUEST, msg.clone())
    } else {
        (
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    let response = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message),
    };

    Ok(warp::reply::with_status(warp::reply::json(&response), status))
}
