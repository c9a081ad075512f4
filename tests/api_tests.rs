//! Tests for the operator status API

use std::sync::Arc;

use payout_solver::api::status_routes;
use payout_solver::bridge::BridgeGateway;
use payout_solver::chains::SettlementClient;
use payout_solver::intent::PayoutIntent;
use payout_solver::service::ReconciliationMonitor;
use payout_solver::store::{IntentStore, MemoryIntentStore};

#[path = "helpers.rs"]
mod test_helpers;
use test_helpers::{
    create_default_solver_config, FakeBridge, FakeSettlement, DUMMY_INTENT_ID, DUMMY_WINNER_ADDR,
};

fn build_routes(
    store: Arc<dyn IntentStore>,
) -> impl warp::Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
    let config = create_default_solver_config();
    let gateway: Arc<dyn BridgeGateway> = FakeBridge::new();
    let client: Arc<dyn SettlementClient> = FakeSettlement::new();
    let monitor = Arc::new(ReconciliationMonitor::new(
        &config,
        store.clone(),
        gateway,
        client,
    ));
    status_routes(store, monitor)
}

async fn seed_intent(store: &Arc<dyn IntentStore>) {
    let intent = PayoutIntent::new(
        DUMMY_INTENT_ID.to_string(),
        DUMMY_WINNER_ADDR.to_string(),
        "polygon".to_string(),
        "cUSD".to_string(),
        500_000,
        None,
    );
    store.create(intent).await.unwrap();
}

/// What is tested: /stats returns lifecycle statistics with a 200
/// Why: This is the operator's primary health surface
#[tokio::test]
async fn test_stats_returns_ok() {
    let store: Arc<dyn IntentStore> = Arc::new(MemoryIntentStore::new());
    let routes = build_routes(store);

    let response = warp::test::request()
        .method("GET")
        .path("/stats")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["monitoring"], true);
    assert_eq!(body["data"]["in_flight"], 0);
}

/// What is tested: /intent returns a seeded record by id
/// Why: Operators look up individual intents while investigating payouts
#[tokio::test]
async fn test_intent_lookup_returns_record() {
    let store: Arc<dyn IntentStore> = Arc::new(MemoryIntentStore::new());
    seed_intent(&store).await;
    let routes = build_routes(store);

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/intent?id={}", DUMMY_INTENT_ID))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["data"]["id"], DUMMY_INTENT_ID);
    assert_eq!(body["data"]["destination_chain"], "polygon");
}

/// What is tested: /intent without an id parameter is a 400 with a message
/// Why: Caller mistakes must be distinguishable from server faults
#[tokio::test]
async fn test_intent_missing_id_is_bad_request() {
    let store: Arc<dyn IntentStore> = Arc::new(MemoryIntentStore::new());
    let routes = build_routes(store);

    let response = warp::test::request()
        .method("GET")
        .path("/intent")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Missing id parameter");
}

/// What is tested: /intent for an unknown id is a 400 naming the id
/// Why: The lookup failed on the caller's input, not on the server
#[tokio::test]
async fn test_intent_unknown_id_is_bad_request() {
    let store: Arc<dyn IntentStore> = Arc::new(MemoryIntentStore::new());
    let routes = build_routes(store);

    let response = warp::test::request()
        .method("GET")
        .path("/intent?id=999")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["error"], "Intent 999 not found");
}

/// What is tested: an unknown route is a 404, not a client-error catch-all
/// Why: Misrouted requests and malformed queries need different status codes
#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let store: Arc<dyn IntentStore> = Arc::new(MemoryIntentStore::new());
    let routes = build_routes(store);

    let response = warp::test::request()
        .method("GET")
        .path("/nope")
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 404);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Not found");
}

/// What is tested: POST /check triggers a reconciliation check and returns 200
/// Why: Operators can nudge a single intent without waiting for the sweep
#[tokio::test]
async fn test_check_returns_ok() {
    let store: Arc<dyn IntentStore> = Arc::new(MemoryIntentStore::new());
    seed_intent(&store).await;
    let routes = build_routes(store);

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/check?id={}", DUMMY_INTENT_ID))
        .reply(&routes)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["success"], true);
}
