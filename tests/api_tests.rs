use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tower::ServiceExt;
use uuid::Uuid;

use recipe_recs::{
    db::{
        memory::{InMemoryPreferenceStore, InMemoryRecipeStore},
        seed::seed_curated,
        PreferenceStore,
    },
    routes::{create_router, AppState},
    services::{
        generation::GenerationSettings, CuisineAdvisor, GenerationClient,
        GenerationOrchestrator, Recommender, TransportError,
    },
};

/// Generation client that answers every prompt with a fresh recipe, or not at all
struct FakeClient {
    available: bool,
    calls: AtomicUsize,
}

impl FakeClient {
    fn new(available: bool) -> Arc<Self> {
        Arc::new(Self {
            available,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl GenerationClient for FakeClient {
    async fn call(&self, _prompt: &str, _timeout: Duration) -> Result<String, TransportError> {
        if !self.available {
            return Err(TransportError::Unavailable);
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "Here is your recipe:\n```json\n{}\n```",
            json!({
                "title": format!("Pad Kra Pao {}", n),
                "description": "Thai basil stir fry",
                "ingredients": "Chicken\nThai basil\nChili\nGarlic",
                "instructions": ["Fry garlic and chili", "Add chicken", "Finish with basil"],
                "cuisine": "Thai",
                "meal_type": "dinner",
                "prep_time": "10 minutes",
                "cook_time": 10,
                "difficulty": "easy",
                "dairy_free": true,
            })
        ))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

async fn create_test_state(client: Arc<FakeClient>) -> Arc<AppState> {
    let recipes = Arc::new(InMemoryRecipeStore::new());
    tokio_test::assert_ok!(seed_curated(recipes.as_ref()).await);
    let preferences = Arc::new(InMemoryPreferenceStore::new());

    let recommender = Recommender::new(recipes.clone());
    recommender.refresh().await.unwrap();

    let orchestrator = GenerationOrchestrator::new(
        client.clone(),
        recipes,
        preferences.clone(),
        recommender.clone(),
        GenerationSettings {
            initial_count: 3,
            failure_threshold: 5,
            timeout: Duration::from_secs(1),
        },
    );
    let advisor = CuisineAdvisor::new(client, Duration::from_secs(1));

    Arc::new(AppState {
        preferences,
        orchestrator,
        recommender,
        advisor,
    })
}

async fn create_test_server(client: Arc<FakeClient>) -> TestServer {
    let state = create_test_state(client).await;
    TestServer::new(create_router(state)).unwrap()
}

async fn wait_for_generation(server: &TestServer, user: Uuid) -> Value {
    for _ in 0..200 {
        let status: Value = server
            .get(&format!("/api/v1/users/{}/generation-status", user))
            .await
            .json();
        if status["generation_complete"] == true {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generation did not finish");
}

fn thai_preferences() -> Value {
    json!({
        "cuisines": ["Thai"],
        "allergies": ["peanuts"],
        "dietary_flags": { "dairy_free": true },
        "flavors": { "spicy": 5 },
        "meal_types": ["dinner", "lunch"],
        "skill_level": "beginner"
    })
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(FakeClient::new(true)).await;
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_router_answers_without_test_server() {
    let state = create_test_state(FakeClient::new(true)).await;
    let response = create_router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_saving_preferences_generates_recipes() {
    let client = FakeClient::new(true);
    let server = create_test_server(client.clone()).await;
    let user = Uuid::new_v4();

    let response = server
        .put(&format!("/api/v1/users/{}/preferences", user))
        .json(&thai_preferences())
        .await;
    response.assert_status_ok();
    let saved: Value = response.json();
    assert_eq!(saved["generation_started"], true);
    assert_eq!(saved["preferences"]["cuisines"], json!(["Thai"]));

    let status = wait_for_generation(&server, user).await;
    assert_eq!(status["recipes_count"], 3);
    assert_eq!(status["is_generating"], false);
    assert_eq!(client.calls.load(Ordering::SeqCst), 3);

    let stored: Value = server
        .get(&format!("/api/v1/users/{}/preferences", user))
        .await
        .json();
    assert_eq!(stored["skill_level"], "beginner");
}

#[tokio::test]
async fn test_user_recommendations_include_generated_recipes() {
    let server = create_test_server(FakeClient::new(true)).await;
    let user = Uuid::new_v4();

    server
        .put(&format!("/api/v1/users/{}/preferences", user))
        .json(&thai_preferences())
        .await
        .assert_status_ok();
    wait_for_generation(&server, user).await;

    let response = server
        .get(&format!("/api/v1/users/{}/recommendations", user))
        .add_query_param("limit", 5)
        .await;
    response.assert_status_ok();
    let recipes: Vec<Value> = response.json();
    assert!(!recipes.is_empty());
    assert!(recipes.len() <= 5);
    assert!(recipes
        .iter()
        .any(|r| r["title"].as_str().unwrap_or_default().starts_with("Pad Kra Pao")));
    assert!(recipes.iter().all(|r| r["dairy_free"] == true));

    let stranger: Vec<Value> = server
        .post("/api/v1/recipes/search")
        .json(&json!({ "query": "thai basil chicken", "user_id": Uuid::new_v4() }))
        .await
        .json();
    assert!(stranger
        .iter()
        .all(|r| !r["title"].as_str().unwrap_or_default().starts_with("Pad Kra Pao")));
}

#[tokio::test]
async fn test_generation_falls_back_when_service_unavailable() {
    let server = create_test_server(FakeClient::new(false)).await;
    let user = Uuid::new_v4();

    server
        .put(&format!("/api/v1/users/{}/preferences", user))
        .json(&thai_preferences())
        .await
        .assert_status_ok();
    let status = wait_for_generation(&server, user).await;
    assert_eq!(status["recipes_count"], 3);
}

#[tokio::test]
async fn test_generate_requires_preferences() {
    let server = create_test_server(FakeClient::new(true)).await;
    let response = server
        .post(&format!("/api/v1/users/{}/generate", Uuid::new_v4()))
        .json(&json!({ "count": 2 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_rejects_bad_count() {
    let server = create_test_server(FakeClient::new(true)).await;
    let user = Uuid::new_v4();
    server
        .put(&format!("/api/v1/users/{}/preferences", user))
        .json(&thai_preferences())
        .await
        .assert_status_ok();
    wait_for_generation(&server, user).await;

    let response = server
        .post(&format!("/api/v1/users/{}/generate", user))
        .json(&json!({ "count": 0 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post(&format!("/api/v1/users/{}/generate", user))
        .json(&json!({ "count": 2 }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["started"], true);
}

#[tokio::test]
async fn test_second_generate_is_not_queued() {
    let state = create_test_state(FakeClient::new(true)).await;
    let user = Uuid::new_v4();
    state
        .preferences
        .put(user, &serde_json::from_value(thai_preferences()).unwrap())
        .await
        .unwrap();
    let _held = state.orchestrator.locks().try_acquire(user).unwrap();

    let server = TestServer::new(create_router(state.clone())).unwrap();
    let response = server
        .post(&format!("/api/v1/users/{}/generate", user))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: Value = response.json();
    assert_eq!(body["started"], false);

    let status: Value = server
        .get(&format!("/api/v1/users/{}/generation-status", user))
        .await
        .json();
    assert_eq!(status["is_generating"], true);
    assert_eq!(status["generation_complete"], false);
}

#[tokio::test]
async fn test_invalid_flavor_level_is_rejected() {
    let server = create_test_server(FakeClient::new(true)).await;
    let response = server
        .put(&format!("/api/v1/users/{}/preferences", Uuid::new_v4()))
        .json(&json!({ "flavors": { "sweet": 9 } }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_user_preferences_not_found() {
    let server = create_test_server(FakeClient::new(true)).await;
    let response = server
        .get(&format!("/api/v1/users/{}/preferences", Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_search_applies_filters_after_ranking() {
    let server = create_test_server(FakeClient::new(true)).await;
    let response = server
        .post("/api/v1/recipes/search")
        .json(&json!({
            "query": "spicy Thai dinner",
            "filters": { "dairy_free": true },
            "limit": 3
        }))
        .await;
    response.assert_status_ok();
    let recipes: Vec<Value> = response.json();
    assert_eq!(recipes[0]["title"], "Thai Green Curry");
    assert!(recipes.iter().all(|r| r["dairy_free"] == true));
    assert!(recipes.iter().all(|r| r["provenance"] == "curated"));
}

#[tokio::test]
async fn test_search_rejects_empty_query() {
    let server = create_test_server(FakeClient::new(true)).await;
    let response = server
        .post("/api/v1/recipes/search")
        .json(&json!({ "query": "   " }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cuisine_advice_falls_back_to_local_table() {
    let server = create_test_server(FakeClient::new(false)).await;
    let response = server
        .post("/api/v1/cuisines/recommend")
        .json(&json!({ "query": "I want to eat dosa", "limit": 3 }))
        .await;
    response.assert_status_ok();
    let recommendations: Vec<Value> = response.json();
    assert_eq!(recommendations.len(), 3);
    assert_eq!(recommendations[0]["name"], "Dosa");
}
