use std::sync::Arc;

use recipe_recs::{
    config::Config,
    db::{self, Cache, PgPreferenceStore, PgRecipeStore, PreferenceStore, RecipeStore},
    routes::{create_router, AppState},
    services::{
        generation::GenerationSettings, CuisineAdvisor, GenerationClient,
        GenerationOrchestrator, OpenAiClient, Recommender,
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,recipe_recs=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    let recipes: Arc<dyn RecipeStore> = Arc::new(PgRecipeStore::new(pool.clone()));
    let preferences: Arc<dyn PreferenceStore> = Arc::new(PgPreferenceStore::new(pool));

    let seeded = db::seed::seed_curated(recipes.as_ref()).await?;
    tracing::info!(seeded, "Curated recipes ready");

    let recipe_client: Arc<dyn GenerationClient> = Arc::new(OpenAiClient::for_recipes(
        config.llm_api_key.clone(),
        config.llm_api_url.clone(),
        config.llm_model.clone(),
    ));
    let cuisine_client: Arc<dyn GenerationClient> = Arc::new(OpenAiClient::for_cuisines(
        config.llm_api_key.clone(),
        config.llm_api_url.clone(),
        config.llm_fast_model.clone(),
    ));

    let recommender = Recommender::new(recipes.clone());
    recommender.refresh().await?;

    let orchestrator = GenerationOrchestrator::new(
        recipe_client,
        recipes,
        preferences.clone(),
        recommender.clone(),
        GenerationSettings {
            initial_count: config.initial_recipe_count,
            failure_threshold: config.failure_threshold,
            timeout: config.generation_timeout(),
        },
    );

    let mut advisor = CuisineAdvisor::new(cuisine_client, config.recommendation_timeout());
    match db::create_redis_client(&config.redis_url) {
        Ok(client) => advisor = advisor.with_cache(Cache::new(client, config.cache_ttl_secs)),
        Err(e) => tracing::warn!(error = %e, "Redis unavailable, cuisine advice will not be cached"),
    }

    let state = Arc::new(AppState {
        preferences,
        orchestrator,
        recommender,
        advisor,
    });
    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server running on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}
