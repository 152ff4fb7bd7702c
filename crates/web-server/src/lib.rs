use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use configuration::Config;
use database::{JunctionRegistry, PgPool, RecipeRepository, TransactionRunner};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;
pub mod service;

pub use error::{AppError, ServiceErrorMapper, TransportError};
pub use service::RecipeService;

/// The shared application state that all handlers can access.
#[derive(Debug, Clone)]
pub struct AppState {
    pub service: RecipeService,
}

impl AppState {
    /// Wires the service stack on top of an existing pool.
    pub fn new(pool: PgPool, config: &Config) -> Self {
        let runner = TransactionRunner::new(pool).with_deadline(config.database.transaction_deadline());
        let repo = Arc::new(RecipeRepository::new(Arc::new(JunctionRegistry::recipe_schema())));
        let mapper = ServiceErrorMapper::new(config.server.expose_error_debug);
        Self {
            service: RecipeService::new(runner, repo, mapper),
        }
    }
}

/// Builds the HTTP routes around `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/recipe/:recipe_id", get(handlers::get_recipe))
        .route("/recipe/steps/:recipe_id", get(handlers::get_recipe_steps))
        .route("/recipe/review/:recipe_id", get(handlers::get_recipe_reviews))
        .route("/leave/review", post(handlers::leave_review))
        .route("/recipes", get(handlers::list_recipes))
        .route("/user/favourite", post(handlers::add_to_favourite))
        .route("/user/favourite/:user_id", get(handlers::get_user_favourites))
        .route(
            "/user/favourite/:user_id/recipe/:recipe_id",
            delete(handlers::remove_favourite),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(1024 * 1024))
}

/// Connects to the database, applies migrations and serves until the process stops.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let addr = config.server.socket_addr()?;
    let pool = database::connect(&config.database).await?;
    database::run_migrations(&pool).await?;

    let app = router(Arc::new(AppState::new(pool, config)));

    tracing::info!(service = %config.service_name, %addr, "web server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
