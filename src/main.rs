use axum::{
    routing::{delete, get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod db;
mod error;
mod handlers;
mod models;
mod services;

use config::Config;
use services::ai::AiGateway;
use services::catalog::CatalogGateway;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub ai: AiGateway,
    pub catalog: CatalogGateway,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moodtunes_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    // Database
    let db = db::create_pool(&config.database_url).await;

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations applied");

    // Gateways are built once from config; missing credentials degrade
    // their features instead of failing startup.
    let ai = AiGateway::new(&config);
    let catalog = CatalogGateway::new(&config);
    if !ai.is_configured() {
        tracing::warn!("CLAUDE_API_KEY not set; AI features will use their fallbacks");
    }
    if !catalog.is_configured() {
        tracing::warn!("Spotify credentials not set; playlist analysis by URL is unavailable");
    }

    let state = AppState {
        db,
        config: config.clone(),
        ai,
        catalog,
    };

    let allowed_origins: Vec<axum::http::HeaderValue> = {
        let mut origins = vec![config
            .frontend_url
            .parse::<axum::http::HeaderValue>()
            .unwrap()];
        // In dev, also allow LAN access (e.g. testing from another device)
        if let Ok(extra) = std::env::var("CORS_EXTRA_ORIGINS") {
            for o in extra.split(',') {
                if let Ok(hv) = o.trim().parse::<axum::http::HeaderValue>() {
                    origins.push(hv);
                }
            }
        }
        origins
    };
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ]);

    let app = Router::new()
        .route("/api/health", get(handlers::health::health_check))
        // Moods
        .route("/api/moods", get(handlers::moods::list_moods))
        .route("/api/moods", post(handlers::moods::create_mood))
        .route("/api/moods/:id", delete(handlers::moods::delete_mood))
        // Insights & analysis
        .route("/api/insights", get(handlers::insights::get_insights))
        .route("/api/music/analyze", post(handlers::music::analyze_song))
        .route(
            "/api/playlist/analyze",
            post(handlers::playlist::analyze_playlist),
        )
        .route(
            "/api/recommend-songs",
            post(handlers::recommend::recommend_songs),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
