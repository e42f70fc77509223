use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campus_portal::{
    api,
    auth::JwtIdentityProvider,
    config::Settings,
    repository::{SqliteAnnouncementRepository, SqliteUserRepository},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_portal=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    if let Err(e) = settings.auth.ensure_secure() {
        anyhow::bail!("Refusing to start: {}", e);
    }

    tracing::info!("Starting campus portal on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    // Initialize repositories
    let announcement_repo = Arc::new(SqliteAnnouncementRepository::with_change_buffer(
        db_pool.clone(),
        settings.announcements.change_buffer,
    ));
    let user_repo = Arc::new(SqliteUserRepository::new(db_pool.clone()));

    let identity_provider = Arc::new(JwtIdentityProvider::new(
        &settings.auth.jwt_secret,
        settings.auth.token_duration_hours,
    ));

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        announcement_repo,
        user_repo,
        identity_provider,
        settings.announcements.max_results,
    ));

    let app = api::create_app(service_context);

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
