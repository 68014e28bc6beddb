use std::sync::Arc;

use identity_service::auth::issuer::TokenIssuer;
use identity_service::auth::ports::AuthServicePort;
use identity_service::auth::ports::NotificationDispatcher;
use identity_service::auth::service::AuthPorts;
use identity_service::auth::service::AuthService;
use identity_service::config::Config;
use identity_service::config::StorageBackend;
use identity_service::inbound::http::router::create_router;
use identity_service::outbound::notifications::KafkaNotificationDispatcher;
use identity_service::outbound::notifications::LoggingNotificationDispatcher;
use identity_service::repositories::InMemorySessionRepository;
use identity_service::repositories::InMemoryUserRepository;
use identity_service::repositories::InMemoryVerificationTokenRepository;
use identity_service::repositories::PostgresSessionRepository;
use identity_service::repositories::PostgresUserRepository;
use identity_service::repositories::PostgresVerificationTokenRepository;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        storage = ?config.storage.backend,
        access_ttl_minutes = config.jwt.access_ttl_minutes,
        refresh_ttl_days = config.jwt.refresh_ttl_days,
        kafka = config.kafka.is_some(),
        "Configuration loaded"
    );

    let dispatcher: Arc<Box<dyn NotificationDispatcher>> = match &config.kafka {
        Some(kafka) => Arc::new(Box::new(KafkaNotificationDispatcher::new(kafka)?)),
        None => {
            tracing::warn!("No Kafka brokers configured, notifications will only be logged");
            Arc::new(Box::new(LoggingNotificationDispatcher))
        }
    };

    let settings = config.auth_settings();
    let issuer = TokenIssuer::new(config.jwt.secret.as_bytes(), &settings);

    let auth_service: Arc<dyn AuthServicePort> = match config.storage.backend {
        StorageBackend::Postgres => {
            let pg_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(&config.database.url)
                .await?;
            tracing::info!(
                max_connections = config.database.max_connections,
                database = "postgresql",
                "Database connection pool created"
            );

            sqlx::migrate!("./migrations").run(&pg_pool).await?;
            tracing::info!(database = "postgresql", "Database migrations completed");

            let users = Arc::new(PostgresUserRepository::new(pg_pool.clone()));
            let ports = AuthPorts {
                users: Arc::clone(&users),
                credentials: Arc::clone(&users),
                sessions: Arc::new(PostgresSessionRepository::new(pg_pool.clone())),
                verification_tokens: Arc::new(PostgresVerificationTokenRepository::new(pg_pool)),
                user_settings: users,
                dispatcher,
            };
            Arc::new(AuthService::new(ports, issuer, settings))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, state is lost on restart");

            let users = Arc::new(InMemoryUserRepository::new());
            let ports = AuthPorts {
                users: Arc::clone(&users),
                credentials: Arc::clone(&users),
                sessions: Arc::new(InMemorySessionRepository::new()),
                verification_tokens: Arc::new(InMemoryVerificationTokenRepository::new()),
                user_settings: users,
                dispatcher,
            };
            Arc::new(AuthService::new(ports, issuer, settings))
        }
    };

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    if let Err(e) = axum::serve(http_listener, create_router(auth_service)).await {
        tracing::error!(error = %e, "Server error");
    }

    Ok(())
}
