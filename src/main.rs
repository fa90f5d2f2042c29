use std::net::TcpListener;
use std::sync::Arc;

use pairauth::auth::PasswordHasher;
use pairauth::configuration::{get_configuration, DatabaseSettings, StoreKind};
use pairauth::startup::{build_services, run};
use pairauth::store::{InMemoryUserStore, PgUserStore, TimeoutStore, UserStore};
use pairauth::telemetry::init_telemetry;
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;

async fn connect_store(database: &DatabaseSettings) -> std::io::Result<Arc<dyn UserStore>> {
    tracing::info!(
        host = %database.host,
        port = database.port,
        database = %database.database_name,
        "Attempting to connect to database"
    );

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(database.timeout())
        .connect(database.connection_string().expose_secret())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Database migration error")
        })?;

    tracing::info!("Database connection pool created successfully");
    Ok(Arc::new(TimeoutStore::new(
        PgUserStore::new(pool),
        database.timeout(),
    )))
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = init_telemetry() {
        eprintln!("Failed to initialize telemetry: {}", e);
    }

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let hasher = PasswordHasher::with_cost(configuration.application.password_hash_cost)
        .map_err(|e| {
            tracing::error!("Invalid password hash cost: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
        })?;

    let store: Arc<dyn UserStore> = match configuration.application.store {
        StoreKind::Postgres => connect_store(&configuration.database).await?,
        StoreKind::Memory => {
            tracing::warn!("Using the in-memory user store; accounts are lost on restart");
            Arc::new(TimeoutStore::new(
                InMemoryUserStore::new(),
                configuration.database.timeout(),
            ))
        }
    };

    let services = build_services(store, &configuration.jwt, hasher).map_err(|e| {
        tracing::error!("Failed to build auth services: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Auth setup error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    tracing::info!("Binding server to address: {}", address);

    let listener = TcpListener::bind(&address)?;
    tracing::info!(
        hash_cost = hasher.cost(),
        "Server listening on: {}",
        address
    );

    let server = run(listener, services)?;
    server.await
}
