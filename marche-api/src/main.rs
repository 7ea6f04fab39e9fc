use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use marche_api::{app, auth::issue_token, AppState, AuthConfig};
use marche_core::events::{EventPublisher, LogPublisher};
use marche_core::services::{Ports, Services};
use marche_core::CoreError;
use marche_shared::Role;
use marche_store::app_config::Config;
use marche_store::catalog_repo::StoreProductRepository;
use marche_store::order_repo::StoreOrderRepository;
use marche_store::subscription_repo::StoreSubscriptionRepository;
use marche_store::user_repo::StoreUserRepository;
use marche_store::wallet_repo::StoreWalletRepository;
use marche_store::{DbClient, EventProducer, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marche_api=debug,marche_core=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Marché API on port {}", config.server.port);

    // Kafka Connection
    let events: Arc<dyn EventPublisher> = match &config.kafka.brokers {
        Some(brokers) => Arc::new(EventProducer::new(brokers).context("Failed to create Kafka producer")?),
        None => {
            tracing::warn!("No Kafka brokers configured, events go to the log only");
            Arc::new(LogPublisher)
        }
    };

    // Postgres, or everything in memory
    let mut business_rules = config.business_rules.clone();
    let ports = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            business_rules = db
                .fetch_business_rules(business_rules)
                .await
                .context("Failed to load business rules")?;

            let pool = db.pool.clone();
            Ports {
                wallets: Arc::new(StoreWalletRepository::new(pool.clone())),
                orders: Arc::new(StoreOrderRepository::new(pool.clone())),
                products: Arc::new(StoreProductRepository::new(pool.clone())),
                subscriptions: Arc::new(StoreSubscriptionRepository::new(pool.clone())),
                users: Arc::new(StoreUserRepository::new(pool)),
                events,
            }
        }
        None => {
            tracing::warn!("No database configured, state is kept in memory");
            Ports { events, ..Ports::in_memory() }
        }
    };

    let fees = business_rules.fee_schedule();
    fees.validate().context("Invalid fee configuration")?;
    tracing::info!(
        "Fees: platform {} delivery {} admin {} ({:?})",
        fees.platform_fee,
        fees.delivery_fee,
        fees.admin_fee,
        fees.mode
    );

    let services = Services::new(ports, fees, config.subscription_pricing);
    let auth = AuthConfig {
        secret: config.auth.jwt_secret.clone(),
        expiration: config.auth.jwt_expiration_seconds,
    };

    // Settlement pays the platform share to the first admin, so one must exist.
    match services.users.platform_admin().await {
        Ok(admin) => tracing::info!("Platform admin is {}", admin.id),
        Err(CoreError::NotFound { .. }) => {
            let admin = services
                .users
                .register("Platform".to_string(), vec![Role::Admin])
                .await
                .context("Failed to create the platform admin")?;
            let token = issue_token(&auth, &admin).context("Failed to sign the bootstrap token")?;
            tracing::warn!("Created platform admin {}. Bootstrap token: {}", admin.id, token);
        }
        Err(e) => return Err(e).context("Failed to look up the platform admin"),
    }

    let mut app_state = AppState::new(services, auth);

    // Redis Connection
    if let Some(url) = &config.redis.url {
        let redis = RedisClient::new(url).await.context("Failed to connect to Redis")?;
        app_state = app_state.with_rate_limit(Arc::new(redis), business_rules.rate_limit_per_minute);
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
