use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shipdesk_api::{app, AppState};
use shipdesk_carrier::{DelhiveryConfig, NimbusConfig, ShiprocketConfig};
use shipdesk_core::notify::LogNotifier;
use shipdesk_core::order::CarrierKind;
use shipdesk_order::{ShipmentOrchestrator, ShippingSettings, WebhookReconciler};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shipdesk_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = shipdesk_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Shipdesk API on port {}", config.server.port);

    let db = shipdesk_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let orders = Arc::new(shipdesk_store::PgOrderRepository::new(db.pool.clone()));
    let stock = Arc::new(shipdesk_store::PgStockRepository::new(db.pool.clone()));
    let notifier = Arc::new(LogNotifier);

    let token_ttl = Duration::from_secs(config.shipping.token_ttl_seconds);
    let carriers = shipdesk_carrier::carrier_registry(
        ShiprocketConfig {
            base_url: config.carriers.shiprocket.base_url.clone(),
            email: config.carriers.shiprocket.email.clone(),
            password: config.carriers.shiprocket.password.clone(),
            pickup_location: config.carriers.shiprocket.pickup_location.clone(),
        },
        DelhiveryConfig {
            base_url: config.carriers.delhivery.base_url.clone(),
            api_key: config.carriers.delhivery.api_key.clone(),
            pickup_name: config.carriers.delhivery.pickup_name.clone(),
        },
        NimbusConfig {
            base_url: config.carriers.nimbuspost.base_url.clone(),
            email: config.carriers.nimbuspost.email.clone(),
            password: config.carriers.nimbuspost.password.clone(),
        },
        token_ttl,
    );

    let default_carrier = CarrierKind::parse(&config.shipping.default_carrier)
        .expect("Unknown default_carrier in configuration");
    let settings = ShippingSettings {
        default_carrier,
        auto_select_cheapest: config.shipping.auto_select_cheapest,
        origin_pincode: config.shipping.origin_pincode.clone(),
    };

    let orchestrator = Arc::new(ShipmentOrchestrator::new(
        carriers,
        orders.clone(),
        stock.clone(),
        notifier.clone(),
        settings,
    ));
    let reconciler = Arc::new(WebhookReconciler::new(
        orders.clone(),
        stock,
        notifier,
    ));

    let app_state = AppState {
        orders,
        orchestrator,
        reconciler,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
