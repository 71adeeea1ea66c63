use std::{sync::Arc, time::Duration};
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clubledger::{
    api,
    auth::AuthService,
    billing,
    config::Settings,
    notifications::{whatsapp::WhatsAppChannel, NotificationDispatcher},
    payments::{PaymentSessionManager, PhonePeClient},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clubledger=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!("Starting clubledger on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let auth_service = Arc::new(AuthService::new(
        db_pool.clone(),
        settings.auth.session_duration_hours,
    ));

    // Notification channels
    let notifier = Arc::new(NotificationDispatcher::new());

    if let Some(whatsapp) = WhatsAppChannel::new(settings.notifications.whatsapp.clone()) {
        notifier.register(Arc::new(whatsapp)).await;
    }

    for (name, result) in notifier.health_check_all().await {
        match result {
            Ok(_) => tracing::info!("Notification channel {} is healthy", name),
            Err(e) => tracing::warn!("Notification channel {} health check failed: {:?}", name, e),
        }
    }

    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        notifier,
        auth_service.clone(),
        &settings.billing,
    ));

    // Payment gateway, one client per process
    let payment_sessions = match PhonePeClient::from_config(&settings.phonepe) {
        Some(client) => {
            tracing::info!("PhonePe payments enabled");
            Some(Arc::new(PaymentSessionManager::new(
                service_context.ledger.clone(),
                Arc::new(client),
                Duration::from_secs(settings.phonepe.timeout_secs),
            )))
        }
        None => {
            tracing::info!("PhonePe payments disabled");
            None
        }
    };

    if settings.billing.auto_run {
        let every = Duration::from_secs(settings.billing.auto_run_interval_hours.max(1) * 3600);
        tracing::info!("Monthly billing will run every {} hours", settings.billing.auto_run_interval_hours.max(1));
        billing::spawn_scheduled(service_context.billing_service.clone(), every);
    }

    // Expired sessions are swept hourly
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            match auth_service.cleanup_expired_sessions().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("Removed {} expired sessions", n),
                Err(e) => tracing::warn!("Session cleanup failed: {}", e),
            }
        }
    });

    let app = api::create_app(service_context, payment_sessions, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
