use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use clubledger::{
    billing::BillingService,
    config::Settings,
    ledger::LedgerStore,
    notifications::NotificationDispatcher,
    repository::SqlitePayerRepository,
};

/// Safe to run any number of times for the same date; payers already
/// invoiced for the month are skipped.
#[derive(Parser, Debug)]
#[command(name = "generate-monthly-fees", about = "Create this month's fee invoices")]
struct Args {
    /// Billing date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    billing_date: Option<NaiveDate>,

    /// Only bill these payers. May be repeated.
    #[arg(long = "payer")]
    payers: Vec<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clubledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let settings = Settings::new().context("failed to load configuration")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await
        .with_context(|| format!("failed to open database {}", settings.database.url))?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    // Invoicing creates unpaid entries only, so no channel is registered.
    let ledger = Arc::new(LedgerStore::new(
        pool.clone(),
        Arc::new(SqlitePayerRepository::new(pool.clone())),
        Arc::new(NotificationDispatcher::new()),
        settings.billing.grace_days,
    ));
    let billing = BillingService::new(ledger);

    let payers = (!args.payers.is_empty()).then_some(args.payers.as_slice());
    let result = billing
        .generate_monthly_invoices(args.billing_date, payers)
        .await
        .context("monthly billing failed")?;

    if result.created_count() == 0 {
        println!("Nothing due for {}.", result.billing_date.format("%B %Y"));
    }
    println!(
        "Successfully created {} monthly fee transactions for {} ({} billable payers, {} already invoiced).",
        result.created_count(),
        result.billing_date,
        result.billable_payers,
        result.skipped_existing
    );

    Ok(())
}
