//! Overdue checkout sweep
//!
//! One-shot job meant for cron or a systemd timer: alerts hosts about visitors who
//! are still checked in past their expected end time.

use chrono::Utc;
use sqlx::postgres::PgPoolOptions;

use visitgate_server::{config::AppConfig, logging, repository::Repository, services::Services};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init(&config.logging);

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database.url)
        .await?;

    let services = Services::new(
        Repository::new(pool),
        config.email.clone(),
        config.facility.clone(),
    );

    let report = services.sweep.run(Utc::now()).await?;

    tracing::info!(
        scanned = report.scanned,
        overdue = report.overdue,
        notified = report.notified,
        without_recipients = report.without_recipients,
        failed = report.failed,
        unflagged = report.unflagged,
        "Overdue sweep finished"
    );

    if report.failed > 0 {
        anyhow::bail!("{} overdue alert(s) could not be sent", report.failed);
    }
    if report.unflagged > 0 {
        anyhow::bail!("{} alerted visit(s) could not be flagged", report.unflagged);
    }

    Ok(())
}
