use anyhow::Context;
use branch_inventory::{
    config::{init_tracing, load_config},
    db::{self, DbConfig},
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(config.log_level(), config.log_json);

    let direction = std::env::args().nth(1).unwrap_or_else(|| "up".to_string());

    info!(environment = %config.environment, "Starting database migration");

    let pool = db::establish_connection_with_config(&DbConfig::from(&config))
        .await
        .context("failed to connect to database")?;

    match direction.as_str() {
        "up" => {
            db::run_migrations(&pool).await?;
            info!("Migration completed successfully");
        }
        "down" => {
            db::revert_migrations(&pool).await?;
            info!("All migrations reverted");
        }
        other => anyhow::bail!("unknown migration direction '{}', expected 'up' or 'down'", other),
    }

    db::close_pool(pool).await?;
    Ok(())
}
