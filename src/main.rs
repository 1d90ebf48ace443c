use tracing::info;
use vacancy_monitor::{
    config::init_config,
    database::pool::create_pool,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    init_config()?;

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let state = AppState::new(pool)?;

    let restored = state.scheduler.restore().await?;
    info!(restored, "monitoring scheduler ready");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    state.scheduler.shutdown().await;

    Ok(())
}
