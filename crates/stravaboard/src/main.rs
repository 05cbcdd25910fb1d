use stravaboard::RunConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Configure logging from env var `STRAVABOARD_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = stravaboard::log_level_from_env_with(|k| std::env::var(k).ok());
    let env_filter = stravaboard::log_filter(&log_env);
    // stdout carries the table, so logs go to stderr
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!("stravaboard: log filter: {}", log_env);

    let config = RunConfig::from_env()?;
    tracing::info!(
        base_url = %config.client.base_url,
        limit = config.limit,
        "stravaboard: fetching activities"
    );

    let stdout = std::io::stdout();
    let rows = stravaboard::run(config, &mut stdout.lock()).await?;
    tracing::info!(rows, "stravaboard: wrote tidy activities");
    Ok(())
}
