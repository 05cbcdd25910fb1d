//! One fetch + tidy cycle, written out as JSON lines for a dashboard to read.

use anyhow::{Context, bail};
use secrecy::SecretString;
use std::io::Write;
use stravaboard_client::{
    ActivitiesManager, ClientConfig, DEFAULT_LIMIT, DataManager, HeldData, TidyActivityTable,
};

/// Filter used when the configured one does not parse.
pub const FALLBACK_LOG_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Log level from `STRAVABOARD_LOG_LEVEL`, else `RUST_LOG`, else `info`.
pub fn log_level_from_env_with<F>(mut get: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    get("STRAVABOARD_LOG_LEVEL")
        .or_else(|| get("RUST_LOG"))
        .unwrap_or_else(|| "info".to_string())
}

/// Filter directives for `log_env`, keeping HTTP internals quiet. Falls back
/// to [`FALLBACK_LOG_FILTER`] when `log_env` is not a valid filter.
pub fn log_filter_directives(log_env: &str) -> String {
    let combined = format!("{},hyper=warn,reqwest=warn", log_env);
    match tracing_subscriber::EnvFilter::try_new(&combined) {
        Ok(_) => combined,
        Err(_) => FALLBACK_LOG_FILTER.to_string(),
    }
}

pub fn log_filter(log_env: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::new(log_filter_directives(log_env))
}

/// Everything a run needs, normally read from the environment.
#[derive(Debug)]
pub struct RunConfig {
    pub client: ClientConfig,
    pub access_token: SecretString,
    pub limit: u32,
}

impl RunConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    pub fn from_env_with<F>(mut get: F) -> anyhow::Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let client = ClientConfig::from_env_with(&mut get)?;
        let access_token = get("STRAVA_ACCESS_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .context("STRAVA_ACCESS_TOKEN missing")?;
        let limit = match get("STRAVA_ACTIVITY_LIMIT") {
            None => DEFAULT_LIMIT,
            Some(raw) => {
                let n: u32 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("STRAVA_ACTIVITY_LIMIT invalid: {raw}"))?;
                if n == 0 {
                    bail!("STRAVA_ACTIVITY_LIMIT must be positive");
                }
                n
            }
        };
        Ok(Self {
            client,
            access_token: SecretString::new(access_token.trim().into()),
            limit,
        })
    }
}

/// Fetch, tidy and write the table; returns the number of rows written.
pub async fn run<W: Write>(config: RunConfig, out: &mut W) -> anyhow::Result<usize> {
    let mut manager = ActivitiesManager::from_config(&config.client)?;
    manager.get_data(config.access_token, config.limit).await;
    if let Some(summary) = manager.last_fetch() {
        tracing::info!(
            pages = summary.pages_requested,
            records = summary.records,
            stop = ?summary.stop,
            "fetched activities"
        );
    }
    manager.tidy_data();
    match manager.data() {
        HeldData::Tidy(table) => write_json_lines(table, out),
        _ => Ok(0),
    }
}

/// One JSON object per row, raw fields plus the derived columns.
pub fn write_json_lines<W: Write>(table: &TidyActivityTable, out: &mut W) -> anyhow::Result<usize> {
    for record in table.to_records() {
        serde_json::to_writer(&mut *out, &record)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(table.len())
}
