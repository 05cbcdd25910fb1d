use crate::StravaError;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.strava.com/api/v3";

/// Transport settings for [`ReqwestStravaClient`](crate::http_client::ReqwestStravaClient).
///
/// The access token is deliberately not part of this: token sourcing belongs
/// to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Whole-request timeout. `None` keeps reqwest's default.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, StravaError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Testable helper that reads configuration values using the provided
    /// function instead of the process environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, StravaError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let base_url = get("STRAVA_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let timeout = match get("STRAVA_HTTP_TIMEOUT_SECS") {
            None => None,
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    StravaError::Config(format!("STRAVA_HTTP_TIMEOUT_SECS invalid: {raw}"))
                })?;
                Some(Duration::from_secs(secs))
            }
        };
        Ok(Self { base_url, timeout })
    }
}
