//! Strava activity retrieval and tidying for dashboard display.
//!
//! The crate is split along three seams:
//! - [`PageSource`] fetches one page of raw activities (the reqwest-backed
//!   [`http_client::ReqwestStravaClient`] in production, scripted fakes in tests),
//! - [`fetch::fetch_activities`] drives pagination until a stop condition,
//! - [`tidy::tidy`] derives the presentation columns.
//!
//! [`manager::ActivitiesManager`] ties them together behind [`manager::DataManager`].

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Serialize;
use thiserror::Error;

pub mod config;
pub mod diagnostics;
pub mod fetch;
pub mod http_client;
pub mod manager;
pub mod tidy;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use config::ClientConfig;
pub use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, NullSink, TracingSink};
pub use fetch::{DEFAULT_LIMIT, FetchReport, MAX_PAGE_SIZE, PageStep, fetch_activities};
pub use manager::{ActivitiesManager, DataManager, FetchSummary, HeldData};
pub use tidy::{TidyActivityTable, TidyRow, flatten_record, tidy, tidy_json};

/// One activity as returned by the API. Fields are API-defined.
pub type RawActivityRecord = serde_json::Map<String, serde_json::Value>;

/// Raw activities in API order. Duplicates returned by the API are kept.
pub type RawActivitySet = Vec<RawActivityRecord>;

#[derive(Debug, Error)]
pub enum StravaError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("api returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("api returned an error payload: {0}")]
    ErrorPayload(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl StravaError {
    /// Connection, timeout and body-read failures, as opposed to errors the API reported.
    pub fn is_transport(&self) -> bool {
        matches!(self, StravaError::Http(_))
    }
}

/// Query parameters of a single page request.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct PageRequest {
    pub per_page: u32,
    pub page: u32,
}

/// Source of activity pages.
///
/// A successful call returns the elements of the JSON array the API sent back,
/// which may be empty. Error-shaped payloads and non-success statuses must be
/// returned as errors rather than as an empty page.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(
        &self,
        access_token: &SecretString,
        request: PageRequest,
    ) -> Result<Vec<serde_json::Value>, StravaError>;
}
