//! Stateful fetch + tidy cycle over one API resource.

use crate::config::ClientConfig;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::fetch::{DEFAULT_LIMIT, PageStep, fetch_activities};
use crate::http_client::ReqwestStravaClient;
use crate::tidy::{TidyActivityTable, tidy};
use crate::{PageSource, RawActivitySet, StravaError};
use async_trait::async_trait;
use secrecy::SecretString;
use std::sync::Arc;

/// What a manager currently holds. Each call replaces it wholesale.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum HeldData {
    #[default]
    Empty,
    Raw(RawActivitySet),
    Tidy(TidyActivityTable),
}

impl HeldData {
    pub fn len(&self) -> usize {
        match self {
            HeldData::Empty => 0,
            HeldData::Raw(raw) => raw.len(),
            HeldData::Tidy(table) => table.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_raw(&self) -> Option<&RawActivitySet> {
        match self {
            HeldData::Raw(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_tidy(&self) -> Option<&TidyActivityTable> {
        match self {
            HeldData::Tidy(table) => Some(table),
            _ => None,
        }
    }
}

/// Where a fetch stopped, kept after the records have moved into [`HeldData`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchSummary {
    pub pages_requested: u32,
    pub records: usize,
    pub stop: PageStep,
}

/// Retrieval and tidying of one API resource.
///
/// Neither operation fails: problems are reported to the manager's
/// diagnostic sink and the held data is always left well-formed.
#[async_trait]
pub trait DataManager: Send {
    /// Replace the held data with up to roughly `n` freshly fetched records.
    async fn get_data(&mut self, access_token: SecretString, n: u32);

    /// Replace the held data with its tidy table.
    fn tidy_data(&mut self);

    fn data(&self) -> &HeldData;

    async fn get_default_data(&mut self, access_token: SecretString) {
        self.get_data(access_token, DEFAULT_LIMIT).await
    }
}

/// [`DataManager`] for the authenticated athlete's activities.
pub struct ActivitiesManager<S> {
    source: S,
    sink: Arc<dyn DiagnosticSink>,
    data: HeldData,
    last_fetch: Option<FetchSummary>,
}

impl ActivitiesManager<ReqwestStravaClient> {
    pub fn from_config(config: &ClientConfig) -> Result<Self, StravaError> {
        Ok(Self::new(ReqwestStravaClient::from_config(config)?))
    }
}

impl<S: PageSource> ActivitiesManager<S> {
    /// Manager reporting diagnostics through `tracing`.
    pub fn new(source: S) -> Self {
        Self::with_sink(source, Arc::new(TracingSink))
    }

    pub fn with_sink(source: S, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            source,
            sink,
            data: HeldData::Empty,
            last_fetch: None,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn last_fetch(&self) -> Option<FetchSummary> {
        self.last_fetch
    }

    /// Take the held data, leaving the manager empty.
    pub fn take_data(&mut self) -> HeldData {
        std::mem::take(&mut self.data)
    }
}

#[async_trait]
impl<S: PageSource> DataManager for ActivitiesManager<S> {
    async fn get_data(&mut self, access_token: SecretString, n: u32) {
        let report = fetch_activities(&self.source, &access_token, n, self.sink.as_ref()).await;
        self.last_fetch = Some(FetchSummary {
            pages_requested: report.pages_requested,
            records: report.records.len(),
            stop: report.stop,
        });
        self.data = HeldData::Raw(report.records);
    }

    fn tidy_data(&mut self) {
        let sink = self.sink.as_ref();
        let table = match std::mem::take(&mut self.data) {
            HeldData::Empty => tidy(&[], sink),
            HeldData::Raw(raw) => tidy(&raw, sink),
            HeldData::Tidy(table) => tidy(&table.raw_records(), sink),
        };
        self.data = HeldData::Tidy(table);
    }

    fn data(&self) -> &HeldData {
        &self.data
    }
}
