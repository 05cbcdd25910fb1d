//! Page-by-page retrieval of activities.
//!
//! Each response is folded into a [`PageStep`]; the loop keeps requesting the
//! next page only while the step is [`PageStep::Continue`]. Every failure ends
//! the loop with whatever was accumulated so far.

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::{PageRequest, PageSource, RawActivitySet, StravaError};
use secrecy::SecretString;
use serde_json::Value;

/// Largest `per_page` the API honours.
pub const MAX_PAGE_SIZE: u32 = 200;

pub const DEFAULT_LIMIT: u32 = 200;

/// Outcome of one page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageStep {
    Continue,
    /// Empty or short page: the API has nothing further.
    Exhausted,
    TransportError,
    ApiError,
    LimitReached,
}

impl PageStep {
    pub fn is_error(self) -> bool {
        matches!(self, PageStep::TransportError | PageStep::ApiError)
    }
}

/// Records gathered by [`fetch_activities`] and why it stopped.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchReport {
    pub records: RawActivitySet,
    pub pages_requested: u32,
    pub stop: PageStep,
}

/// `per_page` used for a given limit. A zero limit is treated as one.
pub fn page_size(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_SIZE)
}

/// Decide what follows a successful page.
///
/// `accumulated` already includes the page's records; `returned` is the raw
/// length of the page as sent by the API.
pub fn next_step(accumulated: usize, returned: usize, per_page: u32, limit: u32) -> PageStep {
    if returned == 0 {
        PageStep::Exhausted
    } else if accumulated >= limit as usize {
        PageStep::LimitReached
    } else if returned < per_page as usize {
        PageStep::Exhausted
    } else {
        PageStep::Continue
    }
}

/// Map a failed page request to its terminal step.
pub fn classify_error(err: &StravaError) -> PageStep {
    if err.is_transport() {
        PageStep::TransportError
    } else {
        PageStep::ApiError
    }
}

fn diagnostic_for(page: u32, err: StravaError) -> Diagnostic {
    match err {
        StravaError::Http(e) => Diagnostic::Transport {
            page,
            message: e.to_string(),
        },
        StravaError::Status { status, body } => Diagnostic::ApiStatus { page, status, body },
        StravaError::ErrorPayload(message) => Diagnostic::ApiErrorPayload { page, message },
        other @ StravaError::Config(_) => Diagnostic::ApiErrorPayload {
            page,
            message: other.to_string(),
        },
    }
}

/// Fetch up to roughly `limit` activities.
///
/// Pages are requested one at a time starting at 1. The result is not cut
/// down to `limit`: the last page is kept whole, so it can overshoot by less
/// than one page.
pub async fn fetch_activities<S>(
    source: &S,
    access_token: &SecretString,
    limit: u32,
    sink: &dyn DiagnosticSink,
) -> FetchReport
where
    S: PageSource + ?Sized,
{
    let limit = limit.max(1);
    let per_page = page_size(limit);
    let mut records = RawActivitySet::new();
    let mut page = 1u32;

    loop {
        tracing::debug!(page, per_page, "requesting activities page");
        let step = match source
            .fetch_page(access_token, PageRequest { per_page, page })
            .await
        {
            Ok(items) => {
                let returned = items.len();
                for (index, item) in items.into_iter().enumerate() {
                    match item {
                        Value::Object(record) => records.push(record),
                        _ => sink.report(Diagnostic::NonObjectRecord { page, index }),
                    }
                }
                next_step(records.len(), returned, per_page, limit)
            }
            Err(err) => {
                let step = classify_error(&err);
                sink.report(diagnostic_for(page, err));
                step
            }
        };

        if step != PageStep::Continue {
            tracing::debug!(
                pages = page,
                records = records.len(),
                stop = ?step,
                "activities fetch finished"
            );
            return FetchReport {
                records,
                pages_requested: page,
                stop: step,
            };
        }
        page += 1;
    }
}
