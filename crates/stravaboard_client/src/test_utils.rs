//! Scripted `PageSource` used by unit tests that exercise the stop policy
//! without an HTTP layer.
#![cfg(test)]

use crate::{PageRequest, PageSource, StravaError};
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

pub enum Scripted {
    Page(Vec<Value>),
    Transport,
    Status(u16, &'static str),
    Payload(&'static str),
}

/// Replays scripted responses in order; once the script runs out every page is empty.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedSource {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(
        &self,
        _access_token: &SecretString,
        request: PageRequest,
    ) -> Result<Vec<Value>, StravaError> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            None => Ok(Vec::new()),
            Some(Scripted::Page(items)) => Ok(items),
            Some(Scripted::Transport) => Err(transport_error()),
            Some(Scripted::Status(status, body)) => Err(StravaError::Status {
                status,
                body: body.into(),
            }),
            Some(Scripted::Payload(message)) => Err(StravaError::ErrorPayload(message.into())),
        }
    }
}

/// A real `reqwest::Error`, produced without touching the network.
pub fn transport_error() -> StravaError {
    let err = reqwest::Client::new()
        .get("not a url")
        .build()
        .expect_err("invalid url must fail to build");
    StravaError::Http(err)
}

/// `count` activity objects with ids starting at `first_id`.
pub fn activities(first_id: u64, count: usize) -> Vec<Value> {
    (0..count as u64)
        .map(|i| {
            json!({
                "id": first_id + i,
                "name": format!("Run {}", first_id + i),
                "elapsed_time": 1800,
                "distance": 5000.0,
                "start_date_local": "2024-05-01T07:30:00Z",
            })
        })
        .collect()
}

pub fn token() -> SecretString {
    SecretString::new("test-token".into())
}
