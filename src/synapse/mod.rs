//! Synapse REST integration
//!
//! [`SynapseApi`] is the JSON-over-REST seam every Synapse operation goes
//! through. [`HttpSynapseClient`] is the real implementation; tests use an
//! in-memory fake.
//!
//! ## Async jobs
//! Long-running requests (schema registration, table queries) return a job
//! token. [`wait_for_job`] polls `/asynchronous/job/{token}` until the job
//! leaves `PROCESSING`.

pub mod curation;
pub mod registration;
pub mod table;
pub mod views;

pub use curation::{
    create_curation_task, create_recordset_task, CurationTaskRequest, CurationTaskResult, RecordSetTaskRequest,
    RecordSetTaskResult,
};
pub use registration::{register_schema, select_schema_files, RegistrationReport};
pub use table::{query_table, QueryResult};
pub use views::{
    bind_schema, columns_from_schema, create_entity_view, fetch_registered_schema, ColumnDefaults, ColumnModel,
};

use reqwest::blocking::{Client, RequestBuilder};
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::config::SynapseConfig;
use crate::error::{DictionaryError, Result};

/// JSON requests against Synapse REST paths (relative to the repo base URL)
pub trait SynapseApi {
    fn get_json(&self, path: &str) -> Result<Value>;
    fn post_json(&self, path: &str, body: &Value) -> Result<Value>;
    fn put_json(&self, path: &str, body: &Value) -> Result<Value>;
}

/// Blocking `reqwest` client with Bearer authentication
pub struct HttpSynapseClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpSynapseClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("nf-dictionary/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Read the access token from the configured environment variable.
    /// Fails before any request is made when it is unset or empty.
    pub fn from_config(config: &SynapseConfig) -> Result<Self> {
        let token = std::env::var(&config.auth_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DictionaryError::MissingAuthToken(config.auth_token_env.clone()))?;
        Self::new(config.base_url.clone(), token)
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn send(&self, path: &str, request: RequestBuilder) -> Result<Value> {
        let response = request
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            // Synapse errors carry a `reason` field
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("reason").and_then(Value::as_str).map(str::to_string))
                .unwrap_or(text);
            return Err(DictionaryError::Synapse {
                path: path.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

impl SynapseApi for HttpSynapseClient {
    fn get_json(&self, path: &str) -> Result<Value> {
        tracing::debug!(path, "GET");
        self.send(path, self.http.get(self.url(path)))
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        tracing::debug!(path, "POST");
        self.send(path, self.http.post(self.url(path)).json(body))
    }

    fn put_json(&self, path: &str, body: &Value) -> Result<Value> {
        tracing::debug!(path, "PUT");
        self.send(path, self.http.put(self.url(path)).json(body))
    }
}

/// How long to wait between polls and overall
#[derive(Debug, Clone, Copy)]
pub struct JobPolling {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl JobPolling {
    pub fn from_config(config: &SynapseConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            max_wait: Duration::from_secs(config.max_wait_secs),
        }
    }
}

impl Default for JobPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_wait: Duration::from_secs(600),
        }
    }
}

/// POST a job request and return its token
pub fn start_job(api: &dyn SynapseApi, path: &str, body: &Value) -> Result<String> {
    let response = api.post_json(path, body)?;
    response
        .get("token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DictionaryError::Synapse {
            path: path.to_string(),
            status: 200,
            message: "response has no job token".to_string(),
        })
}

/// Poll an async job until it completes and return its `responseBody`
pub fn wait_for_job(api: &dyn SynapseApi, token: &str, polling: JobPolling) -> Result<Value> {
    let started = Instant::now();
    let path = format!("/asynchronous/job/{}", token);

    loop {
        let status = api.get_json(&path)?;
        match status.get("jobState").and_then(Value::as_str) {
            Some("PROCESSING") => {
                if started.elapsed() >= polling.max_wait {
                    return Err(DictionaryError::JobTimeout {
                        token: token.to_string(),
                        seconds: polling.max_wait.as_secs(),
                    });
                }
                std::thread::sleep(polling.interval);
            }
            Some("FAILED") => {
                let message = status
                    .get("errorMessage")
                    .and_then(Value::as_str)
                    .unwrap_or("no error message")
                    .to_string();
                return Err(DictionaryError::JobFailed {
                    token: token.to_string(),
                    message,
                });
            }
            _ => {
                return Ok(status.get("responseBody").cloned().unwrap_or(Value::Null));
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted in-memory Synapse

    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    #[derive(Debug, Clone, PartialEq)]
    pub struct Request {
        pub method: &'static str,
        pub path: String,
        pub body: Option<Value>,
    }

    #[derive(Debug, Clone)]
    enum Scripted {
        Ok(Value),
        Err { status: u16, message: String },
    }

    #[derive(Default)]
    pub struct FakeSynapse {
        responses: RefCell<HashMap<(String, String), VecDeque<Scripted>>>,
        pub requests: RefCell<Vec<Request>>,
    }

    impl FakeSynapse {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response; the last one queued for a route repeats
        pub fn respond(&self, method: &str, path: &str, response: Value) -> &Self {
            self.push(method, path, Scripted::Ok(response))
        }

        pub fn fail(&self, method: &str, path: &str, status: u16, message: &str) -> &Self {
            self.push(
                method,
                path,
                Scripted::Err {
                    status,
                    message: message.to_string(),
                },
            )
        }

        fn push(&self, method: &str, path: &str, response: Scripted) -> &Self {
            self.responses
                .borrow_mut()
                .entry((method.to_string(), path.to_string()))
                .or_default()
                .push_back(response);
            self
        }

        pub fn requests_to(&self, path: &str) -> Vec<Request> {
            self.requests
                .borrow()
                .iter()
                .filter(|r| r.path == path)
                .cloned()
                .collect()
        }

        fn handle(&self, method: &'static str, path: &str, body: Option<&Value>) -> Result<Value> {
            self.requests.borrow_mut().push(Request {
                method,
                path: path.to_string(),
                body: body.cloned(),
            });

            let mut responses = self.responses.borrow_mut();
            let scripted = responses
                .get_mut(&(method.to_string(), path.to_string()))
                .and_then(|queue| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                });

            match scripted {
                Some(Scripted::Ok(value)) => Ok(value),
                Some(Scripted::Err { status, message }) => Err(DictionaryError::Synapse {
                    path: path.to_string(),
                    status,
                    message,
                }),
                None => Err(DictionaryError::Synapse {
                    path: path.to_string(),
                    status: 404,
                    message: format!("no response scripted for {} {}", method, path),
                }),
            }
        }
    }

    impl SynapseApi for FakeSynapse {
        fn get_json(&self, path: &str) -> Result<Value> {
            self.handle("GET", path, None)
        }

        fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
            self.handle("POST", path, Some(body))
        }

        fn put_json(&self, path: &str, body: &Value) -> Result<Value> {
            self.handle("PUT", path, Some(body))
        }
    }
}
