// src/client.rs

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::model::{DependencyGraph, HealthSnapshot, ScanSummary, SizeTreeNode, TourDocument};

/// The remote analysis service, as seen by the rest of the client.
///
/// Abstracting the four artifact fetches behind a trait lets the session
/// driver be exercised against an in-memory fake in tests, without a live
/// service or a real network.
pub trait AnalysisService {
    fn start_scan(&self, repo_url: &str) -> Result<ScanSummary, Error>;
    fn fetch_tree(&self, scan_id: &str) -> Result<SizeTreeNode, Error>;
    fn fetch_graph(&self, scan_id: &str) -> Result<DependencyGraph, Error>;
    fn fetch_health(&self, scan_id: &str) -> Result<HealthSnapshot, Error>;
    fn fetch_tour(&self, scan_id: &str) -> Result<TourDocument, Error>;
}

/// HTTP client for the analysis service REST endpoints.
///
/// All endpoints are unauthenticated; no retry policy or timeout is applied.
/// A misconfigured base URL surfaces as `Error::Network` on first use.
pub struct ApiClient {
    agent: ureq::Agent,
    base: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self {
            agent: ureq::AgentBuilder::new().build(),
            base,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path);
        debug!("GET {url}");
        let response = self.agent.get(&url).call().map_err(map_ureq_error)?;
        decode_body(response)
    }
}

impl AnalysisService for ApiClient {
    fn start_scan(&self, repo_url: &str) -> Result<ScanSummary, Error> {
        let url = self.url("scan");
        debug!("POST {url} repo_url={repo_url}");
        let response = self
            .agent
            .post(&url)
            .send_json(json!({ "repo_url": repo_url }))
            .map_err(map_ureq_error)?;
        decode_body(response)
    }

    fn fetch_tree(&self, scan_id: &str) -> Result<SizeTreeNode, Error> {
        self.get_json(&format!("tree/{scan_id}"))
    }

    fn fetch_graph(&self, scan_id: &str) -> Result<DependencyGraph, Error> {
        self.get_json(&format!("graph/{scan_id}"))
    }

    fn fetch_health(&self, scan_id: &str) -> Result<HealthSnapshot, Error> {
        self.get_json(&format!("health/{scan_id}"))
    }

    fn fetch_tour(&self, scan_id: &str) -> Result<TourDocument, Error> {
        self.get_json(&format!("tour/{scan_id}"))
    }
}

fn decode_body<T: DeserializeOwned>(response: ureq::Response) -> Result<T, Error> {
    let body = response
        .into_string()
        .map_err(|e| Error::Network(e.to_string()))?;
    Ok(serde_json::from_str(&body)?)
}

fn map_ureq_error(err: ureq::Error) -> Error {
    match err {
        ureq::Error::Status(status, response) => {
            let detail = response
                .into_string()
                .ok()
                .and_then(|body| parse_error_detail(&body));
            Error::remote(status, detail)
        }
        ureq::Error::Transport(transport) => Error::Network(transport.to_string()),
    }
}

/// Pull the `detail` field out of an error body. The service usually sends
/// `{"detail": "..."}` but validation failures can carry structured values.
fn parse_error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
