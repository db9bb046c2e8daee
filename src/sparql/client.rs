use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, ScoutError};

/// A single bound value in a SPARQL result row
#[derive(Debug, Clone, Deserialize)]
pub struct SparqlValue {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// One result row: variable name -> bound value
pub type Binding = HashMap<String, SparqlValue>;

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<Binding>,
}

/// Executes SPARQL SELECT queries against a remote endpoint.
/// The trait seam lets the search pipeline run against a stub in tests.
#[async_trait]
pub trait SparqlExecutor: Send + Sync {
    /// Run one query and return the raw binding rows.
    async fn select(&self, endpoint: &str, query: &str) -> Result<Vec<Binding>>;
}

/// HTTP SPARQL client. Issues a single form-encoded POST per query;
/// no retries, no caching. Callers needing bounded latency beyond the
/// client timeout must wrap the call.
pub struct SparqlClient {
    client: Client,
}

impl SparqlClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("property-scout/0.1")
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SparqlExecutor for SparqlClient {
    async fn select(&self, endpoint: &str, query: &str) -> Result<Vec<Binding>> {
        debug!("POST {} ({} bytes of SPARQL)", endpoint, query.len());

        let response = self
            .client
            .post(endpoint)
            .header("Accept", "application/sparql-results+json")
            .form(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("remote store returned status {}", status);
            return Err(ScoutError::RemoteQuery {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SparqlResponse = response.json().await?;
        debug!("received {} binding rows", parsed.results.bindings.len());
        Ok(parsed.results.bindings)
    }
}
