// 🌐 Mapping Gateway - cross-reference search against EBI OxO
//
// One call maps a batch of CURIEs to candidate CURIEs in other namespaces,
// each with an integer hop distance. Results line up positionally with the
// input ids. No retries happen here.

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::GatewaySettings;
use crate::error::{CohdError, Result};

/// A candidate equivalent identifier returned by the mapping service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalMappingCandidate {
    pub curie: String,
    pub label: String,
    pub distance: u32,
}

/// Candidates for one queried id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub query_id: String,
    pub label: String,
    pub curie: String,
    pub mappings: Vec<ExternalMappingCandidate>,
}

impl SearchResult {
    /// Placeholder for an id the service answered with nothing usable
    pub fn empty(query_id: &str) -> Self {
        SearchResult {
            query_id: query_id.to_string(),
            label: String::new(),
            curie: query_id.to_string(),
            mappings: Vec::new(),
        }
    }
}

/// Cross-reference search service
pub trait MappingGateway: Send + Sync {
    fn search(
        &self,
        ids: &[String],
        mapping_targets: &[String],
        distance: u32,
    ) -> Result<Vec<SearchResult>>;
}

// ============================================================================
// OXO WIRE FORMAT
// ============================================================================

#[derive(Debug, Deserialize)]
struct OxoSearchResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<OxoEmbedded>,
}

#[derive(Debug, Deserialize)]
struct OxoEmbedded {
    #[serde(rename = "searchResults", default)]
    search_results: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OxoSearchResult {
    #[serde(rename = "queryId")]
    query_id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    curie: Option<String>,
    #[serde(rename = "mappingResponseList", default)]
    mapping_response_list: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OxoMappingResponse {
    curie: String,
    #[serde(default)]
    label: Option<String>,
    distance: u32,
}

impl From<OxoSearchResult> for SearchResult {
    fn from(raw: OxoSearchResult) -> Self {
        let query_id = raw.query_id;
        let mappings = raw
            .mapping_response_list
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<OxoMappingResponse>(value) {
                Ok(m) => Some(ExternalMappingCandidate {
                    curie: m.curie,
                    label: m.label.unwrap_or_default(),
                    distance: m.distance,
                }),
                Err(e) => {
                    warn!(query_id = %query_id, error = %e, "Skipping malformed OxO mapping");
                    None
                }
            })
            .collect();

        SearchResult {
            curie: raw.curie.unwrap_or_else(|| query_id.clone()),
            label: raw.label.unwrap_or_default(),
            query_id,
            mappings,
        }
    }
}

/// Decode an OxO search body.
///
/// A body that is not a search response fails the whole call. A single
/// malformed entry is replaced by an empty result so positions still match `ids`.
pub fn parse_search_response(
    ids: &[String],
    body: &str,
    source_id: Option<&str>,
) -> Result<Vec<SearchResult>> {
    let response: OxoSearchResponse = serde_json::from_str(body)
        .map_err(|e| CohdError::upstream(source_id, format!("malformed OxO response: {}", e)))?;

    let raw_results = match response.embedded {
        Some(embedded) => embedded.search_results,
        None => return Ok(Vec::new()),
    };

    let results = raw_results
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let query_id = ids.get(i).map(String::as_str).unwrap_or_default();
            match serde_json::from_value::<OxoSearchResult>(value) {
                Ok(raw) => raw.into(),
                Err(e) => {
                    warn!(query_id, error = %e, "Skipping malformed OxO search result");
                    SearchResult::empty(query_id)
                }
            }
        })
        .collect();

    Ok(results)
}

// ============================================================================
// OXO CLIENT
// ============================================================================

pub struct OxoClient {
    client: Client,
    url: String,
    input_source: Option<String>,
}

impl OxoClient {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CohdError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(OxoClient {
            client,
            url: url.to_string(),
            input_source: None,
        })
    }

    pub fn from_settings(settings: &GatewaySettings) -> Result<Self> {
        let mut client = Self::new(&settings.url, settings.timeout_secs)?;
        client.input_source = settings.input_source.clone();
        Ok(client)
    }

    fn form(&self, ids: &[String], mapping_targets: &[String], distance: u32) -> Vec<(&'static str, String)> {
        let mut form: Vec<(&'static str, String)> =
            ids.iter().map(|id| ("ids", id.clone())).collect();

        if let Some(source) = &self.input_source {
            form.push(("inputSource", source.clone()));
        }
        form.extend(mapping_targets.iter().map(|t| ("mappingTarget", t.clone())));
        form.push(("distance", distance.to_string()));

        form
    }
}

impl MappingGateway for OxoClient {
    fn search(
        &self,
        ids: &[String],
        mapping_targets: &[String],
        distance: u32,
    ) -> Result<Vec<SearchResult>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        // Failures are attributable only when a single id was sent
        let source_id = match ids {
            [single] => Some(single.as_str()),
            _ => None,
        };

        info!(ids = ids.len(), targets = mapping_targets.len(), distance, "Querying OxO search");

        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .form(&self.form(ids, mapping_targets, distance))
            .send()
            .map_err(|e| CohdError::upstream(source_id, format!("OxO request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CohdError::upstream(source_id, format!("OxO returned HTTP {}", status)));
        }

        let body = response
            .text()
            .map_err(|e| CohdError::upstream(source_id, format!("Failed to read OxO body: {}", e)))?;

        parse_search_response(ids, &body, source_id)
    }
}
