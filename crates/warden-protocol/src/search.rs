//! Search result and response types shared with provider adapters.

use serde::{Deserialize, Serialize};

/// One search result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title.
    pub title: String,
    /// Result URL.
    pub url: String,
    /// Result snippet.
    #[serde(default)]
    pub snippet: String,
}

/// Outcome category of a search request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    /// Provider returned results.
    Ok,
    /// Manual intake is needed from the user.
    ManualRequired,
    /// All providers failed.
    Error,
}

/// Response returned by the search router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Outcome category.
    pub status: SearchStatus,
    /// Provider that produced the outcome.
    pub provider: String,
    /// Result rows, empty unless `status` is ok.
    pub results: Vec<SearchResult>,
    /// Human-readable detail.
    pub detail: String,
    /// Instructions shown when manual intake is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_instructions: Option<String>,
}
