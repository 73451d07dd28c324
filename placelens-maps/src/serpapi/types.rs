use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub local_results: Option<Vec<Value>>,
    #[serde(default)]
    pub serpapi_pagination: Option<Pagination>,
    /// Set on 200 responses that carry no results ("Google hasn't returned any results...").
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub current: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
}
