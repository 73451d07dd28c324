//! Thin wrapper around the SerpApi search endpoint.
//!
//! Shapes request parameters, attaches the key as a query param and maps the
//! wire response onto a [`Page`]. Retries and redacted logging come from the
//! shared HTTP client.
use crate::aggregate::{Page, PageSource};
use crate::record::{ResultRecord, SearchQuery};
use crate::serpapi::types::SearchResponse;
use anyhow::{Context, Result};
use async_trait::async_trait;
use placelens_http::{Auth, HttpClient, HttpError, RequestOpts};
use std::borrow::Cow;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://serpapi.com";

#[derive(Clone)]
pub struct SerpApiMaps {
    http: HttpClient,
    api_key: String,
    engine: String,
}

impl SerpApiMaps {
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self, HttpError> {
        let http = HttpClient::new(endpoint)?.with_timeout(Duration::from_secs(30));
        Ok(Self {
            http,
            api_key: api_key.into(),
            engine: "google_maps".into(),
        })
    }

    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.engine = engine.into();
        self
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.http = self.http.with_timeout(dur);
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.http = self.http.with_retries(n);
        self
    }

    fn to_page(query: &SearchQuery, start: u64, resp: SearchResponse) -> Page {
        if let Some(msg) = &resp.error {
            tracing::info!(query=%query, start, message=%msg, "maps.serpapi.no_results");
        }

        let raw = resp.local_results.unwrap_or_default();
        let total = raw.len();
        let records: Vec<ResultRecord> = raw
            .into_iter()
            .filter_map(ResultRecord::from_value)
            .collect();
        if records.len() != total {
            tracing::warn!(
                query=%query,
                start,
                skipped = total - records.len(),
                "maps.serpapi.non_object_results"
            );
        }

        Page {
            records,
            next: resp.serpapi_pagination.and_then(|p| p.next),
        }
    }
}

#[async_trait]
impl PageSource for SerpApiMaps {
    async fn fetch_page(&self, query: &SearchQuery, start: u64) -> Result<Page> {
        let params: Vec<(&str, Cow<'_, str>)> = vec![
            ("engine", Cow::Borrowed(self.engine.as_str())),
            ("q", query.text().into()),
            ("type", Cow::Borrowed("search")),
            ("start", start.to_string().into()),
        ];

        tracing::debug!(query=%query, start, "maps.serpapi.request");
        let resp: SearchResponse = self
            .http
            .get_json(
                "search.json",
                RequestOpts {
                    auth: Some(Auth::Query {
                        name: "api_key",
                        value: Cow::Borrowed(self.api_key.as_str()),
                    }),
                    query: Some(params),
                    ..Default::default()
                },
            )
            .await
            .with_context(|| format!("SerpApi request for {query}, start {start}"))?;

        Ok(Self::to_page(query, start, resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_wire_response_to_page() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "local_results": [{"place_id": "p1"}, "junk", {"place_id": "p2"}],
            "serpapi_pagination": {"current": 1, "next": "https://serpapi.com/search.json?start=20"}
        }))
        .unwrap();
        let page = SerpApiMaps::to_page(&SearchQuery::new("cafe", "Oslo"), 0, resp);
        assert_eq!(page.records.len(), 2);
        assert_eq!(
            page.next.as_deref(),
            Some("https://serpapi.com/search.json?start=20")
        );
    }

    #[test]
    fn error_payload_is_an_empty_last_page() {
        let resp: SearchResponse = serde_json::from_value(json!({
            "error": "Google hasn't returned any results for this query."
        }))
        .unwrap();
        let page = SerpApiMaps::to_page(&SearchQuery::new("x", "y"), 0, resp);
        assert_eq!(page, Page::default());
    }
}
