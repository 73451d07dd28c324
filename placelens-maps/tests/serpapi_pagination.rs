use std::time::Duration;

use placelens_maps::{
    Aggregator, AggregatorConfig, PageSource, SearchQuery, SerpApiMaps, StopReason,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn no_delay() -> AggregatorConfig {
    AggregatorConfig {
        inter_query_delay: Duration::ZERO,
        ..Default::default()
    }
}

#[tokio::test]
async fn sends_expected_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("engine", "google_maps"))
        .and(query_param("q", "dentist in Austin"))
        .and(query_param("type", "search"))
        .and(query_param("start", "0"))
        .and(query_param("api_key", "serp-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "local_results": [{"place_id": "p1", "title": "Smile Co"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = SerpApiMaps::new(&server.uri(), "serp-key").unwrap();
    let page = client
        .fetch_page(&SearchQuery::new("dentist", "Austin"), 0)
        .await
        .unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.records[0].title(), Some("Smile Co"));
    assert!(page.next.is_none());
}

#[tokio::test]
async fn walks_pages_then_stops_on_server_error() {
    let server = MockServer::start().await;
    let next = |start: u32| format!("{}/search.json?engine=google_maps&start={start}", server.uri());

    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "local_results": [{"place_id": "a"}, {"place_id": "b"}],
            "serpapi_pagination": {"current": 1, "next": next(20)}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("start", "20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "local_results": [{"place_id": "b"}, {"place_id": "c"}],
            "serpapi_pagination": {"current": 2, "next": next(40)}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("start", "40"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .mount(&server)
        .await;

    let client = SerpApiMaps::new(&server.uri(), "k").unwrap().with_retries(0);
    let agg = Aggregator::new(client, no_delay());

    let query = SearchQuery::new("cafe", "Oslo");
    let report = agg.fetch_query(&query).await;
    assert_eq!(report.pages, 2);
    assert_eq!(report.records.len(), 4);
    assert!(matches!(report.stop, StopReason::FetchFailed(_)));

    let all = agg.aggregate(&[query]).await;
    let ids: Vec<_> = all.results.iter().filter_map(|r| r.place_id()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert_eq!(all.dedup.before, 4);
}

#[tokio::test]
async fn unauthorized_key_fails_the_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid API key."})))
        .mount(&server)
        .await;

    let client = SerpApiMaps::new(&server.uri(), "bad").unwrap();
    let err = client
        .fetch_page(&SearchQuery::new("cafe", "Oslo"), 0)
        .await
        .unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("Invalid API key."), "{text}");
    assert!(!text.contains("bad&"), "{text}");
}
