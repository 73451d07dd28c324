use std::borrow::Cow;
use std::time::Duration;

use placelens_http::{Auth, HttpClient, HttpError, RequestOpts};
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_json_sends_query_auth_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .and(query_param("engine", "google_maps"))
        .and(query_param("api_key", "k-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"local_results": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let got: Value = client
        .get_json(
            "search.json",
            RequestOpts {
                query: Some(vec![("engine", Cow::Borrowed("google_maps"))]),
                auth: Some(Auth::Query {
                    name: "api_key",
                    value: Cow::Borrowed("k-123"),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(got, json!({"local_results": []}));

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap_or_default().to_string();
    assert_eq!(query.matches("api_key=").count(), 1);
}

#[tokio::test]
async fn retries_rate_limit_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/v1", server.uri()))
        .unwrap()
        .with_retries(1);
    let got: Value = client
        .post_json_opts(
            "chat/completions",
            &json!({"model": "m"}),
            RequestOpts {
                auth: Some(Auth::Bearer("sk-test")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(got["ok"], true);
}

#[tokio::test]
async fn api_errors_carry_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search.json"))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("x-request-id", "abc")
                .set_body_json(json!({"error": "Invalid API key."})),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(0);
    let err = client
        .get_json::<Value>("search.json", RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Api {
            status,
            message,
            request_id,
        } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(message, "Invalid API key.");
            assert_eq!(request_id, "abc");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn slow_responses_surface_as_timeouts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .get_json::<Value>(
            "slow",
            RequestOpts {
                timeout: Some(Duration::from_millis(50)),
                retries: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Timeout(_)), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn undecodable_success_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .get_json::<Value>("bad", RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Decode(_, snippet) => assert_eq!(snippet, "<html>"),
        other => panic!("unexpected error: {other:?}"),
    }
}
