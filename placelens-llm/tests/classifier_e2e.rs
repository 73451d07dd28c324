mod common;

use placelens_llm::aesthetic::{AestheticClassifier, Category, LabelScheme, RetryPolicy};
use placelens_llm::openai::OpenAiVisionClient;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"content": text}}]
    }))
}

fn classifier(server: &MockServer, scheme: LabelScheme) -> AestheticClassifier {
    let client =
        OpenAiVisionClient::new(&server.uri(), "k".into(), "vision-model".into()).unwrap();
    AestheticClassifier::new(Arc::new(client))
        .with_scheme(scheme)
        .with_policy(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        })
}

#[tokio::test]
async fn classifies_after_rate_limit_recovers() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(reply(
            "Category: Outdated\nExplanation: Cluttered sidebar and pixelated logo.",
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let shot = common::fake_screenshot(dir.path(), "3_joes-pizza.com.png");
    let result = classifier(&server, LabelScheme::MODERNITY).classify(&shot).await;

    assert_eq!(result.category, Category::Outdated);
    assert_eq!(result.explanation, "Cluttered sidebar and pixelated logo.");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn beauty_labels_are_reported_through_the_scheme() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(reply("Category: Ugly\nExplanation: Nice spacing overall."))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let shot = common::fake_screenshot(dir.path(), "0_a.com.png");
    let classifier = classifier(&server, LabelScheme::BEAUTY);
    let result = classifier.classify(&shot).await;

    // no flaw keyword, so worst is lifted to middle
    assert_eq!(result.category, Category::Acceptable);
    assert_eq!(classifier.scheme().label(result.category), "Passable");
    assert!(result.explanation.ends_with(
        "(Reclassified as Passable due to lack of significant aesthetic flaws by 2025 standards.)"
    ));
}

#[tokio::test]
async fn persistent_rate_limit_exhausts_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let shot = common::fake_screenshot(dir.path(), "1_b.com.png");
    let result = classifier(&server, LabelScheme::MODERNITY).classify(&shot).await;

    assert_eq!(result.category, Category::Error);
    assert!(result.explanation.starts_with("Failed API call after 3 attempts:"));
}
