//! Integration tests for the Gemini image client and the placeholder policy
//! of [`ImageGenerator`] on top of it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use adventure_swipe::config::{GeminiConfig, RequestConfig};
use adventure_swipe::error::ImageError;
use adventure_swipe::image::{GeminiImageClient, ImageGenerator, ImageModel, ImageRequest, ReferenceImage};

const MODEL_PATH: &str = "/v1beta/models/gemini-2.5-flash-image:generateContent";

fn create_test_client(base_url: &str) -> GeminiImageClient {
    let config = GeminiConfig {
        api_key: Some("g-key".to_string()),
        base_url: base_url.to_string(),
        ..Default::default()
    };
    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries: 0,
        retry_delay_ms: 10,
    };
    GeminiImageClient::new(&config, "g-key", &request_config).expect("Failed to create client")
}

fn image_response() -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{"inlineData": {"mimeType": "image/png", "data": "iVBORw0K"}}]
            }
        }]
    })
}

#[tokio::test]
async fn test_generate_returns_inline_image() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .and(header("x-goog-api-key", "g-key"))
        .and(body_partial_json(json!({
            "generationConfig": {"responseModalities": ["IMAGE"]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri());
    let image = client
        .generate(ImageRequest::new("a ruined chapel"), CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(image.to_data_uri(), "data:image/png;base64,iVBORw0K");
}

#[tokio::test]
async fn test_reference_image_sent_as_inline_data() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri());
    let request = ImageRequest::new("a ruined chapel").with_reference(ReferenceImage {
        mime_type: "image/jpeg".to_string(),
        data: "PREVIOUS".to_string(),
    });
    let image = client
        .generate(request, CancellationToken::new())
        .await
        .unwrap();
    assert!(image.is_some());

    let received = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let parts = body["contents"][0]["parts"].as_array().unwrap();
    assert!(parts[0]["text"]
        .as_str()
        .unwrap()
        .contains("a ruined chapel"));
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
    assert_eq!(parts[1]["inlineData"]["data"], "PREVIOUS");
}

#[tokio::test]
async fn test_text_only_response_has_no_image() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "I cannot draw that."}]}}]
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri());
    let image = client
        .generate(ImageRequest::new("x"), CancellationToken::new())
        .await
        .unwrap();
    assert!(image.is_none());
}

#[tokio::test]
async fn test_api_error_surfaces_from_client() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri());
    let err = client
        .generate(ImageRequest::new("x"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ImageError::Api { status: 429, .. }));
}

#[tokio::test]
async fn test_generator_degrades_api_error_to_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Arc::new(create_test_client(&mock_server.uri()));
    let generator = ImageGenerator::new(client, Duration::ZERO);
    let uri = generator
        .generate("a ruined chapel", None, &CancellationToken::new())
        .await
        .unwrap();
    assert!(uri.is_none());
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(MODEL_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(image_response())
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri());
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = client
        .generate(ImageRequest::new("x"), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ImageError::Cancelled));
}
