//! Integration tests for `WebDriverSession` against a mocked driver.

use reelwalk_browser::{BrowserError, BrowserSession, Key, WebDriverConfig, WebDriverSession};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

async fn connected(server: &MockServer) -> WebDriverSession {
    Mock::given(method("POST"))
        .and(path("/session"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": { "sessionId": "s-1", "capabilities": {} }
        })))
        .mount(server)
        .await;

    let config = WebDriverConfig::new(&server.uri(), "reelwalk-test");
    WebDriverSession::connect(&config)
        .await
        .expect("session should be created")
}

#[tokio::test]
async fn connect_reads_session_id() {
    let server = MockServer::start().await;
    let session = connected(&server).await;
    assert_eq!(session.session_id(), "s-1");
}

#[tokio::test]
async fn click_locates_then_clicks_element() {
    let server = MockServer::start().await;
    let session = connected(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/element"))
        .and(body_partial_json(json!({
            "using": "css selector",
            "value": "[data-reelwalk-tag=\"next\"]"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": { ELEMENT_KEY: "e-9" } })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/s-1/element/e-9/click"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&server)
        .await;

    session
        .click("[data-reelwalk-tag=\"next\"]")
        .await
        .expect("click should succeed");
}

#[tokio::test]
async fn missing_element_maps_to_no_such_element() {
    let server = MockServer::start().await;
    let session = connected(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/element"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "no such element", "message": "Unable to locate element" }
        })))
        .mount(&server)
        .await;

    let err = session.click("button.gone").await.unwrap_err();
    assert!(
        matches!(err, BrowserError::NoSuchElement { ref selector } if selector == "button.gone"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn stale_click_maps_to_stale_element() {
    let server = MockServer::start().await;
    let session = connected(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/element"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": { ELEMENT_KEY: "e-1" } })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/session/s-1/element/e-1/click"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "value": { "error": "stale element reference", "message": "detached" }
        })))
        .mount(&server)
        .await;

    let err = session.click("a.tray").await.unwrap_err();
    assert!(err.is_element_race(), "got {err:?}");
}

#[tokio::test]
async fn execute_returns_script_value() {
    let server = MockServer::start().await;
    let session = connected(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/execute/sync"))
        .and(body_partial_json(json!({ "args": [3] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "value": { "count": 3 } })),
        )
        .mount(&server)
        .await;

    let value = session
        .execute("return {count: arguments[0]};", vec![json!(3)])
        .await
        .expect("script should run");
    assert_eq!(value, json!({ "count": 3 }));
}

#[tokio::test]
async fn javascript_error_maps_to_script_error() {
    let server = MockServer::start().await;
    let session = connected(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/execute/sync"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "value": { "error": "javascript error", "message": "x is not defined" }
        })))
        .mount(&server)
        .await;

    let err = session.execute("return x;", vec![]).await.unwrap_err();
    assert!(matches!(err, BrowserError::Script(ref m) if m.contains("not defined")));
}

#[tokio::test]
async fn press_key_sends_key_actions() {
    let server = MockServer::start().await;
    let session = connected(&server).await;

    Mock::given(method("POST"))
        .and(path("/session/s-1/actions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&server)
        .await;

    session
        .press_key(Key::ArrowRight)
        .await
        .expect("key press should succeed");
}

#[tokio::test]
async fn screenshot_is_base64_decoded() {
    let server = MockServer::start().await;
    let session = connected(&server).await;

    Mock::given(method("GET"))
        .and(path("/session/s-1/screenshot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "iVBORw0KGgo=" })))
        .mount(&server)
        .await;

    let png = session.screenshot().await.expect("screenshot");
    assert_eq!(&png[..4], &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn close_deletes_session() {
    let server = MockServer::start().await;
    let session = connected(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/session/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": null })))
        .expect(1)
        .mount(&server)
        .await;

    session.close().await.expect("close");
}

#[tokio::test]
async fn current_url_reads_string_value() {
    let server = MockServer::start().await;
    let session = connected(&server).await;

    Mock::given(method("GET"))
        .and(path("/session/s-1/url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": "https://feed.example/stories/alice/3301/"
        })))
        .mount(&server)
        .await;

    let url = session.current_url().await.expect("url");
    assert_eq!(url, "https://feed.example/stories/alice/3301/");
}
