use harvester_engine::{FetchSettings, HttpFetcher, ProviderFailure};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url(server: &MockServer, suffix: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), suffix)).unwrap()
}

#[tokio::test]
async fn fetcher_returns_body_and_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/"))
        .and(query_param("api_key", "secret"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(FetchSettings::default()).unwrap();
    let body = fetcher
        .get(url(&server, "/api/v1/?api_key=secret"))
        .await
        .expect("fetch ok");

    assert_eq!(body.bytes, b"<html>ok</html>");
    assert!(body.content_type.unwrap().starts_with("text/html"));
    assert!(body.final_url.starts_with(&server.uri()));
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(FetchSettings::default()).unwrap();
    let err = fetcher.get(url(&server, "/missing")).await.unwrap_err();
    assert_eq!(err.kind, ProviderFailure::HttpStatus(500));
}

#[tokio::test]
async fn throttling_and_auth_statuses_are_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/throttled"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/denied"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(FetchSettings::default()).unwrap();
    for suffix in ["/throttled", "/denied"] {
        let err = fetcher.get(url(&server, suffix)).await.unwrap_err();
        assert_eq!(err.kind, ProviderFailure::Blocked, "{suffix}");
    }
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![b'a'; 4096], "text/html"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 1024,
        ..FetchSettings::default()
    };
    let fetcher = HttpFetcher::new(settings).unwrap();
    let err = fetcher.get(url(&server, "/big")).await.unwrap_err();
    assert!(matches!(
        err.kind,
        ProviderFailure::TooLarge {
            max_bytes: 1024,
            ..
        }
    ));
}

#[tokio::test]
async fn disallowed_content_type_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/image"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 8], "image/png"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(FetchSettings::default())
        .unwrap()
        .with_allowed_content_types(&["text/html"]);
    let err = fetcher.get(url(&server, "/image")).await.unwrap_err();
    assert_eq!(
        err.kind,
        ProviderFailure::UnsupportedContentType {
            content_type: "image/png".to_string()
        }
    );
}
