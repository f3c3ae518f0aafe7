use std::time::{Duration, Instant};

use food_ingest::fetch::FetchConfig;
use food_ingest::{FatalFetchError, OffClient, PageSource, RateLimiter, RetryPolicy, TransientFetchError};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEARCH_PATH: &str = "/cgi/search.pl";

fn client(server: &MockServer, max_retries: u32) -> OffClient {
    client_with_rate_limit(server, max_retries, Duration::ZERO)
}

fn client_with_rate_limit(server: &MockServer, max_retries: u32, rate_limit: Duration) -> OffClient {
    let config = FetchConfig {
        search_url: format!("{}{}", server.uri(), SEARCH_PATH),
        user_agent: "food-ingest-tests".to_string(),
        page_size: 2,
        request_timeout: Duration::from_secs(5),
        rate_limit,
        retry: RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
    };
    OffClient::new(config, RateLimiter::new(rate_limit)).unwrap()
}

fn search_page(count: u64, codes: &[&str]) -> serde_json::Value {
    json!({
        "count": count,
        "page_size": 2,
        "products": codes.iter().map(|c| json!({ "code": c })).collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn test_fetch_page_sends_search_parameters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("search_terms", "coca cola"))
        .and(query_param("search_simple", "1"))
        .and(query_param("json", "1"))
        .and(query_param("page", "1"))
        .and(query_param("page_size", "2"))
        .and(header("user-agent", "food-ingest-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(3, &["1", "2"])))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server, 0).fetch_page("coca cola", 1).await.unwrap();

    assert_eq!(page.records.len(), 2);
    assert!(page.has_next);
    assert_eq!(page.total_count, Some(3));
}

#[tokio::test]
async fn test_last_page_has_no_next() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(3, &["3"])))
        .mount(&server)
        .await;

    let page = client(&server, 0).fetch_page("milk", 2).await.unwrap();
    assert_eq!(page.records.len(), 1);
    assert!(!page.has_next);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;

    // First two attempts fail, third succeeds
    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(1, &["1"])))
        .expect(1)
        .mount(&server)
        .await;

    let page = client(&server, 3).fetch_page("milk", 1).await.unwrap();
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn test_rate_limited_response_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(1, &["1"])))
        .mount(&server)
        .await;

    assert!(client(&server, 1).fetch_page("milk", 1).await.is_ok());
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server, 2).fetch_page("milk", 1).await.unwrap_err();
    assert_eq!(
        err,
        FatalFetchError::RetriesExhausted {
            attempts: 3,
            last: TransientFetchError::Status(503),
        }
    );
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 3).fetch_page("milk", 1).await.unwrap_err();
    assert_eq!(err, FatalFetchError::Status(404));
}

#[tokio::test]
async fn test_malformed_body_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 3).fetch_page("milk", 1).await.unwrap_err();
    assert!(matches!(err, FatalFetchError::Malformed(_)));
}

#[tokio::test]
async fn test_envelope_without_products_is_fatal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 10 })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 3).fetch_page("milk", 1).await.unwrap_err();
    assert!(matches!(err, FatalFetchError::Malformed(_)));
}

#[tokio::test]
async fn test_requests_are_spaced_by_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(10, &["1", "2"])))
        .mount(&server)
        .await;

    let mut client = client_with_rate_limit(&server, 0, Duration::from_millis(150));
    let start = Instant::now();
    client.fetch_page("milk", 1).await.unwrap();
    client.fetch_page("milk", 2).await.unwrap();
    client.fetch_page("milk", 3).await.unwrap();

    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_slow_responses_time_out_and_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(SEARCH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_page(1, &["1"]))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let config = FetchConfig {
        search_url: format!("{}{}", server.uri(), SEARCH_PATH),
        request_timeout: Duration::from_millis(50),
        rate_limit: Duration::ZERO,
        retry: RetryPolicy {
            max_retries: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        ..FetchConfig::default()
    };
    let mut client = OffClient::new(config, RateLimiter::new(Duration::ZERO)).unwrap();

    let err = client.fetch_page("milk", 1).await.unwrap_err();
    assert_eq!(
        err,
        FatalFetchError::RetriesExhausted {
            attempts: 2,
            last: TransientFetchError::Timeout,
        }
    );
}

#[tokio::test]
async fn test_connection_failures_are_retried() {
    // Bind then release a port so nothing is listening on it
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let config = FetchConfig {
        search_url: format!("http://127.0.0.1:{port}{SEARCH_PATH}"),
        request_timeout: Duration::from_secs(5),
        rate_limit: Duration::ZERO,
        retry: RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        ..FetchConfig::default()
    };
    let mut client = OffClient::new(config, RateLimiter::new(Duration::ZERO)).unwrap();

    let err = client.fetch_page("milk", 1).await.unwrap_err();
    assert!(
        matches!(
            err,
            FatalFetchError::RetriesExhausted {
                attempts: 3,
                last: TransientFetchError::Network(_),
            }
        ),
        "unexpected error: {err:?}"
    );
}
