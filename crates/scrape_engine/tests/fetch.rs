use std::sync::Arc;
use std::time::Duration;

use scrape_core::{is_transient_status, DirectOutcome, RetryPolicy, ScrapeTarget};
use scrape_engine::{
    DirectFetcher, FailureKind, FetchSettings, Fetcher, ReqwestFetcher, RetryingFetcher,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetcher_returns_html_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/doc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/doc", server.uri());

    let output = fetcher.fetch(&url).await.expect("fetch ok");
    assert_eq!(output.metadata.original_url, url);
    assert_eq!(output.metadata.final_url, output.metadata.original_url);
    assert_eq!(output.metadata.status, 200);
    assert_eq!(output.metadata.redirect_count, 0);
    assert!(output
        .metadata
        .content_type
        .unwrap()
        .starts_with("text/html"));
    assert_eq!(output.bytes, b"<html>ok</html>");
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let url = format!("{}/blocked", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(403));
    assert!(err.kind.site_responded());
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/slow", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .insert_header("Content-Length", "11")
                .set_body_string("01234567890"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/large", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn fetcher_stops_redirect_loops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        redirect_limit: 3,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings);
    let url = format!("{}/loop", server.uri());

    let err = fetcher.fetch(&url).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::RedirectLimitExceeded);
    assert!(!err.kind.site_responded());
}

#[tokio::test]
async fn fetcher_rejects_binary_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/image"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 4], "image/png"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let err = fetcher
        .fetch(&format!("{}/image", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentType {
            content_type: "image/png".into()
        }
    );
}

#[tokio::test]
async fn unreachable_hosts_and_bad_urls_are_not_site_responses() {
    let fetcher = ReqwestFetcher::new(FetchSettings {
        connect_timeout: Duration::from_millis(500),
        ..FetchSettings::default()
    });

    let refused = fetcher.fetch("http://127.0.0.1:1/").await.unwrap_err();
    assert_eq!(refused.kind, FailureKind::Network);

    let malformed = fetcher.fetch("not a url").await.unwrap_err();
    assert_eq!(malformed.kind, FailureKind::InvalidUrl);

    let scheme = fetcher.fetch("ftp://example.com/file").await.unwrap_err();
    assert_eq!(scheme.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn connect_timeout_is_not_a_site_response() {
    // TEST-NET-1 is unroutable: the connect either times out or fails outright.
    let fetcher = ReqwestFetcher::new(FetchSettings {
        connect_timeout: Duration::from_millis(200),
        request_timeout: Duration::from_secs(5),
        ..FetchSettings::default()
    });

    let err = fetcher.fetch("http://192.0.2.1/listing").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Network);
    assert!(!err.kind.site_responded());
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        factor: 2.0,
        max_delay: Duration::from_millis(20),
        retryable_status: is_transient_status,
    }
}

fn retrying_fetcher() -> Arc<dyn Fetcher> {
    let page = Arc::new(ReqwestFetcher::new(FetchSettings::default()));
    Arc::new(RetryingFetcher::new(page, fast_retry()))
}

#[tokio::test]
async fn direct_fetch_retries_a_temporary_outage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<p>Real listing text</p>", "text/html; charset=utf-8"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let direct = DirectFetcher::new(retrying_fetcher(), 200);
    let target = ScrapeTarget::new(format!("{}/listing", server.uri()));
    match direct.fetch(&target, "t").await {
        DirectOutcome::Fetched { item } => assert_eq!(item.content, "Real listing text"),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn refusals_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let err = retrying_fetcher()
        .fetch(&format!("{}/blocked", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(403));
}

#[tokio::test]
async fn persistent_outage_surfaces_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = retrying_fetcher()
        .fetch(&format!("{}/down", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(503));
}
