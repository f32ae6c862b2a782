use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crawl_requests::{
    headers_from_pairs, CallArgs, Cookie, DirectClient, HttpError, Method, ProxiedClient,
    ProxyConfig, RequestBuilder, TransportClient,
};
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// The transport blocks, so every call runs on the blocking pool.
async fn blocking<T, F>(f: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.expect("blocking task")
}

#[tokio::test(flavor = "multi_thread")]
async fn direct_get_sends_persistent_headers_query_and_cookie() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .and(header("x-crawler", "feeds"))
        .and(header("cookie", "sid=abc"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>list</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/list", server.uri());
    let response = blocking(move || {
        let client = DirectClient::new()?;
        client.set_headers(&headers_from_pairs(&[("X-Crawler", "feeds")])?);
        let args = CallArgs {
            query: vec![("page".to_string(), "2".to_string())],
            cookie: Some(Cookie::new("sid", "abc")),
        };
        client.get(&url, &args)
    })
    .await
    .expect("get ok");

    assert_eq!(response.status, 200);
    assert_eq!(response.text(), "<html>list</html>");
}

#[tokio::test(flavor = "multi_thread")]
async fn post_json_sends_body_with_json_content_type() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/items"))
        .and(header("content-type", "application/json"))
        .and(body_string(r#"{"page":1}"#))
        .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"accepted":true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/api/items", server.uri());
    let response = blocking(move || {
        let builder = RequestBuilder::new(url)?;
        builder.set_method(Method::PostJson).json(r#"{"page":1}"#);
        builder.send()
    })
    .await
    .expect("post ok");

    assert_eq!(response.status, 201);
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["accepted"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn error_statuses_are_returned_as_responses() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let response = blocking(move || RequestBuilder::new(url)?.send())
        .await
        .expect("404 is not a transport error");

    assert_eq!(response.status, 404);
    assert!(!response.is_success());
}

#[tokio::test(flavor = "multi_thread")]
async fn transport_timeout_surfaces_unchanged() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_string("slow"),
        )
        .mount(&server)
        .await;

    let url = format!("{}/slow", server.uri());
    let err = blocking(move || {
        let client = DirectClient::new()?;
        client.set_timeout(Duration::from_millis(50));
        client.get(&url, &CallArgs::default())
    })
    .await
    .unwrap_err();

    assert!(matches!(err, HttpError::Transport(_)));
    assert!(err.is_timeout());
}

#[tokio::test(flavor = "multi_thread")]
async fn builder_timeout_never_drops_below_default() {
    crawl_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slowish"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_string("done"),
        )
        .mount(&server)
        .await;

    let url = format!("{}/slowish", server.uri());
    let response = blocking(move || {
        let builder = RequestBuilder::new(url)?;
        builder.set_timeout(Duration::from_millis(50));
        builder.send()
    })
    .await
    .expect("floor of one second covers the delay");

    assert_eq!(response.text(), "done");
}

#[tokio::test(flavor = "multi_thread")]
async fn header_update_waits_for_in_flight_request() {
    crawl_logging::initialize_for_tests();
    const DELAY: Duration = Duration::from_millis(600);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/held"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(DELAY)
                .set_body_string("held"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/held", server.uri());
    let (status, headers_updated_after) = blocking(move || {
        let client = Arc::new(DirectClient::new().expect("client"));
        let started = Instant::now();
        let in_flight = {
            let client = Arc::clone(&client);
            thread::spawn(move || client.get(&url, &CallArgs::default()))
        };

        // Let the get take the client lock before updating headers.
        thread::sleep(Duration::from_millis(150));
        client.set_headers(&headers_from_pairs(&[("x-late", "1")]).expect("header"));
        let headers_updated_after = started.elapsed();

        let response = in_flight.join().expect("get thread").expect("get ok");
        (response.status, headers_updated_after)
    })
    .await;

    assert_eq!(status, 200);
    assert!(
        headers_updated_after >= DELAY,
        "set_headers returned after {headers_updated_after:?}, before the response"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn proxied_client_tunnels_through_authenticated_proxy() {
    crawl_logging::initialize_for_tests();
    let proxy_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss"))
        .and(header("proxy-authorization", "Basic YXBwOnNlY3JldA=="))
        .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
        .expect(1)
        .mount(&proxy_server)
        .await;

    let proxy = ProxyConfig::new("app", "secret", proxy_server.address().to_string());
    let expected_url = format!("http://app:secret@{}", proxy_server.address());
    let response = blocking(move || {
        let client = ProxiedClient::new(&proxy)?;
        assert_eq!(client.proxy_url(), expected_url);
        client.get("http://feeds.example.com/rss", &CallArgs::default())
    })
    .await
    .expect("proxied get ok");

    assert_eq!(response.text(), "via proxy");
}

#[test]
fn proxy_without_host_is_rejected() {
    let err = ProxiedClient::new(&ProxyConfig::new("app", "secret", "")).unwrap_err();
    assert!(matches!(err, HttpError::InvalidProxy { .. }));
    assert!(!err.to_string().contains("secret"));
}
