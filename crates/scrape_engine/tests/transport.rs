mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_logging, instant_transport, TestSink};
use pretty_assertions::assert_eq;
use scrape_engine::{
    EngineEvent, FailureClass, FailureKind, FetchContext, FetchOutcome, FetchPurpose, FixedJitter,
    IdentityPool, PacingSettings, RecordingSleeper, ResilientTransport, RetryPolicy, TokioSleeper,
    Transport, TransportSettings,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HTML: &str = "text/html; charset=utf-8";

fn listing_ctx(sink: &TestSink) -> FetchContext<'_> {
    FetchContext {
        purpose: FetchPurpose::Listing { page: 1 },
        referer: None,
        sink,
    }
}

fn header(request: &wiremock::Request, name: &str) -> Option<String> {
    request
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[tokio::test]
async fn success_returns_decoded_body() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list/1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>ok</html>", HTML))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, sleeper) = instant_transport(RetryPolicy::default(), CancellationToken::new());
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/list/1", server.uri()), &listing_ctx(&sink))
        .await;

    assert_eq!(
        outcome,
        FetchOutcome::Success {
            body: "<html>ok</html>".to_string(),
            status: 200
        }
    );
    assert!(sleeper.durations().is_empty());
    assert_eq!(
        sink.take(),
        vec![EngineEvent::Attempt {
            purpose: FetchPurpose::Listing { page: 1 },
            attempt: 1,
            max_attempts: 3
        }]
    );
}

#[tokio::test]
async fn first_request_carries_browser_identity_without_referer() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", HTML))
        .mount(&server)
        .await;

    let (transport, _) = instant_transport(RetryPolicy::default(), CancellationToken::new());
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/page", server.uri()), &listing_ctx(&sink))
        .await;
    assert!(outcome.is_success());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let pool = IdentityPool::browsers();
    let expected_ua = pool.get(0).unwrap().user_agent().to_string();
    assert_eq!(header(&requests[0], "user-agent"), Some(expected_ua));
    assert!(header(&requests[0], "accept")
        .unwrap()
        .starts_with("text/html"));
    assert!(header(&requests[0], "accept-language").is_some());
    assert_eq!(header(&requests[0], "referer"), None);
}

#[tokio::test]
async fn retryable_status_recovers_on_a_later_attempt() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>back</p>", HTML))
        .mount(&server)
        .await;

    let (transport, sleeper) = instant_transport(RetryPolicy::default(), CancellationToken::new());
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/flaky", server.uri()), &listing_ctx(&sink))
        .await;

    assert!(outcome.is_success());
    // 5s base plus the midpoint of 1..4s.
    assert_eq!(sleeper.durations(), vec![Duration::from_millis(7_500)]);
    let backoffs: Vec<_> = sink
        .take()
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::Backoff { class, .. } => Some(class),
            _ => None,
        })
        .collect();
    assert_eq!(backoffs, vec![FailureClass::ServerError]);
}

#[tokio::test]
async fn retries_rotate_identity_and_add_origin_referer() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let (transport, _) = instant_transport(RetryPolicy::immediate(3), CancellationToken::new());
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/busy", server.uri()), &listing_ctx(&sink))
        .await;
    assert_eq!(
        outcome.error().map(|err| err.kind.clone()),
        Some(FailureKind::HttpStatus(429))
    );
    assert!(matches!(outcome, FetchOutcome::RetryableFailure(_)));

    let requests = server.received_requests().await.unwrap();
    let agents: Vec<_> = requests
        .iter()
        .map(|request| header(request, "user-agent").unwrap())
        .collect();
    assert_ne!(agents[0], agents[1]);
    assert_ne!(agents[1], agents[2]);

    let origin = format!("{}/", server.uri());
    assert_eq!(header(&requests[0], "referer"), None);
    assert_eq!(header(&requests[1], "referer"), Some(origin.clone()));
    assert_eq!(header(&requests[2], "referer"), Some(origin));
}

#[tokio::test]
async fn explicit_referer_is_sent_on_every_attempt() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let (transport, _) = instant_transport(RetryPolicy::immediate(2), CancellationToken::new());
    let sink = TestSink::new();
    let ctx = FetchContext {
        purpose: FetchPurpose::Detail { index: 4 },
        referer: Some("https://blog.example.com/tester"),
        sink: &sink,
    };
    let outcome = transport
        .fetch(&format!("{}/details/4", server.uri()), &ctx)
        .await;
    assert!(matches!(outcome, FetchOutcome::RetryableFailure(_)));

    for request in server.received_requests().await.unwrap() {
        assert_eq!(
            header(&request, "referer").as_deref(),
            Some("https://blog.example.com/tester")
        );
    }
}

#[tokio::test]
async fn origin_unavailable_exhausts_attempts_with_growing_waits() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(521))
        .expect(3)
        .mount(&server)
        .await;

    let (transport, sleeper) = instant_transport(RetryPolicy::default(), CancellationToken::new());
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/down", server.uri()), &listing_ctx(&sink))
        .await;

    assert!(matches!(outcome, FetchOutcome::RetryableFailure(_)));
    assert_eq!(
        sleeper.durations(),
        vec![Duration::from_secs(20), Duration::from_secs(30)]
    );
}

#[tokio::test]
async fn access_denied_waits_longer_than_server_errors() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/denied"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let retry = RetryPolicy {
        max_attempts: 2,
        ..RetryPolicy::default()
    };
    let sink = TestSink::new();

    let (denied, denied_sleeps) = instant_transport(retry.clone(), CancellationToken::new());
    denied
        .fetch(&format!("{}/denied", server.uri()), &listing_ctx(&sink))
        .await;
    let (broken, broken_sleeps) = instant_transport(retry, CancellationToken::new());
    broken
        .fetch(&format!("{}/broken", server.uri()), &listing_ctx(&sink))
        .await;

    let denied_wait = denied_sleeps.durations()[0];
    let broken_wait = broken_sleeps.durations()[0];
    assert_eq!(denied_wait, Duration::from_secs(30));
    assert!(denied_wait > broken_wait);
}

#[tokio::test]
async fn fatal_status_is_not_retried() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, sleeper) = instant_transport(RetryPolicy::default(), CancellationToken::new());
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/missing", server.uri()), &listing_ctx(&sink))
        .await;

    match outcome {
        FetchOutcome::FatalFailure(err) => assert_eq!(err.kind, FailureKind::HttpStatus(404)),
        other => panic!("expected fatal failure, got {other:?}"),
    }
    assert!(sleeper.durations().is_empty());
}

#[tokio::test]
async fn whitelisted_status_becomes_retryable() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(418))
        .expect(2)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let transport = ResilientTransport::builder(TransportSettings {
        extra_retryable_statuses: vec![418],
        ..TransportSettings::default()
    })
    .pacing(PacingSettings::none())
    .retry(RetryPolicy::immediate(2))
    .sleeper(sleeper)
    .jitter(Arc::new(FixedJitter::default()))
    .build()
    .unwrap();
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/teapot", server.uri()), &listing_ctx(&sink))
        .await;
    assert!(matches!(outcome, FetchOutcome::RetryableFailure(_)));
}

#[tokio::test]
async fn timeout_is_retried_as_network_failure() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_raw("slow", HTML),
        )
        .expect(2)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let transport = ResilientTransport::builder(TransportSettings {
        request_timeout: Duration::from_millis(50),
        ..TransportSettings::default()
    })
    .pacing(PacingSettings::none())
    .retry(RetryPolicy {
        max_attempts: 2,
        ..RetryPolicy::default()
    })
    .sleeper(sleeper.clone())
    .jitter(Arc::new(FixedJitter::default()))
    .build()
    .unwrap();
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/slow", server.uri()), &listing_ctx(&sink))
        .await;

    match outcome {
        FetchOutcome::RetryableFailure(err) => assert_eq!(err.kind, FailureKind::Timeout),
        other => panic!("expected retryable timeout, got {other:?}"),
    }
    // 3s base plus the midpoint of 0..2s.
    assert_eq!(sleeper.durations(), vec![Duration::from_secs(4)]);
}

#[tokio::test]
async fn oversized_body_is_fatal() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .insert_header("Content-Length", "11")
                .set_body_raw("01234567890", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = ResilientTransport::builder(TransportSettings {
        max_bytes: 10,
        ..TransportSettings::default()
    })
    .pacing(PacingSettings::none())
    .sleeper(Arc::new(RecordingSleeper::new()))
    .build()
    .unwrap();
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/large", server.uri()), &listing_ctx(&sink))
        .await;

    assert_eq!(
        outcome.error().map(|err| err.kind.clone()),
        Some(FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        })
    );
}

#[tokio::test]
async fn non_html_content_is_fatal() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{}", "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    let (transport, _) = instant_transport(RetryPolicy::default(), CancellationToken::new());
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/api", server.uri()), &listing_ctx(&sink))
        .await;
    assert!(matches!(
        outcome,
        FetchOutcome::FatalFailure(ref err)
            if matches!(err.kind, FailureKind::UnsupportedContentType { .. })
    ));
}

#[tokio::test]
async fn legacy_charset_is_decoded() {
    init_logging();
    let server = MockServer::start().await;
    let (encoded, _, _) = encoding_rs::GBK.encode("<span>阅读 12</span>");
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(encoded.into_owned(), "text/html; charset=gbk"),
        )
        .mount(&server)
        .await;

    let (transport, _) = instant_transport(RetryPolicy::default(), CancellationToken::new());
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/gbk", server.uri()), &listing_ctx(&sink))
        .await;
    assert_eq!(
        outcome,
        FetchOutcome::Success {
            body: "<span>阅读 12</span>".to_string(),
            status: 200
        }
    );
}

#[tokio::test]
async fn invalid_url_fails_without_a_request() {
    init_logging();
    let (transport, _) = instant_transport(RetryPolicy::default(), CancellationToken::new());
    let sink = TestSink::new();
    let outcome = transport.fetch("not a url", &listing_ctx(&sink)).await;
    assert_eq!(
        outcome.error().map(|err| err.kind.clone()),
        Some(FailureKind::InvalidUrl)
    );
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn cancelled_token_stops_before_sending() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", HTML))
        .expect(0)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let (transport, _) = instant_transport(RetryPolicy::default(), cancel);
    let sink = TestSink::new();
    let outcome = transport
        .fetch(&format!("{}/page", server.uri()), &listing_ctx(&sink))
        .await;
    assert_eq!(
        outcome.error().map(|err| err.kind.clone()),
        Some(FailureKind::Cancelled)
    );
}

#[tokio::test]
async fn cancel_during_backoff_ends_the_fetch_early() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let transport = ResilientTransport::builder(TransportSettings::default())
        .pacing(PacingSettings::none())
        .retry(RetryPolicy::default())
        .jitter(Arc::new(FixedJitter::default()))
        .sleeper(Arc::new(TokioSleeper))
        .cancel(cancel.clone())
        .build()
        .unwrap();
    let trigger = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        })
    };

    let sink = TestSink::new();
    let started = std::time::Instant::now();
    let outcome = transport
        .fetch(&format!("{}/busy", server.uri()), &listing_ctx(&sink))
        .await;
    let elapsed = started.elapsed();
    trigger.await.unwrap();

    match outcome {
        FetchOutcome::FatalFailure(err) => assert_eq!(err.kind, FailureKind::Cancelled),
        other => panic!("expected cancellation, got {other:?}"),
    }
    // The server-error backoff is 7.5s; cancellation cuts it short.
    assert!(elapsed < Duration::from_secs(5), "fetch took {elapsed:?}");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(sink.take().iter().any(|event| matches!(
        event,
        EngineEvent::Backoff {
            class: FailureClass::ServerError,
            ..
        }
    )));
}
