use aggregator_sync::{Notifier, NotifyError, WebhookNotifier};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn notify(url: String, verb: &'static str) -> Result<(), NotifyError> {
    tokio::task::spawn_blocking(move || WebhookNotifier::new(url, verb).notify())
        .await
        .expect("notifier task panicked")
}

#[tokio::test(flavor = "multi_thread")]
async fn posts_once_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    notify(format!("{}/hook", server.uri()), "POST")
        .await
        .expect("notify");
}

#[tokio::test(flavor = "multi_thread")]
async fn honours_configured_method() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/reload"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    notify(format!("{}/reload", server.uri()), "PUT")
        .await
        .expect("notify");
}

#[tokio::test(flavor = "multi_thread")]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = notify(format!("{}/hook", server.uri()), "POST")
        .await
        .expect_err("500 must fail");
    match err {
        NotifyError::Status { status, .. } => assert_eq!(status, 500),
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_endpoint_is_a_transport_error() {
    let server = MockServer::start().await;
    let url = format!("{}/hook", server.uri());
    drop(server);

    let err = notify(url, "POST").await.expect_err("closed port must fail");
    assert!(matches!(err, NotifyError::Transport { .. }), "{err:?}");
}
