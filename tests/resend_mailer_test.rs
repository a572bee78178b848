use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gigradar::app::ports::{MailSenderPort, OutgoingMail};
use gigradar::common::error::AlertError;
use gigradar::infra::ResendMailer;

fn mail() -> OutgoingMail {
    OutgoingMail {
        to: "ops@example.com".into(),
        subject: "GigRadar: 1 scraper(s) failed".into(),
        body: "Scraper: jfr".into(),
    }
}

#[tokio::test]
async fn test_posts_email_with_bearer_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(header("Authorization", "Bearer re_test"))
        .and(body_json(json!({
            "from": "Alerts <alerts@example.com>",
            "to": ["ops@example.com"],
            "subject": "GigRadar: 1 scraper(s) failed",
            "text": "Scraper: jfr",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "abc" })))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = ResendMailer::new(Some("re_test".into()))
        .with_from("Alerts <alerts@example.com>")
        .with_base_url(server.uri());

    mailer.send(&mail()).await.unwrap();
}

#[tokio::test]
async fn test_provider_error_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid from"))
        .expect(1)
        .mount(&server)
        .await;

    let mailer = ResendMailer::new(Some("re_test".into())).with_base_url(server.uri());
    let err = mailer.send(&mail()).await.unwrap_err();

    match err {
        AlertError::Transport(msg) => assert!(msg.contains("422")),
        other => panic!("expected transport failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_api_key_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mailer = ResendMailer::new(None).with_base_url(server.uri());
    let err = mailer.send(&mail()).await.unwrap_err();

    assert!(matches!(err, AlertError::ConfigMissing("RESEND_API_KEY")));
}
