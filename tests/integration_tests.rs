use serde_json::json;
use sms_core::mock::MockTransport;
use sms_core::*;
use sms_cheapglobalsms::CheapGlobalSmsConfig;
use sms_nexmo::NexmoConfig;
use sms_twilio::TwilioConfig;
use sms_voxbone::VoxboneConfig;
use sms_web_generic::WebhookProcessor;
use smsgate::{AppConfig, DriverManager};
use std::sync::Arc;

const TWILIO_URL: &str = "https://sms.example.com/webhooks/twilio";

fn config() -> AppConfig {
    let mut config = AppConfig::default();

    let mut twilio = TwilioConfig::new("AC123", "twilio-token");
    twilio.from = Some("+15557654321".into());
    twilio.verify = true;
    twilio.base_url = Some("https://twilio.test".into());
    config.providers.twilio = Some(twilio);

    let mut nexmo = NexmoConfig::new("key", "secret");
    nexmo.base_url = Some("https://nexmo.test".into());
    config.providers.nexmo = Some(nexmo);

    let mut voxbone = VoxboneConfig::new("user", "pass");
    voxbone.base_url = Some("https://voxbone.test".into());
    config.providers.voxbone = Some(voxbone);

    let mut cheap = CheapGlobalSmsConfig::new("acct", "pw");
    cheap.sender_id = Some("ACME".into());
    cheap.base_url = Some("https://cheap.test".into());
    config.providers.cheapglobalsms = Some(cheap);

    config
}

fn manager(mock: &MockTransport) -> DriverManager {
    DriverManager::new(config(), Arc::new(mock.clone()))
}

fn twilio_message(sid: &str) -> serde_json::Value {
    json!({
        "sid": sid,
        "from": "+15550001111",
        "to": "+15557654321",
        "body": "Reply",
        "date_sent": "Wed, 18 Aug 2010 20:01:40 +0000",
        "status": "received"
    })
}

fn nexmo_accepted(id: &str) -> RawResponse {
    RawResponse::json(
        200,
        &json!({"message-count": "1", "messages": [{"message-id": id, "status": "0"}]}),
    )
}

fn signed_twilio_webhook(body: &str) -> (Headers, Vec<u8>) {
    let unsigned = WebhookRequest::from_form(TWILIO_URL, vec![], body).unwrap();
    let signature = UrlParamsSha1::new("twilio-token").sign(&unsigned).unwrap();
    (
        vec![
            (
                "content-type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ),
            ("X-Twilio-Signature".to_string(), signature),
        ],
        body.as_bytes().to_vec(),
    )
}

#[tokio::test]
async fn per_recipient_driver_makes_one_call_per_recipient() {
    let mock = MockTransport::always(nexmo_accepted("0A01"));
    let nexmo = manager(&mock).driver("nexmo").unwrap();
    assert_eq!(nexmo.dispatch_policy(), DispatchPolicy::PerRecipient);

    let message = OutgoingMessage::builder()
        .from("Acme")
        .to_all(["+15551230001", "+15551230002", "+15551230003"])
        .text("Same body")
        .build()
        .unwrap();
    let report = nexmo.send(message).await.unwrap();

    assert_eq!(report.receipts.len(), 3);
    let requests = mock.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.body.get("text") == Some("Same body")));
}

#[tokio::test]
async fn batch_driver_makes_a_single_call() {
    let mock = MockTransport::always(RawResponse::json(200, &json!({"batch_id": 9})));
    let cheap = manager(&mock).driver("cheapglobalsms").unwrap();
    assert_eq!(cheap.dispatch_policy(), DispatchPolicy::Batch);

    let message = OutgoingMessage::builder()
        .to_all(["639170000001", "639170000002"])
        .text("Promo")
        .build()
        .unwrap();
    let report = cheap.send(message).await.unwrap();

    assert_eq!(report.receipts.len(), 2);
    assert_eq!(mock.request_count(), 1);
    assert_eq!(mock.requests()[0].body.get("message"), Some("Promo"));
}

#[tokio::test]
async fn tampered_signature_is_rejected_before_parsing() {
    let mock = MockTransport::new();
    let processor = WebhookProcessor::new(manager(&mock).registry().unwrap());
    let (mut headers, body) =
        signed_twilio_webhook("MessageSid=SM1&From=%2B15550001111&To=%2B15557654321&Body=Hi");
    headers[1].1 = "AAAAAAAAAAAAAAAAAAAAAAAAAAA=".to_string();

    let response = processor.process_webhook("twilio", TWILIO_URL, headers, &body);
    assert_eq!(response.status.as_u16(), 401);
    assert!(!response.body.contains("SM1"));
}

#[tokio::test]
async fn signed_webhook_is_normalized() {
    let mock = MockTransport::new();
    let processor = WebhookProcessor::new(manager(&mock).registry().unwrap());
    let (headers, body) =
        signed_twilio_webhook("MessageSid=SM1&From=%2B15550001111&To=%2B15557654321&Body=Hi");

    let response = processor.process_webhook("twilio", TWILIO_URL, headers, &body);
    assert_eq!(response.status.as_u16(), 200);
    let message: serde_json::Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(message["id"], "SM1");
    assert_eq!(message["from"], "+15550001111");
    assert_eq!(message["message"], "Hi");
}

#[tokio::test]
async fn unverified_driver_accepts_any_signature() {
    let mock = MockTransport::new();
    let processor = WebhookProcessor::new(manager(&mock).registry().unwrap());
    let headers: Headers = vec![("X-Signature".to_string(), "bogus".to_string())];

    let response = processor.process_webhook(
        "nexmo",
        "https://sms.example.com/webhooks/nexmo",
        headers,
        b"msisdn=15550001111&to=15557654321&messageId=0A9&text=Hi",
    );
    assert_eq!(response.status.as_u16(), 200);
}

#[tokio::test]
async fn single_recipient_round_trip() {
    let mock = MockTransport::always(RawResponse::json(201, &twilio_message("SM42")));
    let twilio = manager(&mock).default().unwrap();
    assert_eq!(twilio.provider(), "twilio");

    let message = OutgoingMessage::builder()
        .from("+15557654321")
        .to("+15551234567")
        .text("Hello")
        .build()
        .unwrap();
    let report = twilio.send(message).await.unwrap();

    assert_eq!(report.receipts, vec![Receipt::new("+15551234567", "SM42")]);
    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body.get("To"), Some("+15551234567"));
    assert_eq!(requests[0].body.get("From"), Some("+15557654321"));
}

#[tokio::test]
async fn provider_error_document_is_a_rejection() {
    let mock = MockTransport::always(RawResponse::json(
        200,
        &json!({"messages":[{"status":"1","error-text":"Bad number"}]}),
    ));
    let nexmo = manager(&mock).driver("nexmo").unwrap();
    let message = OutgoingMessage::builder()
        .from("Acme")
        .to("+15551234567")
        .text("Hello")
        .build()
        .unwrap();

    match nexmo.send(message).await {
        Err(SmsError::ProviderRejection { code, message }) => {
            assert_eq!(code, "1");
            assert_eq!(message, "Bad number");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let mock = MockTransport::always(RawResponse::json(
        404,
        &json!({"code": 20404, "message": "The requested resource was not found", "status": 404}),
    ));
    let manager = manager(&mock);
    assert!(matches!(
        manager.driver("twilio").unwrap().get_message("SMnope").await,
        Err(SmsError::NotFound(_))
    ));

    let empty = MockTransport::always(RawResponse::new(200, ""));
    let nexmo = DriverManager::new(config(), Arc::new(empty))
        .driver("nexmo")
        .unwrap();
    assert!(matches!(
        nexmo.get_message("nope").await,
        Err(SmsError::NotFound(_))
    ));
}

#[tokio::test]
async fn check_messages_returns_the_requested_window() {
    let page: Vec<_> = (0..5).map(|i| twilio_message(&format!("SM{i}"))).collect();
    let mock = MockTransport::always(RawResponse::json(200, &json!({ "messages": page })));
    let twilio = manager(&mock).driver("twilio").unwrap();

    let messages = twilio
        .check_messages(MessageWindow::new(10, 15).unwrap())
        .await
        .unwrap();

    assert!(messages.len() <= 5);
    for message in &messages {
        assert!(!message.id().is_empty());
        assert!(!message.from().is_empty());
        assert!(!message.to().is_empty());
        assert!(!message.message().is_empty());
    }
    assert_eq!(mock.requests()[0].body.get("PageSize"), Some("5"));
}

#[tokio::test]
async fn unsupported_history_maps_to_not_implemented() {
    let mock = MockTransport::new();
    let voxbone = manager(&mock).driver("voxbone").unwrap();
    let err = voxbone
        .check_messages(MessageWindow::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SmsError::Unsupported { .. }));
    assert_eq!(err.http_status().as_u16(), 501);
    assert_eq!(mock.request_count(), 0);
}

#[tokio::test]
async fn webhook_processor_unknown_provider() {
    let processor = WebhookProcessor::new(DriverRegistry::new());
    let response = processor.process_webhook("unknown-provider", "u", vec![], b"test payload");

    assert_eq!(response.status.as_u16(), 404);
    assert_eq!(response.content_type, "application/json");
    assert!(response.body.contains("unknown provider"));
}

#[tokio::test]
async fn webhook_processor_concurrent_requests() {
    use futures::future;

    let mock = MockTransport::new();
    let processor = WebhookProcessor::new(manager(&mock).registry().unwrap());

    let futures = (0..10).map(|i| {
        let processor = processor.clone();
        let body = format!("msisdn=1555000{i}&to=15557654321&messageId=id-{i}&text=hello");
        async move {
            processor.process_webhook(
                "nexmo",
                "https://sms.example.com/webhooks/nexmo",
                vec![],
                body.as_bytes(),
            )
        }
    });

    let responses = future::join_all(futures).await;
    assert_eq!(responses.len(), 10);
    for response in responses {
        assert_eq!(response.status.as_u16(), 200);
    }
}
