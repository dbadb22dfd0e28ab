use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sms_core::mock::MockTransport;
use sms_core::*;
use sms_nexmo::NexmoConfig;
use sms_web_generic::WebhookProcessor;
use smsgate::{AppConfig, DriverManager};
use std::collections::BTreeMap;
use std::sync::Arc;

fn processor() -> WebhookProcessor {
    let mut config = AppConfig::default();
    config.providers.nexmo = Some(NexmoConfig::new("key", "secret"));
    let manager = DriverManager::new(config, Arc::new(MockTransport::new()));
    WebhookProcessor::new(manager.registry().unwrap())
}

fn benchmark_webhook_processing(c: &mut Criterion) {
    let processor = processor();

    let payload_sizes = vec![100, 1000, 10000];
    let mut group = c.benchmark_group("webhook_processing");

    for size in payload_sizes {
        let payload = format!(
            "msisdn=15550001111&to=15557654321&messageId=0A01&text={}",
            "x".repeat(size)
        );
        let headers: Headers = vec![(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        )];

        group.bench_with_input(
            BenchmarkId::new("process_webhook", size),
            &size,
            |b, &_size| {
                b.iter(|| {
                    black_box(processor.process_webhook(
                        "nexmo",
                        "https://sms.example.com/webhooks/nexmo",
                        headers.clone(),
                        payload.as_bytes(),
                    ))
                })
            },
        );
    }
    group.finish();
}

fn benchmark_request_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_building");

    let credentials = RequestBody::new()
        .with_field("api_key", "key")
        .with_field("api_secret", "secret");

    group.bench_function("merge_and_form_encode", |b| {
        b.iter(|| {
            let request = ApiCall::new("https://rest.nexmo.com")
                .call("/sms/json")
                .body(credentials.clone())
                .with_field("from", "Acme")
                .with_field("to", "15551234567")
                .with_field("text", "Hello there")
                .build();
            black_box(request.payload())
        })
    });

    group.finish();
}

fn benchmark_template_composition(c: &mut Criterion) {
    let mut group = c.benchmark_group("template_composition");

    let data: BTreeMap<String, String> = [("name", "Ada"), ("code", "123456")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let message = OutgoingMessage::builder()
        .to("+15551234567")
        .template("Hi {{ name }}, your code is {{ code }}.", data)
        .build()
        .unwrap();

    group.bench_function("compose_message", |b| {
        b.iter(|| black_box(message.compose_message()))
    });

    group.finish();
}

fn benchmark_configuration_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("configuration");

    group.bench_function("create_default", |b| {
        b.iter(|| black_box(AppConfig::default()))
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_webhook_processing,
    benchmark_request_building,
    benchmark_template_composition,
    benchmark_configuration_loading
);

criterion_main!(benches);
