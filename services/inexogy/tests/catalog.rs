mod common;

use common::MockHttpSend;
use metersign_core::{Context, ErrorKind};
use metersign_inexogy::{
    Client, Config, Endpoint, MeterType, NormalizedReading, StaticCredentialProvider,
};
use pretty_assertions::assert_eq;
use std::path::Path;
use std::time::Duration;

const BASE_URL: &str = "https://api.example.com/public/v1";

fn catalog_body() -> String {
    serde_json::json!([
        {
            "meterId": "m1",
            "serialNumber": 12345678,
            "fullSerialNumber": "ABCD1234EFGH",
            "measurementType": "ELECTRICITY",
            "location": {
                "street": "Musterstraße",
                "streetNumber": "7",
                "zip": "04109",
                "city": "Leipzig",
                "country": "DE"
            },
            "firstMeasurementTime": 1_634_704_029_042i64,
            "lastMeasurementTime": 1_634_790_429_042i64
        },
        {
            "meterId": "m2-rlm",
            "serialNumber": "87654321",
            "fullSerialNumber": "WXYZ8765HGFE",
            "measurementType": "RLM"
        }
    ])
    .to_string()
}

fn client_with(mock: &MockHttpSend, cache_dir: &Path) -> Client {
    let ctx = Context::new().with_http_send(mock.clone());
    let config = Config {
        client: Some("my-app".to_string()),
        email: Some("user@example.com".to_string()),
        password: Some("password-1".to_string()),
        base_url: BASE_URL.to_string(),
        cache_dir: Some(cache_dir.to_string_lossy().into_owned()),
        ..Default::default()
    };

    Client::with_provider(
        config,
        ctx,
        StaticCredentialProvider::new("consumer-key", "consumer-secret", "token", "token-secret"),
    )
    .unwrap()
}

#[tokio::test]
async fn test_catalog_fetch_is_signed_and_cached() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let mock = MockHttpSend::with_responses(&[(200, &catalog_body())]);
    let client = client_with(&mock, dir.path());

    let meters = client.meters().await.unwrap();
    assert_eq!(meters.len(), 2);
    assert_eq!(meters[0].meter_id, "m1");
    assert_eq!(meters[1].meter_type(), MeterType::Rlm);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].uri, format!("{BASE_URL}/meters"));

    let auth = requests[0].header("authorization").unwrap();
    assert!(auth.starts_with("OAuth "));
    assert!(auth.contains(r#"oauth_token="token""#));
    assert!(auth.contains("oauth_signature="));
    assert_eq!(
        requests[0].header("content-type").unwrap(),
        "application/json"
    );

    // Memoized in memory: no further transport calls for this client.
    client.meters().await.unwrap();
    assert_eq!(mock.requests().len(), 1);

    // A second process over the same cache directory reads from disk.
    let offline = MockHttpSend::default();
    let second = client_with(&offline, dir.path());
    let cached = second.meters().await.unwrap();
    assert_eq!(cached.len(), 2);
    assert!(offline.requests().is_empty());
}

#[tokio::test]
async fn test_meter_lookup_tries_all_identifiers() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockHttpSend::with_responses(&[(200, &catalog_body())]);
    let client = client_with(&mock, dir.path());

    let by_full = client.meter("ABCD1234EFGH").await.unwrap();
    let by_id = client.meter("m1").await.unwrap();
    let by_serial = client.meter("12345678").await.unwrap();
    // Trailing-8 match tolerates a differing manufacturer prefix.
    let by_suffix = client.meter("ZZZZ1234EFGH").await.unwrap();

    for meter in [&by_id, &by_serial, &by_suffix] {
        assert_eq!(meter.meter_id, by_full.meter_id);
    }

    let err = client.meter("no-such-meter").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MeterNotFound);
}

#[tokio::test(start_paused = true)]
async fn test_empty_catalog_exhausts_retries() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockHttpSend::always(200, "[]");
    let client = client_with(&mock, dir.path());

    let started = tokio::time::Instant::now();
    let err = client.meters().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CatalogUnavailable);
    assert_eq!(mock.requests().len(), 5);

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10), "elapsed: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(11), "elapsed: {elapsed:?}");

    // Nothing usable was produced: no catalog entry, no leftover lock.
    let leftovers: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".meters."))
        .collect();
    assert!(leftovers.is_empty(), "found: {leftovers:?}");
}

#[tokio::test]
async fn test_undecodable_catalog_retries_with_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockHttpSend::with_responses(&[(503, "Bad Gateway"), (200, &catalog_body())]);
    let client = client_with(&mock, dir.path());

    tokio::time::pause();
    let meters = client.meters().await.unwrap();

    assert_eq!(meters.len(), 2);
    assert_eq!(mock.requests().len(), 2);
}

#[tokio::test]
async fn test_get_path_escape_hatch() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockHttpSend::with_responses(&[(200, r#"{"code":"1234"}"#)]);
    let client = client_with(&mock, dir.path());

    let value = client
        .get_path("website_access_code", &[("email", "user@example.com")])
        .await
        .unwrap();

    assert_eq!(value["code"], "1234");
    assert_eq!(
        mock.requests()[0].uri,
        format!("{BASE_URL}/website_access_code?email=user%40example.com")
    );
}

#[tokio::test]
async fn test_readings_are_typed_and_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let mock = MockHttpSend::with_responses(&[
        (200, &catalog_body()),
        (
            200,
            r#"[{"time": 1634704029042, "values": {"power": 2500000.0, "energy": 12340000000.0}}]"#,
        ),
    ]);
    let client = client_with(&mock, dir.path());

    let meter = client.meter("m1").await.unwrap();
    let readings = client
        .readings(
            &meter.meter_id,
            &[("resolution", "raw"), ("from", "1634700000000")],
        )
        .await
        .unwrap();

    assert_eq!(readings.len(), 1);

    let normalized = NormalizedReading::derive(&readings[0], meter.meter_type());
    assert_eq!(normalized.power_kw, Some(2.5));
    assert_eq!(normalized.energy_kwh, Some(1.234));

    let uri = &mock.requests()[1].uri;
    assert!(uri.starts_with(&format!("{BASE_URL}/{}?", Endpoint::Readings.path())));
    assert!(uri.contains("meterId=m1"));
    assert!(uri.contains("resolution=raw"));
    assert!(uri.contains("from=1634700000000"));
}
