use bridge_config::Binding;
use clock::MockClock;
use clock::Timestamp;
use futures::channel::mpsc;
use mockito::Matcher;
use mockito::Mock;
use mqtt_channel::Message;
use mqtt_channel::Topic;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thingspeak_bridge::*;
use time::OffsetDateTime;

const BULK_UPDATE_PATH: &str = "/channels/42/bulk_update.json";

#[tokio::test]
async fn a_complete_batch_is_sent_once_the_min_interval_elapsed() {
    let mut server = mockito::Server::new_async().await;
    let endpoint = server
        .mock("POST", BULK_UPDATE_PATH)
        .match_body(Matcher::Json(json!({
            "write_api_key": "XXXX",
            "updates": [{"field1": 22.0, "field2": 55.0, "delta_t": 16}]
        })))
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let mut bridge = bridge(&server, clock_reading(vec![0, 0, 5, 16]));
    let (sender, receiver) = mpsc::unbounded();
    sender.unbounded_send(reading("sensors/temp", "21.5")).unwrap();
    sender.unbounded_send(reading("sensors/humidity", "55.0")).unwrap();
    sender.unbounded_send(reading("sensors/temp", "22.0")).unwrap();
    drop(sender);

    let outcome = bridge.run(receiver).await;

    // The bridge stops when the MQTT channel is closed
    assert!(outcome.is_err());
    endpoint.assert_async().await;
    assert!(bridge.batch().is_empty());
}

#[tokio::test]
async fn a_rejected_batch_is_not_sent_again() {
    let mut server = mockito::Server::new_async().await;
    let rejected = server
        .mock("POST", BULK_UPDATE_PATH)
        .match_body(Matcher::Json(json!({
            "write_api_key": "XXXX",
            "updates": [{"field1": 21.5, "field2": 55.0, "delta_t": 20}]
        })))
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("POST", BULK_UPDATE_PATH)
        .match_body(Matcher::Json(json!({
            "write_api_key": "XXXX",
            "updates": [{"field1": 22.0, "field2": 56.0, "delta_t": 20}]
        })))
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let mut bridge = bridge(&server, clock_reading(vec![0, 0, 20, 21, 40]));
    let (sender, receiver) = mpsc::unbounded();
    sender.unbounded_send(reading("sensors/temp", "21.5")).unwrap();
    sender.unbounded_send(reading("sensors/humidity", "55.0")).unwrap();
    sender.unbounded_send(reading("sensors/temp", "22.0")).unwrap();
    sender.unbounded_send(reading("sensors/humidity", "56.0")).unwrap();
    drop(sender);

    let _ = bridge.run(receiver).await;

    rejected.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn invalid_and_unbound_readings_do_not_alter_the_batch() {
    let mut server = mockito::Server::new_async().await;
    let endpoint = server
        .mock("POST", BULK_UPDATE_PATH)
        .match_body(Matcher::Json(json!({
            "write_api_key": "XXXX",
            "updates": [{"field1": 21.5, "field2": 55.0, "delta_t": 30}]
        })))
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let mut bridge = bridge(&server, clock_reading(vec![0, 1, 2, 3, 4, 30]));
    let (sender, receiver) = mpsc::unbounded();
    sender.unbounded_send(reading("sensors/temp", "21.5")).unwrap();
    sender.unbounded_send(reading("sensors/temp", "too hot")).unwrap();
    sender.unbounded_send(reading("sensors/pressure", "1013.2")).unwrap();
    sender
        .unbounded_send(Message::new(&Topic::new_unchecked("sensors/humidity"), &b"\xff"[..]))
        .unwrap();
    sender.unbounded_send(reading("sensors/humidity", "55.0")).unwrap();
    drop(sender);

    let _ = bridge.run(receiver).await;

    endpoint.assert_async().await;
}

#[tokio::test]
async fn without_periodic_check_an_idle_bridge_never_sends_its_batch() {
    let mut server = mockito::Server::new_async().await;
    let endpoint = server
        .mock("POST", BULK_UPDATE_PATH)
        .expect(0)
        .create_async()
        .await;

    // The clock says that more than max_interval elapsed since the only reading
    let mut bridge = bridge(&server, clock_reading(vec![0, 10, 601]));
    let (sender, receiver) = mpsc::unbounded();
    sender.unbounded_send(reading("sensors/temp", "21.5")).unwrap();

    let bridge_task = tokio::spawn(async move { bridge.run(receiver).await });
    tokio::time::sleep(Duration::from_millis(300)).await;

    endpoint.assert_async().await;
    bridge_task.abort();
    drop(sender);
}

#[tokio::test]
async fn a_periodic_check_sends_a_stale_batch() {
    let mut server = mockito::Server::new_async().await;
    let endpoint = server
        .mock("POST", BULK_UPDATE_PATH)
        .match_body(Matcher::Json(json!({
            "write_api_key": "XXXX",
            "updates": [{"field1": 21.5, "delta_t": 601}]
        })))
        .with_status(202)
        .expect(1)
        .create_async()
        .await;

    let mut bridge = bridge(&server, clock_reading(vec![0, 10, 601]))
        .with_flush_check_interval(Some(Duration::from_millis(50)));
    let (sender, receiver) = mpsc::unbounded();
    sender.unbounded_send(reading("sensors/temp", "21.5")).unwrap();

    let bridge_task = tokio::spawn(async move { bridge.run(receiver).await });
    wait_until_matched(&endpoint).await;

    // Later checks find an empty batch and send nothing
    tokio::time::sleep(Duration::from_millis(200)).await;
    endpoint.assert_async().await;

    bridge_task.abort();
    drop(sender);
}

fn at(seconds: i64) -> Timestamp {
    OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(seconds)
}

/// A clock returning the given times, in seconds, then sticking to the last one
fn clock_reading(times: Vec<i64>) -> MockClock {
    let mut times = times.into_iter().map(at);
    let mut last = at(0);
    let mut clock = MockClock::new();
    clock.expect_now().returning(move || {
        if let Some(time) = times.next() {
            last = time;
        }
        last
    });
    clock
}

fn bridge(server: &mockito::Server, clock: MockClock) -> Bridge {
    let topic_map = TopicMap::try_new(vec![
        Binding::new("sensors/temp", "field1"),
        Binding::new("sensors/humidity", "field2"),
    ])
    .unwrap();
    let policy = FlushPolicy::try_new(
        topic_map.expected_field_count(),
        Duration::from_secs(15),
        Duration::from_secs(600),
    )
    .unwrap();
    let url = format!("{}{}", server.url(), BULK_UPDATE_PATH).parse().unwrap();
    let client = ThingSpeakClient::try_new(url, Duration::from_secs(5)).unwrap();
    let gateway = DispatchGateway::new("XXXX", Box::new(client));

    Bridge::new(topic_map, policy, gateway, Arc::new(clock))
}

fn reading(topic: &str, payload: &str) -> Message {
    Message::new(&Topic::new_unchecked(topic), payload)
}

async fn wait_until_matched(endpoint: &Mock) {
    for _ in 0..100 {
        if endpoint.matched_async().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("No bulk update received");
}
