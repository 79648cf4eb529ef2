//! MQTT publish sink.
//!
//! Each reading is published as retained-or-not JSON under a per-device
//! topic. The sink itself only builds topics and payloads; the network
//! side lives behind the [`Publisher`] trait so the core stays testable
//! and the client library stays optional.

use crate::reading::Reading;
use crate::sink::{Sink, SinkError};
use serde_json::json;

/// Connection parameters for the MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_topic: String,
    pub retain: bool,
}

/// Minimal publish capability the sink depends on.
///
/// The real implementation wraps an MQTT client; tests substitute a
/// recording fake. `publish` must be a non-blocking enqueue: the trait is
/// called from the dispatch loop and must never stall it on the network.
pub trait Publisher: Send {
    /// Establish the outbound connection. Called once, from `Sink::open`.
    fn connect(&mut self) -> Result<(), SinkError>;

    /// Enqueue one message for delivery.
    fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), SinkError>;

    /// Tear the connection down. Safe to call when never connected.
    fn disconnect(&mut self) -> Result<(), SinkError>;
}

/// Sink publishing readings to `{base}/{room}/{device}/state`.
pub struct MqttSink {
    base_topic: String,
    retain: bool,
    publisher: Box<dyn Publisher>,
}

impl MqttSink {
    pub fn new(base_topic: &str, retain: bool, publisher: Box<dyn Publisher>) -> Self {
        MqttSink {
            base_topic: base_topic.trim_end_matches('/').to_string(),
            retain,
            publisher,
        }
    }

    /// Construct the sink backed by the bundled rumqttc client.
    #[cfg(feature = "mqtt")]
    pub fn with_rumqttc(config: MqttConfig) -> Self {
        let base_topic = config.base_topic.clone();
        let retain = config.retain;
        Self::new(&base_topic, retain, Box::new(RumqttcPublisher::new(config)))
    }
}

/// Topic segments come from the registry: location lowercased with spaces
/// collapsed to underscores, id uppercased with colons stripped.
fn topic(base: &str, reading: &Reading) -> String {
    let room = reading.location.replace(' ', "_").to_lowercase();
    let device = reading.id.replace(':', "").to_uppercase();
    format!("{base}/{room}/{device}/state")
}

/// Record JSON enriched with a `ts` (defaulted to now) and a `source` tag,
/// so consumers can tell these apart from other feeds on the broker.
fn payload(reading: &Reading) -> Result<Vec<u8>, SinkError> {
    let mut value = serde_json::to_value(reading)
        .map_err(|e| SinkError::Write(format!("serialize reading: {e}")))?;
    let map = value
        .as_object_mut()
        .expect("a reading serializes to an object");
    map.entry("ts")
        .or_insert_with(|| json!(crate::reading::epoch_seconds()));
    map.entry("source").or_insert_with(|| json!("ble"));
    serde_json::to_vec(&value).map_err(|e| SinkError::Write(format!("serialize payload: {e}")))
}

impl Sink for MqttSink {
    fn open(&mut self) -> Result<(), SinkError> {
        self.publisher.connect()
    }

    fn write(&mut self, reading: &Reading) -> Result<(), SinkError> {
        let topic = topic(&self.base_topic, reading);
        self.publisher.publish(&topic, payload(reading)?, self.retain)
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.publisher.disconnect()
    }
}

#[cfg(feature = "mqtt")]
pub use rumqttc_impl::RumqttcPublisher;

#[cfg(feature = "mqtt")]
mod rumqttc_impl {
    use super::{MqttConfig, Publisher};
    use crate::sink::SinkError;
    use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    /// Outstanding-request capacity of the client's internal queue.
    const REQUEST_CAPACITY: usize = 64;

    /// [`Publisher`] backed by a synchronous rumqttc client.
    ///
    /// `connect` blocks until the broker acknowledges the session, then
    /// hands the connection to a worker thread that drives the protocol
    /// (keep-alives, acks, reconnects). Publishes are enqueued with
    /// `try_publish` and never wait on the network.
    pub struct RumqttcPublisher {
        config: MqttConfig,
        client: Option<Client>,
        worker: Option<thread::JoinHandle<()>>,
        stop: Arc<AtomicBool>,
    }

    impl RumqttcPublisher {
        pub fn new(config: MqttConfig) -> Self {
            RumqttcPublisher {
                config,
                client: None,
                worker: None,
                stop: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl Publisher for RumqttcPublisher {
        fn connect(&mut self) -> Result<(), SinkError> {
            let client_id = format!("switchbot-{}", std::process::id());
            let mut options =
                MqttOptions::new(client_id, self.config.host.clone(), self.config.port);
            options.set_keep_alive(Duration::from_secs(60));
            if let Some(username) = &self.config.username {
                options.set_credentials(username, self.config.password.clone().unwrap_or_default());
            }

            let (client, mut connection) = Client::new(options, REQUEST_CAPACITY);

            // Wait for the broker to accept the session before reporting
            // the sink as open.
            let mut acked = false;
            for event in connection.iter() {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        acked = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(SinkError::Unavailable(format!(
                            "mqtt {}:{}: {e}",
                            self.config.host, self.config.port
                        )));
                    }
                }
            }
            if !acked {
                return Err(SinkError::Unavailable(format!(
                    "mqtt {}:{}: connection closed before acknowledgement",
                    self.config.host, self.config.port
                )));
            }

            let stop = Arc::clone(&self.stop);
            let worker = thread::Builder::new()
                .name("mqtt-worker".into())
                .spawn(move || {
                    for event in connection.iter() {
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        match event {
                            Ok(event) => log::trace!("mqtt event: {event:?}"),
                            Err(e) => {
                                log::warn!("mqtt connection error: {e}");
                                thread::sleep(Duration::from_secs(1));
                            }
                        }
                    }
                })
                .map_err(|e| SinkError::Unavailable(format!("mqtt worker: {e}")))?;

            self.client = Some(client);
            self.worker = Some(worker);
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), SinkError> {
            let Some(client) = self.client.as_ref() else {
                return Err(SinkError::Write("mqtt publisher is not connected".into()));
            };
            client
                .try_publish(topic, QoS::AtMostOnce, retain, payload)
                .map_err(|e| SinkError::Write(format!("mqtt publish: {e}")))
        }

        fn disconnect(&mut self) -> Result<(), SinkError> {
            self.stop.store(true, Ordering::Relaxed);
            if let Some(client) = self.client.take() {
                // Wakes the worker out of its blocking poll.
                let _ = client.disconnect();
            }
            if let Some(worker) = self.worker.take() {
                let _ = worker.join();
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::base_reading;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq)]
    enum Call {
        Connect,
        Publish(String, String, bool),
        Disconnect,
    }

    #[derive(Clone, Default)]
    struct FakePublisher {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl Publisher for FakePublisher {
        fn connect(&mut self) -> Result<(), SinkError> {
            self.calls.lock().unwrap().push(Call::Connect);
            Ok(())
        }

        fn publish(&mut self, topic: &str, payload: Vec<u8>, retain: bool) -> Result<(), SinkError> {
            self.calls.lock().unwrap().push(Call::Publish(
                topic.to_string(),
                String::from_utf8(payload).unwrap(),
                retain,
            ));
            Ok(())
        }

        fn disconnect(&mut self) -> Result<(), SinkError> {
            self.calls.lock().unwrap().push(Call::Disconnect);
            Ok(())
        }
    }

    fn publish_one(base_topic: &str, retain: bool, reading: &Reading) -> Vec<Call> {
        let publisher = FakePublisher::default();
        let calls = Arc::clone(&publisher.calls);
        let mut sink = MqttSink::new(base_topic, retain, Box::new(publisher));
        sink.open().unwrap();
        sink.write(reading).unwrap();
        sink.close().unwrap();
        drop(sink);
        Arc::try_unwrap(calls).unwrap().into_inner().unwrap()
    }

    #[test]
    fn test_lifecycle_and_topic() {
        let calls = publish_one("home/sensors", true, &base_reading());
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Call::Connect);
        assert_eq!(calls[2], Call::Disconnect);

        let Call::Publish(topic, _, retain) = &calls[1] else {
            panic!("expected a publish");
        };
        assert_eq!(topic, "home/sensors/living_room/HUB2/state");
        assert!(*retain);
    }

    #[test]
    fn test_topic_normalization() {
        let mut reading = base_reading();
        reading.location = "Green House".into();
        reading.id = "aa:bb:cc".into();
        let calls = publish_one("home/sensors/", false, &reading);

        let Call::Publish(topic, _, retain) = &calls[1] else {
            panic!("expected a publish");
        };
        // Trailing slash trimmed, room lowercased, colons stripped from id.
        assert_eq!(topic, "home/sensors/green_house/AABBCC/state");
        assert!(!*retain);
    }

    #[test]
    fn test_payload_is_enriched() {
        let calls = publish_one("home/sensors", false, &base_reading());
        let Call::Publish(_, payload, _) = &calls[1] else {
            panic!("expected a publish");
        };

        let value: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(value["temp"], 2.5);
        assert_eq!(value["source"], "ble");
        assert!(value["ts"].is_u64());
    }

    #[test]
    fn test_close_without_open_is_safe() {
        let publisher = FakePublisher::default();
        let calls = Arc::clone(&publisher.calls);
        let mut sink = MqttSink::new("home/sensors", false, Box::new(publisher));
        sink.close().unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![Call::Disconnect]);
    }
}
