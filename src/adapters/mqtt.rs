//! ESP-IDF MQTT publisher.
//!
//! Implements [`Publisher`] over `EspMqttClient`.  The client reconnects on
//! its own; a receiver thread drains the connection, tracks the session
//! state in an `AtomicBool` and turns `site/<id>/cmd/aim` messages into
//! [`AimCommand`]s on the [`CommandQueue`].
//!
//! ```text
//!   EspMqttConnection ──▶ mqtt-rx thread ──┬──▶ connected flag ──▶ LinkMonitor
//!                                          └──▶ CommandQueue (aim)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use esp_idf_svc::mqtt::client::{
    Details, EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use log::{info, warn};

use crate::aim::{AimCommand, CommandQueue};
use crate::app::ports::Publisher;
use crate::config::Qos;
use crate::drivers::task_pin::{self, Core};

/// Inbound messages larger than this are ignored.
const MAX_INBOUND_BYTES: usize = 256;

/// Broker endpoint and credentials.
pub struct BrokerSettings<'a> {
    pub url: &'a str,
    pub client_id: &'a str,
    pub username: Option<&'a str>,
    pub password: Option<&'a str>,
}

pub struct MqttPublisher {
    client: Mutex<EspMqttClient<'static>>,
    connected: AtomicBool,
}

fn qos(q: Qos) -> QoS {
    match q {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

impl MqttPublisher {
    /// Create the client and spawn the receiver thread.
    pub fn start(
        settings: &BrokerSettings<'_>,
        aim_topic: &str,
        commands: &'static CommandQueue,
    ) -> anyhow::Result<Arc<Self>> {
        let conf = MqttClientConfiguration {
            client_id: Some(settings.client_id),
            username: settings.username,
            password: settings.password,
            ..Default::default()
        };
        let (client, conn) = EspMqttClient::new(settings.url, &conf)?;
        let publisher = Arc::new(Self {
            client: Mutex::new(client),
            connected: AtomicBool::new(false),
        });
        info!("MQTT: client created for {}", settings.url);

        let rx = Arc::clone(&publisher);
        let topic = String::from(aim_topic);
        task_pin::spawn_on_core(Core::Pro, 5, 6, "mqtt-rx\0", move || {
            rx.receive_loop(conn, &topic, commands);
        })?;
        Ok(publisher)
    }

    fn subscribe(&self, topic: &str) {
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = client.subscribe(topic, QoS::AtMostOnce) {
            warn!("MQTT: subscribe to '{}' failed: {:?}", topic, e);
        }
    }

    fn receive_loop(&self, mut conn: EspMqttConnection, aim_topic: &str, commands: &CommandQueue) {
        loop {
            match conn.next() {
                Ok(event) => match event.payload() {
                    EventPayload::Connected(_) => {
                        self.connected.store(true, Ordering::Release);
                        info!("MQTT: connected");
                        self.subscribe(aim_topic);
                    }
                    EventPayload::Disconnected => {
                        self.connected.store(false, Ordering::Release);
                        warn!("MQTT: disconnected");
                    }
                    EventPayload::Received {
                        topic: Some(topic),
                        data,
                        details: Details::Complete,
                        ..
                    } if topic == aim_topic => {
                        if data.len() > MAX_INBOUND_BYTES {
                            warn!("MQTT: dropping oversized aim command ({} bytes)", data.len());
                            continue;
                        }
                        match AimCommand::parse(data) {
                            Some(cmd) => {
                                commands.send_aim(cmd);
                            }
                            None => warn!("MQTT: unparseable aim command"),
                        }
                    }
                    _ => {}
                },
                Err(e) => {
                    self.connected.store(false, Ordering::Release);
                    warn!("MQTT: receive loop error: {:?}", e);
                    std::thread::sleep(Duration::from_secs(2));
                }
            }
        }
    }
}

impl Publisher for MqttPublisher {
    fn publish(&self, topic: &str, payload: &str, q: Qos, retain: bool) -> bool {
        if !self.is_connected() {
            return false;
        }
        let mut client = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        match client.publish(topic, qos(q), retain, payload.as_bytes()) {
            Ok(_) => true,
            Err(e) => {
                warn!("MQTT: publish to '{}' failed: {:?}", topic, e);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
