// mqtt.rs

use log::*;
use serde::Serialize;

/// The single-field payload served retained by the broker.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct TempReport {
    pub temp: f32,
}

/// One short-lived broker session per cycle: open, publish retained, close.
pub trait BrokerLink {
    type Error;

    fn open(&mut self) -> Result<(), Self::Error>;
    /// Publish `payload` on `topic` with the retained flag set.
    fn send(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;
    /// Tear the session down; must be safe to call whether or not `open`
    /// succeeded.
    fn close(&mut self);
}

#[derive(Debug)]
pub enum PublishError<E> {
    Session(E),
    Encode(serde_json::Error),
    Send(E),
}

pub struct TelemetryPublisher<L> {
    link: L,
    topic: String,
}

impl<L> TelemetryPublisher<L>
where
    L: BrokerLink,
{
    pub fn new(link: L, topic: String) -> Self {
        TelemetryPublisher { link, topic }
    }

    /// Publish one retained reading. The session is closed unconditionally
    /// afterwards, success or not; no session outlives the cycle.
    pub fn publish(&mut self, reading: f32) -> Result<(), PublishError<L::Error>> {
        let payload = match serde_json::to_vec(&TempReport { temp: reading }) {
            Ok(p) => p,
            Err(e) => return Err(PublishError::Encode(e)),
        };

        let result = match self.link.open() {
            Err(e) => Err(PublishError::Session(e)),
            Ok(()) => self
                .link
                .send(&self.topic, &payload)
                .map_err(PublishError::Send),
        };
        self.link.close();

        if result.is_ok() {
            info!("Message published in topic {}", self.topic);
        }
        result
    }

    pub fn link(&self) -> &L {
        &self.link
    }
}

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::mqtt::client::{EspMqttClient, MqttClientConfiguration, QoS};
    use log::*;

    use super::BrokerLink;
    use crate::AgentConfig;

    /// Blocking MQTT session against the configured broker. The client is
    /// created on `open` and dropped on `close`; the device identity is the
    /// client id.
    pub struct EspBrokerLink {
        url: String,
        client_id: String,
        username: String,
        password: String,
        session: Option<EspMqttClient<'static>>,
    }

    impl EspBrokerLink {
        pub fn new(config: &AgentConfig) -> Self {
            EspBrokerLink {
                url: format!("mqtt://{}", config.mqtt_server),
                client_id: config.device_name.clone(),
                username: config.mqtt_user.clone(),
                password: config.mqtt_pass.clone(),
                session: None,
            }
        }
    }

    impl BrokerLink for EspBrokerLink {
        type Error = anyhow::Error;

        fn open(&mut self) -> anyhow::Result<()> {
            let client = EspMqttClient::new_cb(
                &self.url,
                &MqttClientConfiguration {
                    client_id: Some(&self.client_id),
                    username: Some(&self.username),
                    password: Some(&self.password),
                    ..Default::default()
                },
                |event| debug!("MQTT event: {:?}", event.payload()),
            )?;
            self.session = Some(client);
            Ok(())
        }

        fn send(&mut self, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
            match self.session.as_mut() {
                Some(client) => {
                    // QoS left at broker default level, retained so the
                    // broker serves the last value to new subscribers
                    client.publish(topic, QoS::AtMostOnce, true, payload)?;
                    Ok(())
                }
                None => anyhow::bail!("no open MQTT session"),
            }
        }

        fn close(&mut self) {
            // dropping the client disconnects
            self.session = None;
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::EspBrokerLink;


// EOF
