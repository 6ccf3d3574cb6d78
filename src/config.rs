// config.rs

use std::net::Ipv4Addr;

use anyhow::bail;
use serde::Deserialize;

/// Device configuration, loaded once at process start and immutable for the
/// process lifetime. Every field is required; a missing or malformed key is
/// fatal before any network or hardware action is attempted.
#[derive(Clone, Debug, Deserialize)]
pub struct AgentConfig {
    pub device_name: String,

    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub wifi_ip: Ipv4Addr,
    pub wifi_mask: Ipv4Addr,
    pub wifi_gateway: Ipv4Addr,
    pub wifi_dns: Ipv4Addr,

    pub mqtt_server: String,
    pub mqtt_user: String,
    pub mqtt_pass: String,
    pub mqtt_temp_topic: String,

    /// Wake interval in minutes.
    pub wakeup_period: u32,
}

impl AgentConfig {
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let config: AgentConfig = serde_json::from_str(raw)?;
        if config.wakeup_period == 0 {
            bail!("wakeup_period must be at least 1 minute");
        }
        Ok(config)
    }
}


// EOF
