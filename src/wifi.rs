// wifi.rs

use std::net::Ipv4Addr;

use embedded_hal::blocking::delay::DelayMs;
use log::*;

pub const JOIN_POLL_INTERVAL_MS: u16 = 1000;
pub const DEFAULT_JOIN_TIMEOUT_S: u32 = 20;

/// Managed station interface. Credentials and the static address are bound
/// when the concrete station is constructed, so joining takes no arguments.
pub trait Station {
    type Error;

    /// Power up the interface and apply the configured static address.
    fn activate(&mut self) -> Result<(), Self::Error>;
    /// Start associating with the configured access point. Non-blocking;
    /// progress is observed through `is_associated`.
    fn join(&mut self) -> Result<(), Self::Error>;
    fn is_associated(&mut self) -> Result<bool, Self::Error>;
    fn leave(&mut self) -> Result<(), Self::Error>;
    fn deactivate(&mut self) -> Result<(), Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    Connected,
    TimedOut,
}

/// Brings the station up for one duty cycle and tears it down afterwards.
/// The association flag is owned here; other components may only observe it
/// through `is_connected`.
pub struct NetworkConnector<S, D> {
    station: S,
    delay: D,
    connected: bool,
}

impl<S, D> NetworkConnector<S, D>
where
    S: Station,
    D: DelayMs<u16>,
{
    pub fn new(station: S, delay: D) -> Self {
        NetworkConnector {
            station,
            delay,
            connected: false,
        }
    }

    /// Join the configured network, polling association once per second for
    /// at most `timeout_s` attempts. Exhausting the budget disassociates,
    /// deactivates the interface and reports `TimedOut`; the cycle goes on
    /// and the next wake is the retry.
    pub fn connect(&mut self, timeout_s: u32) -> Result<LinkStatus, S::Error> {
        self.station.activate()?;
        self.station.join()?;

        info!("Connecting to wifi...");
        for _ in 0..timeout_s {
            self.delay.delay_ms(JOIN_POLL_INTERVAL_MS);
            if self.station.is_associated()? {
                self.connected = true;
                info!("Connected to wifi");
                return Ok(LinkStatus::Connected);
            }
        }

        warn!("Wifi connection could NOT be established within {timeout_s}s");
        self.disconnect()?;
        Ok(LinkStatus::TimedOut)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Idempotent: disassociates only if currently associated, then
    /// deactivates the interface unconditionally. Safe from any state.
    pub fn disconnect(&mut self) -> Result<(), S::Error> {
        if self.connected {
            self.station.leave()?;
            self.connected = false;
        }
        self.station.deactivate()?;
        info!("Wifi disconnected");
        Ok(())
    }
}

/// Prefix length of a dotted-quad netmask, e.g. 255.255.255.0 -> 24.
pub fn netmask_prefix(mask: Ipv4Addr) -> u8 {
    u32::from_be_bytes(mask.octets()).count_ones() as u8
}

#[cfg(target_os = "espidf")]
mod esp {
    use anyhow::anyhow;
    use embedded_svc::wifi::{ClientConfiguration, Configuration};
    use esp_idf_hal::modem::Modem;
    use esp_idf_svc::{
        eventloop::EspSystemEventLoop,
        ipv4,
        netif::{self, EspNetif},
        nvs::EspDefaultNvsPartition,
        wifi::{EspWifi, WifiDriver},
    };

    use super::{netmask_prefix, Station};
    use crate::AgentConfig;

    pub struct EspStation<'d> {
        wifi: EspWifi<'d>,
        ssid: String,
        pass: String,
    }

    impl<'d> EspStation<'d> {
        pub fn new(
            modem: Modem,
            sysloop: EspSystemEventLoop,
            nvs: EspDefaultNvsPartition,
            config: &AgentConfig,
        ) -> anyhow::Result<Self> {
            let driver = WifiDriver::new(modem, sysloop, Some(nvs))?;

            let sta_netif = EspNetif::new_with_conf(&netif::NetifConfiguration {
                ip_configuration: ipv4::Configuration::Client(ipv4::ClientConfiguration::Fixed(
                    ipv4::ClientSettings {
                        ip: config.wifi_ip,
                        subnet: ipv4::Subnet {
                            gateway: config.wifi_gateway,
                            mask: ipv4::Mask(netmask_prefix(config.wifi_mask)),
                        },
                        dns: Some(config.wifi_dns),
                        secondary_dns: None,
                    },
                )),
                ..netif::NetifConfiguration::wifi_default_client()
            })?;

            let wifi = EspWifi::wrap_all(
                driver,
                sta_netif,
                EspNetif::new(netif::NetifStack::Ap)?,
            )?;

            Ok(EspStation {
                wifi,
                ssid: config.wifi_ssid.clone(),
                pass: config.wifi_pass.clone(),
            })
        }
    }

    impl Station for EspStation<'_> {
        type Error = anyhow::Error;

        fn activate(&mut self) -> anyhow::Result<()> {
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration {
                    ssid: self
                        .ssid
                        .as_str()
                        .try_into()
                        .map_err(|_| anyhow!("SSID too long"))?,
                    password: self
                        .pass
                        .as_str()
                        .try_into()
                        .map_err(|_| anyhow!("passphrase too long"))?,
                    ..Default::default()
                }))?;
            Ok(self.wifi.start()?)
        }

        fn join(&mut self) -> anyhow::Result<()> {
            Ok(self.wifi.connect()?)
        }

        fn is_associated(&mut self) -> anyhow::Result<bool> {
            Ok(self.wifi.is_connected()?)
        }

        fn leave(&mut self) -> anyhow::Result<()> {
            Ok(self.wifi.disconnect()?)
        }

        fn deactivate(&mut self) -> anyhow::Result<()> {
            Ok(self.wifi.stop()?)
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::EspStation;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct FakeStation {
        associate_after: Option<u32>,
        polls: u32,
        active: bool,
        joined: bool,
        left: u32,
    }

    impl Station for FakeStation {
        type Error = ();

        fn activate(&mut self) -> Result<(), ()> {
            self.active = true;
            Ok(())
        }

        fn join(&mut self) -> Result<(), ()> {
            self.joined = true;
            Ok(())
        }

        fn is_associated(&mut self) -> Result<bool, ()> {
            self.polls += 1;
            Ok(matches!(self.associate_after, Some(n) if self.polls >= n))
        }

        fn leave(&mut self) -> Result<(), ()> {
            self.left += 1;
            Ok(())
        }

        fn deactivate(&mut self) -> Result<(), ()> {
            self.active = false;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_ms: u64,
    }

    impl DelayMs<u16> for CountingDelay {
        fn delay_ms(&mut self, ms: u16) {
            self.total_ms += u64::from(ms);
        }
    }

    #[test]
    fn join_succeeds_on_third_attempt() {
        let station = FakeStation {
            associate_after: Some(3),
            ..Default::default()
        };
        let mut conn = NetworkConnector::new(station, CountingDelay::default());

        assert_eq!(conn.connect(20).unwrap(), LinkStatus::Connected);
        assert!(conn.is_connected());
        assert_eq!(conn.station.polls, 3);
        assert_eq!(conn.delay.total_ms, 3000);
        assert!(conn.station.active);
    }

    #[test]
    fn join_budget_exhaustion_deactivates_interface() {
        let station = FakeStation::default();
        let mut conn = NetworkConnector::new(station, CountingDelay::default());

        assert_eq!(conn.connect(20).unwrap(), LinkStatus::TimedOut);
        assert!(!conn.is_connected());
        // exactly one poll per attempt, one second apart
        assert_eq!(conn.station.polls, 20);
        assert_eq!(conn.delay.total_ms, 20_000);
        // never associated, so no disassociation, but interface is down
        assert_eq!(conn.station.left, 0);
        assert!(!conn.station.active);
    }

    #[test]
    fn disconnect_without_prior_connect_is_a_noop() {
        let mut conn = NetworkConnector::new(FakeStation::default(), CountingDelay::default());
        conn.disconnect().unwrap();
        assert_eq!(conn.station.left, 0);
        assert!(!conn.station.active);
    }

    #[test]
    fn disconnect_after_connect_leaves_once() {
        let station = FakeStation {
            associate_after: Some(1),
            ..Default::default()
        };
        let mut conn = NetworkConnector::new(station, CountingDelay::default());
        conn.connect(20).unwrap();

        conn.disconnect().unwrap();
        conn.disconnect().unwrap();
        assert_eq!(conn.station.left, 1);
        assert!(!conn.is_connected());
    }

    #[test]
    fn netmask_prefix_of_dotted_quad() {
        assert_eq!(netmask_prefix(Ipv4Addr::new(255, 255, 255, 0)), 24);
        assert_eq!(netmask_prefix(Ipv4Addr::new(255, 255, 0, 0)), 16);
        assert_eq!(netmask_prefix(Ipv4Addr::new(255, 255, 255, 252)), 30);
    }
}

// EOF
