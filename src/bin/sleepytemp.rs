// bin/sleepytemp.rs

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use esp_idf_hal::{
        delay::{Ets, FreeRtos},
        gpio::{self, Pull},
        prelude::Peripherals,
    };
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
    use log::*;
    use sleepytemp::*;

    // the drift-corrected sleep is computed against this reference, so it
    // is captured before anything else runs
    let clock = EspWakeClock::new();

    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    info!("sleepytemp v{FW_VERSION} waking up");

    // the only fatal condition: no valid configuration, halt before any
    // network or hardware action
    let config = AgentConfig::from_json(include_str!("../../config.json"))?;

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    #[cfg(feature = "esp32c3")]
    let onewire_pin = pins.gpio0;
    #[cfg(feature = "esp32s")]
    let onewire_pin = pins.gpio4;

    let mut pin_drv = gpio::PinDriver::input_output_od(onewire_pin)?;
    pin_drv.set_pull(Pull::Up)?;

    let station = EspStation::new(peripherals.modem, sysloop, nvs, &config)?;
    let mut connector = NetworkConnector::new(station, FreeRtos);

    let bus = match OneWireTempBus::new(pin_drv, Ets) {
        Ok(bus) => bus,
        Err(e) => bail!("one-wire bus setup failed: {e:?}"),
    };
    let mut reader = SensorReader::new(bus, FreeRtos);

    let mut publisher = TelemetryPublisher::new(
        EspBrokerLink::new(&config),
        config.mqtt_temp_topic.clone(),
    );

    run_cycle(
        config.wakeup_period,
        &mut connector,
        &mut reader,
        &mut publisher,
        &clock,
        &mut EspDeepSleep,
    );

    // run_cycle ends in deep sleep; the alarm restarts the process
    unreachable!("returned from deep sleep");
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!("sleepytemp runs on esp32 hardware; build for an espidf target");
}

// EOF
