// measure.rs

use embedded_hal::blocking::delay::DelayMs;
use log::*;

/// Hardware-mandated DS18B20 conversion latency at 12-bit resolution.
pub const CONVERSION_WAIT_MS: u16 = 750;

/// One-wire temperature bus as seen by the reader: broadcast a conversion,
/// enumerate addressed devices, read one back.
pub trait TempBus {
    type Device;
    type Error;

    fn start_conversion(&mut self) -> Result<(), Self::Error>;
    fn devices(&mut self) -> Result<Vec<Self::Device>, Self::Error>;
    fn read(&mut self, device: &Self::Device) -> Result<f32, Self::Error>;
}

// In addition to bus faults it can happen that no device is present on the
// one-wire bus at all, so the error cases are extended for that.
#[derive(Debug)]
pub enum SensorError<E> {
    NoDeviceFound,
    Bus(E),
}

impl<E> From<E> for SensorError<E> {
    fn from(value: E) -> Self {
        SensorError::Bus(value)
    }
}

/// Produces at most one fresh reading per wake cycle. Only the first
/// discovered device is read; the device carries exactly one sensor.
pub struct SensorReader<B, D> {
    bus: B,
    delay: D,
}

impl<B, D> SensorReader<B, D>
where
    B: TempBus,
    D: DelayMs<u16>,
{
    pub fn new(bus: B, delay: D) -> Self {
        SensorReader { bus, delay }
    }

    pub fn measure(&mut self) -> Result<f32, SensorError<B::Error>> {
        self.bus.start_conversion()?;
        self.delay.delay_ms(CONVERSION_WAIT_MS);

        let devices = self.bus.devices()?;
        let first = devices.first().ok_or(SensorError::NoDeviceFound)?;
        let temperature = self.bus.read(first)?;
        info!("Temp: {temperature}\u{b0}C");
        Ok(temperature)
    }
}

mod onewire {
    use embedded_hal::{
        blocking::delay::{DelayMs, DelayUs},
        digital::v2::{InputPin, OutputPin},
    };
    use one_wire_bus::{Address, OneWire, OneWireError};

    use super::TempBus;

    /// DS18B20 bus over a single open-drain pin, generic over the pin so the
    /// same driver serves any board wiring.
    pub struct OneWireTempBus<P, D> {
        bus: OneWire<P>,
        delay: D,
    }

    impl<P, D, E> OneWireTempBus<P, D>
    where
        P: OutputPin<Error = E> + InputPin<Error = E>,
        D: DelayUs<u16> + DelayMs<u16>,
    {
        pub fn new(pin: P, delay: D) -> Result<Self, OneWireError<E>> {
            Ok(OneWireTempBus {
                bus: OneWire::new(pin)?,
                delay,
            })
        }
    }

    impl<P, D, E> TempBus for OneWireTempBus<P, D>
    where
        P: OutputPin<Error = E> + InputPin<Error = E>,
        D: DelayUs<u16> + DelayMs<u16>,
    {
        type Device = Address;
        type Error = OneWireError<E>;

        fn start_conversion(&mut self) -> Result<(), Self::Error> {
            ds18b20::start_simultaneous_temp_measurement(&mut self.bus, &mut self.delay)
        }

        fn devices(&mut self) -> Result<Vec<Address>, Self::Error> {
            self.bus
                .devices(false, &mut self.delay)
                .collect::<Result<Vec<_>, _>>()
        }

        fn read(&mut self, device: &Address) -> Result<f32, Self::Error> {
            let sensor = ds18b20::Ds18b20::new::<E>(*device)?;
            let data = sensor.read_data(&mut self.bus, &mut self.delay)?;
            Ok(data.temperature)
        }
    }
}

pub use onewire::OneWireTempBus;

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBus {
        devices: Vec<u64>,
        temperature: f32,
        conversions: u32,
    }

    impl TempBus for FakeBus {
        type Device = u64;
        type Error = &'static str;

        fn start_conversion(&mut self) -> Result<(), Self::Error> {
            self.conversions += 1;
            Ok(())
        }

        fn devices(&mut self) -> Result<Vec<u64>, Self::Error> {
            Ok(self.devices.clone())
        }

        fn read(&mut self, _device: &u64) -> Result<f32, Self::Error> {
            Ok(self.temperature)
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
    fn first_device_is_read_after_conversion_wait() {
        let bus = FakeBus {
            devices: vec![0x28_0000_0000_0001],
            temperature: 21.5,
            conversions: 0,
        };
        let mut reader = SensorReader::new(bus, CountingDelay::default());

        let reading = reader.measure().unwrap();
        assert_eq!(reading, 21.5);
        assert_eq!(reader.bus.conversions, 1);
        assert_eq!(reader.delay.total_ms, u64::from(CONVERSION_WAIT_MS));
    }

    #[test]
    fn empty_enumeration_is_a_sensor_error() {
        let bus = FakeBus {
            devices: Vec::new(),
            temperature: 0.0,
            conversions: 0,
        };
        let mut reader = SensorReader::new(bus, CountingDelay::default());

        assert!(matches!(reader.measure(), Err(SensorError::NoDeviceFound)));
    }

    #[test]
    fn bus_fault_is_tagged_as_bus_error() {
        struct BrokenBus;

        impl TempBus for BrokenBus {
            type Device = u64;
            type Error = &'static str;

            fn start_conversion(&mut self) -> Result<(), Self::Error> {
                Err("bus short")
            }

            fn devices(&mut self) -> Result<Vec<u64>, Self::Error> {
                Ok(Vec::new())
            }

            fn read(&mut self, _device: &u64) -> Result<f32, Self::Error> {
                Err("bus short")
            }
        }

        let mut reader = SensorReader::new(BrokenBus, CountingDelay::default());
        assert!(matches!(
            reader.measure(),
            Err(SensorError::Bus("bus short"))
        ));
    }
}

// EOF
