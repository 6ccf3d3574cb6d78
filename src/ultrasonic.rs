// ultrasonic.rs

use embedded_hal::{blocking::delay::DelayUs, digital::v2::OutputPin};
use log::*;

/// Speed of sound in air, before calibration.
pub const SOUND_SPEED_M_S: f32 = 340.0;
pub const TRIGGER_PULSE_US: u16 = 10;

/// Measures the width of the echo pulse in microseconds.
pub trait EchoTimer {
    type Error;

    fn pulse_width_us(&mut self) -> Result<u32, Self::Error>;
}

#[derive(Debug)]
pub enum RangeError<PE, EE> {
    Trigger(PE),
    Echo(EE),
}

/// HC-SR04 ultrasonic ranger: a 10 us trigger pulse, then the echo pin goes
/// high for the round-trip time of the burst.
pub struct Ultrasonic<T, E, D> {
    trig: T,
    echo: E,
    delay: D,
    sound_speed: f32,
}

impl<T, E, D> Ultrasonic<T, E, D>
where
    T: OutputPin,
    E: EchoTimer,
    D: DelayUs<u16>,
{
    pub fn new(trig: T, echo: E, delay: D) -> Self {
        Ultrasonic {
            trig,
            echo,
            delay,
            sound_speed: SOUND_SPEED_M_S,
        }
    }

    /// Distance to the target in meters.
    pub fn distance(&mut self) -> Result<f32, RangeError<T::Error, E::Error>> {
        self.trig.set_high().map_err(RangeError::Trigger)?;
        self.delay.delay_us(TRIGGER_PULSE_US);
        self.trig.set_low().map_err(RangeError::Trigger)?;

        let width_s = self.echo.pulse_width_us().map_err(RangeError::Echo)? as f32 / 1_000_000.0;
        Ok(width_s / 2.0 * self.sound_speed)
    }

    /// Rescale the speed of sound against a known distance and return the
    /// calibrated value.
    pub fn calibrate(
        &mut self,
        known_dist_m: f32,
    ) -> Result<f32, RangeError<T::Error, E::Error>> {
        let measured = self.distance()?;
        self.sound_speed = known_dist_m / measured * self.sound_speed;
        info!("Speed of sound calibrated: {} m/s", self.sound_speed);
        Ok(self.sound_speed)
    }

    pub fn sound_speed(&self) -> f32 {
        self.sound_speed
    }
}


// EOF
