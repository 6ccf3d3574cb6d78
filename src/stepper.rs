// stepper.rs

use embedded_hal::{blocking::delay::DelayUs, digital::v2::OutputPin};

/// Shortest step pulse the driver board accepts.
pub const MIN_STEP_TIME_US: u16 = 20;
pub const STEPS_PER_REV: i32 = 1600;

/// Stepper motor behind an Easy Driver board: step and direction pulses plus
/// a sleep pin for power control. Stateless across power cycles; the step
/// position is only meaningful since the last `power_on`.
pub struct Stepper<STEP, DIR, SLP, D> {
    step: STEP,
    dir: DIR,
    slp: SLP,
    delay: D,
    step_time_us: u16,
    position: i32,
}

impl<STEP, DIR, SLP, D, E> Stepper<STEP, DIR, SLP, D>
where
    STEP: OutputPin<Error = E>,
    DIR: OutputPin<Error = E>,
    SLP: OutputPin<Error = E>,
    D: DelayUs<u16>,
{
    pub fn new(step: STEP, dir: DIR, slp: SLP, delay: D) -> Self {
        Stepper {
            step,
            dir,
            slp,
            delay,
            step_time_us: MIN_STEP_TIME_US,
            position: 0,
        }
    }

    pub fn power_on(&mut self) -> Result<(), E> {
        self.slp.set_high()
    }

    /// Powering off loses the holding torque, so the position is reset.
    pub fn power_off(&mut self) -> Result<(), E> {
        self.slp.set_low()?;
        self.position = 0;
        Ok(())
    }

    /// Rotate for the given step count, negative counts reverse.
    pub fn steps(&mut self, count: i32) -> Result<(), E> {
        if count > 0 {
            self.dir.set_low()?;
        } else {
            self.dir.set_high()?;
        }
        for _ in 0..count.abs() {
            self.step.set_high()?;
            self.delay.delay_us(self.step_time_us);
            self.step.set_low()?;
            self.delay.delay_us(self.step_time_us);
        }
        self.position += count;
        Ok(())
    }

    /// Rotate by a relative angle in degrees.
    pub fn rel_angle(&mut self, angle: f32) -> Result<(), E> {
        let steps = (angle / 360.0 * STEPS_PER_REV as f32) as i32;
        self.steps(steps)
    }

    /// Rotate to an absolute angle, counted from the last power on.
    pub fn abs_angle(&mut self, angle: f32) -> Result<(), E> {
        let mut steps = (angle / 360.0 * STEPS_PER_REV as f32) as i32;
        steps -= self.position.rem_euclid(STEPS_PER_REV);
        self.steps(steps)
    }

    pub fn revolutions(&mut self, count: i32) -> Result<(), E> {
        self.steps(count * STEPS_PER_REV)
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    /// Inter-edge step delay; values below the hardware minimum are clamped.
    pub fn set_step_time(&mut self, us: u16) {
        self.step_time_us = us.max(MIN_STEP_TIME_US);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingPin {
        state: bool,
        rising_edges: u32,
    }

    impl OutputPin for RecordingPin {
        type Error = ();

        fn set_high(&mut self) -> Result<(), ()> {
            if !self.state {
                self.rising_edges += 1;
            }
            self.state = true;
            Ok(())
        }

        fn set_low(&mut self) -> Result<(), ()> {
            self.state = false;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_us: u64,
    }

    impl DelayUs<u16> for CountingDelay {
        fn delay_us(&mut self, us: u16) {
            self.total_us += u64::from(us);
        }
    }

    fn stepper() -> Stepper<RecordingPin, RecordingPin, RecordingPin, CountingDelay> {
        Stepper::new(
            RecordingPin::default(),
            RecordingPin::default(),
            RecordingPin::default(),
            CountingDelay::default(),
        )
    }

    #[test]
    fn full_turn_pulses_once_per_step() {
        let mut s = stepper();
        s.rel_angle(360.0).unwrap();
        assert_eq!(s.step.rising_edges, STEPS_PER_REV as u32);
        assert_eq!(s.position(), STEPS_PER_REV);
        // one high and one low wait per step
        assert_eq!(s.delay.total_us, 2 * 20 * STEPS_PER_REV as u64);
    }

    #[test]
    fn negative_steps_reverse_direction() {
        let mut s = stepper();
        s.steps(-4).unwrap();
        assert!(s.dir.state);
        assert_eq!(s.position(), -4);
        assert_eq!(s.step.rising_edges, 4);
    }

    #[test]
    fn absolute_angle_accounts_for_current_position() {
        let mut s = stepper();
        s.rel_angle(90.0).unwrap();
        assert_eq!(s.position(), 400);
        // already at 90, quarter turn more to reach 180
        s.abs_angle(180.0).unwrap();
        assert_eq!(s.position(), 800);
    }

    #[test]
    fn power_off_resets_position() {
        let mut s = stepper();
        s.steps(100).unwrap();
        s.power_off().unwrap();
        assert_eq!(s.position(), 0);
        assert!(!s.slp.state);
    }

    #[test]
    fn step_time_is_clamped_to_hardware_minimum() {
        let mut s = stepper();
        s.set_step_time(5);
        assert_eq!(s.step_time_us, MIN_STEP_TIME_US);
        s.set_step_time(120);
        assert_eq!(s.step_time_us, 120);
    }
}

// EOF
