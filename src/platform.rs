// platform.rs

/// Monotonic milliseconds since the current wake. Volatile memory is lost in
/// deep sleep, so the counter restarts at zero on every cycle; it exists only
/// to shorten the next sleep by the time already spent awake.
pub trait WakeClock {
    fn elapsed_ms(&self) -> u64;
}

/// Arms the hardware RTC wake alarm and powers the device down. The alarm
/// register is the only state that survives the transition; on hardware
/// `enter` never returns and the process restarts cold when the alarm fires.
pub trait DeepSleep {
    fn enter(&mut self, seconds: u64);
}

#[cfg(target_os = "espidf")]
mod esp {
    use std::time::Instant;

    use log::*;

    use super::{DeepSleep, WakeClock};

    pub struct EspWakeClock {
        booted: Instant,
    }

    impl EspWakeClock {
        /// Capture the reference point; construct this first thing in main.
        pub fn new() -> Self {
            EspWakeClock {
                booted: Instant::now(),
            }
        }
    }

    impl Default for EspWakeClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl WakeClock for EspWakeClock {
        fn elapsed_ms(&self) -> u64 {
            self.booted.elapsed().as_millis() as u64
        }
    }

    pub struct EspDeepSleep;

    impl DeepSleep for EspDeepSleep {
        fn enter(&mut self, seconds: u64) {
            info!("Deep sleep for {seconds}s NOW!");
            unsafe {
                esp_idf_sys::esp_sleep_enable_timer_wakeup(seconds.saturating_mul(1_000_000));
                esp_idf_sys::esp_deep_sleep_start();
            }
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::{EspDeepSleep, EspWakeClock};

// EOF
