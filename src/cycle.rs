// cycle.rs

use std::fmt::Debug;

use embedded_hal::blocking::delay::DelayMs;
use log::*;

use crate::{
    BrokerLink, DeepSleep, LinkStatus, NetworkConnector, SensorReader, Station, TelemetryPublisher,
    TempBus, WakeClock, DEFAULT_JOIN_TIMEOUT_S,
};

/// One run of the machine per wake; the device powers off in `Sleeping` and
/// restarts from `Idle` on the next alarm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Connecting,
    Measuring,
    Publishing,
    Disconnecting,
    Sleeping,
}

/// Outcome of a full duty cycle. On hardware the device is asleep before
/// this is observable; mock platforms read it in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct CycleReport {
    pub link: Option<LinkStatus>,
    pub reading: Option<f32>,
    pub published: bool,
    pub sleep_budget: i64,
    pub armed_seconds: u64,
}

/// Seconds of sleep left after subtracting the time already spent awake.
/// Goes zero or negative when the wake work overran the whole interval.
pub fn sleep_budget(wakeup_minutes: u32, elapsed_ms: u64) -> i64 {
    i64::from(wakeup_minutes) * 60 - (elapsed_ms / 1000) as i64
}

/// A non-positive budget is raised to one second so the alarm is always
/// armed in the future; an overrunning device wakes again almost
/// immediately instead of stalling.
pub fn armed_seconds(budget: i64) -> u64 {
    budget.max(1) as u64
}

/// Runs the whole duty cycle: connect, measure, publish, disconnect, sleep.
/// Nothing past configuration loading is fatal; every sub-step failure is
/// reduced to a logged status and the machine always reaches `Sleeping`.
pub fn run_cycle<S, DS, B, DB, L, C, P>(
    wakeup_minutes: u32,
    connector: &mut NetworkConnector<S, DS>,
    reader: &mut SensorReader<B, DB>,
    publisher: &mut TelemetryPublisher<L>,
    clock: &C,
    power: &mut P,
) -> CycleReport
where
    S: Station,
    S::Error: Debug,
    DS: DelayMs<u16>,
    B: TempBus,
    B::Error: Debug,
    DB: DelayMs<u16>,
    L: BrokerLink,
    L::Error: Debug,
    C: WakeClock,
    P: DeepSleep,
{
    let mut report = CycleReport::default();
    let mut state = CycleState::Idle;

    loop {
        state = match state {
            CycleState::Idle => CycleState::Connecting,

            CycleState::Connecting => {
                match connector.connect(DEFAULT_JOIN_TIMEOUT_S) {
                    Ok(status) => report.link = Some(status),
                    Err(e) => error!("Wifi error: {e:?}"),
                }
                CycleState::Measuring
            }

            CycleState::Measuring => {
                match reader.measure() {
                    Ok(value) => report.reading = Some(value),
                    Err(e) => error!("Sensor error: {e:?}"),
                }
                CycleState::Publishing
            }

            CycleState::Publishing => {
                match report.reading {
                    Some(value) => match publisher.publish(value) {
                        Ok(()) => report.published = true,
                        Err(e) => error!("Message NOT published: {e:?}"),
                    },
                    None => info!("No reading, nothing to publish"),
                }
                CycleState::Disconnecting
            }

            CycleState::Disconnecting => {
                if let Err(e) = connector.disconnect() {
                    error!("Wifi teardown error: {e:?}");
                }
                CycleState::Sleeping
            }

            CycleState::Sleeping => {
                report.sleep_budget = sleep_budget(wakeup_minutes, clock.elapsed_ms());
                report.armed_seconds = armed_seconds(report.sleep_budget);
                info!(
                    "Cycle done in {}s, sleeping {}s",
                    clock.elapsed_ms() / 1000,
                    report.armed_seconds
                );
                // terminal on hardware, returns only under mock platforms
                power.enter(report.armed_seconds);
                break;
            }
        };
    }

    report
}


// EOF
