use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Emission rate policy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RateLimit {
    /// Emit as fast as the sink allows.
    #[default]
    Unlimited,
    /// Fixed minimum delay in between two emissions.
    Delay(Duration),
    /// Target amount of emissions per second.
    PerSecond(f64),
}

/// Longest interval a throttle paces with, slower rates are clamped to it.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

impl RateLimit {
    /// Minimum interval in between two emissions,
    /// `None` in case no throttling is to be applied.
    ///
    /// Never exceeds [`MAX_INTERVAL`].
    pub fn interval(self) -> Option<Duration> {
        let interval = match self {
            RateLimit::Unlimited => return None,
            RateLimit::Delay(delay) => delay,
            RateLimit::PerSecond(rate) => {
                if !rate.is_finite() || rate <= 0. {
                    return None;
                }
                // a rate too small to express as a duration is as slow as it gets
                Duration::try_from_secs_f64(1. / rate).unwrap_or(MAX_INTERVAL)
            }
        };
        (!interval.is_zero()).then(|| interval.min(MAX_INTERVAL))
    }
}

/// Per-worker pacing stage.
///
/// Each emission waits for the next tick of a steady periodic clock,
/// the first one included. Ticks missed while the emitter was busy are
/// not caught up: the schedule restarts from the late tick, which keeps
/// consecutive emissions at least one interval apart.
#[derive(Debug)]
pub struct Throttle {
    ticker: Option<Interval>,
}

impl Throttle {
    pub fn new(rate: RateLimit) -> Self {
        let ticker = rate.interval().map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        Self { ticker }
    }

    /// Wait until the next emission is permitted.
    ///
    /// Cancel safe: dropping the future before completion does not consume a tick.
    pub async fn tick(&mut self) {
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.tick().await;
        }
    }
}
