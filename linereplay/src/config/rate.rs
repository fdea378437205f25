use std::time::Duration;

use rama::error::BoxError;

use crate::throttle::{MAX_INTERVAL, RateLimit};

/// Rate control flags, mutually exclusive.
///
/// Neither flag (or a zero value) means unlimited.
#[derive(Debug, Clone, clap::Args, Default)]
pub struct RateArgs {
    /// Minimum delay in between two records (e.g. '10ms', '1s', '250us')
    #[arg(
        long,
        visible_alias = "timeout",
        value_name = "DURATION",
        value_parser = parse_delay,
        conflicts_with = "rps"
    )]
    pub delay: Option<Duration>,

    /// Target amount of records per second (per worker)
    #[arg(long, value_name = "N", value_parser = parse_rps)]
    pub rps: Option<f64>,
}

impl From<RateArgs> for RateLimit {
    fn from(args: RateArgs) -> Self {
        match (args.delay, args.rps) {
            (Some(delay), _) if !delay.is_zero() => RateLimit::Delay(delay),
            (_, Some(rps)) if rps > 0. => RateLimit::PerSecond(rps),
            _ => RateLimit::Unlimited,
        }
    }
}

pub fn parse_delay(s: &str) -> Result<Duration, BoxError> {
    let s = s.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    let delay = humantime::parse_duration(s)?;
    if delay > MAX_INTERVAL {
        return Err(format!(
            "delay exceeds the maximum of {}",
            humantime::format_duration(MAX_INTERVAL)
        )
        .into());
    }
    Ok(delay)
}

pub fn parse_rps(s: &str) -> Result<f64, BoxError> {
    let rps: f64 = s.trim().parse()?;
    if !rps.is_finite() || rps < 0. {
        return Err("rps must be a finite, non-negative number".into());
    }
    if rps > 0. && rps < 1. / MAX_INTERVAL.as_secs_f64() {
        return Err(format!(
            "rps is too low: at most one record per {} is supported",
            humantime::format_duration(MAX_INTERVAL)
        )
        .into());
    }
    Ok(rps)
}
