//! Rate-limit frequency strings such as `2/3seconds` or `10 per minute`

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::TfmktError;

/// `max_requests` admissions per sliding `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RateLimitFrequency {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitFrequency {
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, TfmktError> {
        if max_requests == 0 {
            return Err(TfmktError::Config("rate limit must admit at least one request".into()));
        }
        if window.is_zero() {
            return Err(TfmktError::Config("rate limit window must be positive".into()));
        }
        Ok(Self { max_requests, window })
    }

    pub fn per_second(max_requests: u32) -> Result<Self, TfmktError> {
        Self::new(max_requests, Duration::from_secs(1))
    }
}

fn unit_seconds(unit: &str) -> Option<u64> {
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Some(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(60),
        "h" | "hr" | "hour" | "hours" => Some(60 * 60),
        "d" | "day" | "days" => Some(24 * 60 * 60),
        _ => None,
    }
}

impl FromStr for RateLimitFrequency {
    type Err = TfmktError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| TfmktError::Config(format!("invalid rate limit '{s}': {why}"));
        let normalized = s.trim().to_lowercase();

        let (count, window) = normalized
            .split_once('/')
            .or_else(|| normalized.split_once(" per "))
            .ok_or_else(|| invalid("expected <N>/<window>"))?;

        let max_requests: u32 =
            count.trim().parse().map_err(|_| invalid("request count is not a number"))?;

        let window = window.trim();
        let digits = window.find(|c: char| !c.is_ascii_digit()).unwrap_or(window.len());
        let multiplier: u64 = if digits == 0 {
            1
        } else {
            window[..digits].parse().map_err(|_| invalid("window multiplier is not a number"))?
        };
        let unit = window[digits..].trim();
        let unit = unit_seconds(unit).ok_or_else(|| invalid("unknown window unit"))?;

        let secs = multiplier.checked_mul(unit).ok_or_else(|| invalid("window overflows"))?;
        Self::new(max_requests, Duration::from_secs(secs))
    }
}

impl fmt::Display for RateLimitFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.window.as_secs();
        if self.window.subsec_nanos() != 0 {
            return write!(f, "{}/{}ms", self.max_requests, self.window.as_millis());
        }
        match secs {
            1 => write!(f, "{}/second", self.max_requests),
            60 => write!(f, "{}/minute", self.max_requests),
            3600 => write!(f, "{}/hour", self.max_requests),
            86_400 => write!(f, "{}/day", self.max_requests),
            n => write!(f, "{}/{n}seconds", self.max_requests),
        }
    }
}

impl TryFrom<String> for RateLimitFrequency {
    type Error = TfmktError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RateLimitFrequency> for String {
    fn from(value: RateLimitFrequency) -> Self {
        value.to_string()
    }
}
