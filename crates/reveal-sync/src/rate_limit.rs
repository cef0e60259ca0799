//! Rate-limit tracking and polling backoff
//!
//! The document store reports the remaining call budget and the reset time
//! on every response. [`RateLimiter`] keeps the most recent report and is
//! shared by reference between the adapter that records it and the client
//! and poller that consult it.

use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::HeaderMap;
use reveal_core::Timestamp;
use tracing::{debug, trace};

/// Header carrying the remaining call budget
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Header carrying the budget reset time in epoch seconds
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Budget assumed before the first response has been seen
pub const DEFAULT_RATE_LIMIT: u32 = 5000;

/// Upper bound for the polling backoff
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Last reported call budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Calls left in the current window
    pub remaining: u32,
    /// When the window resets, epoch milliseconds
    pub reset_at: Timestamp,
}

impl Default for RateLimitStatus {
    fn default() -> Self {
        Self {
            remaining: DEFAULT_RATE_LIMIT,
            reset_at: 0,
        }
    }
}

impl RateLimitStatus {
    /// True while the budget is (nearly) spent and the window has not reset
    pub fn is_exhausted(&self, now: Timestamp) -> bool {
        self.remaining <= 1 && now < self.reset_at
    }
}

/// Rate-limit values parsed from one response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    /// Parsed `x-ratelimit-remaining`
    pub remaining: Option<u32>,
    /// Parsed `x-ratelimit-reset`, epoch seconds
    pub reset_secs: Option<i64>,
}

impl RateLimitHeaders {
    /// Parse the rate-limit headers. Missing or garbled values are `None`.
    pub fn parse(headers: &HeaderMap) -> Self {
        Self {
            remaining: header_value(headers, REMAINING_HEADER),
            reset_secs: header_value(headers, RESET_HEADER),
        }
    }

    /// Reset time in epoch milliseconds
    pub fn reset_at(&self) -> Option<Timestamp> {
        self.reset_secs.map(|secs| secs.saturating_mul(1000))
    }

    /// True when this response says the budget is spent
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Process-wide rate-limit status
///
/// Starts optimistic (full budget, no reset pending) because the real budget
/// is unknown until the first response arrives.
#[derive(Debug, Default)]
pub struct RateLimiter {
    // None until the remote has reported a budget
    reported: Mutex<Option<RateLimitStatus>>,
}

impl RateLimiter {
    /// Create a limiter with optimistic defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the status with the values from the latest response
    pub fn record_response(&self, remaining: u32, reset_at: Timestamp) {
        *self.reported.lock() = Some(RateLimitStatus {
            remaining,
            reset_at,
        });
        trace!(remaining, reset_at, "Recorded rate limit");
    }

    /// Fold parsed headers into the status. Absent values leave the
    /// corresponding field unchanged.
    pub fn record_headers(&self, headers: &RateLimitHeaders) {
        if headers.remaining.is_none() && headers.reset_secs.is_none() {
            return;
        }

        let mut reported = self.reported.lock();
        let current = reported.unwrap_or_default();
        let next = RateLimitStatus {
            remaining: headers.remaining.unwrap_or(current.remaining),
            reset_at: headers.reset_at().unwrap_or(current.reset_at),
        };
        *reported = Some(next);
        trace!(remaining = next.remaining, reset_at = next.reset_at, "Recorded rate limit");
    }

    /// Current status
    pub fn status(&self) -> RateLimitStatus {
        self.reported.lock().unwrap_or_default()
    }

    /// Status as last reported by the remote, `None` before any report
    pub fn observed_status(&self) -> Option<RateLimitStatus> {
        *self.reported.lock()
    }

    /// Whether a remote call at `now` should be skipped
    pub fn should_skip(&self, now: Timestamp) -> bool {
        let status = self.status();
        let skip = status.is_exhausted(now);
        if skip {
            debug!(
                remaining = status.remaining,
                reset_at = status.reset_at,
                "Rate budget exhausted, skipping remote call"
            );
        }
        skip
    }
}

/// Delay before the next poll after `consecutive_errors` failures.
///
/// Doubles per error, capped at [`MAX_BACKOFF`], and never shorter than
/// `base_interval`.
pub fn backoff_delay(consecutive_errors: u32, base_interval: Duration) -> Duration {
    let factor = 1u32.checked_shl(consecutive_errors).unwrap_or(u32::MAX);
    base_interval
        .saturating_mul(factor)
        .min(MAX_BACKOFF)
        .max(base_interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_defaults_are_optimistic() {
        let limiter = RateLimiter::new();
        assert_eq!(limiter.status().remaining, DEFAULT_RATE_LIMIT);
        assert_eq!(limiter.status().reset_at, 0);
        assert!(limiter.observed_status().is_none());
        assert!(!limiter.should_skip(0));
    }

    #[test]
    fn test_should_skip_until_reset() {
        let limiter = RateLimiter::new();
        limiter.record_response(0, 10_000);

        assert!(limiter.should_skip(9_999));
        assert!(!limiter.should_skip(10_000));
        assert!(!limiter.should_skip(20_000));
    }

    #[test]
    fn test_one_remaining_counts_as_exhausted() {
        let limiter = RateLimiter::new();
        limiter.record_response(1, 10_000);
        assert!(limiter.should_skip(5_000));

        limiter.record_response(2, 10_000);
        assert!(!limiter.should_skip(5_000));
    }

    #[test]
    fn test_parse_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REMAINING_HEADER, HeaderValue::from_static("17"));
        headers.insert(RESET_HEADER, HeaderValue::from_static("1700000000"));

        let parsed = RateLimitHeaders::parse(&headers);
        assert_eq!(parsed.remaining, Some(17));
        assert_eq!(parsed.reset_at(), Some(1_700_000_000_000));
        assert!(!parsed.is_exhausted());
    }

    #[test]
    fn test_garbled_headers_leave_status_unchanged() {
        let limiter = RateLimiter::new();
        limiter.record_response(40, 1_000);

        let mut headers = HeaderMap::new();
        headers.insert(REMAINING_HEADER, HeaderValue::from_static("lots"));
        limiter.record_headers(&RateLimitHeaders::parse(&headers));

        assert_eq!(limiter.status().remaining, 40);
        assert_eq!(limiter.status().reset_at, 1_000);
    }

    #[test]
    fn test_partial_headers_update_one_field() {
        let limiter = RateLimiter::new();
        limiter.record_headers(&RateLimitHeaders {
            remaining: Some(3),
            reset_secs: None,
        });

        assert_eq!(limiter.status().remaining, 3);
        assert_eq!(limiter.status().reset_at, 0);
        assert!(limiter.observed_status().is_some());
    }

    #[test]
    fn test_backoff_growth() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(0, base), base);
        assert_eq!(backoff_delay(1, base), Duration::from_secs(10));
        assert_eq!(backoff_delay(2, base), Duration::from_secs(20));
        assert_eq!(backoff_delay(3, base), Duration::from_secs(40));
    }

    #[test]
    fn test_backoff_caps_at_max() {
        let base = Duration::from_secs(5);
        assert_eq!(backoff_delay(4, base), MAX_BACKOFF);
        assert_eq!(backoff_delay(40, base), MAX_BACKOFF);
    }

    #[test]
    fn test_backoff_never_below_base() {
        let base = Duration::from_secs(90);
        assert_eq!(backoff_delay(0, base), base);
        assert_eq!(backoff_delay(3, base), base);
    }
}
