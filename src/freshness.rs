//! Per-source time-to-live rules.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cache::CacheRecord;

/// Local and rotating-city weather.
pub const WEATHER_TTL: Duration = Duration::from_secs(15 * 60);

/// The headline feed.
pub const NEWS_TTL: Duration = Duration::from_secs(60 * 60);

/// `true` while `now - record.updated_at < ttl`.
///
/// A record exactly `ttl` old is stale.  Records stamped in the future
/// (clock skew) count as fresh.
pub fn is_fresh<T>(record: &CacheRecord<T>, ttl: Duration, now: DateTime<Utc>) -> bool {
    let age_ms = (now - record.updated_at).num_milliseconds();
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    age_ms < ttl_ms
}
