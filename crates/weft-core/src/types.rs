use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identity
// =============================================================================

/// Opaque identifier of the user a session belongs to.
///
/// Delivery channels use numeric chat ids or handles; both fit a string.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

// =============================================================================
// Temporal
// =============================================================================

/// Unix timestamp in milliseconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_conversions() {
        assert_eq!(UserId::from(42_i64).as_str(), "42");
        assert_eq!(UserId::from("alice"), UserId::new("alice"));
        assert_eq!(UserId::new("bob").to_string(), "bob");
    }

    #[test]
    fn test_timestamp_roundtrip_datetime() {
        let ts = Timestamp(1_700_000_000_123);
        let dt = ts.to_datetime();
        assert_eq!(Timestamp::from_datetime(dt), ts);
        assert!(ts.to_string().starts_with("2023-11-14"));
    }

    #[test]
    fn test_timestamp_now_is_recent() {
        let now = Timestamp::now();
        let drift = (Utc::now().timestamp_millis() - now.as_millis()).abs();
        assert!(drift < 2_000);
    }

    #[test]
    fn test_timestamp_ordering() {
        assert!(Timestamp(1) < Timestamp(2));
    }

    #[test]
    fn test_timestamp_serde_transparent_number() {
        let json = serde_json::to_string(&Timestamp(5)).unwrap();
        assert_eq!(json, "5");
    }
}
