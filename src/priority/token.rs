//! Priority levels and tokens.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Urgency of a scheduling request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityLevel {
    Emergency,
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

impl PriorityLevel {
    /// All levels, highest first.
    pub const ALL: [PriorityLevel; 5] = [
        PriorityLevel::Emergency,
        PriorityLevel::Urgent,
        PriorityLevel::High,
        PriorityLevel::Normal,
        PriorityLevel::Low,
    ];

    /// Numeric value used for every comparison.
    #[inline]
    pub const fn value(self) -> u32 {
        match self {
            PriorityLevel::Emergency => 100,
            PriorityLevel::Urgent => 80,
            PriorityLevel::High => 60,
            PriorityLevel::Normal => 40,
            PriorityLevel::Low => 20,
        }
    }

    /// Upper-case level name.
    pub const fn name(self) -> &'static str {
        match self {
            PriorityLevel::Emergency => "EMERGENCY",
            PriorityLevel::Urgent => "URGENT",
            PriorityLevel::High => "HIGH",
            PriorityLevel::Normal => "NORMAL",
            PriorityLevel::Low => "LOW",
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A ranked urgency marker attached to a request or session.
///
/// The numeric value is always derived from the level, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityToken {
    pub level: PriorityLevel,
    /// Why the request carries this priority.
    #[serde(default)]
    pub reason: String,
    pub created_at: DateTime<Utc>,
    /// After this instant the token no longer preempts anything.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Default for PriorityToken {
    fn default() -> Self {
        Self::new(PriorityLevel::Normal, "")
    }
}

impl PriorityToken {
    /// Creates a token stamped with the current time and no expiry.
    pub fn new(level: PriorityLevel, reason: impl Into<String>) -> Self {
        Self {
            level,
            reason: reason.into(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Sets the expiry.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[inline]
    pub fn value(&self) -> u32 {
        self.level.value()
    }

    /// Whether the token has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the token has expired as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    /// Whether this token outranks `other`. Expired tokens outrank nothing.
    pub fn can_preempt(&self, other: &PriorityToken) -> bool {
        self.can_preempt_at(other, Utc::now())
    }

    /// [`can_preempt`](Self::can_preempt) evaluated at `now`.
    pub fn can_preempt_at(&self, other: &PriorityToken, now: DateTime<Utc>) -> bool {
        !self.is_expired_at(now) && self.value() > other.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    #[test]
    fn test_level_table() {
        let values: Vec<u32> = PriorityLevel::ALL.iter().map(|l| l.value()).collect();
        assert_eq!(values, vec![100, 80, 60, 40, 20]);
        assert_eq!(PriorityLevel::default(), PriorityLevel::Normal);
        assert_eq!(PriorityLevel::Urgent.to_string(), "URGENT");
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let token = PriorityToken::new(PriorityLevel::Emergency, "acute pain")
            .with_expiry(now - Duration::minutes(1));
        assert!(token.is_expired_at(now));
        assert!(!token.can_preempt_at(&PriorityToken::default(), now));

        let open = PriorityToken::new(PriorityLevel::Low, "");
        assert!(!open.is_expired());
    }

    #[test]
    fn test_can_preempt_strictly_greater() {
        let urgent = PriorityToken::new(PriorityLevel::Urgent, "");
        assert!(urgent.can_preempt(&PriorityToken::default()));
        assert!(!urgent.can_preempt(&urgent.clone()));
    }

    #[test]
    fn test_serde_level_names() {
        let token = PriorityToken::new(PriorityLevel::Emergency, "x");
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(json["level"], "EMERGENCY");
    }

    fn any_level() -> impl Strategy<Value = PriorityLevel> {
        prop::sample::select(PriorityLevel::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_value_follows_level(level in any_level(), reason in ".{0,12}") {
            let token = PriorityToken::new(level, reason);
            prop_assert_eq!(token.value(), level.value());
        }

        #[test]
        fn prop_expired_never_preempts(a in any_level(), b in any_level(), mins in 1i64..10_000) {
            let now = Utc::now();
            let token = PriorityToken::new(a, "").with_expiry(now - Duration::minutes(mins));
            prop_assert!(!token.can_preempt_at(&PriorityToken::new(b, ""), now));
        }
    }
}
