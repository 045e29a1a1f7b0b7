//! Retention policy and its textual form

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use vault_core::VaultError;

/// Policy applied when no retention spec is given
pub const DEFAULT_RETENTION: &str = "7:days,4:weeks,12:months,5:years";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Retention policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Every backup younger than this is kept (from `<n>:days`)
    pub hot_window_secs: u64,
    /// Calendar weeks with one retained full backup
    pub weekly: u32,
    /// Calendar months with one retained full backup
    pub monthly: u32,
    /// Calendar years with one retained full backup
    pub yearly: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            hot_window_secs: 7 * SECONDS_PER_DAY,
            weekly: 4,
            monthly: 12,
            yearly: 5,
        }
    }
}

impl RetentionPolicy {
    /// Parse a retention spec, falling back to [`DEFAULT_RETENTION`] when absent
    ///
    /// Malformed `<n>:<unit>` tokens are skipped with a warning. A spec that
    /// leaves neither a hot window nor any periodic snapshot is rejected.
    pub fn parse(spec: Option<&str>) -> Result<Self> {
        let spec = match spec.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => DEFAULT_RETENTION,
        };

        let mut days: Option<u32> = None;
        let mut policy = Self {
            hot_window_secs: 0,
            weekly: 0,
            monthly: 0,
            yearly: 0,
        };

        for token in spec.split(',') {
            let token = token.trim().to_lowercase();
            if token.is_empty() {
                continue;
            }

            let parts: Vec<&str> = token.split(':').map(str::trim).collect();
            let [interval, unit] = parts.as_slice() else {
                tracing::warn!(%token, "ignoring retention token: expected <count>:<unit>");
                continue;
            };
            let Ok(count) = interval.parse::<u32>() else {
                tracing::warn!(%token, "ignoring retention token: count is not an integer");
                continue;
            };

            match *unit {
                "days" => days = Some(count),
                "weeks" => policy.weekly = count,
                "months" => policy.monthly = count,
                "years" => policy.yearly = count,
                _ => {
                    tracing::warn!(%token, "ignoring retention token: unknown unit");
                    continue;
                }
            }
        }

        policy.hot_window_secs = u64::from(days.unwrap_or(0)) * SECONDS_PER_DAY;

        if policy.is_empty() {
            return Err(VaultError::MalformedPolicySpec {
                spec: spec.to_string(),
                reason: "no hot window and no weekly, monthly or yearly snapshots".to_string(),
            });
        }

        Ok(policy)
    }

    /// Hot window as a chrono duration
    pub fn hot_window(&self) -> chrono::Duration {
        i64::try_from(self.hot_window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// True when the policy would keep nothing older than "now"
    pub fn is_empty(&self) -> bool {
        self.hot_window_secs == 0 && self.weekly == 0 && self.monthly == 0 && self.yearly == 0
    }

    /// Upper bound on full backups kept by rotation outside the hot window
    pub fn max_rotated_fulls(&self) -> u64 {
        u64::from(self.weekly) + u64::from(self.monthly) + u64::from(self.yearly)
    }
}

impl FromStr for RetentionPolicy {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(Some(s))
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:days,{}:weeks,{}:months,{}:years",
            self.hot_window_secs / SECONDS_PER_DAY,
            self.weekly,
            self.monthly,
            self.yearly
        )
    }
}
