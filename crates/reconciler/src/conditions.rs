//! Status conditions keyed by type.
//!
//! [`ConditionLedger`] keeps at most one [`Condition`] per type. New types are
//! appended; existing types keep their position. The transition timestamp of
//! an entry moves only when its status value changes, so repeated passes that
//! observe the same state leave the ledger byte-for-byte identical.
//!
//! On the wire the ledger is a plain list (the `listType=map` convention used
//! by Kubernetes). Deserializing a list with duplicate types keeps the last
//! entry for each type.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Aggregate readiness of the claim.
pub const READY: &str = "Ready";
/// The managed certificate has been issued.
pub const CERTIFICATE_ISSUED: &str = "CertificateIssued";
/// At least one workload matches the claim's selector.
pub const PODS_VERIFIED: &str = "PodsVerified";

/// Tri-state condition status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    /// `True` when `value` holds, `False` otherwise.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::True => "True",
            Self::False => "False",
            Self::Unknown => "Unknown",
        };
        f.write_str(text)
    }
}

/// A single typed, timestamped status entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: ConditionStatus,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[schemars(with = "String")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Whether this condition's status is `True`.
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Desired value of one condition, as computed by a reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionUpdate<'a> {
    pub condition_type: &'a str,
    pub status: ConditionStatus,
    pub reason: &'a str,
    pub message: &'a str,
    pub observed_generation: Option<i64>,
}

/// Ordered set of conditions, unique by type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Condition>", into = "Vec<Condition>")]
pub struct ConditionLedger {
    entries: Vec<Condition>,
}

impl ConditionLedger {
    /// Create an empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or update the condition named by `update.condition_type`.
    ///
    /// Returns `true` when the ledger changed.
    pub fn upsert(&mut self, update: &ConditionUpdate<'_>, now: DateTime<Utc>) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|c| c.condition_type == update.condition_type)
        {
            Some(existing) if existing.status != update.status => {
                *existing = Self::fresh(update, now);
                true
            }
            Some(existing) => {
                let changed = existing.reason != update.reason
                    || existing.message != update.message
                    || existing.observed_generation != update.observed_generation;
                if changed {
                    existing.reason = update.reason.to_string();
                    existing.message = update.message.to_string();
                    existing.observed_generation = update.observed_generation;
                }
                changed
            }
            None => {
                self.entries.push(Self::fresh(update, now));
                true
            }
        }
    }

    /// Look up a condition by type.
    #[must_use]
    pub fn get(&self, condition_type: &str) -> Option<&Condition> {
        self.entries
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// Whether the named condition exists with status `True`.
    #[must_use]
    pub fn is_true(&self, condition_type: &str) -> bool {
        self.get(condition_type).is_some_and(Condition::is_true)
    }

    /// Iterate conditions in ledger order.
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.entries.iter()
    }

    /// Number of conditions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn fresh(update: &ConditionUpdate<'_>, now: DateTime<Utc>) -> Condition {
        Condition {
            condition_type: update.condition_type.to_string(),
            status: update.status,
            reason: update.reason.to_string(),
            message: update.message.to_string(),
            observed_generation: update.observed_generation,
            last_transition_time: now,
        }
    }
}

impl From<Vec<Condition>> for ConditionLedger {
    fn from(conditions: Vec<Condition>) -> Self {
        let mut entries: Vec<Condition> = Vec::with_capacity(conditions.len());
        for condition in conditions {
            match entries
                .iter_mut()
                .find(|c| c.condition_type == condition.condition_type)
            {
                Some(existing) => *existing = condition,
                None => entries.push(condition),
            }
        }
        Self { entries }
    }
}

impl From<ConditionLedger> for Vec<Condition> {
    fn from(ledger: ConditionLedger) -> Self {
        ledger.entries
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use chrono::{Duration, TimeZone};

    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn update<'a>(
        condition_type: &'a str,
        status: ConditionStatus,
        reason: &'a str,
        message: &'a str,
    ) -> ConditionUpdate<'a> {
        ConditionUpdate {
            condition_type,
            status,
            reason,
            message,
            observed_generation: Some(1),
        }
    }

    #[test]
    fn test_insert_new_type() {
        let mut ledger = ConditionLedger::new();
        let changed = ledger.upsert(
            &update(PODS_VERIFIED, ConditionStatus::True, "PodsFound", "Found 1"),
            t0(),
        );

        assert!(changed);
        assert_eq!(ledger.len(), 1);
        let cond = ledger.get(PODS_VERIFIED).unwrap();
        assert_eq!(cond.last_transition_time, t0());
        assert!(cond.is_true());
    }

    #[test]
    fn test_same_status_keeps_timestamp() {
        let mut ledger = ConditionLedger::new();
        let later = t0() + Duration::minutes(5);
        ledger.upsert(
            &update(PODS_VERIFIED, ConditionStatus::True, "PodsFound", "Found 1"),
            t0(),
        );
        let changed = ledger.upsert(
            &update(PODS_VERIFIED, ConditionStatus::True, "PodsFound", "Found 1"),
            later,
        );

        assert!(!changed);
        assert_eq!(ledger.get(PODS_VERIFIED).unwrap().last_transition_time, t0());
    }

    #[test]
    fn test_message_change_keeps_timestamp() {
        let mut ledger = ConditionLedger::new();
        let later = t0() + Duration::minutes(5);
        ledger.upsert(
            &update(PODS_VERIFIED, ConditionStatus::True, "PodsFound", "Found 1"),
            t0(),
        );
        let changed = ledger.upsert(
            &update(PODS_VERIFIED, ConditionStatus::True, "PodsFound", "Found 3"),
            later,
        );

        assert!(changed);
        let cond = ledger.get(PODS_VERIFIED).unwrap();
        assert_eq!(cond.message, "Found 3");
        assert_eq!(cond.last_transition_time, t0());
    }

    #[test]
    fn test_status_flip_refreshes_timestamp() {
        let mut ledger = ConditionLedger::new();
        let later = t0() + Duration::minutes(5);
        ledger.upsert(
            &update(PODS_VERIFIED, ConditionStatus::True, "PodsFound", "Found 1"),
            t0(),
        );
        ledger.upsert(
            &update(PODS_VERIFIED, ConditionStatus::False, "NoPods", "none"),
            later,
        );

        let cond = ledger.get(PODS_VERIFIED).unwrap();
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(cond.reason, "NoPods");
        assert_eq!(cond.last_transition_time, later);
    }

    #[test]
    fn test_order_preserved_for_existing_types() {
        let mut ledger = ConditionLedger::new();
        ledger.upsert(&update(PODS_VERIFIED, ConditionStatus::True, "a", ""), t0());
        ledger.upsert(&update(CERTIFICATE_ISSUED, ConditionStatus::False, "b", ""), t0());
        ledger.upsert(&update(READY, ConditionStatus::False, "c", ""), t0());
        ledger.upsert(&update(PODS_VERIFIED, ConditionStatus::False, "d", ""), t0());

        let order: Vec<&str> = ledger.iter().map(|c| c.condition_type.as_str()).collect();
        assert_eq!(order, vec![PODS_VERIFIED, CERTIFICATE_ISSUED, READY]);
    }

    #[test]
    fn test_wire_format_is_list() {
        let mut ledger = ConditionLedger::new();
        ledger.upsert(&update(READY, ConditionStatus::True, "Ready", "ok"), t0());

        let value = serde_json::to_value(&ledger).unwrap();
        let list = value.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.first().unwrap()["type"], "Ready");
        assert_eq!(list.first().unwrap()["status"], "True");
        assert_eq!(list.first().unwrap()["observedGeneration"], 1);
    }

    #[test]
    fn test_deserialize_collapses_duplicates() {
        let raw = serde_json::json!([
            {"type": "Ready", "status": "False", "reason": "a", "message": "", "lastTransitionTime": "2026-01-01T00:00:00Z"},
            {"type": "PodsVerified", "status": "True", "reason": "b", "message": "", "lastTransitionTime": "2026-01-01T00:00:00Z"},
            {"type": "Ready", "status": "True", "reason": "c", "message": "", "lastTransitionTime": "2026-01-01T00:00:00Z"}
        ]);
        let ledger: ConditionLedger = serde_json::from_value(raw).unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(READY).unwrap().reason, "c");
        assert!(ledger.is_true(READY));
    }
}
