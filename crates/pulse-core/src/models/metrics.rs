// ABOUTME: Canonical provider-independent health sample shared across the sync pipeline
// ABOUTME: Enforces field bounds and defines the no-data sentinel record
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use crate::constants::metrics::{MAX_HEART_RATE_BPM, MAX_PERCENT, MAX_SLEEP_HOURS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One time-stamped health sample in the canonical shape
///
/// Every numeric field is non-negative. Heart rate is bounded to
/// `[0, 300]` BPM and percentages to `[0, 100]`. A record whose
/// physiological fields are all zero is the "no data yet" sentinel; zero is
/// never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalMetricsRecord {
    /// Instant the sample represents
    pub timestamp: DateTime<Utc>,
    /// Beats per minute, 0 = unknown
    #[serde(default)]
    pub heart_rate: u16,
    /// Steps within the sampling window
    #[serde(default)]
    pub steps: u64,
    /// Kilocalories within the sampling window
    #[serde(default)]
    pub calories: f64,
    /// Hours slept
    #[serde(default)]
    pub sleep_hours: f64,
    /// Hydration level
    #[serde(default)]
    pub hydration_percent: f64,
    /// Stress level
    #[serde(default)]
    pub stress_percent: f64,
    /// Distance covered in kilometers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    /// Active minutes within the window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_minutes: Option<f64>,
    /// Activity names in the order the provider reported them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activities: Option<Vec<String>>,
    /// Instant this record was last mutated
    pub last_updated: DateTime<Utc>,
}

impl CanonicalMetricsRecord {
    /// Empty record at `timestamp` with every metric zeroed
    #[must_use]
    pub const fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            heart_rate: 0,
            steps: 0,
            calories: 0.0,
            sleep_hours: 0.0,
            hydration_percent: 0.0,
            stress_percent: 0.0,
            distance_km: None,
            active_minutes: None,
            activities: None,
            last_updated: timestamp,
        }
    }

    /// The "no data yet" sentinel, stamped at the Unix epoch
    #[must_use]
    pub const fn no_data() -> Self {
        Self::at(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Whether every physiological field is zero or absent
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        self.heart_rate == 0
            && self.steps == 0
            && self.calories <= 0.0
            && self.sleep_hours <= 0.0
            && self.hydration_percent <= 0.0
            && self.stress_percent <= 0.0
            && self.distance_km.is_none()
            && self.active_minutes.is_none()
            && self.activities.as_ref().is_none_or(Vec::is_empty)
    }

    /// Return a copy with every field forced into its documented bounds
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.heart_rate = self.heart_rate.min(MAX_HEART_RATE_BPM);
        self.calories = non_negative(self.calories);
        self.sleep_hours = non_negative(self.sleep_hours).min(MAX_SLEEP_HOURS);
        self.hydration_percent = non_negative(self.hydration_percent).min(MAX_PERCENT);
        self.stress_percent = non_negative(self.stress_percent).min(MAX_PERCENT);
        self.distance_km = self.distance_km.map(non_negative);
        self.active_minutes = self.active_minutes.map(non_negative);
        self
    }

    /// Whether every field lies within its documented bounds
    #[must_use]
    pub fn within_bounds(&self) -> bool {
        let non_neg = |v: f64| v.is_finite() && v >= 0.0;
        let percent = |v: f64| non_neg(v) && v <= MAX_PERCENT;
        self.heart_rate <= MAX_HEART_RATE_BPM
            && non_neg(self.calories)
            && non_neg(self.sleep_hours)
            && self.sleep_hours <= MAX_SLEEP_HOURS
            && percent(self.hydration_percent)
            && percent(self.stress_percent)
            && self.distance_km.is_none_or(non_neg)
            && self.active_minutes.is_none_or(non_neg)
    }

    /// Ordering used to decide which of two records is authoritative
    ///
    /// Later `timestamp` wins; equal timestamps fall back to `last_updated`.
    #[must_use]
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.last_updated.cmp(&other.last_updated))
    }

    /// Whether this record should replace `other`
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.recency_cmp(other) == Ordering::Greater
    }
}

impl Default for CanonicalMetricsRecord {
    fn default() -> Self {
        Self::no_data()
    }
}

/// Clamp NaN, infinities and negatives to a usable non-negative value
fn non_negative(value: f64) -> f64 {
    if value.is_nan() || value < 0.0 {
        0.0
    } else if value.is_infinite() {
        f64::MAX
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_no_data_sentinel() {
        let sentinel = CanonicalMetricsRecord::no_data();
        assert!(sentinel.is_no_data());
        assert_eq!(sentinel.timestamp, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_clamped_enforces_bounds() {
        let mut record = CanonicalMetricsRecord::at(Utc::now());
        record.heart_rate = 420;
        record.calories = -5.0;
        record.hydration_percent = 140.0;
        record.stress_percent = f64::NAN;
        record.sleep_hours = 30.0;
        record.distance_km = Some(-1.0);

        let clamped = record.clamped();
        assert_eq!(clamped.heart_rate, 300);
        assert!(clamped.calories.abs() < f64::EPSILON);
        assert!((clamped.hydration_percent - 100.0).abs() < f64::EPSILON);
        assert!(clamped.stress_percent.abs() < f64::EPSILON);
        assert!((clamped.sleep_hours - 24.0).abs() < f64::EPSILON);
        assert_eq!(clamped.distance_km, Some(0.0));
        assert!(clamped.within_bounds());
    }

    #[test]
    fn test_recency_prefers_timestamp_then_last_updated() {
        let t0 = Utc.timestamp_opt(1_000, 0).unwrap();
        let t1 = Utc.timestamp_opt(2_000, 0).unwrap();
        let older = CanonicalMetricsRecord::at(t0);
        let newer = CanonicalMetricsRecord::at(t1);
        assert!(newer.is_newer_than(&older));

        let mut restamped = older.clone();
        restamped.last_updated = t1;
        assert!(restamped.is_newer_than(&older));
        assert!(!older.is_newer_than(&older));
    }

    #[test]
    fn test_camel_case_wire_names() {
        let json = serde_json::to_value(CanonicalMetricsRecord::no_data()).unwrap();
        assert!(json.get("heartRate").is_some());
        assert!(json.get("hydrationPercent").is_some());
        assert!(json.get("lastUpdated").is_some());
        assert!(json.get("distanceKm").is_none());
    }
}
