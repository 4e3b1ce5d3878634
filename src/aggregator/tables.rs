// ABOUTME: Declarative per-provider normalization tables for flat raw samples
// ABOUTME: Maps raw field names onto canonical fields with their unit conversion
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use pulse_core::constants::metrics::KJ_PER_KCAL;
use pulse_core::models::{CanonicalMetricsRecord, ProviderId};

/// Canonical field a raw reading feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    /// Beats per minute
    HeartRate,
    /// Step count
    Steps,
    /// Kilocalories
    Calories,
    /// Hours slept
    SleepHours,
    /// Hydration percentage
    HydrationPercent,
    /// Stress percentage
    StressPercent,
    /// Kilometers
    DistanceKm,
    /// Minutes of activity
    ActiveMinutes,
}

impl CanonicalField {
    /// Write a converted value into `record`
    ///
    /// Integer fields are rounded; bounds are applied afterwards by
    /// `CanonicalMetricsRecord::clamped`.
    pub fn apply(self, record: &mut CanonicalMetricsRecord, value: f64) {
        let value = if value.is_finite() { value } else { 0.0 };
        match self {
            Self::HeartRate => {
                record.heart_rate = value.round().clamp(0.0, f64::from(u16::MAX)) as u16;
            }
            Self::Steps => record.steps = value.round().max(0.0) as u64,
            Self::Calories => record.calories = value,
            Self::SleepHours => record.sleep_hours = value,
            Self::HydrationPercent => record.hydration_percent = value,
            Self::StressPercent => record.stress_percent = value,
            Self::DistanceKm => record.distance_km = Some(value),
            Self::ActiveMinutes => record.active_minutes = Some(value),
        }
    }
}

/// One row of a normalization table
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    /// Raw key as the provider names it
    pub raw_key: &'static str,
    /// Canonical destination
    pub field: CanonicalField,
    /// Unit conversion into the canonical unit
    pub convert: fn(f64) -> f64,
}

const fn identity(value: f64) -> f64 {
    value
}

fn kilojoules_to_kcal(value: f64) -> f64 {
    value / KJ_PER_KCAL
}

fn minutes_to_hours(value: f64) -> f64 {
    value / 60.0
}

fn meters_to_km(value: f64) -> f64 {
    value / 1000.0
}

const BLUETOOTH: &[FieldMapping] = &[
    FieldMapping {
        raw_key: "bpm",
        field: CanonicalField::HeartRate,
        convert: identity,
    },
    FieldMapping {
        raw_key: "energy_expended_kj",
        field: CanonicalField::Calories,
        convert: kilojoules_to_kcal,
    },
];

const ACTIVITY_SERVICE: &[FieldMapping] = &[
    FieldMapping {
        raw_key: "heart_rate",
        field: CanonicalField::HeartRate,
        convert: identity,
    },
    FieldMapping {
        raw_key: "step_count",
        field: CanonicalField::Steps,
        convert: identity,
    },
    FieldMapping {
        raw_key: "kcal",
        field: CanonicalField::Calories,
        convert: identity,
    },
    FieldMapping {
        raw_key: "sleep_minutes",
        field: CanonicalField::SleepHours,
        convert: minutes_to_hours,
    },
    FieldMapping {
        raw_key: "hydration_pct",
        field: CanonicalField::HydrationPercent,
        convert: identity,
    },
    FieldMapping {
        raw_key: "stress_pct",
        field: CanonicalField::StressPercent,
        convert: identity,
    },
    FieldMapping {
        raw_key: "distance_m",
        field: CanonicalField::DistanceKm,
        convert: meters_to_km,
    },
    FieldMapping {
        raw_key: "active_minutes",
        field: CanonicalField::ActiveMinutes,
        convert: identity,
    },
];

/// Flat-sample table for `provider`; cloud fitness payloads are bucketed instead
#[must_use]
pub const fn table_for(provider: ProviderId) -> &'static [FieldMapping] {
    match provider {
        ProviderId::Bluetooth => BLUETOOTH,
        ProviderId::ActivityService => ACTIVITY_SERVICE,
        ProviderId::CloudFitness => &[],
    }
}

/// Row for `raw_key` in `table`
#[must_use]
pub fn lookup(table: &'static [FieldMapping], raw_key: &str) -> Option<&'static FieldMapping> {
    table.iter().find(|m| m.raw_key == raw_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_is_converted_to_kcal() {
        let mapping = lookup(table_for(ProviderId::Bluetooth), "energy_expended_kj").unwrap();
        assert!(((mapping.convert)(41.84) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_activity_table_covers_every_sample_key() {
        for key in [
            "heart_rate",
            "step_count",
            "kcal",
            "sleep_minutes",
            "hydration_pct",
            "stress_pct",
            "distance_m",
            "active_minutes",
        ] {
            assert!(lookup(table_for(ProviderId::ActivityService), key).is_some());
        }
        assert!(lookup(table_for(ProviderId::ActivityService), "bpm").is_none());
    }

    #[test]
    fn test_heart_rate_is_rounded() {
        let mut record = CanonicalMetricsRecord::no_data();
        CanonicalField::HeartRate.apply(&mut record, 71.6);
        assert_eq!(record.heart_rate, 72);
        CanonicalField::Steps.apply(&mut record, -3.0);
        assert_eq!(record.steps, 0);
    }
}
