// ABOUTME: Normalizes raw provider payloads into canonical metrics records
// ABOUTME: Merges cloud fitness buckets by start time and maps flat samples through tables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Metrics Aggregator
//!
//! Cloud fitness payloads arrive as one bucketed response per data type.
//! Buckets are keyed by start time and merged across responses:
//!
//! - gauges (heart rate) take the last point in provider order
//! - counters (steps, calories) sum every point
//! - buckets without points are dropped, never emitted as zero
//!
//! Flat samples from the other providers go through the provider's
//! normalization table. Every record is clamped to its documented bounds and
//! the output is always ascending by timestamp.

/// Per-provider normalization tables
pub mod tables;

use chrono::{DateTime, Utc};
use pulse_core::constants::cloud_fitness::{BUCKET_DURATION_MILLIS, SLEEP_ACTIVITY_TYPE};
use pulse_core::errors::{ProviderError, ProviderResult};
use pulse_core::models::{CanonicalMetricsRecord, ProviderId};
use pulse_providers::cloud_fitness::wire::{
    AggregateResponse, CloudFitnessPayload, DataPoint, Session,
};
use pulse_providers::{RawProviderPayload, RawSample};
use std::collections::BTreeMap;
use tables::CanonicalField;
use tracing::debug;

/// Map a raw payload onto canonical records, ascending by timestamp
///
/// # Errors
///
/// Returns `MalformedResponse` when the payload shape does not belong to
/// `provider`.
pub fn normalize(
    provider: ProviderId,
    payload: &RawProviderPayload,
) -> ProviderResult<Vec<CanonicalMetricsRecord>> {
    match (provider, payload) {
        (ProviderId::CloudFitness, RawProviderPayload::CloudFitness(payload)) => {
            Ok(normalize_cloud_fitness(payload))
        }
        (ProviderId::Bluetooth | ProviderId::ActivityService, RawProviderPayload::Sample(sample)) => {
            Ok(vec![normalize_sample(provider, sample)])
        }
        _ => Err(ProviderError::malformed(
            provider.as_str(),
            "payload shape does not match provider",
        )),
    }
}

/// Map one flat sample through the provider's table
#[must_use]
pub fn normalize_sample(provider: ProviderId, sample: &RawSample) -> CanonicalMetricsRecord {
    let table = tables::table_for(provider);
    let mut record = CanonicalMetricsRecord::at(sample.captured_at);
    for (key, value) in &sample.fields {
        if let Some(mapping) = tables::lookup(table, key) {
            mapping.field.apply(&mut record, (mapping.convert)(*value));
        } else {
            debug!(provider = %provider, key = %key, "Ignoring unmapped raw field");
        }
    }
    if !sample.activities.is_empty() {
        record.activities = Some(sample.activities.clone());
    }
    record.clamped()
}

#[derive(Debug, Default)]
struct BucketAccumulator {
    heart_rate: Option<f64>,
    steps: f64,
    calories: f64,
    sleep_hours: f64,
    activities: Vec<String>,
}

impl BucketAccumulator {
    fn into_record(self, start_millis: i64) -> Option<CanonicalMetricsRecord> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(start_millis)?;
        let mut record = CanonicalMetricsRecord::at(timestamp);
        if let Some(bpm) = self.heart_rate {
            CanonicalField::HeartRate.apply(&mut record, bpm);
        }
        CanonicalField::Steps.apply(&mut record, self.steps);
        CanonicalField::Calories.apply(&mut record, self.calories);
        CanonicalField::SleepHours.apply(&mut record, self.sleep_hours);
        if !self.activities.is_empty() {
            record.activities = Some(self.activities);
        }
        Some(record.clamped())
    }
}

type Buckets = BTreeMap<i64, BucketAccumulator>;

/// Merge every bucketed response and session into one record per bucket
#[must_use]
pub fn normalize_cloud_fitness(payload: &CloudFitnessPayload) -> Vec<CanonicalMetricsRecord> {
    let mut buckets = Buckets::new();

    merge_points(&mut buckets, &payload.heart_rate, |acc, values| {
        acc.heart_rate = values.last().copied();
    });
    merge_points(&mut buckets, &payload.steps, |acc, values| {
        acc.steps += values.iter().sum::<f64>();
    });
    merge_points(&mut buckets, &payload.calories, |acc, values| {
        acc.calories += values.iter().sum::<f64>();
    });
    attach_sessions(&mut buckets, &payload.sessions);

    buckets
        .into_iter()
        .filter_map(|(start, acc)| acc.into_record(start))
        .collect()
}

fn merge_points(
    buckets: &mut Buckets,
    response: &AggregateResponse,
    apply: impl Fn(&mut BucketAccumulator, &[f64]),
) {
    for bucket in &response.bucket {
        let values: Vec<f64> = bucket.points().filter_map(DataPoint::first_value).collect();
        if values.is_empty() {
            continue;
        }
        apply(buckets.entry(bucket.start_time_millis).or_default(), &values);
    }
}

fn attach_sessions(buckets: &mut Buckets, sessions: &[Session]) {
    let mut sleep_hours = 0.0;

    for session in sessions {
        if session.activity_type == SLEEP_ACTIVITY_TYPE {
            sleep_hours += session.duration_hours();
            continue;
        }
        let start = session.start_time_millis;
        let containing = buckets
            .range_mut(..=start)
            .next_back()
            .filter(|(key, _)| start < key.saturating_add(BUCKET_DURATION_MILLIS));
        let Some((_, acc)) = containing else {
            debug!(start, "Dropping session outside every data bucket");
            continue;
        };
        let name = if session.name.is_empty() {
            format!("activity {}", session.activity_type)
        } else {
            session.name.clone()
        };
        acc.activities.push(name);
    }

    if sleep_hours <= 0.0 {
        return;
    }
    if let Some(mut latest) = buckets.last_entry() {
        latest.get_mut().sleep_hours += sleep_hours;
    } else {
        debug!(sleep_hours, "Dropping sleep with no data bucket to carry it");
    }
}
