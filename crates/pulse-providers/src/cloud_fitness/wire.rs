// ABOUTME: Wire types for the cloud fitness aggregate and sessions REST endpoints
// ABOUTME: Accepts millisecond and nanosecond timestamps encoded as strings or numbers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Body of a `dataset:aggregate` request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    /// Data types to aggregate
    pub aggregate_by: Vec<AggregateBy>,
    /// Bucket width
    pub bucket_by_time: BucketByTime,
    /// Window start, epoch milliseconds
    pub start_time_millis: i64,
    /// Window end, epoch milliseconds
    pub end_time_millis: i64,
}

/// One data type to aggregate
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBy {
    /// Fully-qualified data type name
    pub data_type_name: String,
}

/// Time-based bucketing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketByTime {
    /// Bucket width in milliseconds
    pub duration_millis: i64,
}

impl AggregateRequest {
    /// Request for one data type over `[start, end)` in `bucket_millis` buckets
    #[must_use]
    pub fn new(
        data_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket_millis: i64,
    ) -> Self {
        Self {
            aggregate_by: vec![AggregateBy {
                data_type_name: data_type.to_owned(),
            }],
            bucket_by_time: BucketByTime {
                duration_millis: bucket_millis,
            },
            start_time_millis: start.timestamp_millis(),
            end_time_millis: end.timestamp_millis(),
        }
    }
}

/// `dataset:aggregate` response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AggregateResponse {
    /// Time buckets in ascending order
    #[serde(default)]
    pub bucket: Vec<AggregateBucket>,
}

/// One time bucket
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBucket {
    /// Bucket start, epoch milliseconds
    #[serde(deserialize_with = "int_or_string")]
    pub start_time_millis: i64,
    /// Bucket end, epoch milliseconds
    #[serde(deserialize_with = "int_or_string")]
    pub end_time_millis: i64,
    /// One dataset per requested data type
    #[serde(default)]
    pub dataset: Vec<Dataset>,
}

impl AggregateBucket {
    /// Every point in the bucket, across datasets, in provider order
    pub fn points(&self) -> impl Iterator<Item = &DataPoint> {
        self.dataset.iter().flat_map(|d| d.point.iter())
    }
}

/// Points of one data type within a bucket
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Data source id
    #[serde(default)]
    pub data_source_id: Option<String>,
    /// Points in provider order; empty when nothing was recorded
    #[serde(default)]
    pub point: Vec<DataPoint>,
}

/// A single reading
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataPoint {
    /// Start, epoch nanoseconds
    #[serde(default, deserialize_with = "opt_int_or_string")]
    pub start_time_nanos: Option<i64>,
    /// End, epoch nanoseconds
    #[serde(default, deserialize_with = "opt_int_or_string")]
    pub end_time_nanos: Option<i64>,
    /// Data type of the reading
    #[serde(default)]
    pub data_type_name: String,
    /// Values; the first carries the reading
    #[serde(default)]
    pub value: Vec<Value>,
}

impl DataPoint {
    /// Numeric reading of the first value
    #[must_use]
    pub fn first_value(&self) -> Option<f64> {
        self.value.first().and_then(Value::as_f64)
    }
}

/// Integer or floating point value
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    /// Integer reading
    #[serde(default)]
    pub int_val: Option<i64>,
    /// Floating point reading
    #[serde(default)]
    pub fp_val: Option<f64>,
}

impl Value {
    /// Reading as `f64`, preferring the floating point form
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        self.fp_val.or_else(|| self.int_val.map(|v| v as f64))
    }
}

/// `sessions` response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionListResponse {
    /// Sessions overlapping the requested window
    #[serde(default)]
    pub session: Vec<Session>,
}

/// A recorded activity or sleep session
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Provider session id
    #[serde(default)]
    pub id: String,
    /// Human readable name
    #[serde(default)]
    pub name: String,
    /// Numeric activity type
    #[serde(default)]
    pub activity_type: i64,
    /// Start, epoch milliseconds
    #[serde(deserialize_with = "int_or_string")]
    pub start_time_millis: i64,
    /// End, epoch milliseconds
    #[serde(deserialize_with = "int_or_string")]
    pub end_time_millis: i64,
}

impl Session {
    /// Session length in hours
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_hours(&self) -> f64 {
        self.end_time_millis
            .saturating_sub(self.start_time_millis)
            .max(0) as f64 / 3_600_000.0
    }
}

/// Everything one cloud fitness fetch returned
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudFitnessPayload {
    /// Heart rate aggregate
    pub heart_rate: AggregateResponse,
    /// Step count aggregate
    pub steps: AggregateResponse,
    /// Energy expended aggregate
    pub calories: AggregateResponse,
    /// Sessions in the window
    pub sessions: Vec<Session>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

impl IntOrString {
    fn into_i64<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            Self::Int(v) => Ok(v),
            Self::Str(s) => s.trim().parse().map_err(E::custom),
        }
    }
}

fn int_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    IntOrString::deserialize(deserializer)?.into_i64()
}

fn opt_int_or_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    Option::<IntOrString>::deserialize(deserializer)?
        .map(IntOrString::into_i64)
        .transpose()
}
