// ABOUTME: Bluetooth heart-rate sensor adapter and GATT Heart Rate Measurement decoding
// ABOUTME: Pairs through a sensor abstraction and reads one measurement frame per fetch
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Bluetooth Provider
//!
//! Radio access sits behind [`HeartRateSensor`] so the adapter only deals with
//! pairing state and frame decoding. [`SimulatedHeartRateSensor`] stands in for
//! hardware in the CLI and in tests.

use crate::core::{ConnectionHandle, RawProviderPayload, RawSample, WearableProvider};
use crate::registry::ProviderCapabilities;
use crate::synthetic::RandomSampleGenerator;
use async_trait::async_trait;
use chrono::Utc;
use pulse_core::errors::{ProviderError, ProviderResult};
use pulse_core::models::ProviderId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const PROVIDER: ProviderId = ProviderId::Bluetooth;

/// Default time allowed for one characteristic read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// A peripheral that accepted the pairing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedDevice {
    /// Platform device id
    pub id: String,
    /// Advertised name
    pub name: String,
}

/// Decoded Heart Rate Measurement characteristic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartRateMeasurement {
    /// Beats per minute
    pub bpm: u16,
    /// Skin contact, when the sensor reports it
    pub sensor_contact: Option<bool>,
    /// Cumulative energy expended in kilojoules
    pub energy_expended_kj: Option<u16>,
    /// RR intervals in 1/1024 second units
    pub rr_intervals: Vec<u16>,
}

impl HeartRateMeasurement {
    /// Raw sample keyed with the names the bluetooth normalization table expects
    #[must_use]
    pub fn to_sample(&self) -> RawSample {
        let mut sample = RawSample::new(Utc::now()).with_field("bpm", f64::from(self.bpm));
        if let Some(energy) = self.energy_expended_kj {
            sample = sample.with_field("energy_expended_kj", f64::from(energy));
        }
        sample
    }
}

/// Decode a Heart Rate Measurement (0x2A37) frame
///
/// # Errors
///
/// Returns `MalformedResponse` if the frame is shorter than its flags promise.
pub fn parse_heart_rate_measurement(frame: &[u8]) -> ProviderResult<HeartRateMeasurement> {
    let truncated = || ProviderError::malformed(PROVIDER.as_str(), "truncated heart rate frame");
    let (&flags, mut rest) = frame.split_first().ok_or_else(truncated)?;

    let bpm = if flags & 0x01 == 0 {
        let (&value, tail) = rest.split_first().ok_or_else(truncated)?;
        rest = tail;
        u16::from(value)
    } else {
        read_u16(&mut rest).ok_or_else(truncated)?
    };

    let sensor_contact = match (flags >> 1) & 0b11 {
        0b10 => Some(false),
        0b11 => Some(true),
        _ => None,
    };

    let energy_expended_kj = if flags & 0x08 == 0 {
        None
    } else {
        Some(read_u16(&mut rest).ok_or_else(truncated)?)
    };

    let mut rr_intervals = Vec::new();
    if flags & 0x10 != 0 {
        while rest.len() >= 2 {
            rr_intervals.push(read_u16(&mut rest).ok_or_else(truncated)?);
        }
    }

    Ok(HeartRateMeasurement {
        bpm,
        sensor_contact,
        energy_expended_kj,
        rr_intervals,
    })
}

fn read_u16(rest: &mut &[u8]) -> Option<u16> {
    if rest.len() < 2 {
        return None;
    }
    let (value, tail) = rest.split_at(2);
    *rest = tail;
    Some(u16::from_le_bytes([value[0], value[1]]))
}

/// Access to a heart-rate peripheral
#[async_trait]
pub trait HeartRateSensor: Send + Sync {
    /// Ask the platform to pair a device exposing the Heart Rate service
    async fn request_device(&self) -> ProviderResult<PairedDevice>;

    /// Read one Heart Rate Measurement frame from the paired device
    async fn read_measurement(&self, device: &PairedDevice) -> ProviderResult<Vec<u8>>;

    /// Release the GATT connection
    async fn release(&self, device: &PairedDevice) -> ProviderResult<()>;
}

/// Sensor producing plausible frames without hardware
#[derive(Debug)]
pub struct SimulatedHeartRateSensor {
    devices: Vec<PairedDevice>,
    generator: Mutex<RandomSampleGenerator>,
}

impl SimulatedHeartRateSensor {
    /// One simulated chest strap, seeded for reproducible readings
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_devices(
            vec![PairedDevice {
                id: "sim-hrm-0001".to_owned(),
                name: "Simulated HRM".to_owned(),
            }],
            seed,
        )
    }

    /// Sensor advertising the given devices; an empty list never pairs
    #[must_use]
    pub fn with_devices(devices: Vec<PairedDevice>, seed: u64) -> Self {
        Self {
            devices,
            generator: Mutex::new(RandomSampleGenerator::new(seed)),
        }
    }
}

#[async_trait]
impl HeartRateSensor for SimulatedHeartRateSensor {
    async fn request_device(&self) -> ProviderResult<PairedDevice> {
        self.devices
            .first()
            .cloned()
            .ok_or_else(|| ProviderError::DeviceNotFound {
                provider: PROVIDER.to_string(),
                details: "no device advertising the heart rate service".to_owned(),
            })
    }

    async fn read_measurement(&self, _device: &PairedDevice) -> ProviderResult<Vec<u8>> {
        Ok(self.generator.lock().await.heart_rate_frame())
    }

    async fn release(&self, _device: &PairedDevice) -> ProviderResult<()> {
        Ok(())
    }
}

/// Bluetooth heart-rate adapter
pub struct BluetoothProvider {
    sensor: Arc<dyn HeartRateSensor>,
    device: Mutex<Option<PairedDevice>>,
    read_timeout: Duration,
}

impl BluetoothProvider {
    /// Adapter over `sensor`
    #[must_use]
    pub fn new(sensor: Arc<dyn HeartRateSensor>) -> Self {
        Self {
            sensor,
            device: Mutex::new(None),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Override the per-read timeout
    #[must_use]
    pub const fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

#[async_trait]
impl WearableProvider for BluetoothProvider {
    fn id(&self) -> ProviderId {
        PROVIDER
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::HEART_RATE
    }

    async fn connect(&self) -> ProviderResult<ConnectionHandle> {
        let device = self.sensor.request_device().await?;
        info!(device = %device.name, "Paired heart rate sensor");
        let handle = ConnectionHandle::new(PROVIDER, Some(device.name.clone()));
        *self.device.lock().await = Some(device);
        Ok(handle)
    }

    async fn fetch_sample(&self) -> ProviderResult<RawProviderPayload> {
        let device = self
            .device
            .lock()
            .await
            .clone()
            .ok_or_else(|| ProviderError::DeviceNotFound {
                provider: PROVIDER.to_string(),
                details: "no paired device".to_owned(),
            })?;

        let frame = tokio::time::timeout(self.read_timeout, self.sensor.read_measurement(&device))
            .await
            .map_err(|_| {
                ProviderError::network(
                    PROVIDER.as_str(),
                    format!("measurement read timed out after {:?}", self.read_timeout),
                )
            })??;

        let measurement = parse_heart_rate_measurement(&frame)?;
        debug!(bpm = measurement.bpm, "Read heart rate measurement");
        Ok(RawProviderPayload::Sample(measurement.to_sample()))
    }

    async fn disconnect(&self) -> ProviderResult<()> {
        let Some(device) = self.device.lock().await.take() else {
            return Ok(());
        };
        if let Err(e) = self.sensor.release(&device).await {
            warn!(device = %device.name, error = %e, "Failed to release sensor cleanly");
        }
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.device.lock().await.is_some()
    }
}
