//! Telemetry fixes and their compact wire record.
//!
//! Fix acquisition belongs to the positioning side; this module only snapshots
//! what a [`FixProvider`] currently knows and renders it as a bounded JSON line:
//!
//! ```text
//! {"Id":"AGR 9021","vId":"TRUCK-01","lt":-17.812345,"ln":31.052345,"s":42.1,"h":123.4}
//! ```
//!
//! Coordinates carry 6 decimals, speed (km/h) and heading (degrees) one.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for an encoded record, in bytes.
pub const MAX_RECORD_LEN: usize = 200;

#[derive(Debug, Error, PartialEq)]
pub enum TelemetryError {
    #[error("no location fix available")]
    NoLocation,

    #[error("coordinate out of range: lat {lat}, lon {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("record is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },
}

/// Identifiers stamped on every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub device_id: String,
    pub vehicle_id: String,
}

impl Identity {
    pub fn new(device_id: impl Into<String>, vehicle_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            vehicle_id: vehicle_id.into(),
        }
    }
}

/// Source of position data. Each field is valid or not independently.
pub trait FixProvider {
    /// Whether a location newer than the last one handed out is available.
    fn has_fresh_fix(&self) -> bool;
    /// Latitude and longitude in decimal degrees.
    fn location(&self) -> Option<(f64, f64)>;
    fn speed_kmh(&self) -> Option<f64>;
    fn heading_deg(&self) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
    pub heading_deg: Option<f64>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            speed_kmh: None,
            heading_deg: None,
        }
    }

    pub fn with_speed(mut self, kmh: f64) -> Self {
        self.speed_kmh = Some(kmh);
        self
    }

    pub fn with_heading(mut self, deg: f64) -> Self {
        self.heading_deg = Some(deg);
        self
    }

    /// Snapshot whatever the provider has right now; `None` without a location.
    pub fn from_provider<P: FixProvider + ?Sized>(provider: &P) -> Option<Self> {
        let (latitude, longitude) = provider.location()?;
        Some(Self {
            latitude,
            longitude,
            speed_kmh: provider.speed_kmh(),
            heading_deg: provider.heading_deg(),
        })
    }
}

/// A provider backed by fixed values (CLI input, replays).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualFix {
    pub location: Option<(f64, f64)>,
    pub speed_kmh: Option<f64>,
    pub heading_deg: Option<f64>,
}

impl FixProvider for ManualFix {
    fn has_fresh_fix(&self) -> bool {
        self.location.is_some()
    }
    fn location(&self) -> Option<(f64, f64)> {
        self.location
    }
    fn speed_kmh(&self) -> Option<f64> {
        self.speed_kmh
    }
    fn heading_deg(&self) -> Option<f64> {
        self.heading_deg
    }
}

fn valid_or_zero(v: Option<f64>) -> f64 {
    v.filter(|x| x.is_finite()).unwrap_or(0.0)
}

/// Render the compact record for `fix`. Invalid speed or heading encode as 0.0.
pub fn encode_record(identity: &Identity, fix: &Fix) -> Result<String, TelemetryError> {
    let (lat, lon) = (fix.latitude, fix.longitude);
    if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
        return Err(TelemetryError::InvalidCoordinate { lat, lon });
    }
    // serde_json handles quoting/escaping of the identifiers
    let id = serde_json::Value::from(identity.device_id.as_str());
    let vid = serde_json::Value::from(identity.vehicle_id.as_str());
    let record = format!(
        "{{\"Id\":{},\"vId\":{},\"lt\":{:.6},\"ln\":{:.6},\"s\":{:.1},\"h\":{:.1}}}",
        id,
        vid,
        lat,
        lon,
        valid_or_zero(fix.speed_kmh),
        valid_or_zero(fix.heading_deg)
    );
    if record.len() > MAX_RECORD_LEN {
        return Err(TelemetryError::TooLong {
            len: record.len(),
            max: MAX_RECORD_LEN,
        });
    }
    Ok(record)
}

/// Snapshot `provider` and encode it.
pub fn encode_from_provider<P: FixProvider + ?Sized>(
    identity: &Identity,
    provider: &P,
) -> Result<String, TelemetryError> {
    let fix = Fix::from_provider(provider).ok_or(TelemetryError::NoLocation)?;
    encode_record(identity, &fix)
}
