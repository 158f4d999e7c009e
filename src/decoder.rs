//! Frame decoding: one raw transport line in, one validated record or a
//! typed failure out.
//!
//! The link carries newline-delimited frames in either of two formats: a
//! JSON object, or a fixed-order 13-field comma-separated line. Decoding is
//! an ordered attempt (JSON object first, then delimited) and never panics;
//! malformed input is returned as a [`DecodeError`] for the caller to log
//! and discard.

use serde_json::Value;
use thiserror::Error;

use crate::record::{GpsReading, GyroReading, TelemetryRecord};

/// A frame that could not be turned into a record. Carries the raw input so
/// the operator can see what the link actually delivered.
#[derive(Debug, Error)]
#[error("failed to decode frame {raw:?}: {reason}")]
pub struct DecodeError {
    pub raw: String,
    pub reason: String,
}

impl DecodeError {
    fn new(raw: &str, reason: impl Into<String>) -> Self {
        Self {
            raw: raw.to_string(),
            reason: reason.into(),
        }
    }
}

/// Decodes one raw frame into a [`TelemetryRecord`].
///
/// A frame that parses as a JSON object is validated as a record; any other
/// valid JSON value is rejected outright. Everything else is parsed as the
/// fixed 13-field delimited format. Partial records are never produced.
pub fn decode_frame(raw: &str) -> Result<TelemetryRecord, DecodeError> {
    let line = raw.trim();
    if line.is_empty() {
        return Err(DecodeError::new(raw, "empty frame"));
    }

    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(_)) => serde_json::from_str(line)
            .map_err(|e| DecodeError::new(line, format!("invalid telemetry object: {e}"))),
        Ok(other) => Err(DecodeError::new(
            line,
            format!("JSON frame is not an object (got {other})"),
        )),
        Err(_) => decode_csv(line),
    }
}

/// Positional field order of the delimited format, as emitted by the
/// flight firmware:
/// `voltage, gps_lat, gps_lon, altitude, temperature, pressure,
/// vertical_speed, current, gyro_x, gyro_y, gyro_z, battery, time`.
fn decode_csv(line: &str) -> Result<TelemetryRecord, DecodeError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != TelemetryRecord::CSV_FIELD_COUNT {
        return Err(DecodeError::new(
            line,
            format!(
                "expected {} comma-separated fields, got {}",
                TelemetryRecord::CSV_FIELD_COUNT,
                fields.len()
            ),
        ));
    }

    let num = |index: usize, name: &str| -> Result<f64, DecodeError> {
        fields[index].parse::<f64>().map_err(|_| {
            DecodeError::new(
                line,
                format!("field {index} ({name}) is not numeric: {:?}", fields[index]),
            )
        })
    };

    Ok(TelemetryRecord {
        voltage: Some(num(0, "voltage")?),
        gps: GpsReading {
            lat: num(1, "gps_lat")?,
            lon: num(2, "gps_lon")?,
            sat: None,
        },
        altitude: num(3, "altitude")?,
        temperature: num(4, "temperature")?,
        pressure: num(5, "pressure")?,
        vertical_speed: num(6, "vertical_speed")?,
        current: Some(num(7, "current")?),
        gyro: GyroReading {
            x: num(8, "gyro_x")?,
            y: num(9, "gyro_y")?,
            z: num(10, "gyro_z")?,
        },
        battery: num(11, "battery")?,
        time: fields[12].to_string(),
    })
}
