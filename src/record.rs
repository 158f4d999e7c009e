use serde::{Deserialize, Serialize};

/// Angular rates reported by the onboard IMU, in deg/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GyroReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// GPS fix. `sat` is the visible satellite count, which cheaper receivers
/// do not report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsReading {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sat: Option<u32>,
}

/// One fully decoded, validated telemetry sample.
///
/// This is the unit exchanged across the whole pipeline: decoder output,
/// ingestion queue element, and the value handed to the presentation layer.
/// A record is either complete or rejected at the decode boundary; optional
/// fields are `None` when the source did not report them. Zero is a valid
/// sensor value and is never substituted for a missing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<f64>,
    /// Battery charge, 0-100 %.
    pub battery: f64,
    /// Altitude above ground, meters.
    pub altitude: f64,
    /// Signed descent rate, m/s.
    pub vertical_speed: f64,
    /// Ambient temperature, degrees C.
    pub temperature: f64,
    /// Barometric pressure, hPa.
    pub pressure: f64,
    pub gyro: GyroReading,
    pub gps: GpsReading,
    /// Wall-clock capture time, `HH:MM:SS`.
    pub time: String,
}

impl TelemetryRecord {
    /// Number of positional fields in the delimited transport format.
    pub const CSV_FIELD_COUNT: usize = 13;

    /// Encodes the record in the fixed 13-field transport order:
    /// `voltage, gps_lat, gps_lon, altitude, temperature, pressure,
    /// vertical_speed, current, gyro_x, gyro_y, gyro_z, battery, time`.
    ///
    /// The delimited format has no missing-value marker, so absent optional
    /// fields encode as `0`. External recorders that need to distinguish
    /// missing values should serialize the record as JSON instead.
    pub fn to_csv_line(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.voltage.unwrap_or(0.0),
            self.gps.lat,
            self.gps.lon,
            self.altitude,
            self.temperature,
            self.pressure,
            self.vertical_speed,
            self.current.unwrap_or(0.0),
            self.gyro.x,
            self.gyro.y,
            self.gyro.z,
            self.battery,
            self.time,
        )
    }
}
