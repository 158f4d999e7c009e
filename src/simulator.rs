//! Stateful mission simulator producing physically-plausible descent
//! telemetry when no live link is available.
//!
//! The descent profile follows the flight plan: free fall after ejection,
//! primary chute at 950 m, secondary chute at 500 m, payload expansion at
//! 450 m, audio beacons at 20 m, landed at ground level. Each transition
//! fires exactly once and is announced through the injected [`EventSink`].

use std::sync::Arc;

use chrono::Local;
use rand::Rng;

use crate::events::{EventSeverity, EventSink};
use crate::record::{GpsReading, GyroReading, TelemetryRecord};

const INITIAL_ALTITUDE_M: f64 = 1000.0;
const INITIAL_BATTERY_PCT: f64 = 100.0;

const FREE_FALL_ACCEL_MPS2: f64 = 30.0;
const FREE_FALL_TERMINAL_MPS: f64 = 50.0;
const PRIMARY_CHUTE_VELOCITY_MPS: f64 = 15.0;
const SECONDARY_CHUTE_VELOCITY_MPS: f64 = 2.0;

const PRIMARY_DEPLOY_ALTITUDE_M: f64 = 950.0;
const SECONDARY_DEPLOY_ALTITUDE_M: f64 = 500.0;
const EXPANSION_ALTITUDE_M: f64 = 450.0;
const BEACON_ALTITUDE_M: f64 = 20.0;

const BATTERY_DRAIN_PCT_PER_S: f64 = 0.005;

// Launch site reference position; the payload drifts downrange as it
// descends.
const GPS_BASE_LAT: f64 = 13.0;
const GPS_BASE_LON: f64 = 80.2;
const GPS_DRIFT_DEG_PER_M: f64 = 0.0001;
const GPS_JITTER_DEG: f64 = 0.00005;

/// Discrete stage of the simulated descent profile. Transitions are
/// one-directional and altitude-triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MissionPhase {
    Ejection,
    PrimaryChute,
    SecondaryChute,
    Expansion,
    Beacon,
    Landed,
}

impl MissionPhase {
    pub fn index(self) -> u8 {
        match self {
            MissionPhase::Ejection => 0,
            MissionPhase::PrimaryChute => 1,
            MissionPhase::SecondaryChute => 2,
            MissionPhase::Expansion => 3,
            MissionPhase::Beacon => 4,
            MissionPhase::Landed => 5,
        }
    }
}

/// Generates one telemetry record per [`step`](Self::step) call, advancing
/// the mission-phase state machine and elapsed-time model.
///
/// All simulation state is owned here and mutated only by `step`; the
/// caller drives time by passing a monotonically non-decreasing timestamp.
pub struct MissionSimulator {
    phase: MissionPhase,
    altitude_m: f64,
    velocity_mps: f64,
    battery_pct: f64,
    last_step_ms: Option<u64>,
    // Transition latch, indexed by target phase. Altitude noise can
    // re-cross a threshold; each transition still fires at most once.
    fired: [bool; 6],
    events: Arc<dyn EventSink>,
}

impl MissionSimulator {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            phase: MissionPhase::Ejection,
            altitude_m: INITIAL_ALTITUDE_M,
            velocity_mps: 0.0,
            battery_pct: INITIAL_BATTERY_PCT,
            last_step_ms: None,
            fired: [false; 6],
            events,
        }
    }

    pub fn phase(&self) -> MissionPhase {
        self.phase
    }

    pub fn altitude_m(&self) -> f64 {
        self.altitude_m
    }

    pub fn battery_pct(&self) -> f64 {
        self.battery_pct
    }

    /// Advances the simulation to `now_ms` and returns the resulting
    /// telemetry record.
    ///
    /// `now_ms` must be non-decreasing across calls; the first call uses
    /// `dt = 0`. Derived sensors (temperature, pressure, gyro, GPS) are
    /// recomputed every step and carry no state of their own.
    pub fn step(&mut self, now_ms: u64) -> TelemetryRecord {
        let dt_s = match self.last_step_ms {
            Some(last) => now_ms.saturating_sub(last) as f64 / 1000.0,
            None => 0.0,
        };
        self.last_step_ms = Some(now_ms);

        self.advance_descent(dt_s);
        self.battery_pct = (self.battery_pct - BATTERY_DRAIN_PCT_PER_S * dt_s).max(0.0);

        let mut rng = rand::thread_rng();
        let temperature = 28.0 - 8.0 * (self.altitude_m / 1000.0) + rng.gen_range(-1.0..=1.0);
        // Barometric formula referenced to standard sea-level pressure.
        let pressure = 1013.25 * (1.0 - 0.0065 * self.altitude_m / 288.15).powf(5.255)
            + rng.gen_range(-1.0..=1.0);
        let descended_m = INITIAL_ALTITUDE_M - self.altitude_m;

        TelemetryRecord {
            voltage: None,
            current: None,
            battery: self.battery_pct,
            altitude: self.altitude_m,
            vertical_speed: self.velocity_mps,
            temperature,
            pressure,
            gyro: GyroReading {
                x: rng.gen_range(-2.0..=2.0),
                y: rng.gen_range(-2.0..=2.0),
                z: rng.gen_range(-2.0..=2.0),
            },
            gps: GpsReading {
                lat: GPS_BASE_LAT
                    + descended_m * GPS_DRIFT_DEG_PER_M
                    + rng.gen_range(-GPS_JITTER_DEG..=GPS_JITTER_DEG),
                lon: GPS_BASE_LON
                    + descended_m * GPS_DRIFT_DEG_PER_M
                    + rng.gen_range(-GPS_JITTER_DEG..=GPS_JITTER_DEG),
                sat: Some(rng.gen_range(7..=12)),
            },
            time: Local::now().format("%H:%M:%S").to_string(),
        }
    }

    fn advance_descent(&mut self, dt_s: f64) {
        match self.phase {
            MissionPhase::Ejection => {
                self.velocity_mps =
                    (self.velocity_mps + FREE_FALL_ACCEL_MPS2 * dt_s).min(FREE_FALL_TERMINAL_MPS);
                self.altitude_m -= self.velocity_mps * dt_s;
                if self.altitude_m <= PRIMARY_DEPLOY_ALTITUDE_M
                    && self.fire_once(MissionPhase::PrimaryChute)
                {
                    self.phase = MissionPhase::PrimaryChute;
                    self.velocity_mps = PRIMARY_CHUTE_VELOCITY_MPS;
                    self.emit("Primary parachute deployed!", EventSeverity::Info);
                }
            }
            MissionPhase::PrimaryChute => {
                self.velocity_mps = PRIMARY_CHUTE_VELOCITY_MPS;
                self.altitude_m -= self.velocity_mps * dt_s;
                if self.altitude_m <= SECONDARY_DEPLOY_ALTITUDE_M
                    && self.fire_once(MissionPhase::SecondaryChute)
                {
                    self.phase = MissionPhase::SecondaryChute;
                    self.velocity_mps = SECONDARY_CHUTE_VELOCITY_MPS;
                    self.emit("Secondary parachute deployed!", EventSeverity::Info);
                    self.emit(
                        "Secondary parachute deployed successfully!",
                        EventSeverity::Popup,
                    );
                }
            }
            MissionPhase::SecondaryChute => {
                self.velocity_mps = SECONDARY_CHUTE_VELOCITY_MPS;
                self.altitude_m -= self.velocity_mps * dt_s;
                if self.altitude_m <= EXPANSION_ALTITUDE_M
                    && self.fire_once(MissionPhase::Expansion)
                {
                    self.phase = MissionPhase::Expansion;
                    self.emit("CanSat expansion mechanism completed.", EventSeverity::Info);
                }
                if self.altitude_m <= BEACON_ALTITUDE_M && self.fire_once(MissionPhase::Beacon) {
                    self.phase = MissionPhase::Beacon;
                    self.emit("Audio beacons activated.", EventSeverity::Info);
                }
            }
            MissionPhase::Expansion => {
                self.velocity_mps = SECONDARY_CHUTE_VELOCITY_MPS;
                self.altitude_m -= self.velocity_mps * dt_s;
                if self.altitude_m <= BEACON_ALTITUDE_M && self.fire_once(MissionPhase::Beacon) {
                    self.phase = MissionPhase::Beacon;
                    self.emit("Audio beacons activated.", EventSeverity::Info);
                }
            }
            MissionPhase::Beacon => {
                self.velocity_mps = SECONDARY_CHUTE_VELOCITY_MPS;
                self.altitude_m -= self.velocity_mps * dt_s;
                if self.altitude_m <= 0.0 {
                    self.altitude_m = 0.0;
                    self.velocity_mps = 0.0;
                    self.phase = MissionPhase::Landed;
                }
            }
            MissionPhase::Landed => {
                // Terminal and absorbing; battery and ambient sensors keep
                // evolving, motion does not.
                self.velocity_mps = 0.0;
                self.altitude_m = 0.0;
            }
        }

        if self.altitude_m < 0.0 {
            self.altitude_m = 0.0;
        }
    }

    /// Returns true the first time the transition to `target` is requested.
    fn fire_once(&mut self, target: MissionPhase) -> bool {
        let index = target.index() as usize;
        if self.fired[index] {
            return false;
        }
        self.fired[index] = true;
        true
    }

    fn emit(&self, message: &str, severity: EventSeverity) {
        self.events.on_event(message, severity);
    }
}
