//! Liftoff detection from the barometric vario
//!
//! Vertical speed is sampled every [`DERIVATIVE_PERIOD_MS`] and smoothed
//! with a 0.9/0.1 exponential filter that runs on every sample.

use tracing::info;

/// Minimum spacing between raw vertical speed updates
pub const DERIVATIVE_PERIOD_MS: u64 = 100;

/// Climb rate above which a flight is assumed to have started (m/s)
pub const DEFAULT_LIFTOFF_THRESHOLD: f32 = 1.5;

const SMOOTHING_KEEP: f32 = 0.9;

/// Tracks the smoothed vertical speed and latches once airborne
#[derive(Debug, Clone)]
pub struct LiftoffDetector {
    threshold: f32,
    in_flight: bool,
    last: Option<(f32, u64)>,
    raw_derivative: f32,
    derivative: f32,
}

impl LiftoffDetector {
    /// Create a detector. With `enabled == false` the detector reports
    /// in-flight from the first sample.
    pub fn new(enabled: bool, threshold: f32) -> Self {
        Self {
            threshold,
            in_flight: !enabled,
            last: None,
            raw_derivative: 0.0,
            derivative: 0.0,
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Smoothed vertical speed in m/s
    pub fn derivative(&self) -> f32 {
        self.derivative
    }

    /// Feed one altitude sample.
    ///
    /// # Arguments
    ///
    /// * `altitude` - Pressure altitude in meters
    /// * `timestamp_ms` - Sample time in milliseconds, monotonic
    /// * `position_valid` - Whether the receiver currently has a position
    ///
    /// # Returns
    ///
    /// `true` once the flight has started (latched)
    pub fn update(&mut self, altitude: f32, timestamp_ms: u64, position_valid: bool) -> bool {
        let (old_alt, old_ms) = *self.last.get_or_insert((altitude, timestamp_ms));

        let elapsed = timestamp_ms.saturating_sub(old_ms);
        if elapsed >= DERIVATIVE_PERIOD_MS {
            self.raw_derivative = (altitude - old_alt) * 1000.0 / elapsed as f32;
            self.last = Some((altitude, timestamp_ms));
        }
        self.derivative = SMOOTHING_KEEP * self.derivative + (1.0 - SMOOTHING_KEEP) * self.raw_derivative;

        if !self.in_flight && self.derivative > self.threshold && position_valid {
            info!("Liftoff detected, vario {:.2} m/s", self.derivative);
            self.in_flight = true;
        }
        self.in_flight
    }
}

impl Default for LiftoffDetector {
    fn default() -> Self {
        Self::new(true, DEFAULT_LIFTOFF_THRESHOLD)
    }
}
