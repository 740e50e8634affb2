//! Position snapshot
//!
//! [`PositionFix`] is the value the sensor-acquisition context produces and
//! the network-upload context consumes. It is a plain `Copy` struct so it can
//! be published as a single atomic snapshot (see
//! [`crate::core::traits::sync`]): latitude, longitude, validity and the fix
//! timestamp are always replaced together, never field by field.

/// Decoded position fix
///
/// `latitude`/`longitude` are signed decimal degrees. When no valid fix is
/// held, both are zero and `valid` is `false` (the "no fix" sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PositionFix {
    /// Latitude in decimal degrees, positive north
    pub latitude: f64,
    /// Longitude in decimal degrees, positive east
    pub longitude: f64,
    /// UTC time-of-day as transmitted (hhmmss.sss)
    pub utc_time: f64,
    /// Whether the receiver reported the fix as valid
    pub valid: bool,
    /// Monotonic millisecond timestamp of the last valid update
    pub fix_time_ms: u64,
}

impl PositionFix {
    /// Clear the position back to the "no fix" sentinel
    ///
    /// The UTC time and fix timestamp keep their last values; only the
    /// coordinates and the validity flag are reset.
    pub fn invalidate(&mut self) {
        self.latitude = 0.0;
        self.longitude = 0.0;
        self.valid = false;
    }
}
