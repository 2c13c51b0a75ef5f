use crate::types::{OrientationAngles, RotationMatrix, SensorEvent, SensorKind};
use glam::{Mat3, Vec3};

/// Standard gravity (m/s^2).
pub const STANDARD_GRAVITY: f32 = 9.80665;

/// Below this squared acceleration the device is treated as in free fall.
const FREE_FALL_GRAVITY_SQUARED: f32 = 0.01 * STANDARD_GRAVITY * STANDARD_GRAVITY;

/// Minimum magnitude of `field × gravity`. Smaller means the field is
/// (close to) parallel to gravity, or missing.
const MIN_HORIZONTAL_FIELD: f32 = 0.1;

impl RotationMatrix {
    /// Derive the device rotation from a gravity and a geomagnetic vector.
    ///
    /// Returns `None` for degenerate input: non-finite components, free fall,
    /// or a magnetic field that is zero or collinear with gravity.
    pub fn from_gravity_and_field(gravity: Vec3, geomagnetic: Vec3) -> Option<Self> {
        if !gravity.is_finite() || !geomagnetic.is_finite() {
            return None;
        }
        // Huge but finite readings overflow the norms below.
        let gravity_len = gravity.length();
        if !gravity_len.is_finite() || gravity_len * gravity_len < FREE_FALL_GRAVITY_SQUARED {
            return None;
        }

        let east = geomagnetic.cross(gravity);
        let east_len = east.length();
        if !east_len.is_finite() || east_len < MIN_HORIZONTAL_FIELD {
            return None;
        }

        let east = east / east_len;
        let up = gravity / gravity_len;
        let north = up.cross(east);

        let matrix = Mat3::from_cols(east, north, up).transpose();
        matrix.is_finite().then_some(Self(matrix))
    }

    /// Extract azimuth, pitch and roll.
    pub fn orientation(&self) -> OrientationAngles {
        OrientationAngles {
            azimuth: self.at(0, 1).atan2(self.at(1, 1)),
            pitch: (-self.at(2, 1)).clamp(-1.0, 1.0).asin(),
            roll: (-self.at(2, 0)).atan2(self.at(2, 2)),
        }
    }
}

impl OrientationAngles {
    /// Azimuth in degrees, in (-180, 180].
    pub fn azimuth_degrees(&self) -> f32 {
        normalize_degrees(self.azimuth.to_degrees())
    }
}

/// Fold an angle into (-180, 180].
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Fuses accelerometer and magnetometer readings into a compass heading.
///
/// Only the latest sample of each kind is kept. Fusion failures leave the last
/// good azimuth in place; the next usable pair corrects it.
#[derive(Debug, Default)]
pub struct OrientationEstimator {
    gravity: Vec3,
    geomagnetic: Vec3,
    azimuth_degrees: f32,
}

impl OrientationEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the latest reading for `kind`, replacing the previous one.
    pub fn update(&mut self, kind: SensorKind, x: f32, y: f32, z: f32) {
        let sample = Vec3::new(x, y, z);
        match kind {
            SensorKind::Accelerometer => self.gravity = sample,
            SensorKind::MagneticField => self.geomagnetic = sample,
        }
    }

    pub fn update_event(&mut self, event: &SensorEvent) {
        self.update(event.kind, event.values.x, event.values.y, event.values.z);
    }

    /// Rotation matrix for the current pair, if it is usable.
    pub fn rotation_matrix(&self) -> Option<RotationMatrix> {
        RotationMatrix::from_gravity_and_field(self.gravity, self.geomagnetic)
    }

    /// Full orientation for the current pair, if it is usable.
    pub fn orientation(&self) -> Option<OrientationAngles> {
        self.rotation_matrix().map(|r| r.orientation())
    }

    /// Fuse the current pair and store the resulting azimuth.
    ///
    /// Returns the new azimuth in degrees, or `None` when the pair is
    /// degenerate, in which case the previous azimuth is kept.
    pub fn compute_azimuth_degrees(&mut self) -> Option<f32> {
        match self.orientation().filter(|a| a.azimuth.is_finite()) {
            Some(angles) => {
                self.azimuth_degrees = angles.azimuth_degrees();
                Some(self.azimuth_degrees)
            }
            None => {
                tracing::trace!(
                    gravity = ?self.gravity,
                    geomagnetic = ?self.geomagnetic,
                    "Degenerate sensor pair, keeping previous azimuth"
                );
                None
            }
        }
    }

    /// Last successfully fused azimuth in degrees (0 before the first fusion).
    pub fn azimuth_degrees(&self) -> f32 {
        self.azimuth_degrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator_with(gravity: Vec3, field: Vec3) -> OrientationEstimator {
        let mut e = OrientationEstimator::new();
        e.update(SensorKind::Accelerometer, gravity.x, gravity.y, gravity.z);
        e.update(SensorKind::MagneticField, field.x, field.y, field.z);
        e
    }

    #[test]
    fn flat_device_facing_north_is_zero() {
        let mut e = estimator_with(Vec3::new(0.0, 0.0, 9.8), Vec3::new(0.0, 50.0, 0.0));
        let azimuth = e.compute_azimuth_degrees().unwrap();
        assert!(azimuth.abs() < 1e-4, "azimuth = {azimuth}");
    }

    #[test]
    fn north_along_x_is_minus_ninety() {
        let mut e = estimator_with(Vec3::new(0.0, 0.0, 9.8), Vec3::new(50.0, 0.0, 0.0));
        let azimuth = e.compute_azimuth_degrees().unwrap();
        assert!((azimuth + 90.0).abs() < 1e-4, "azimuth = {azimuth}");
    }

    #[test]
    fn north_along_negative_x_is_plus_ninety() {
        let mut e = estimator_with(Vec3::new(0.0, 0.0, 9.8), Vec3::new(-50.0, 0.0, 0.0));
        let azimuth = e.compute_azimuth_degrees().unwrap();
        assert!((azimuth - 90.0).abs() < 1e-4, "azimuth = {azimuth}");
    }

    #[test]
    fn facing_south_reports_positive_one_eighty() {
        let mut e = estimator_with(Vec3::new(0.0, 0.0, 9.8), Vec3::new(0.0, -50.0, 0.0));
        let azimuth = e.compute_azimuth_degrees().unwrap();
        assert!((azimuth - 180.0).abs() < 1e-4, "azimuth = {azimuth}");
    }

    #[test]
    fn field_dip_does_not_change_heading() {
        // Real fields point into the ground; only the horizontal part matters.
        let mut e = estimator_with(Vec3::new(0.0, 0.0, 9.8), Vec3::new(0.0, 22.0, -40.0));
        let azimuth = e.compute_azimuth_degrees().unwrap();
        assert!(azimuth.abs() < 1e-4, "azimuth = {azimuth}");
    }

    #[test]
    fn azimuth_stays_in_half_open_range() {
        let gravity = Vec3::new(0.3, -0.2, 9.7);
        for step in 0..72 {
            let angle = (step as f32 * 5.0).to_radians();
            let field = Vec3::new(30.0 * angle.sin(), 30.0 * angle.cos(), -35.0);
            let mut e = estimator_with(gravity, field);
            let azimuth = e.compute_azimuth_degrees().unwrap();
            assert!(azimuth > -180.0 && azimuth <= 180.0, "azimuth = {azimuth}");
        }
    }

    #[test]
    fn zero_field_keeps_previous_azimuth() {
        let mut e = estimator_with(Vec3::new(0.0, 0.0, 9.8), Vec3::new(50.0, 0.0, 0.0));
        let before = e.compute_azimuth_degrees().unwrap();

        e.update(SensorKind::MagneticField, 0.0, 0.0, 0.0);
        assert!(e.compute_azimuth_degrees().is_none());
        assert_eq!(e.azimuth_degrees(), before);
        assert!(!e.azimuth_degrees().is_nan());
    }

    #[test]
    fn overflowing_field_keeps_previous_azimuth() {
        let mut e = estimator_with(Vec3::new(0.0, 0.0, 9.8), Vec3::new(0.0, 50.0, 0.0));
        let before = e.compute_azimuth_degrees().unwrap();

        e.update(SensorKind::MagneticField, 0.0, 3e38, 0.0);
        assert!(e.compute_azimuth_degrees().is_none());
        assert_eq!(e.azimuth_degrees(), before);
        assert!(!e.azimuth_degrees().is_nan());
    }

    #[test]
    fn overflowing_gravity_is_rejected() {
        assert!(RotationMatrix::from_gravity_and_field(
            Vec3::new(3e38, 3e38, 3e38),
            Vec3::new(0.0, 50.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn field_parallel_to_gravity_is_rejected() {
        let mut e = estimator_with(Vec3::new(0.0, 0.0, 9.8), Vec3::new(0.0, 0.0, -45.0));
        assert!(e.compute_azimuth_degrees().is_none());
        assert_eq!(e.azimuth_degrees(), 0.0);
    }

    #[test]
    fn free_fall_is_rejected() {
        let mut e = estimator_with(Vec3::new(0.0, 0.0, 0.5), Vec3::new(0.0, 50.0, 0.0));
        assert!(e.compute_azimuth_degrees().is_none());
    }

    #[test]
    fn nan_sample_is_rejected() {
        let mut e = estimator_with(Vec3::new(0.0, 0.0, 9.8), Vec3::new(0.0, 50.0, 0.0));
        e.compute_azimuth_degrees().unwrap();
        e.update(SensorKind::Accelerometer, f32::NAN, 0.0, 9.8);
        assert!(e.compute_azimuth_degrees().is_none());
        assert!(e.azimuth_degrees().abs() < 1e-4);
    }

    #[test]
    fn no_samples_means_no_fusion() {
        let mut e = OrientationEstimator::new();
        assert!(e.compute_azimuth_degrees().is_none());
        assert_eq!(e.azimuth_degrees(), 0.0);
    }

    #[test]
    fn rotation_matrix_is_orthonormal() {
        let r = RotationMatrix::from_gravity_and_field(
            Vec3::new(1.2, -0.7, 9.6),
            Vec3::new(12.0, 31.0, -38.0),
        )
        .unwrap();
        let product = r.0 * r.0.transpose();
        assert!(product.abs_diff_eq(Mat3::IDENTITY, 1e-5));
    }

    #[test]
    fn pitched_device_reports_pitch() {
        // Device tilted so gravity lies along +Y: top edge pointing up.
        let e = estimator_with(Vec3::new(0.0, 9.8, 0.0), Vec3::new(0.0, 0.0, -50.0));
        let angles = e.orientation().unwrap();
        assert!((angles.pitch + std::f32::consts::FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn normalize_folds_minus_one_eighty() {
        assert_eq!(normalize_degrees(-180.0), 180.0);
        assert_eq!(normalize_degrees(180.0), 180.0);
        assert!((normalize_degrees(-190.0) - 170.0).abs() < 1e-4);
        assert!((normalize_degrees(370.0) - 10.0).abs() < 1e-4);
    }
}
