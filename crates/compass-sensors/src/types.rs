use glam::{Mat3, Vec3};

/// Which physical sensor produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Linear acceleration including gravity (m/s^2).
    Accelerometer,
    /// Ambient magnetic field (µT).
    MagneticField,
}

/// A single 3-axis reading delivered by a sensor source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    pub kind: SensorKind,
    /// Raw x, y, z values in the sensor's native unit.
    pub values: Vec3,
    /// Source timestamp in nanoseconds.
    pub timestamp_ns: u64,
}

impl SensorEvent {
    pub fn new(kind: SensorKind, values: Vec3, timestamp_ns: u64) -> Self {
        Self {
            kind,
            values,
            timestamp_ns,
        }
    }
}

/// Device-to-world rotation derived from gravity and the geomagnetic field.
///
/// Rows are the world East, North and Up axes expressed in device coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationMatrix(pub Mat3);

impl RotationMatrix {
    /// Element at `row`, `col`.
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.0.row(row)[col]
    }
}

/// Euler angles extracted from a [`RotationMatrix`], in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrientationAngles {
    /// Rotation about the vertical axis (compass heading), -π to π.
    pub azimuth: f32,
    /// Rotation about the device X axis, -π/2 to π/2.
    pub pitch: f32,
    /// Rotation about the device Y axis, -π to π.
    pub roll: f32,
}

/// Heading published to the render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Heading {
    /// Angle to draw with, in degrees.
    pub degrees: f32,
    /// Whether `degrees` is a latched snapshot instead of the live value.
    pub frozen: bool,
}
