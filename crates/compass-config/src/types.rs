use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Initial window size.
    pub window: WindowConfig,
    /// Drawing area for the polygon.
    pub canvas: CanvasConfig,
    /// Sensor source and sampling.
    pub sensors: SensorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 640,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Side of the square canvas in logical pixels.
    pub size: f32,
    /// Gap between the polygon's circumcircle and the canvas edge.
    pub margin: f32,
    /// Polygon fill, linear RGB.
    #[serde(with = "rgb_serde")]
    pub fill_color: Vec3,
    /// Clear color, linear RGB.
    #[serde(with = "rgb_serde")]
    pub background_color: Vec3,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            size: 300.0,
            margin: 20.0,
            // #888888 gray, linear.
            fill_color: Vec3::splat(0.246),
            background_color: Vec3::ONE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Delay between delivered samples. 60ms matches the platform "UI" rate.
    pub sample_interval_ms: u64,
    /// Where samples come from.
    pub source: SourceConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 60,
            source: SourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Device lying flat while the magnetic field turns around it.
    Simulated {
        /// Angular speed of the simulated field.
        degrees_per_second: f32,
        /// Horizontal field magnitude in µT.
        field_strength_ut: f32,
    },
    /// Events read from a recorded sensor log.
    Replay {
        path: PathBuf,
        /// Restart from the first event when the log is exhausted.
        #[serde(default)]
        looped: bool,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Simulated {
            degrees_per_second: 15.0,
            field_strength_ut: 50.0,
        }
    }
}

// Colors are written as plain `[r, g, b]` arrays in TOML.
mod rgb_serde {
    use glam::Vec3;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Vec3, s: S) -> Result<S::Ok, S::Error> {
        [v.x, v.y, v.z].serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec3, D::Error> {
        let [r, g, b] = <[f32; 3]>::deserialize(d)?;
        Ok(Vec3::new(r, g, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.canvas.margin, 20.0);
        assert_eq!(config.sensors.source, SourceConfig::default());
    }

    #[test]
    fn replay_source_parses() {
        let config: AppConfig = toml::from_str(
            r#"
            [sensors]
            sample_interval_ms = 20
            source = { kind = "replay", path = "walk.log" }
            "#,
        )
        .unwrap();

        assert_eq!(config.sensors.sample_interval_ms, 20);
        assert_eq!(
            config.sensors.source,
            SourceConfig::Replay {
                path: PathBuf::from("walk.log"),
                looped: false,
            }
        );
    }

    #[test]
    fn default_survives_toml_round_trip() {
        let text = toml::to_string_pretty(&AppConfig::default()).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.canvas.fill_color, CanvasConfig::default().fill_color);
        assert_eq!(back.sensors.source, SourceConfig::default());
    }
}
