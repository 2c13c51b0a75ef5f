use crate::types::{SensorEvent, SensorKind};
use glam::Vec3;
use std::collections::VecDeque;
use thiserror::Error;

/// Tag used for accelerometer lines in a recorded log.
pub const ACCEL_TAG: &str = "accel";
/// Tag used for magnetometer lines in a recorded log.
pub const MAG_TAG: &str = "mag";

#[derive(Debug, Error, PartialEq)]
pub enum ReplayError {
    #[error("Unknown sensor tag {0:?}")]
    UnknownSensor(String),
    #[error("Missing field {0} in log line")]
    MissingField(&'static str),
    #[error("Invalid number {0:?} in log line")]
    InvalidNumber(String),
    #[error("Unexpected trailing data {0:?}")]
    TrailingData(String),
}

/// Streaming parser for recorded sensor logs.
///
/// Each line is `<timestamp_ns> <accel|mag> <x> <y> <z>`. Blank lines and lines
/// starting with `#` are skipped. Feed bytes via `push_data`, then drain events
/// via `next_event`.
pub struct ReplayParser {
    buffer: VecDeque<u8>,
}

impl ReplayParser {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(4096),
        }
    }

    /// Append raw log bytes to the internal buffer.
    pub fn push_data(&mut self, data: &[u8]) {
        self.buffer.extend(data);
    }

    /// Try to extract the next event from the buffer.
    /// Returns `None` until a complete line is available.
    pub fn next_event(&mut self) -> Option<Result<SensorEvent, ReplayError>> {
        loop {
            let (line, end) = {
                let buf = self.buffer.make_contiguous();
                let end = buf.iter().position(|&b| b == b'\n')?;
                (String::from_utf8_lossy(&buf[..end]).into_owned(), end)
            };

            // Advance buffer past this line and its newline.
            self.buffer.drain(..=end);

            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return Some(parse_line(line));
        }
    }

    /// Parse whatever is left once the input is exhausted, including a final
    /// line without a trailing newline.
    pub fn finish(&mut self) -> Option<Result<SensorEvent, ReplayError>> {
        if !self.buffer.is_empty() && self.buffer.back() != Some(&b'\n') {
            self.buffer.push_back(b'\n');
        }
        self.next_event()
    }
}

impl Default for ReplayParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a whole log into events, failing on the first bad line.
pub fn parse_log(data: &[u8]) -> Result<Vec<SensorEvent>, ReplayError> {
    let mut parser = ReplayParser::new();
    parser.push_data(data);

    let mut events = Vec::new();
    while let Some(result) = parser.next_event() {
        events.push(result?);
    }
    while let Some(result) = parser.finish() {
        events.push(result?);
    }
    Ok(events)
}

/// Render an event as a log line (without newline).
pub fn format_event(event: &SensorEvent) -> String {
    let tag = match event.kind {
        SensorKind::Accelerometer => ACCEL_TAG,
        SensorKind::MagneticField => MAG_TAG,
    };
    format!(
        "{} {} {} {} {}",
        event.timestamp_ns, tag, event.values.x, event.values.y, event.values.z
    )
}

fn parse_line(line: &str) -> Result<SensorEvent, ReplayError> {
    let mut fields = line.split_whitespace();

    let timestamp = fields.next().ok_or(ReplayError::MissingField("timestamp"))?;
    let timestamp_ns = timestamp
        .parse::<u64>()
        .map_err(|_| ReplayError::InvalidNumber(timestamp.to_string()))?;

    let kind = match fields.next().ok_or(ReplayError::MissingField("sensor"))? {
        ACCEL_TAG => SensorKind::Accelerometer,
        MAG_TAG => SensorKind::MagneticField,
        other => return Err(ReplayError::UnknownSensor(other.to_string())),
    };

    let mut axis = |name: &'static str| -> Result<f32, ReplayError> {
        let raw = fields.next().ok_or(ReplayError::MissingField(name))?;
        raw.parse::<f32>()
            .map_err(|_| ReplayError::InvalidNumber(raw.to_string()))
    };
    let x = axis("x")?;
    let y = axis("y")?;
    let z = axis("z")?;

    if let Some(extra) = fields.next() {
        return Err(ReplayError::TrailingData(extra.to_string()));
    }

    Ok(SensorEvent::new(kind, Vec3::new(x, y, z), timestamp_ns))
}
