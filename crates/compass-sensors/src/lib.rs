pub mod fusion;
pub mod heading;
pub mod replay;
pub mod source;
pub mod types;

use fusion::OrientationEstimator;
use heading::HeadingState;
use source::SensorSink;
use tokio::sync::{mpsc, watch};
use types::{Heading, SensorEvent};

/// Inputs consumed by the heading task, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeadingInput {
    Sample(SensorEvent),
    ToggleFreeze,
}

/// Sensor fusion plus freeze state, driven one input at a time.
#[derive(Debug, Default)]
pub struct HeadingProcessor {
    estimator: OrientationEstimator,
    state: HeadingState,
}

impl HeadingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one input and return the resulting heading.
    pub fn apply(&mut self, input: HeadingInput) -> Heading {
        match input {
            HeadingInput::Sample(event) => {
                self.estimator.update_event(&event);
                if let Some(azimuth) = self.estimator.compute_azimuth_degrees() {
                    self.state.set_live(azimuth);
                }
            }
            HeadingInput::ToggleFreeze => {
                let frozen = self.state.toggle_freeze();
                tracing::info!(
                    frozen,
                    degrees = self.state.current_angle(),
                    "Heading freeze toggled"
                );
            }
        }
        self.state.snapshot()
    }

    pub fn heading(&self) -> Heading {
        self.state.snapshot()
    }
}

/// Handle to the background heading task.
///
/// Sensor sources push samples through a [`SensorSink`]; the task fuses them,
/// applies freeze toggles in the same order, and publishes the latest heading.
pub struct HeadingClient {
    heading_rx: watch::Receiver<Heading>,
    input_tx: mpsc::UnboundedSender<HeadingInput>,
    task: tokio::task::JoinHandle<()>,
}

impl HeadingClient {
    /// Start the heading task on the current tokio runtime.
    pub fn spawn() -> Self {
        let (heading_tx, heading_rx) = watch::channel(Heading::default());
        let (input_tx, input_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(heading_loop(input_rx, heading_tx));

        Self {
            heading_rx,
            input_tx,
            task,
        }
    }

    /// Sink for a [`source::SensorSource`] to deliver samples into.
    pub fn sink(&self) -> SensorSink {
        SensorSink::new(self.input_tx.clone())
    }

    /// Latest published heading (non-blocking).
    pub fn heading(&self) -> Heading {
        *self.heading_rx.borrow()
    }

    /// Receiver that observes every published heading.
    pub fn watch(&self) -> watch::Receiver<Heading> {
        self.heading_rx.clone()
    }

    /// Freeze the heading at its current value, or release the freeze.
    pub fn toggle_freeze(&self) {
        let _ = self.input_tx.send(HeadingInput::ToggleFreeze);
    }
}

impl Drop for HeadingClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Background task: drain inputs, fuse, publish changed headings.
async fn heading_loop(
    mut input_rx: mpsc::UnboundedReceiver<HeadingInput>,
    heading_tx: watch::Sender<Heading>,
) {
    let mut processor = HeadingProcessor::new();
    let mut sample_count: u64 = 0;

    while let Some(input) = input_rx.recv().await {
        if matches!(input, HeadingInput::Sample(_)) {
            sample_count += 1;
            if sample_count % 500 == 0 {
                tracing::debug!(sample_count, "Sensor samples processed");
            }
        }

        let heading = processor.apply(input);
        heading_tx.send_if_modified(|current| {
            if *current == heading {
                false
            } else {
                *current = heading;
                true
            }
        });
    }

    tracing::debug!("Heading input closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use std::time::Duration;
    use types::SensorKind;

    fn accel(x: f32, y: f32, z: f32) -> HeadingInput {
        HeadingInput::Sample(SensorEvent::new(
            SensorKind::Accelerometer,
            Vec3::new(x, y, z),
            0,
        ))
    }

    fn mag(x: f32, y: f32, z: f32) -> HeadingInput {
        HeadingInput::Sample(SensorEvent::new(
            SensorKind::MagneticField,
            Vec3::new(x, y, z),
            0,
        ))
    }

    /// Field for a flat device whose +Y axis points at `heading` degrees.
    fn mag_for_heading(heading: f32) -> HeadingInput {
        let h = heading.to_radians();
        mag(-50.0 * h.sin(), 50.0 * h.cos(), 0.0)
    }

    #[test]
    fn processor_freezes_between_samples() {
        let mut p = HeadingProcessor::new();
        p.apply(accel(0.0, 0.0, 9.8));
        p.apply(mag_for_heading(10.0));
        p.apply(mag_for_heading(45.0));
        let frozen = p.apply(HeadingInput::ToggleFreeze);
        let after = p.apply(mag_for_heading(90.0));

        assert!(frozen.frozen);
        assert!((frozen.degrees - 45.0).abs() < 1e-3);
        assert!((after.degrees - 45.0).abs() < 1e-3);

        let released = p.apply(HeadingInput::ToggleFreeze);
        assert!(!released.frozen);
        assert!((released.degrees - 90.0).abs() < 1e-3);
        assert_eq!(p.heading(), released);
    }

    #[test]
    fn processor_ignores_degenerate_field() {
        let mut p = HeadingProcessor::new();
        p.apply(accel(0.0, 0.0, 9.8));
        let before = p.apply(mag(50.0, 0.0, 0.0));
        let after = p.apply(mag(0.0, 0.0, 0.0));

        assert!((before.degrees + 90.0).abs() < 1e-3);
        assert_eq!(after, before);
    }

    #[test]
    fn processor_waits_for_both_sensors() {
        let mut p = HeadingProcessor::new();
        let heading = p.apply(mag(50.0, 0.0, 0.0));
        assert_eq!(heading, Heading::default());
    }

    #[tokio::test]
    async fn client_publishes_fused_heading() {
        let client = HeadingClient::spawn();
        let sink = client.sink();
        let mut rx = client.watch();

        assert!(sink.send(SensorEvent::new(
            SensorKind::Accelerometer,
            Vec3::new(0.0, 0.0, 9.8),
            1
        )));
        assert!(sink.send(SensorEvent::new(
            SensorKind::MagneticField,
            Vec3::new(50.0, 0.0, 0.0),
            2
        )));

        let heading = tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|h| (h.degrees + 90.0).abs() < 1e-3),
        )
        .await
        .expect("heading not published")
        .map(|h| *h)
        .unwrap();
        assert!(!heading.frozen);
        assert_eq!(client.heading(), heading);
    }

    #[tokio::test]
    async fn client_applies_toggle_in_order() {
        let client = HeadingClient::spawn();
        let sink = client.sink();
        let mut rx = client.watch();

        sink.send(SensorEvent::new(
            SensorKind::Accelerometer,
            Vec3::new(0.0, 0.0, 9.8),
            1,
        ));
        sink.send(SensorEvent::new(
            SensorKind::MagneticField,
            Vec3::new(-50.0, 0.0, 0.0),
            2,
        ));
        client.toggle_freeze();

        let heading = tokio::time::timeout(Duration::from_secs(1), rx.wait_for(|h| h.frozen))
            .await
            .expect("freeze not published")
            .map(|h| *h)
            .unwrap();
        assert!((heading.degrees - 90.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn dropping_client_closes_sinks() {
        let client = HeadingClient::spawn();
        let sink = client.sink();
        drop(client);

        tokio::time::timeout(Duration::from_secs(1), sink.closed())
            .await
            .expect("sink still open");
        assert!(sink.is_closed());
        assert!(!sink.send(SensorEvent::new(
            SensorKind::Accelerometer,
            Vec3::ZERO,
            0
        )));
    }
}
