use crate::fusion::STANDARD_GRAVITY;
use crate::replay::parse_log;
use crate::types::{SensorEvent, SensorKind};
use crate::HeadingInput;
use anyhow::{Context, Result};
use compass_config::{SensorConfig, SourceConfig};
use glam::Vec3;
use std::path::PathBuf;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Where a sensor source delivers its samples.
#[derive(Debug, Clone)]
pub struct SensorSink {
    tx: mpsc::UnboundedSender<HeadingInput>,
}

impl SensorSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<HeadingInput>) -> Self {
        Self { tx }
    }

    /// Deliver one sample. Returns `false` once nobody is listening.
    pub fn send(&self, event: SensorEvent) -> bool {
        self.tx.send(HeadingInput::Sample(event)).is_ok()
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Wait until the receiving side has gone away.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// A provider of accelerometer and magnetometer samples.
///
/// Owned by whatever manages the application lifecycle: subscribe when the
/// app becomes active, unsubscribe when it stops.
pub trait SensorSource: Send {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Start delivering samples into `sink`. Replaces any earlier subscription.
    fn subscribe(&mut self, sink: SensorSink) -> Result<()>;

    /// Stop delivering samples. No-op when not subscribed.
    fn unsubscribe(&mut self);

    fn is_subscribed(&self) -> bool;
}

/// Build the source described by `config`, spawning its tasks on `runtime`.
pub fn from_config(config: &SensorConfig, runtime: Handle) -> Box<dyn SensorSource> {
    let interval = Duration::from_millis(config.sample_interval_ms.max(1));
    match &config.source {
        SourceConfig::Simulated {
            degrees_per_second,
            field_strength_ut,
        } => Box::new(SimulatedSource::new(
            *degrees_per_second,
            *field_strength_ut,
            interval,
            runtime,
        )),
        SourceConfig::Replay { path, looped } => {
            Box::new(ReplaySource::new(path.clone(), *looped, interval, runtime))
        }
    }
}

/// A flat device with the magnetic field turning around it at a fixed rate.
pub struct SimulatedSource {
    degrees_per_second: f32,
    field_strength_ut: f32,
    interval: Duration,
    runtime: Handle,
    task: Option<JoinHandle<()>>,
}

impl SimulatedSource {
    pub fn new(
        degrees_per_second: f32,
        field_strength_ut: f32,
        interval: Duration,
        runtime: Handle,
    ) -> Self {
        Self {
            degrees_per_second,
            field_strength_ut,
            interval,
            runtime,
            task: None,
        }
    }

    /// The accelerometer and magnetometer readings `elapsed` after start.
    ///
    /// The simulated heading is `degrees_per_second * elapsed`.
    pub fn samples_at(&self, elapsed: Duration) -> [SensorEvent; 2] {
        let heading = (self.degrees_per_second * elapsed.as_secs_f32()).to_radians();
        let timestamp_ns = elapsed.as_nanos() as u64;
        let field = Vec3::new(
            -self.field_strength_ut * heading.sin(),
            self.field_strength_ut * heading.cos(),
            0.0,
        );
        [
            SensorEvent::new(
                SensorKind::Accelerometer,
                Vec3::new(0.0, 0.0, STANDARD_GRAVITY),
                timestamp_ns,
            ),
            SensorEvent::new(SensorKind::MagneticField, field, timestamp_ns),
        ]
    }
}

impl SensorSource for SimulatedSource {
    fn name(&self) -> &str {
        "simulated"
    }

    fn subscribe(&mut self, sink: SensorSink) -> Result<()> {
        self.unsubscribe();

        let generator = SimulatedSource::new(
            self.degrees_per_second,
            self.field_strength_ut,
            self.interval,
            self.runtime.clone(),
        );
        let interval = self.interval;

        self.task = Some(self.runtime.spawn(async move {
            let start = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for event in generator.samples_at(start.elapsed()) {
                    if !sink.send(event) {
                        return;
                    }
                }
            }
        }));

        tracing::info!(
            rate_dps = self.degrees_per_second,
            interval_ms = interval.as_millis() as u64,
            "Simulated sensors subscribed"
        );
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!("Simulated sensors unsubscribed");
        }
    }

    fn is_subscribed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

/// Plays back a recorded sensor log.
///
/// Events are paced by their recorded timestamps. When looping, playback
/// waits one sample interval before starting over.
pub struct ReplaySource {
    path: PathBuf,
    looped: bool,
    interval: Duration,
    runtime: Handle,
    task: Option<JoinHandle<()>>,
}

/// Upper bound on a single pause between replayed events.
const MAX_REPLAY_GAP: Duration = Duration::from_secs(1);

impl ReplaySource {
    pub fn new(path: PathBuf, looped: bool, interval: Duration, runtime: Handle) -> Self {
        Self {
            path,
            looped,
            interval,
            runtime,
            task: None,
        }
    }
}

impl SensorSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn subscribe(&mut self, sink: SensorSink) -> Result<()> {
        self.unsubscribe();

        let data = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read sensor log {}", self.path.display()))?;
        let events = parse_log(&data)
            .with_context(|| format!("Invalid sensor log {}", self.path.display()))?;
        if events.is_empty() {
            anyhow::bail!("Sensor log {} has no events", self.path.display());
        }

        tracing::info!(path = ?self.path, events = events.len(), "Replaying sensor log");

        let looped = self.looped;
        let interval = self.interval;
        self.task = Some(self.runtime.spawn(async move {
            loop {
                let mut previous: Option<u64> = None;
                for event in &events {
                    if let Some(prev) = previous {
                        let gap = Duration::from_nanos(event.timestamp_ns.saturating_sub(prev));
                        if !gap.is_zero() {
                            tokio::time::sleep(gap.min(MAX_REPLAY_GAP)).await;
                        }
                    }
                    previous = Some(event.timestamp_ns);

                    if !sink.send(*event) {
                        return;
                    }
                }

                if !looped {
                    tracing::info!("Sensor log finished");
                    return;
                }
                tokio::time::sleep(interval).await;
            }
        }));
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!(path = ?self.path, "Replay stopped");
        }
    }

    fn is_subscribed(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SimulatedSource {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ReplaySource {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
