//! Telemetry task: gates classifier results and publishes reports.

use embassy_futures::select::{Either, select};
use embassy_time::Instant;
use heapless::String;
use log::{debug, error, info, warn};

use crate::config::{APP_VERSION, MAX_PUBLISH_LEN, MAX_TOPIC_LEN};
use crate::domain::detection::{DetectionGate, Inference, InferenceReceiver, Outcome};
use crate::domain::ports::{MessagePublisher, PublishError};
use crate::domain::tunables::{CommandReceiver, ControlCommand, Tunables};
use crate::infrastructure::telemetry::{
    Position, Report, TelemetryError, device_position, serialize_message, telemetry_topic,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportError {
    Telemetry(TelemetryError),
    Publish(PublishError),
}

impl From<TelemetryError> for ReportError {
    fn from(e: TelemetryError) -> Self {
        ReportError::Telemetry(e)
    }
}

impl From<PublishError> for ReportError {
    fn from(e: PublishError) -> Self {
        ReportError::Publish(e)
    }
}

/// Owns the tunables and the detection gate of one device.
pub struct TelemetryPublisher<P> {
    publisher: P,
    topic: String<MAX_TOPIC_LEN>,
    position: Position,
    tunables: Tunables,
    gate: DetectionGate,
}

impl<P: MessagePublisher> TelemetryPublisher<P> {
    pub fn new(publisher: P, device_id: &str) -> Result<Self, TelemetryError> {
        Ok(Self {
            publisher,
            topic: telemetry_topic(device_id)?,
            position: device_position(device_id),
            tunables: Tunables::DEFAULT,
            gate: DetectionGate::new(),
        })
    }

    pub fn tunables(&self) -> &Tunables {
        &self.tunables
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn apply(&mut self, command: &ControlCommand) {
        self.tunables.apply(command);
    }

    /// Gate one inference and publish the resulting report, if any.
    pub async fn on_inference(
        &mut self,
        inference: &Inference,
        now_ms: u64,
    ) -> Result<Outcome, ReportError> {
        let outcome = self.gate.evaluate(inference, &self.tunables, now_ms);
        let report = match outcome {
            Outcome::Detected(detection) => {
                info!(
                    "telemetry: detected {} ({}%)",
                    detection.label(),
                    detection.confidence
                );
                Report::detection(detection, self.position)
            }
            Outcome::Idle => {
                debug!("telemetry: sending idle report");
                Report::idle()
            }
            Outcome::Nothing => return Ok(outcome),
        };

        let mut payload = [0u8; MAX_PUBLISH_LEN];
        let len = serialize_message(report, &mut payload)?;
        self.publisher.publish(&self.topic, &payload[..len]).await?;
        Ok(outcome)
    }
}

/// Consume inferences and tunables commands, forever.
pub async fn telemetry_task<P: MessagePublisher>(
    publisher: P,
    device_id: &str,
    inferences: InferenceReceiver<'_>,
    commands: CommandReceiver<'_>,
) {
    let mut telemetry = match TelemetryPublisher::new(publisher, device_id) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            error!("telemetry: cannot start for {}: {}", device_id, e);
            return;
        }
    };

    info!("telemetry: app {} publishing to {}", APP_VERSION, telemetry.topic());
    loop {
        match select(inferences.receive(), commands.receive()).await {
            Either::First(inference) => {
                let now_ms = Instant::now().as_millis();
                if let Err(e) = telemetry.on_inference(&inference, now_ms).await {
                    warn!("telemetry: report dropped: {:?}", e);
                }
            }
            Either::Second(command) => telemetry.apply(&command),
        }
    }
}
