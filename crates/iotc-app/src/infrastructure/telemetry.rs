//! Telemetry payloads and MQTT topics.
//!
//! Every message is an envelope `{"d":[{"d":<body>}],"mt":0}` around one
//! body, serialized with `serde-json-core` into a caller buffer.

use core::fmt::{self, Write as _};

use heapless::String;
use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::config::{IDLE_CLASS, MAX_TOPIC_LEN, REPORT_VERSION};
use crate::domain::detection::Classification;

/// Message type of device-to-cloud reports
const REPORT_MESSAGE_TYPE: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// Payload does not fit the buffer
    BufferTooSmall,
    /// Topic does not fit [`MAX_TOPIC_LEN`]
    TopicTooLong,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::BufferTooSmall => write!(f, "payload buffer too small"),
            TelemetryError::TopicTooLong => write!(f, "topic too long"),
        }
    }
}

/// Map position, serialized as `[lat, lon]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&self.lat)?;
        seq.serialize_element(&self.lon)?;
        seq.end()
    }
}

pub const DEFAULT_POSITION: Position = Position::new(41.877_433, -87.638_993_7);
/// Where idle reports are placed on the map
pub const INACTIVE_POSITION: Position = Position::new(36.240_953, -115.063_345_2);

const DEVICE_POSITIONS: [(&str, Position); 10] = [
    ("ml-ai-demo-01", Position::new(36.086_111_2, -115.178_676_5)),
    ("ml-ai-demo-02", Position::new(36.086_388_6, -115.173_269_2)),
    ("ml-ai-demo-03", Position::new(36.089_822, -115.172_604)),
    ("ml-ai-demo-04", Position::new(36.093_470_6, -115.173_167_1)),
    ("ml-ai-demo-05", Position::new(36.093_349_4, -115.181_460_9)),
    ("ml-ai-demo-06", Position::new(36.086_111_2, -115.178_676_5)),
    ("ml-ai-demo-07", Position::new(36.086_388_6, -115.173_269_2)),
    ("ml-ai-demo-08", Position::new(36.089_822, -115.172_604)),
    ("ml-ai-demo-09", Position::new(36.093_470_6, -115.173_167_1)),
    ("ml-ai-demo-10", Position::new(36.093_349_4, -115.181_460_9)),
];

/// Fixed map position of a demo device.
pub fn device_position(device_id: &str) -> Position {
    DEVICE_POSITIONS
        .iter()
        .find(|(id, _)| *id == device_id)
        .map_or(DEFAULT_POSITION, |(_, position)| *position)
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Report<'a> {
    pub version: &'a str,
    pub class: &'a str,
    pub confidence: u8,
    pub position: Position,
}

impl Report<'static> {
    pub fn detection(detection: Classification, position: Position) -> Self {
        Self {
            version: REPORT_VERSION,
            class: detection.label(),
            confidence: detection.confidence,
            position,
        }
    }

    pub fn idle() -> Self {
        Self {
            version: REPORT_VERSION,
            class: IDLE_CLASS,
            confidence: 100,
            position: INACTIVE_POSITION,
        }
    }
}

/// Asks the cloud to push upload credentials into the device store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CredentialRequest<'a> {
    pub version: &'a str,
    pub request: &'a str,
}

impl CredentialRequest<'static> {
    pub const S3: Self = Self {
        version: REPORT_VERSION,
        request: "s3-credentials",
    };
}

#[derive(serde::Serialize)]
struct Item<T> {
    d: T,
}

#[derive(serde::Serialize)]
struct Envelope<'a, T> {
    d: &'a [Item<T>],
    mt: u8,
}

/// Serialize `body` in a report envelope. Returns the payload length.
pub fn serialize_message<T: Serialize>(body: T, buf: &mut [u8]) -> Result<usize, TelemetryError> {
    let items = [Item { d: body }];
    let envelope = Envelope {
        d: &items,
        mt: REPORT_MESSAGE_TYPE,
    };
    serde_json_core::to_slice(&envelope, buf).map_err(|_| TelemetryError::BufferTooSmall)
}

/// Topic the device listens on for commands
pub fn command_topic(device_id: &str) -> Result<String<MAX_TOPIC_LEN>, TelemetryError> {
    let mut topic = String::new();
    write!(topic, "iot/{}/cmd", device_id).map_err(|_| TelemetryError::TopicTooLong)?;
    Ok(topic)
}

/// Topic reports are published to
pub fn telemetry_topic(device_id: &str) -> Result<String<MAX_TOPIC_LEN>, TelemetryError> {
    let mut topic = String::new();
    write!(topic, "$aws/rules/msg_d2c_rpt/{}/2.1/0", device_id)
        .map_err(|_| TelemetryError::TopicTooLong)?;
    Ok(topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics() {
        assert_eq!(command_topic("dev-1").unwrap().as_str(), "iot/dev-1/cmd");
        assert_eq!(
            telemetry_topic("dev-1").unwrap().as_str(),
            "$aws/rules/msg_d2c_rpt/dev-1/2.1/0"
        );
        let long = [b'x'; MAX_TOPIC_LEN];
        let long = core::str::from_utf8(&long).unwrap();
        assert_eq!(command_topic(long).err(), Some(TelemetryError::TopicTooLong));
    }

    #[test]
    fn unknown_devices_get_the_default_position() {
        assert_eq!(device_position("someone-else"), DEFAULT_POSITION);
        assert_eq!(device_position("ml-ai-demo-08").lat, 36.089_822);
    }
}
