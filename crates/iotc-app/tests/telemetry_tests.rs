//! Integration tests for detection gating and telemetry reports.

mod common;

use common::RecordingPublisher;
use embassy_futures::block_on;
use iotc_app::config::CLASS_COUNT;
use iotc_app::domain::detection::{Classification, DetectionGate, Inference, Outcome, classify};
use iotc_app::domain::ports::PublishError;
use iotc_app::domain::tunables::{ControlCommand, Tunables};
use iotc_app::infrastructure::tasks::publish::{ReportError, TelemetryPublisher};
use iotc_app::infrastructure::telemetry::{
    CredentialRequest, INACTIVE_POSITION, Position, Report, TelemetryError, device_position,
    serialize_message,
};

const DOG: usize = 2;

fn flat_tunables() -> Tunables {
    Tunables {
        confidence_offsets: [0; CLASS_COUNT],
        ..Tunables::DEFAULT
    }
}

fn scored(class: usize, score: f32) -> Inference {
    let mut scores = [0.0; CLASS_COUNT];
    scores[class] = score;
    Inference::new(scores)
}

/// Split a report payload into its text and the parsed position.
fn split_position(payload: &str) -> (&str, Position) {
    let (head, rest) = payload.split_once("\"position\":[").unwrap();
    let (coords, _) = rest.split_once(']').unwrap();
    let (lat, lon) = coords.split_once(',').unwrap();
    (head, Position::new(lat.parse().unwrap(), lon.parse().unwrap()))
}

// -----------------------------------------------------------------------------
// Test 1: Classification
// -----------------------------------------------------------------------------

#[test]
fn offsets_shift_the_winner() {
    let inference = Inference::new([0.5; CLASS_COUNT]);

    let found = classify(&inference, &Tunables::DEFAULT);

    assert_eq!(found.label(), "Glass breaking");
    assert!((88..=89).contains(&found.confidence));
}

#[test]
fn confidence_is_clamped() {
    let mut tunables = flat_tunables();
    tunables.confidence_offsets[DOG] = 50;
    assert_eq!(
        classify(&scored(DOG, 1.0), &tunables),
        Classification { class: DOG, confidence: 100 }
    );

    tunables.confidence_offsets = [-90, -30, -90, -90, -90, -90];
    assert_eq!(
        classify(&scored(1, 0.2), &tunables),
        Classification { class: 1, confidence: 0 }
    );
}

#[test]
fn ties_go_to_the_first_class() {
    let found = classify(&Inference::new([0.25; CLASS_COUNT]), &flat_tunables());
    assert_eq!(found.class, 0);
}

// -----------------------------------------------------------------------------
// Test 2: Gating
// -----------------------------------------------------------------------------

#[test]
fn idle_detection_block_idle_sequence() {
    let tunables = flat_tunables();
    let mut gate = DetectionGate::new();
    let dog = Classification { class: DOG, confidence: 75 };

    let outcomes: Vec<Outcome> = [
        (0, Inference::silence()),
        (100, Inference::silence()),
        (200, scored(DOG, 0.75)),
        (1000, scored(DOG, 0.75)),
        (3000, Inference::silence()),
        (5200, Inference::silence()),
        (5300, Inference::silence()),
    ]
    .iter()
    .map(|(now, inference)| gate.evaluate(inference, &tunables, *now))
    .collect();

    assert_eq!(
        outcomes,
        [
            Outcome::Idle,
            Outcome::Nothing,
            Outcome::Detected(dog),
            Outcome::Nothing,
            Outcome::Nothing,
            Outcome::Idle,
            Outcome::Nothing,
        ]
    );
}

#[test]
fn other_class_and_low_confidence_are_ignored() {
    let tunables = flat_tunables();
    let mut gate = DetectionGate::new();
    assert_eq!(gate.evaluate(&Inference::silence(), &tunables, 0), Outcome::Idle);

    assert_eq!(gate.evaluate(&scored(0, 0.9), &tunables, 10), Outcome::Nothing);
    assert_eq!(gate.evaluate(&scored(DOG, 0.25), &tunables, 20), Outcome::Nothing);
    assert!(!gate.is_blocked(&tunables, 30));
}

#[test]
fn threshold_is_inclusive() {
    let tunables = Tunables {
        confidence_threshold: 50,
        ..flat_tunables()
    };
    let mut gate = DetectionGate::new();

    assert_eq!(
        gate.evaluate(&scored(DOG, 0.5), &tunables, 0),
        Outcome::Detected(Classification { class: DOG, confidence: 50 })
    );
}

#[test]
fn inactivity_timeout_bounds_the_block() {
    let tunables = Tunables {
        inactivity_timeout_ms: 1000,
        ..flat_tunables()
    };
    let mut gate = DetectionGate::new();
    assert!(matches!(gate.evaluate(&scored(DOG, 0.75), &tunables, 500), Outcome::Detected(_)));

    assert!(gate.is_blocked(&tunables, 1499));
    assert!(!gate.is_blocked(&tunables, 1500));
    assert!(matches!(gate.evaluate(&scored(DOG, 0.75), &tunables, 1500), Outcome::Detected(_)));
}

// -----------------------------------------------------------------------------
// Test 3: Payloads
// -----------------------------------------------------------------------------

#[test]
fn idle_report_payload() {
    let mut buf = [0u8; 512];
    let len = serialize_message(Report::idle(), &mut buf).unwrap();
    let payload = core::str::from_utf8(&buf[..len]).unwrap();

    let (head, position) = split_position(payload);
    assert_eq!(
        head,
        r#"{"d":[{"d":{"version":"MLDEMO-1.4.0","class":"not-active","confidence":100,"#
    );
    assert_eq!(position, INACTIVE_POSITION);
    assert!(payload.ends_with(r#"]}}],"mt":0}"#));
}

#[test]
fn credential_request_payload() {
    let mut buf = [0u8; 512];
    let len = serialize_message(CredentialRequest::S3, &mut buf).unwrap();

    assert_eq!(
        core::str::from_utf8(&buf[..len]).unwrap(),
        r#"{"d":[{"d":{"version":"MLDEMO-1.4.0","request":"s3-credentials"}}],"mt":0}"#
    );
}

#[test]
fn small_buffers_are_reported() {
    let mut buf = [0u8; 16];
    assert_eq!(
        serialize_message(Report::idle(), &mut buf),
        Err(TelemetryError::BufferTooSmall)
    );
}

// -----------------------------------------------------------------------------
// Test 4: Publisher
// -----------------------------------------------------------------------------

#[test]
fn publisher_sends_idle_then_detection() {
    let mut publisher = RecordingPublisher::default();

    block_on(async {
        let mut telemetry = TelemetryPublisher::new(&mut publisher, "ml-ai-demo-03").unwrap();
        telemetry.apply(&ControlCommand::SetConfidenceOffsets([0; CLASS_COUNT]));
        telemetry.on_inference(&Inference::silence(), 0).await.unwrap();
        telemetry.on_inference(&scored(DOG, 0.75), 100).await.unwrap();
        telemetry.on_inference(&scored(DOG, 0.75), 200).await.unwrap();
    });

    assert_eq!(publisher.messages.len(), 2);
    for (topic, _) in &publisher.messages {
        assert_eq!(topic, "$aws/rules/msg_d2c_rpt/ml-ai-demo-03/2.1/0");
    }
    let (head, position) = split_position(&publisher.messages[1].1);
    assert_eq!(
        head,
        r#"{"d":[{"d":{"version":"MLDEMO-1.4.0","class":"Dog","confidence":75,"#
    );
    assert_eq!(position, device_position("ml-ai-demo-03"));
}

#[test]
fn commands_change_publisher_tunables() {
    let mut publisher = RecordingPublisher::default();
    let mut telemetry = TelemetryPublisher::new(&mut publisher, "dev").unwrap();

    telemetry.apply(&ControlCommand::SetConfidenceThreshold(90));

    assert_eq!(telemetry.tunables().confidence_threshold, 90);
    assert_eq!(telemetry.tunables().inactivity_timeout_ms, 5000);
}

#[test]
fn offline_publisher_surfaces_the_error() {
    let mut publisher = RecordingPublisher {
        offline: true,
        ..RecordingPublisher::default()
    };

    let result = block_on(async {
        let mut telemetry = TelemetryPublisher::new(&mut publisher, "dev").unwrap();
        telemetry.on_inference(&Inference::silence(), 0).await
    });

    assert_eq!(result, Err(ReportError::Publish(PublishError::NotConnected)));
}
