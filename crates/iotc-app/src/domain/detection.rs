//! Turns classifier output into report decisions.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use log::{debug, info};

use crate::config::{CLASS_COUNT, CLASS_LABELS, INFERENCE_QUEUE_LEN};
use crate::domain::tunables::Tunables;

/// Index of the catch-all class, which is never reported
pub const OTHER_CLASS: usize = 0;

/// One classifier run over an audio window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inference {
    /// Raw per-class scores, nominally `0.0..=1.0`
    pub scores: [f32; CLASS_COUNT],
    /// The window was below the silence threshold and was not classified
    pub silent: bool,
}

impl Inference {
    pub const fn new(scores: [f32; CLASS_COUNT]) -> Self {
        Self {
            scores,
            silent: false,
        }
    }

    pub const fn silence() -> Self {
        Self {
            scores: [0.0; CLASS_COUNT],
            silent: true,
        }
    }
}

/// Best class after offsets, with its confidence in percent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub class: usize,
    pub confidence: u8,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        CLASS_LABELS[self.class]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Publish a detection report
    Detected(Classification),
    /// Publish the idle report
    Idle,
    /// Publish nothing
    Nothing,
}

/// Pick the class with the highest offset-adjusted score.
///
/// Ties go to the lower index.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn classify(inference: &Inference, tunables: &Tunables) -> Classification {
    let adjusted = |i: usize| inference.scores[i] + tunables.confidence_offsets[i] as f32 / 100.0;

    let mut best = 0;
    let mut best_score = adjusted(0);
    for i in 1..CLASS_COUNT {
        let score = adjusted(i);
        if score > best_score {
            best = i;
            best_score = score;
        }
    }

    let percent = (100.0 * best_score) as i32;
    Classification {
        class: best,
        confidence: percent.clamp(0, 100) as u8,
    }
}

/// Detection gate state carried between inferences.
#[derive(Debug, Clone)]
pub struct DetectionGate {
    last_detection_ms: Option<u64>,
    idle_pending: bool,
}

impl DetectionGate {
    pub const fn new() -> Self {
        Self {
            last_detection_ms: None,
            idle_pending: true,
        }
    }

    /// A detection happened less than the inactivity timeout ago.
    pub fn is_blocked(&self, tunables: &Tunables, now_ms: u64) -> bool {
        let Some(last) = self.last_detection_ms else {
            return false;
        };
        let elapsed = i64::try_from(now_ms.saturating_sub(last)).unwrap_or(i64::MAX);
        elapsed < i64::from(tunables.inactivity_timeout_ms)
    }

    pub fn evaluate(&mut self, inference: &Inference, tunables: &Tunables, now_ms: u64) -> Outcome {
        if let Some(detection) = self.detect(inference, tunables, now_ms) {
            self.last_detection_ms = Some(now_ms);
            self.idle_pending = true;
            return Outcome::Detected(detection);
        }

        if self.idle_pending && !self.is_blocked(tunables, now_ms) {
            self.idle_pending = false;
            return Outcome::Idle;
        }
        Outcome::Nothing
    }

    fn detect(&self, inference: &Inference, tunables: &Tunables, now_ms: u64) -> Option<Classification> {
        if inference.silent {
            return None;
        }

        let found = classify(inference, tunables);
        if found.class == OTHER_CLASS {
            debug!("telemetry: \"{}\" scored {}, ignoring", found.label(), found.confidence);
            return None;
        }
        if i32::from(found.confidence) < tunables.confidence_threshold {
            debug!(
                "telemetry: confidence low for {} ({}<{}), ignoring",
                found.label(),
                found.confidence,
                tunables.confidence_threshold
            );
            return None;
        }
        if self.is_blocked(tunables, now_ms) {
            info!("telemetry: blocking {} with score {}", found.label(), found.confidence);
            return None;
        }
        Some(found)
    }
}

impl Default for DetectionGate {
    fn default() -> Self {
        Self::new()
    }
}

pub type InferenceChannel = Channel<CriticalSectionRawMutex, Inference, INFERENCE_QUEUE_LEN>;
pub type InferenceSender<'a> = Sender<'a, CriticalSectionRawMutex, Inference, INFERENCE_QUEUE_LEN>;
pub type InferenceReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, Inference, INFERENCE_QUEUE_LEN>;

static INFERENCE_CHANNEL: InferenceChannel = Channel::new();

/// Where the audio pipeline posts classifier results
pub fn get_inference_sender() -> InferenceSender<'static> {
    INFERENCE_CHANNEL.sender()
}

pub fn get_inference_receiver() -> InferenceReceiver<'static> {
    INFERENCE_CHANNEL.receiver()
}
