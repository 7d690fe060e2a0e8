//! Runtime-adjustable detection parameters.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use log::info;

use crate::config::{
    CLASS_COUNT, COMMAND_QUEUE_LEN, DEFAULT_CONFIDENCE_OFFSETS, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_INACTIVITY_TIMEOUT_MS,
};

/// A cloud command that changes the tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    SetConfidenceOffsets([i32; CLASS_COUNT]),
    SetConfidenceThreshold(i32),
    SetInactivityTimeout(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tunables {
    /// Minimum adjusted confidence, in percent, for a detection
    pub confidence_threshold: i32,
    /// Quiet period after a detection, in milliseconds
    pub inactivity_timeout_ms: i32,
    /// Per-class adjustment added to the raw score, in percent
    pub confidence_offsets: [i32; CLASS_COUNT],
}

impl Tunables {
    pub const DEFAULT: Self = Self {
        confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        inactivity_timeout_ms: DEFAULT_INACTIVITY_TIMEOUT_MS,
        confidence_offsets: DEFAULT_CONFIDENCE_OFFSETS,
    };

    pub fn apply(&mut self, command: &ControlCommand) {
        match *command {
            ControlCommand::SetConfidenceOffsets(offsets) => {
                self.confidence_offsets = offsets;
                info!("control: confidence offsets set to {:?}", offsets);
            }
            ControlCommand::SetConfidenceThreshold(threshold) => {
                self.confidence_threshold = threshold;
                info!("control: confidence threshold set to {}", threshold);
            }
            ControlCommand::SetInactivityTimeout(timeout) => {
                self.inactivity_timeout_ms = timeout;
                info!("control: inactivity timeout set to {} ms", timeout);
            }
        }
    }
}

impl Default for Tunables {
    fn default() -> Self {
        Self::DEFAULT
    }
}

pub type CommandChannel = Channel<CriticalSectionRawMutex, ControlCommand, COMMAND_QUEUE_LEN>;
pub type CommandSender<'a> =
    Sender<'a, CriticalSectionRawMutex, ControlCommand, COMMAND_QUEUE_LEN>;
pub type CommandReceiver<'a> =
    Receiver<'a, CriticalSectionRawMutex, ControlCommand, COMMAND_QUEUE_LEN>;

static COMMAND_CHANNEL: CommandChannel = Channel::new();

pub fn get_command_sender() -> CommandSender<'static> {
    COMMAND_CHANNEL.sender()
}

pub fn get_command_receiver() -> CommandReceiver<'static> {
    COMMAND_CHANNEL.receiver()
}
