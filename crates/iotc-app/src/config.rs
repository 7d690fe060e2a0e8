//! Application constants.

use embassy_time::Duration;
use iotc_transfer::{DownloadConfig, UploadConfig};

pub const APP_VERSION: &str = "1.4.0";
/// Version string carried by every telemetry report
pub const REPORT_VERSION: &str = "MLDEMO-1.4.0";

pub const DEVICE_ID_MAX_LEN: usize = 128;
pub const MAX_URL_LEN: usize = 2000;
pub const MAX_FILE_NAME_LEN: usize = 100;
pub const MAX_TOPIC_LEN: usize = 256;
pub const MAX_PUBLISH_LEN: usize = 512;
pub const MAX_API_KEY_LEN: usize = 128;
pub const MAX_ENDPOINT_LEN: usize = 512;
pub const MAX_COMMAND_LEN: usize = 256;

/// Image slot name handed to the OTA sink
pub const OTA_STAGING_FILE_PATH: &str = "b_u585i_iot02a_ntz.bin";

// Classifier
pub const CLASS_COUNT: usize = 6;
/// Labels in classifier output order. Index 0 is never reported.
pub const CLASS_LABELS: [&str; CLASS_COUNT] =
    ["other", "Alarm", "Dog", "Glass breaking", "Knock", "Speech"];
pub const IDLE_CLASS: &str = "not-active";

pub const DEFAULT_CONFIDENCE_THRESHOLD: i32 = 42;
pub const DEFAULT_INACTIVITY_TIMEOUT_MS: i32 = 5000;
pub const DEFAULT_CONFIDENCE_OFFSETS: [i32; CLASS_COUNT] = [0, -49, -19, 39, 27, -25];

// Queues
pub const OTA_QUEUE_LEN: usize = 1;
pub const COMMAND_QUEUE_LEN: usize = 4;
pub const INFERENCE_QUEUE_LEN: usize = 2;
pub const RETRAIN_QUEUE_LEN: usize = 10;
pub const RETRAIN_ENQUEUE_TIMEOUT: Duration = Duration::from_millis(500);

// Retrain upload
pub const RETRAIN_MAX_CLASSIFICATION_LEN: usize = 40;
/// One second of 16 kHz 16-bit mono audio plus a WAV header
pub const RETRAIN_MAX_BUFFER_SIZE: usize = 32_044;
pub const RETRAIN_CONTENT_TYPE: &str = "audio/wav";

// Credentials
pub const CREDENTIAL_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Polls between two credential requests
pub const CREDENTIAL_REQUEST_EVERY: u32 = 12;

pub const OTA_DOWNLOAD: DownloadConfig = DownloadConfig::DEFAULT;
pub const RETRAIN_UPLOAD: UploadConfig = UploadConfig::DEFAULT;
