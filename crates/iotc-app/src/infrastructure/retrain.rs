//! Retrain sample queue and the upload of one sample.
//!
//! The audio pipeline enqueues a captured clip together with the class it
//! should have been; the retrain task posts it to the upload endpoint.

use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::with_timeout;
use embedded_hal_async::delay::DelayNs;
use heapless::String;
use iotc_transfer::{
    ChunkedUploader, ConnectParams, CustomHeader, Endpoint, TransferResult, Transport,
    TransportSession, UploadBuffers, UploadConfig, UploadReport,
};
use log::{debug, error, warn};

use crate::certs::RETRAIN_TRUST_ANCHORS;
use crate::config::{
    CLASS_LABELS, MAX_API_KEY_LEN, MAX_ENDPOINT_LEN, RETRAIN_CONTENT_TYPE, RETRAIN_ENQUEUE_TIMEOUT,
    RETRAIN_MAX_BUFFER_SIZE, RETRAIN_MAX_CLASSIFICATION_LEN, RETRAIN_QUEUE_LEN,
};
use crate::domain::ports::{ConfigKey, ConfigStore, read_config_string};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrainError {
    InvalidBuffer,
    BufferOverflow,
    InvalidMessage,
    QueueFull,
}

impl fmt::Display for RetrainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrainError::InvalidBuffer => write!(f, "empty sample"),
            RetrainError::BufferOverflow => {
                write!(f, "sample larger than {} bytes", RETRAIN_MAX_BUFFER_SIZE)
            }
            RetrainError::InvalidMessage => write!(f, "invalid classification"),
            RetrainError::QueueFull => write!(f, "retrain queue full"),
        }
    }
}

/// One labelled audio sample waiting for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrainData {
    pub payload: &'static [u8],
    pub classification: String<RETRAIN_MAX_CLASSIFICATION_LEN>,
}

impl RetrainData {
    pub fn new(payload: &'static [u8], classification: &str) -> Result<Self, RetrainError> {
        if payload.is_empty() {
            error!("retrain: empty sample buffer");
            return Err(RetrainError::InvalidBuffer);
        }
        if payload.len() > RETRAIN_MAX_BUFFER_SIZE {
            error!("retrain: sample of {} bytes exceeds maximum", payload.len());
            return Err(RetrainError::BufferOverflow);
        }
        if classification.is_empty() {
            return Err(RetrainError::InvalidMessage);
        }
        let classification =
            String::try_from(classification).map_err(|()| RetrainError::InvalidMessage)?;

        Ok(Self {
            payload,
            classification,
        })
    }
}

/// Label of classifier output `index`
pub fn class_label(index: u8) -> Option<&'static str> {
    CLASS_LABELS.get(usize::from(index)).copied()
}

/// Bounded queue between the audio pipeline and the retrain task.
pub struct RetrainQueue {
    channel: Channel<CriticalSectionRawMutex, RetrainData, RETRAIN_QUEUE_LEN>,
}

impl RetrainQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Validate and queue a sample, waiting a bounded time for space.
    pub async fn enqueue(
        &self,
        payload: &'static [u8],
        classification: &str,
    ) -> Result<(), RetrainError> {
        let data = RetrainData::new(payload, classification)?;
        with_timeout(RETRAIN_ENQUEUE_TIMEOUT, self.channel.send(data))
            .await
            .map_err(|_| {
                error!("retrain: failed to enqueue sample, queue full");
                RetrainError::QueueFull
            })?;
        debug!("retrain: sample enqueued");
        Ok(())
    }

    /// Validate and queue a sample without waiting.
    pub fn try_enqueue(
        &self,
        payload: &'static [u8],
        classification: &str,
    ) -> Result<(), RetrainError> {
        let data = RetrainData::new(payload, classification)?;
        self.channel.try_send(data).map_err(|_| {
            warn!("retrain: queue full, sample dropped");
            RetrainError::QueueFull
        })
    }

    pub async fn receive(&self) -> RetrainData {
        self.channel.receive().await
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }
}

impl Default for RetrainQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub static RETRAIN_QUEUE: RetrainQueue = RetrainQueue::new();

/// Upload endpoint and key, provisioned at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCredentials {
    pub api_key: String<MAX_API_KEY_LEN>,
    /// `host/path` or a full URL
    pub endpoint: String<MAX_ENDPOINT_LEN>,
}

impl UploadCredentials {
    /// `None` until both values are present in `store`.
    pub fn load(store: &impl ConfigStore) -> Option<Self> {
        let api_key = read_config_string(store, ConfigKey::S3ApiKey)?;
        let endpoint = read_config_string(store, ConfigKey::S3Endpoint)?;
        Some(Self { api_key, endpoint })
    }
}

/// Post one sample with the retrain headers.
pub async fn upload_sample<T, D>(
    data: &RetrainData,
    credentials: &UploadCredentials,
    transport: T,
    delay: D,
    buffers: &mut UploadBuffers,
    config: UploadConfig,
) -> TransferResult<UploadReport>
where
    T: Transport,
    D: DelayNs,
{
    let endpoint = Endpoint::from_url(&credentials.endpoint)?;
    let headers = [
        CustomHeader::new("Content-Type", RETRAIN_CONTENT_TYPE),
        CustomHeader::new("x-api-key", &credentials.api_key),
        CustomHeader::new("sound-classes", &data.classification),
    ];
    let params = ConnectParams::new(endpoint.host(), endpoint.port().unwrap_or(config.port))
        .with_timeouts(config.connect_timeout, config.read_timeout)
        .with_trust_anchors(&RETRAIN_TRUST_ANCHORS);

    let mut session = TransportSession::connect(transport, params).await?;
    let result = ChunkedUploader::new(&mut session, buffers, delay, config)
        .post(&endpoint, data.payload, &headers)
        .await;
    session.close().await;
    result
}
