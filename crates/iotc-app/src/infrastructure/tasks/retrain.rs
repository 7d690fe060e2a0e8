//! Retrain task: uploads queued samples, one at a time.

use embedded_hal_async::delay::DelayNs;
use iotc_transfer::{TransferResult, Transport, UploadBuffers, UploadReport};
use log::{error, info, warn};

use crate::config::{
    CREDENTIAL_POLL_INTERVAL, CREDENTIAL_REQUEST_EVERY, MAX_PUBLISH_LEN, RETRAIN_UPLOAD,
};
use crate::domain::ports::{ConfigStore, MessagePublisher};
use crate::infrastructure::retrain::{RetrainQueue, UploadCredentials, upload_sample};
use crate::infrastructure::telemetry::{CredentialRequest, serialize_message, telemetry_topic};

/// Poll `store` until the upload credentials show up.
///
/// While they are missing a credential request goes out on `topic` on the
/// first poll and every [`CREDENTIAL_REQUEST_EVERY`] polls after that.
pub async fn wait_for_upload_credentials<C, P, D>(
    store: &C,
    publisher: &mut P,
    topic: &str,
    delay: &mut D,
) -> UploadCredentials
where
    C: ConfigStore,
    P: MessagePublisher,
    D: DelayNs,
{
    let poll_ms = u32::try_from(CREDENTIAL_POLL_INTERVAL.as_millis()).unwrap_or(u32::MAX);
    let mut polls = 0u32;
    loop {
        if let Some(credentials) = UploadCredentials::load(store) {
            return credentials;
        }
        if polls % CREDENTIAL_REQUEST_EVERY == 0 {
            info!("retrain: upload credentials missing, requesting them");
            request_credentials(publisher, topic).await;
        }
        polls = polls.wrapping_add(1);
        delay.delay_ms(poll_ms).await;
    }
}

async fn request_credentials<P: MessagePublisher>(publisher: &mut P, topic: &str) {
    let mut payload = [0u8; MAX_PUBLISH_LEN];
    let len = match serialize_message(CredentialRequest::S3, &mut payload) {
        Ok(len) => len,
        Err(e) => {
            error!("retrain: credential request: {}", e);
            return;
        }
    };
    if let Err(e) = publisher.publish(topic, &payload[..len]).await {
        warn!("retrain: credential request not published: {:?}", e);
    }
}

/// Take the next sample off `queue` and upload it.
pub async fn process_next<T, D, C, P>(
    queue: &RetrainQueue,
    transport: T,
    delay: &mut D,
    store: &C,
    publisher: &mut P,
    topic: &str,
    buffers: &mut UploadBuffers,
) -> TransferResult<UploadReport>
where
    T: Transport,
    D: DelayNs,
    C: ConfigStore,
    P: MessagePublisher,
{
    let data = queue.receive().await;
    info!(
        "retrain: {} byte sample labelled {} received",
        data.payload.len(),
        data.classification
    );

    let credentials = wait_for_upload_credentials(store, publisher, topic, delay).await;
    upload_sample(&data, &credentials, transport, delay, buffers, RETRAIN_UPLOAD).await
}

pub async fn retrain_task<T, D, C, P>(
    queue: &RetrainQueue,
    mut transport: T,
    mut delay: D,
    store: C,
    mut publisher: P,
    device_id: &str,
    buffers: &mut UploadBuffers,
) where
    T: Transport,
    D: DelayNs,
    C: ConfigStore,
    P: MessagePublisher,
{
    let Ok(topic) = telemetry_topic(device_id) else {
        error!("retrain: device id {} does not fit a topic", device_id);
        return;
    };

    info!("retrain: task started");
    loop {
        let result = process_next(
            queue,
            &mut transport,
            &mut delay,
            &store,
            &mut publisher,
            &topic,
            buffers,
        )
        .await;
        match result {
            Ok(report) => info!(
                "retrain: upload done, {} bytes in {} chunks, status {}",
                report.bytes_sent, report.chunks, report.status
            ),
            Err(e) => error!("retrain: upload failed: {}", e),
        }
    }
}
