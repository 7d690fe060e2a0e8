//! OTA task: downloads images requested by cloud commands.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embedded_hal_async::delay::DelayNs;
use heapless::String;
use iotc_transfer::{
    ConnectParams, DownloadBuffers, DownloadConfig, DownloadReport, Endpoint, OtaSink,
    RangeDownloader, TransferResult, Transport, TransportSession,
};
use log::{error, info};

use crate::certs::OTA_TRUST_ANCHORS;
use crate::config::{MAX_FILE_NAME_LEN, MAX_URL_LEN, OTA_DOWNLOAD, OTA_QUEUE_LEN, OTA_STAGING_FILE_PATH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtaRequest {
    /// Presigned image URL
    pub url: String<MAX_URL_LEN>,
    pub file_name: String<MAX_FILE_NAME_LEN>,
}

pub type OtaChannel = Channel<CriticalSectionRawMutex, OtaRequest, OTA_QUEUE_LEN>;
pub type OtaSender<'a> = Sender<'a, CriticalSectionRawMutex, OtaRequest, OTA_QUEUE_LEN>;
pub type OtaReceiver<'a> = Receiver<'a, CriticalSectionRawMutex, OtaRequest, OTA_QUEUE_LEN>;

static OTA_CHANNEL: OtaChannel = Channel::new();

pub fn get_ota_sender() -> OtaSender<'static> {
    OTA_CHANNEL.sender()
}

pub fn get_ota_receiver() -> OtaReceiver<'static> {
    OTA_CHANNEL.receiver()
}

/// Download and activate the image named by `request`.
///
/// The session is closed before returning, whatever the outcome.
pub async fn run_ota<T, D, S>(
    request: &OtaRequest,
    transport: T,
    delay: D,
    sink: &mut S,
    buffers: &mut DownloadBuffers,
    config: DownloadConfig,
) -> TransferResult<DownloadReport>
where
    T: Transport,
    D: DelayNs,
    S: OtaSink,
{
    let endpoint = Endpoint::from_url(&request.url)?;
    let params = ConnectParams::new(endpoint.host(), endpoint.port().unwrap_or(config.port))
        .with_timeouts(config.connect_timeout, config.read_timeout)
        .with_trust_anchors(&OTA_TRUST_ANCHORS);
    let mut session = TransportSession::connect(transport, params).await?;

    let result = match RangeDownloader::new(&mut session, buffers, delay, config) {
        Ok(mut downloader) => downloader.run(endpoint.path(), OTA_STAGING_FILE_PATH, sink).await,
        Err(e) => Err(e),
    };
    session.close().await;
    result
}

/// Serve OTA requests one at a time, forever.
pub async fn ota_task<T, D, S>(
    requests: OtaReceiver<'_>,
    mut transport: T,
    mut delay: D,
    mut sink: S,
    buffers: &mut DownloadBuffers,
) -> !
where
    T: Transport,
    D: DelayNs,
    S: OtaSink,
{
    info!("ota: task started");
    loop {
        let request = requests.receive().await;
        info!("ota: update to {} requested", request.file_name);

        match run_ota(&request, &mut transport, &mut delay, &mut sink, buffers, OTA_DOWNLOAD).await {
            Ok(report) => info!(
                "ota: {} installed, {} bytes in {} chunks, {} reconnects",
                request.file_name, report.total_size, report.chunks, report.reconnects
            ),
            Err(e) => error!("ota: update to {} failed: {}", request.file_name, e),
        }
    }
}
