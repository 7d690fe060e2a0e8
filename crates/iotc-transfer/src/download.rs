//! Range-fetch downloader for OTA images.
//!
//! The object size is learned from a `bytes=0-0` probe, then the object is
//! fetched in fixed ranges over one keep-alive connection. Transport failures
//! after the first chunk are cured by reconnecting, up to a budget of
//! consecutive failures per range.

use embassy_time::Duration;
use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::buffers::TransferBuffers;
use crate::config::DownloadConfig;
use crate::error::{Error, ProbeError, TransferResult};
use crate::http::{Body, ByteRange, ContentRange, HttpClient, Request, Response};
use crate::transport::{Transport, TransportSession};

const PROBE_PREFIX: &str = "bytes 0-0/";
/// Up to 9,999,999 bytes
const PROBE_MAX_DIGITS: usize = 7;

/// A sink hook reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkError;

/// Destination of a downloaded image.
pub trait OtaSink {
    /// Prepare to receive `file_size` bytes.
    fn create_file_for_rx(&mut self, file_size: u32, file_path: &str) -> Result<(), SinkError>;

    /// Store `data` at `offset`, returning the number of bytes written.
    fn write_block(&mut self, offset: u32, data: &[u8]) -> usize;

    fn close_file(&mut self) -> Result<(), SinkError>;

    /// Mark the received image as the one to boot.
    fn activate_new_image(&mut self) -> Result<(), SinkError>;

    /// Called every few chunks with the received percentage.
    fn on_progress(&mut self, _percent: u8) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Idle,
    Probing,
    Downloading,
    Reconnecting,
    Finalizing,
    Done,
}

/// Extract `N` from a `Content-Range` value of the form `bytes 0-0/N`.
pub fn parse_probe_total(value: &str) -> Result<u32, ProbeError> {
    let digits = value
        .trim()
        .strip_prefix(PROBE_PREFIX)
        .ok_or(ProbeError::Malformed)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProbeError::Malformed);
    }
    if digits.len() > PROBE_MAX_DIGITS {
        return Err(ProbeError::TooManyDigits);
    }
    digits.parse().map_err(|_| ProbeError::Malformed)
}

/// Offset bookkeeping of a range download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFetchState {
    total_size: u32,
    offset: u32,
    chunk_size: u32,
}

impl RangeFetchState {
    pub fn new(total_size: u32, chunk_size: u32) -> TransferResult<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidParam);
        }
        Ok(Self {
            total_size,
            offset: 0,
            chunk_size,
        })
    }

    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Range to request next, or `None` once the whole object is fetched.
    pub fn next_range(&self) -> Option<ByteRange> {
        if self.offset >= self.total_size {
            return None;
        }
        let end = self
            .offset
            .saturating_add(self.chunk_size - 1)
            .min(self.total_size - 1);
        Some(ByteRange::new(self.offset, end))
    }

    /// Move past the current range.
    pub fn advance(&mut self) {
        self.offset = self
            .offset
            .saturating_add(self.chunk_size)
            .min(self.total_size);
    }

    pub fn progress_percent(&self) -> u8 {
        if self.total_size == 0 {
            return 100;
        }
        let percent = u64::from(self.offset) * 100 / u64::from(self.total_size);
        u8::try_from(percent).unwrap_or(100)
    }
}

impl Iterator for RangeFetchState {
    type Item = ByteRange;

    fn next(&mut self) -> Option<ByteRange> {
        let range = self.next_range()?;
        self.advance();
        Some(range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
    pub total_size: u32,
    pub chunks: u32,
    pub reconnects: u32,
}

pub struct RangeDownloader<'s, 'a, T, D, const HEADER: usize, const RESPONSE: usize>
where
    T: Transport,
    D: DelayNs,
{
    client: HttpClient<'s, 'a, T, HEADER, RESPONSE>,
    delay: D,
    config: DownloadConfig,
    state: DownloadState,
    reconnects: u32,
}

impl<'s, 'a, T, D, const HEADER: usize, const RESPONSE: usize>
    RangeDownloader<'s, 'a, T, D, HEADER, RESPONSE>
where
    T: Transport,
    D: DelayNs,
{
    /// Fails with [`Error::InvalidParam`] when a chunk does not fit the
    /// response buffer.
    pub fn new(
        session: &'s mut TransportSession<'a, T>,
        buffers: &'s mut TransferBuffers<HEADER, RESPONSE>,
        delay: D,
        config: DownloadConfig,
    ) -> TransferResult<Self> {
        let max_body = TransferBuffers::<HEADER, RESPONSE>::max_body_len();
        if config.chunk_size == 0 || config.chunk_size > max_body {
            error!(
                "ota: chunk size {} does not fit response buffer ({} max)",
                config.chunk_size, max_body
            );
            return Err(Error::InvalidParam);
        }
        Ok(Self {
            client: HttpClient::new(session, buffers),
            delay,
            config,
            state: DownloadState::Idle,
            reconnects: 0,
        })
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    /// Download `path` into `sink` and activate it.
    pub async fn run<S: OtaSink>(
        &mut self,
        path: &str,
        file_path: &str,
        sink: &mut S,
    ) -> TransferResult<DownloadReport> {
        self.reconnects = 0;
        self.state = DownloadState::Probing;
        let total_size = self.probe(path).await.inspect_err(|e| {
            error!("ota: size probe of {} failed: {}", path, e);
        })?;
        info!("ota: {} is {} bytes", path, total_size);

        sink.create_file_for_rx(total_size, file_path).map_err(|_| {
            error!("ota: failed to create {}", file_path);
            Error::Sink
        })?;

        self.state = DownloadState::Downloading;
        let chunk_size = u32::try_from(self.config.chunk_size).map_err(|_| Error::InvalidParam)?;
        let mut fetch = RangeFetchState::new(total_size, chunk_size)?;
        let mut chunks = 0u32;
        while let Some(range) = fetch.next_range() {
            let response = self.fetch_range(path, range).await?;
            let body = self.client.body(&response);
            let written = sink.write_block(range.start, body);
            if written != body.len() {
                error!(
                    "ota: sink wrote {} of {} bytes at {}",
                    written,
                    body.len(),
                    range.start
                );
                return Err(Error::WriteMismatch {
                    expected: body.len(),
                    written,
                });
            }
            fetch.advance();

            let every = self.config.progress_every;
            if every != 0 && chunks % every == every - 1 {
                let percent = fetch.progress_percent();
                info!("ota: downloaded {}% ({} of {} bytes)", percent, fetch.offset(), total_size);
                sink.on_progress(percent);
            }
            chunks += 1;
        }
        info!("ota: download complete, {} chunks, {} reconnects", chunks, self.reconnects);

        self.finalize(sink).await?;
        Ok(DownloadReport {
            total_size,
            chunks,
            reconnects: self.reconnects,
        })
    }

    async fn probe(&mut self, path: &str) -> TransferResult<u32> {
        let host = self.client.session().params().host;
        let request = Request::get(host, path).with_range(ByteRange::new(0, 0));
        let response = self.client.send(&request, Body::Empty).await?;
        if !matches!(response.status, 200 | 206) {
            warn!("ota: size probe answered with status {}", response.status);
            return Err(Error::HttpStatus(response.status));
        }
        let value = self
            .client
            .header(&response, "content-range")
            .ok_or(ProbeError::MissingHeader)?;
        let total = parse_probe_total(value)?;
        if total == 0 {
            return Err(ProbeError::Malformed.into());
        }
        Ok(total)
    }

    async fn fetch_range(&mut self, path: &str, range: ByteRange) -> TransferResult<Response> {
        let host = self.client.session().params().host;
        let request = Request::get(host, path).with_range(range);
        let mut failures = 0u8;
        loop {
            match self.client.send(&request, Body::Empty).await {
                Ok(response) => {
                    self.check_chunk(&response, range)?;
                    return Ok(response);
                }
                // The first range shares its fate with the probe; only later
                // ranges are worth reconnecting for.
                Err(e) if e.is_transport() && range.start != 0 => {
                    failures = failures.saturating_add(1);
                    if failures >= self.config.retry_budget {
                        error!(
                            "ota: range {}-{} failed {} times, aborting",
                            range.start, range.end, failures
                        );
                        return Err(Error::DownloadAborted);
                    }
                    warn!(
                        "ota: failed to get range {}-{} ({}), reconnecting",
                        range.start, range.end, e
                    );
                    self.reconnect().await;
                }
                Err(e) => {
                    error!("ota: range {}-{} failed: {}", range.start, range.end, e);
                    return Err(e);
                }
            }
        }
    }

    fn check_chunk(&self, response: &Response, range: ByteRange) -> TransferResult {
        if !matches!(response.status, 200 | 206) {
            return Err(Error::HttpStatus(response.status));
        }
        if let Some(value) = self.client.header(response, "content-range") {
            let content_range = ContentRange::parse(value).ok_or(Error::Protocol)?;
            if content_range.range.start != range.start {
                warn!(
                    "ota: asked for offset {}, got {}",
                    range.start, content_range.range.start
                );
                return Err(Error::Protocol);
            }
        }
        let expected = range.size() as usize;
        if response.body_len() != expected {
            warn!("ota: expected {} bytes, got {}", expected, response.body_len());
            return Err(Error::Protocol);
        }
        Ok(())
    }

    async fn reconnect(&mut self) {
        self.state = DownloadState::Reconnecting;
        delay_for(&mut self.delay, self.config.backoff).await;
        if let Err(e) = self.client.session().reconnect().await {
            // The next attempt on the dead session counts as another failure.
            warn!("ota: reconnect failed: {}", e);
        }
        self.reconnects += 1;
        self.state = DownloadState::Downloading;
    }

    async fn finalize<S: OtaSink>(&mut self, sink: &mut S) -> TransferResult {
        self.state = DownloadState::Finalizing;
        self.client.session().disconnect().await;
        delay_for(&mut self.delay, self.config.settle_delay).await;

        sink.close_file().map_err(|_| {
            error!("ota: failed to close the received file");
            Error::Sink
        })?;
        delay_for(&mut self.delay, self.config.finalize_delay).await;

        sink.activate_new_image().map_err(|_| {
            error!("ota: failed to activate the new image");
            Error::Sink
        })?;
        delay_for(&mut self.delay, self.config.finalize_delay).await;

        info!("ota: new image activated");
        self.state = DownloadState::Done;
        Ok(())
    }
}

pub(crate) async fn delay_for<D: DelayNs>(delay: &mut D, duration: Duration) {
    let ms = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
    delay.delay_ms(ms).await;
}
