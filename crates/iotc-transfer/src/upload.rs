//! Chunked POST client.
//!
//! Payloads up to `max_chunk_size` go out as one request. Larger payloads are
//! sent as consecutive requests over the same connection, each tagged with a
//! `Content-Range`; the last one is sent with `Transfer-Encoding: chunked`.

use embedded_hal_async::delay::DelayNs;
use log::{error, info, warn};

use crate::buffers::TransferBuffers;
use crate::config::{MAX_CUSTOM_HEADERS, UploadConfig};
use crate::download::delay_for;
use crate::endpoint::Endpoint;
use crate::error::{Error, TransferResult};
use crate::http::{Body, ByteRange, CustomHeader, HttpClient, Request, Response};
use crate::transport::{Transport, TransportSession};

/// One slice of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadChunk<'p> {
    pub data: &'p [u8],
    pub range: ByteRange,
    pub total: u32,
    pub is_last: bool,
}

/// Progress through a caller owned payload.
#[derive(Debug, Clone)]
pub struct UploadContext<'p> {
    payload: &'p [u8],
    sent: usize,
    chunk_size: usize,
}

impl<'p> UploadContext<'p> {
    pub fn new(payload: &'p [u8], chunk_size: usize) -> TransferResult<Self> {
        if payload.is_empty() || chunk_size == 0 || u32::try_from(payload.len()).is_err() {
            return Err(Error::InvalidParam);
        }
        Ok(Self {
            payload,
            sent: 0,
            chunk_size,
        })
    }

    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn is_done(&self) -> bool {
        self.sent >= self.payload.len()
    }

    /// Chunk to send next, `None` once everything is sent.
    #[allow(clippy::cast_possible_truncation)]
    pub fn next_chunk(&self) -> Option<UploadChunk<'p>> {
        let length = self.payload.len();
        if self.sent >= length {
            return None;
        }
        let size = (length - self.sent).min(self.chunk_size);
        let data = &self.payload[self.sent..self.sent + size];
        // Payload length was checked to fit u32 in `new`.
        Some(UploadChunk {
            data,
            range: ByteRange::new(self.sent as u32, (self.sent + size - 1) as u32),
            total: length as u32,
            is_last: self.sent.saturating_add(self.chunk_size) >= length,
        })
    }

    /// Account for the chunk returned by [`UploadContext::next_chunk`].
    pub fn advance(&mut self) {
        self.sent = self.sent.saturating_add(self.chunk_size).min(self.payload.len());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub bytes_sent: usize,
    pub chunks: u32,
    /// Status of the last response
    pub status: u16,
    pub reconnects: u32,
}

pub struct ChunkedUploader<'s, 'a, T, D, const HEADER: usize, const RESPONSE: usize>
where
    T: Transport,
    D: DelayNs,
{
    client: HttpClient<'s, 'a, T, HEADER, RESPONSE>,
    delay: D,
    config: UploadConfig,
    reconnects: u32,
}

impl<'s, 'a, T, D, const HEADER: usize, const RESPONSE: usize>
    ChunkedUploader<'s, 'a, T, D, HEADER, RESPONSE>
where
    T: Transport,
    D: DelayNs,
{
    pub fn new(
        session: &'s mut TransportSession<'a, T>,
        buffers: &'s mut TransferBuffers<HEADER, RESPONSE>,
        delay: D,
        config: UploadConfig,
    ) -> Self {
        Self {
            client: HttpClient::new(session, buffers),
            delay,
            config,
            reconnects: 0,
        }
    }

    /// Upload `payload`, in one request when it fits a single chunk.
    pub async fn post(
        &mut self,
        endpoint: &Endpoint<'_>,
        payload: &[u8],
        headers: &[CustomHeader<'_>],
    ) -> TransferResult<UploadReport> {
        validate(payload, headers)?;
        if payload.len() <= self.config.max_chunk_size {
            self.post_single(endpoint, payload, headers).await
        } else {
            self.post_chunked(endpoint, payload, headers).await
        }
    }

    /// Upload `payload` as a single request body.
    pub async fn post_single(
        &mut self,
        endpoint: &Endpoint<'_>,
        payload: &[u8],
        headers: &[CustomHeader<'_>],
    ) -> TransferResult<UploadReport> {
        validate(payload, headers)?;
        self.reconnects = 0;
        info!(
            "upload: posting {} bytes to {}{}",
            payload.len(),
            endpoint.host(),
            endpoint.path()
        );

        let request = Request::post(endpoint.host(), endpoint.path()).with_headers(headers);
        let response = self.send(&request, Body::Bytes(payload)).await?;
        check_status(&response, 0, payload.len())?;

        info!("upload: done, status {}", response.status);
        Ok(UploadReport {
            bytes_sent: payload.len(),
            chunks: 1,
            status: response.status,
            reconnects: self.reconnects,
        })
    }

    /// Upload `payload` in `max_chunk_size` requests.
    pub async fn post_chunked(
        &mut self,
        endpoint: &Endpoint<'_>,
        payload: &[u8],
        headers: &[CustomHeader<'_>],
    ) -> TransferResult<UploadReport> {
        validate(payload, headers)?;
        self.reconnects = 0;
        let mut context = UploadContext::new(payload, self.config.max_chunk_size)?;
        info!(
            "upload: posting {} bytes to {}{} in chunks of {}",
            payload.len(),
            endpoint.host(),
            endpoint.path(),
            self.config.max_chunk_size
        );

        let mut chunks = 0u32;
        let mut status = 0;
        while let Some(chunk) = context.next_chunk() {
            let request = Request::post(endpoint.host(), endpoint.path())
                .with_content_range(chunk.range, chunk.total)
                .with_headers(headers);
            let body = if chunk.is_last {
                Body::Chunked(chunk.data)
            } else {
                Body::Bytes(chunk.data)
            };

            let response = self.send(&request, body).await?;
            check_status(&response, chunk.range.start, chunk.data.len())?;
            status = response.status;

            context.advance();
            chunks += 1;
        }

        info!("upload: {} chunks sent, status {}", chunks, status);
        Ok(UploadReport {
            bytes_sent: context.sent(),
            chunks,
            status,
            reconnects: self.reconnects,
        })
    }

    async fn send(&mut self, request: &Request<'_>, body: Body<'_>) -> TransferResult<Response> {
        let mut failures = 0u8;
        loop {
            match self.client.send(request, body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transport() && self.config.retry_budget > 0 => {
                    failures = failures.saturating_add(1);
                    if failures >= self.config.retry_budget {
                        error!("upload: giving up after {} transport failures", failures);
                        return Err(e);
                    }
                    warn!("upload: send failed ({}), reconnecting", e);
                    delay_for(&mut self.delay, self.config.backoff).await;
                    if let Err(e) = self.client.session().reconnect().await {
                        warn!("upload: reconnect failed: {}", e);
                    }
                    self.reconnects += 1;
                }
                Err(e) => {
                    error!("upload: request failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

fn validate(payload: &[u8], headers: &[CustomHeader<'_>]) -> TransferResult {
    if payload.is_empty() {
        error!("upload: empty payload");
        return Err(Error::InvalidParam);
    }
    if headers.len() > MAX_CUSTOM_HEADERS {
        error!(
            "upload: {} custom headers, at most {} allowed",
            headers.len(),
            MAX_CUSTOM_HEADERS
        );
        return Err(Error::InvalidParam);
    }
    Ok(())
}

fn check_status(response: &Response, offset: u32, len: usize) -> TransferResult {
    if response.is_success() {
        return Ok(());
    }
    error!(
        "upload: {} bytes at offset {} rejected with status {}",
        len, offset, response.status
    );
    Err(Error::HttpStatus(response.status))
}
