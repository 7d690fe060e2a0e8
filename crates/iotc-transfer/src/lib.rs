//! # Chunked HTTPS transfer engine
//!
//! `no_std`, allocation free building blocks for moving large objects over a
//! flaky link with fixed memory:
//!
//! - [`transport`]: the secured connection seam and [`TransportSession`]
//! - [`buffers`]: the request/response regions a transfer owns
//! - [`download`]: range-GET OTA downloader with reconnect retry
//! - [`upload`]: chunked POST client with per-chunk `Content-Range`
//! - [`endpoint`]: `host/path` splitting
//!
//! ```no_run
//! # use iotc_transfer::*;
//! # async fn ota<T: Transport, D: embedded_hal_async::delay::DelayNs, S: OtaSink>(
//! #     transport: T, delay: D, sink: &mut S, buffers: &mut DownloadBuffers,
//! # ) -> Result<(), Error> {
//! let endpoint = Endpoint::from_url("https://bucket.s3.amazonaws.com/fw.bin")?;
//! let params = ConnectParams::new(endpoint.host(), 443);
//! let mut session = TransportSession::connect(transport, params).await?;
//! let mut downloader = RangeDownloader::new(&mut session, buffers, delay, DownloadConfig::DEFAULT)?;
//! downloader.run(endpoint.path(), "fw.bin", sink).await?;
//! # Ok(())
//! # }
//! ```

#![no_std]

pub mod buffers;
pub mod config;
pub mod download;
pub mod endpoint;
pub mod error;
pub mod http;
#[cfg(feature = "embassy-net")]
pub mod net;
pub mod transport;
pub mod upload;

pub use buffers::{DownloadBuffers, TransferBuffers, UploadBuffers};
pub use config::{DownloadConfig, UploadConfig};
pub use download::{DownloadReport, DownloadState, OtaSink, RangeDownloader, SinkError};
pub use endpoint::Endpoint;
pub use error::{Error, ProbeError, TransferResult, TransportError};
pub use http::CustomHeader;
pub use transport::{ConnectParams, SessionState, Transport, TransportSession, TrustAnchor};
pub use upload::{ChunkedUploader, UploadReport};
