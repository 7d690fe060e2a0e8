use embassy_time::Duration;

use crate::buffers::DATA_CHUNK_SIZE;

pub const HTTPS_PORT: u16 = 443;
/// Most custom headers an upload accepts.
pub const MAX_CUSTOM_HEADERS: usize = 10;

const IO_TIMEOUT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub port: u16,
    /// Bytes requested per range GET
    pub chunk_size: usize,
    /// Consecutive transport failures tolerated for one range
    pub retry_budget: u8,
    /// Wait before each reconnect
    pub backoff: Duration,
    /// Chunks between progress reports
    pub progress_every: u32,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Wait after the transfer before touching the sink
    pub settle_delay: Duration,
    /// Wait after each finalize hook
    pub finalize_delay: Duration,
}

impl DownloadConfig {
    pub const DEFAULT: Self = Self {
        port: HTTPS_PORT,
        chunk_size: DATA_CHUNK_SIZE,
        retry_budget: 30,
        backoff: Duration::from_millis(1000),
        progress_every: 30,
        connect_timeout: IO_TIMEOUT,
        read_timeout: IO_TIMEOUT,
        settle_delay: Duration::from_millis(500),
        finalize_delay: Duration::from_millis(100),
    };

    #[must_use]
    pub const fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, budget: u8, backoff: Duration) -> Self {
        self.retry_budget = budget;
        self.backoff = backoff;
        self
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub port: u16,
    /// Largest request body; bigger payloads are split
    pub max_chunk_size: usize,
    /// Consecutive transport failures tolerated for one chunk, `0` aborts on
    /// the first one
    pub retry_budget: u8,
    pub backoff: Duration,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl UploadConfig {
    pub const DEFAULT: Self = Self {
        port: HTTPS_PORT,
        max_chunk_size: 4096,
        retry_budget: 0,
        backoff: Duration::from_millis(1000),
        connect_timeout: IO_TIMEOUT,
        read_timeout: IO_TIMEOUT,
    };

    #[must_use]
    pub const fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, budget: u8, backoff: Duration) -> Self {
        self.retry_budget = budget;
        self.backoff = backoff;
        self
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
