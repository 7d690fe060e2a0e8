//! Fixed request and response regions reused by every request of an
//! operation.
//!
//! A [`TransferBuffers`] value is owned by exactly one downloader or uploader
//! at a time. Boards usually place it in a `StaticCell` so the memory is
//! neither on the stack nor on a heap.

use heapless::String;

/// Request head capacity.
pub const HEADER_BUFFER_LEN: usize = 2048;
/// Room for the response head on top of the largest expected body.
pub const RESPONSE_SLACK_LEN: usize = 2048;
/// Chunk size of range downloads.
pub const DATA_CHUNK_SIZE: usize = 4096;
/// Response capacity for a [`DATA_CHUNK_SIZE`] body.
pub const RESPONSE_BUFFER_LEN: usize = DATA_CHUNK_SIZE + RESPONSE_SLACK_LEN;

/// Buffers sized for the default download configuration.
pub type DownloadBuffers = TransferBuffers<HEADER_BUFFER_LEN, RESPONSE_BUFFER_LEN>;
/// Upload bodies are sent straight from the caller's payload, so the
/// response side only has to hold a head and a short message.
pub type UploadBuffers = TransferBuffers<HEADER_BUFFER_LEN, RESPONSE_SLACK_LEN>;

pub struct TransferBuffers<const HEADER: usize, const RESPONSE: usize> {
    header: String<HEADER>,
    response: [u8; RESPONSE],
}

impl<const HEADER: usize, const RESPONSE: usize> TransferBuffers<HEADER, RESPONSE> {
    pub const fn new() -> Self {
        Self {
            header: String::new(),
            response: [0; RESPONSE],
        }
    }

    /// Largest body that fits next to a response head of `RESPONSE_SLACK_LEN`.
    pub const fn max_body_len() -> usize {
        RESPONSE.saturating_sub(RESPONSE_SLACK_LEN)
    }

    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// Split into the cleared header buffer and the response region.
    pub(crate) fn split(&mut self) -> (&mut String<HEADER>, &mut [u8]) {
        self.header.clear();
        (&mut self.header, &mut self.response)
    }
}

impl<const HEADER: usize, const RESPONSE: usize> Default for TransferBuffers<HEADER, RESPONSE> {
    fn default() -> Self {
        Self::new()
    }
}
