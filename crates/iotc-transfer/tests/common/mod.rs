//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;

use embedded_hal_async::delay::DelayNs;
use iotc_transfer::{ConnectParams, OtaSink, SinkError, Transport, TransportError};

/// A request as the server saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub head: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn request_line(&self) -> &str {
        self.head.split("\r\n").next().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.split("\r\n").skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// In-memory HTTP server speaking just enough HTTP/1.1 for range GETs and
/// POSTs, with scripted connection drops.
#[derive(Debug, Default)]
pub struct MockServer {
    pub object: Vec<u8>,
    pub connected: bool,
    pub connects: u32,
    pub disconnects: u32,
    /// Connect attempts after the first one that are refused
    pub refused_reconnects: u32,
    pub requests: Vec<RecordedRequest>,
    /// `Range` header values and how many more times the connection drops
    /// when they are requested
    pub drops: Vec<(String, u32)>,
    /// POST requests that drop the connection before answering
    pub post_drops: u32,
    /// Statuses for upcoming POSTs, `200` once empty
    pub post_statuses: VecDeque<u16>,
    /// Raw response sent for the `bytes=0-0` probe instead of the default
    pub probe_response: Option<String>,
    /// Largest number of bytes a single `recv` returns
    pub recv_limit: Option<usize>,
    inbound: Vec<u8>,
    outbound: VecDeque<u8>,
}

impl MockServer {
    pub fn with_object(object: Vec<u8>) -> Self {
        Self {
            object,
            ..Self::default()
        }
    }

    /// Server whose next `drops` POSTs lose the connection.
    pub fn with_post_drops(drops: u32) -> Self {
        Self {
            post_drops: drops,
            ..Self::default()
        }
    }

    /// Serve `object` with the payload byte at `i` equal to `i % 251`.
    pub fn with_object_len(len: usize) -> Self {
        Self::with_object(pattern(len))
    }

    pub fn drop_on_range(&mut self, range: &str, times: u32) {
        self.drops.push((range.to_string(), times));
    }

    pub fn ranges_requested(&self) -> Vec<String> {
        self.requests
            .iter()
            .filter_map(|r| r.header("range").map(str::to_string))
            .collect()
    }

    fn process(&mut self) {
        while let Some((consumed, request)) = parse_request(&self.inbound) {
            self.inbound.drain(..consumed);
            self.requests.push(request.clone());
            self.respond(&request);
            if !self.connected {
                return;
            }
        }
    }

    fn respond(&mut self, request: &RecordedRequest) {
        if request.request_line().starts_with("POST") {
            if self.post_drops > 0 {
                self.post_drops -= 1;
                self.drop_connection();
                return;
            }
            let status = self.post_statuses.pop_front().unwrap_or(200);
            self.push_response(&format!("HTTP/1.1 {} Status\r\nContent-Length: 0\r\n\r\n", status), &[]);
            return;
        }

        let range = request.header("range").unwrap_or_default().to_string();
        if let Some((_, remaining)) = self.drops.iter_mut().find(|(r, n)| *r == range && *n > 0) {
            *remaining -= 1;
            self.drop_connection();
            return;
        }
        if range == "bytes=0-0" {
            if let Some(raw) = self.probe_response.clone() {
                self.push_response(&raw, &[]);
                return;
            }
        }

        let (start, end) = parse_range(&range);
        let total = self.object.len();
        let end = end.min(total - 1);
        let head = format!(
            "HTTP/1.1 206 Partial Content\r\nContent-Type: application/octet-stream\r\n\
             Content-Range: bytes {}-{}/{}\r\nContent-Length: {}\r\n\r\n",
            start,
            end,
            total,
            end - start + 1
        );
        let body = self.object[start..=end].to_vec();
        self.push_response(&head, &body);
    }

    fn push_response(&mut self, head: &str, body: &[u8]) {
        self.outbound.extend(head.as_bytes());
        self.outbound.extend(body);
    }

    fn drop_connection(&mut self) {
        self.connected = false;
        self.outbound.clear();
        self.inbound.clear();
    }
}

impl Transport for MockServer {
    async fn connect(&mut self, _params: &ConnectParams<'_>) -> Result<(), TransportError> {
        if self.connects > 0 && self.refused_reconnects > 0 {
            self.refused_reconnects -= 1;
            return Err(TransportError::Network);
        }
        self.connected = true;
        self.connects += 1;
        self.inbound.clear();
        self.outbound.clear();
        Ok(())
    }

    async fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        if !self.connected {
            return Err(TransportError::Network);
        }
        self.inbound.extend_from_slice(buf);
        self.process();
        Ok(buf.len())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if !self.connected {
            return Err(TransportError::Network);
        }
        let limit = self.recv_limit.unwrap_or(usize::MAX);
        let n = buf.len().min(self.outbound.len()).min(limit);
        for slot in &mut buf[..n] {
            *slot = self.outbound.pop_front().unwrap();
        }
        Ok(n)
    }

    async fn disconnect(&mut self) {
        self.connected = false;
        self.disconnects += 1;
    }
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn parse_range(value: &str) -> (usize, usize) {
    let bounds = value.strip_prefix("bytes=").expect("range header");
    let (start, end) = bounds.split_once('-').expect("range separator");
    (start.parse().unwrap(), end.parse().unwrap())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Split one complete request off the front of `buf`.
fn parse_request(buf: &[u8]) -> Option<(usize, RecordedRequest)> {
    let head_end = find(buf, b"\r\n\r\n")? + 4;
    let head = String::from_utf8(buf[..head_end].to_vec()).expect("utf-8 head");
    let mut request = RecordedRequest {
        head,
        body: Vec::new(),
    };

    if let Some(len) = request.header("content-length") {
        let len: usize = len.parse().unwrap();
        if buf.len() < head_end + len {
            return None;
        }
        request.body = buf[head_end..head_end + len].to_vec();
        return Some((head_end + len, request));
    }

    if request.header("transfer-encoding") == Some("chunked") {
        let mut pos = head_end;
        loop {
            let line_end = pos + find(&buf[pos..], b"\r\n")?;
            let size_line = std::str::from_utf8(&buf[pos..line_end]).unwrap();
            let size = usize::from_str_radix(size_line, 16).unwrap();
            pos = line_end + 2;
            if buf.len() < pos + size + 2 {
                return None;
            }
            request.body.extend_from_slice(&buf[pos..pos + size]);
            assert_eq!(&buf[pos + size..pos + size + 2], b"\r\n");
            pos += size + 2;
            if size == 0 {
                return Some((pos, request));
            }
        }
    }

    Some((head_end, request))
}

/// Sink collecting the image in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub data: Vec<u8>,
    pub file_size: Option<u32>,
    pub file_path: Option<String>,
    pub writes: Vec<(u32, usize)>,
    pub progress: Vec<u8>,
    pub closed: bool,
    pub activated: bool,
    /// Offset at which `write_block` drops the last byte
    pub short_write_at: Option<u32>,
    pub fail_create: bool,
    pub fail_close: bool,
    pub fail_activate: bool,
}

impl OtaSink for MemorySink {
    fn create_file_for_rx(&mut self, file_size: u32, file_path: &str) -> Result<(), SinkError> {
        if self.fail_create {
            return Err(SinkError);
        }
        self.file_size = Some(file_size);
        self.file_path = Some(file_path.to_string());
        self.data = vec![0; file_size as usize];
        Ok(())
    }

    fn write_block(&mut self, offset: u32, data: &[u8]) -> usize {
        let len = if self.short_write_at == Some(offset) {
            data.len() - 1
        } else {
            data.len()
        };
        let start = offset as usize;
        self.data[start..start + len].copy_from_slice(&data[..len]);
        self.writes.push((offset, len));
        len
    }

    fn close_file(&mut self) -> Result<(), SinkError> {
        if self.fail_close {
            return Err(SinkError);
        }
        self.closed = true;
        Ok(())
    }

    fn activate_new_image(&mut self) -> Result<(), SinkError> {
        if self.fail_activate {
            return Err(SinkError);
        }
        self.activated = true;
        Ok(())
    }

    fn on_progress(&mut self, percent: u8) {
        self.progress.push(percent);
    }
}

/// Delay that returns immediately and remembers what it was asked for.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub calls_ms: Vec<u32>,
}

impl DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.calls_ms.push(ns / 1_000_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.calls_ms.push(ms);
    }
}
