//! Test doubles for the application integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashMap;

use embedded_hal_async::delay::DelayNs;
use iotc_app::domain::ports::{ConfigKey, ConfigStore, MessagePublisher, PublishError};
use iotc_transfer::{ConnectParams, OtaSink, SinkError, Transport, TransportError};

#[derive(Debug, Clone)]
pub struct Request {
    pub head: String,
    pub body: Vec<u8>,
}

impl Request {
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

/// HTTP server serving one object for range GETs and accepting POSTs.
#[derive(Debug, Default)]
pub struct FakeServer {
    pub object: Vec<u8>,
    pub hosts: Vec<String>,
    pub ports: Vec<u16>,
    pub anchors: Vec<usize>,
    pub connected: bool,
    pub requests: Vec<Request>,
    inbound: Vec<u8>,
    outbound: Vec<u8>,
}

impl FakeServer {
    pub fn serving(len: usize) -> Self {
        Self {
            object: pattern(len),
            ..Self::default()
        }
    }

    fn process(&mut self) {
        while let Some(end) = find(&self.inbound, b"\r\n\r\n") {
            let head = String::from_utf8(self.inbound[..end + 4].to_vec()).unwrap();
            let mut request = Request {
                head,
                body: Vec::new(),
            };
            let body_len: usize = request
                .header("content-length")
                .map_or(0, |len| len.parse().unwrap());
            if self.inbound.len() < end + 4 + body_len {
                return;
            }
            request.body = self.inbound[end + 4..end + 4 + body_len].to_vec();
            self.inbound.drain(..end + 4 + body_len);
            self.respond(&request);
            self.requests.push(request);
        }
    }

    fn respond(&mut self, request: &Request) {
        if request.request_line().starts_with("POST") {
            self.outbound
                .extend_from_slice(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");
            return;
        }

        let range = request.header("range").unwrap().strip_prefix("bytes=").unwrap();
        let (start, end) = range.split_once('-').unwrap();
        let start: usize = start.parse().unwrap();
        let end = end.parse::<usize>().unwrap().min(self.object.len() - 1);
        let head = format!(
            "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {}-{}/{}\r\nContent-Length: {}\r\n\r\n",
            start,
            end,
            self.object.len(),
            end - start + 1
        );
        self.outbound.extend_from_slice(head.as_bytes());
        self.outbound.extend_from_slice(&self.object[start..=end]);
    }
}

impl Transport for FakeServer {
    async fn connect(&mut self, params: &ConnectParams<'_>) -> Result<(), TransportError> {
        self.hosts.push(params.host.to_string());
        self.ports.push(params.port);
        self.anchors.push(params.trust_anchors.len());
        self.connected = true;
        Ok(())
    }

    async fn send(&mut self, buf: &[u8]) -> Result<usize, TransportError> {
        self.inbound.extend_from_slice(buf);
        self.process();
        Ok(buf.len())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let n = buf.len().min(self.outbound.len());
        buf[..n].copy_from_slice(&self.outbound[..n]);
        self.outbound.drain(..n);
        Ok(n)
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub data: Vec<u8>,
    pub file_path: Option<String>,
    pub activated: bool,
}

impl OtaSink for MemorySink {
    fn create_file_for_rx(&mut self, file_size: u32, file_path: &str) -> Result<(), SinkError> {
        self.data = vec![0; file_size as usize];
        self.file_path = Some(file_path.to_string());
        Ok(())
    }

    fn write_block(&mut self, offset: u32, data: &[u8]) -> usize {
        let start = offset as usize;
        self.data[start..start + data.len()].copy_from_slice(data);
        data.len()
    }

    fn close_file(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    fn activate_new_image(&mut self) -> Result<(), SinkError> {
        self.activated = true;
        Ok(())
    }
}

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

#[derive(Debug, Default)]
pub struct RecordingPublisher {
    pub messages: Vec<(String, String)>,
    pub offline: bool,
}

impl RecordingPublisher {
    pub fn payloads(&self) -> Vec<&str> {
        self.messages.iter().map(|(_, p)| p.as_str()).collect()
    }
}

impl MessagePublisher for RecordingPublisher {
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if self.offline {
            return Err(PublishError::NotConnected);
        }
        let payload = String::from_utf8(payload.to_vec()).unwrap();
        self.messages.push((topic.to_string(), payload));
        Ok(())
    }
}

/// Key-value store whose entries appear after a number of reads.
#[derive(Debug, Default)]
pub struct MapStore {
    pub values: HashMap<&'static str, String>,
    /// Reads of any key that return "unset" before values become visible
    pub hidden_reads: Cell<u32>,
}

impl MapStore {
    pub fn with(mut self, key: ConfigKey, value: &str) -> Self {
        self.values.insert(key.as_str(), value.to_string());
        self
    }
}

impl ConfigStore for MapStore {
    fn get_string(&self, key: ConfigKey, buf: &mut [u8]) -> usize {
        if self.hidden_reads.get() > 0 {
            self.hidden_reads.set(self.hidden_reads.get() - 1);
            return 0;
        }
        let Some(value) = self.values.get(key.as_str()) else {
            return 0;
        };
        let n = value.len().min(buf.len());
        buf[..n].copy_from_slice(&value.as_bytes()[..n]);
        value.len()
    }
}
