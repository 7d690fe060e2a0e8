//! Minimal HTTP/1.1 client framing.
//!
//! Requests are formatted straight into the header buffer; responses are read
//! into the response buffer and described by offsets, so no copy of the body
//! is ever made. The connection is kept alive between requests, which means a
//! response must be consumed exactly up to its `Content-Length`.

use core::fmt::{self, Write};
use core::ops::Range;

use heapless::String;
use log::debug;

use crate::buffers::TransferBuffers;
use crate::error::{Error, TransferResult};
use crate::transport::{Transport, TransportSession};

pub const USER_AGENT: &str = "iotc-transfer/0.1";

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";
const CHUNKED_TRAILER: &[u8] = b"\r\n0\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Caller supplied header. The engine only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomHeader<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl<'a> CustomHeader<'a> {
    pub const fn new(key: &'a str, value: &'a str) -> Self {
        Self { key, value }
    }

    /// Value as it may appear in logs.
    pub fn loggable_value(&self) -> &'a str {
        if cfg!(feature = "mask-secrets") && is_sensitive(self.key) {
            "****"
        } else {
            self.value
        }
    }
}

fn is_sensitive(key: &str) -> bool {
    const SENSITIVE: [&str; 3] = ["x-api-key", "authorization", "x-amz-security-token"];
    SENSITIVE.iter().any(|name| key.trim().eq_ignore_ascii_case(name))
}

/// Inclusive byte range, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u32,
    pub end: u32,
}

impl ByteRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered.
    pub const fn size(&self) -> u32 {
        self.end - self.start + 1
    }
}

/// `Content-Range: bytes <start>-<end>/<total>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub range: ByteRange,
    /// `None` when the server sent `*`
    pub total: Option<u32>,
}

impl ContentRange {
    pub fn parse(value: &str) -> Option<Self> {
        let ranges = value.trim().strip_prefix("bytes ")?;
        let (range, total) = ranges.split_once('/')?;
        let (start, end) = range.split_once('-')?;
        let start = start.trim().parse().ok()?;
        let end = end.trim().parse().ok()?;
        if end < start {
            return None;
        }
        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse().ok()?),
        };
        Some(Self {
            range: ByteRange::new(start, end),
            total,
        })
    }
}

/// Request body framing.
#[derive(Debug, Clone, Copy)]
pub enum Body<'a> {
    Empty,
    /// Sent with `Content-Length`
    Bytes(&'a [u8]),
    /// Sent as a single chunk plus terminator with `Transfer-Encoding: chunked`
    Chunked(&'a [u8]),
}

impl Body<'_> {
    pub fn len(&self) -> usize {
        match self {
            Body::Empty => 0,
            Body::Bytes(b) | Body::Chunked(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Request head description.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    method: Method,
    host: &'a str,
    path: &'a str,
    range: Option<ByteRange>,
    content_range: Option<(ByteRange, u32)>,
    headers: &'a [CustomHeader<'a>],
}

impl<'a> Request<'a> {
    pub const fn new(method: Method, host: &'a str, path: &'a str) -> Self {
        Self {
            method,
            host,
            path,
            range: None,
            content_range: None,
            headers: &[],
        }
    }

    pub const fn get(host: &'a str, path: &'a str) -> Self {
        Self::new(Method::Get, host, path)
    }

    pub const fn post(host: &'a str, path: &'a str) -> Self {
        Self::new(Method::Post, host, path)
    }

    /// Ask for `bytes=<start>-<end>`.
    #[must_use]
    pub const fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Tag the body as `bytes <start>-<end>/<total>` of a larger payload.
    #[must_use]
    pub const fn with_content_range(mut self, range: ByteRange, total: u32) -> Self {
        self.content_range = Some((range, total));
        self
    }

    #[must_use]
    pub const fn with_headers(mut self, headers: &'a [CustomHeader<'a>]) -> Self {
        self.headers = headers;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &'a str {
        self.path
    }

    /// Write the request line and headers, including the blank line.
    pub fn write_head(&self, writer: &mut impl Write, body: &Body<'_>) -> fmt::Result {
        let root = if self.path.starts_with('/') { "" } else { "/" };
        write!(writer, "{} {}{} HTTP/1.1\r\n", self.method.as_str(), root, self.path)?;
        write!(writer, "Host: {}\r\n", self.host)?;
        write!(writer, "User-Agent: {}\r\n", USER_AGENT)?;
        write!(writer, "Connection: keep-alive\r\n")?;
        if let Some(range) = self.range {
            write!(writer, "Range: bytes={}-{}\r\n", range.start, range.end)?;
        }
        if let Some((range, total)) = self.content_range {
            write!(
                writer,
                "Content-Range: bytes {}-{}/{}\r\n",
                range.start, range.end, total
            )?;
        }
        for header in self.headers {
            write!(writer, "{}: {}\r\n", header.key, header.value)?;
        }
        match body {
            Body::Empty if self.method == Method::Get => {}
            Body::Empty => write!(writer, "Content-Length: 0\r\n")?,
            Body::Bytes(b) => write!(writer, "Content-Length: {}\r\n", b.len())?,
            Body::Chunked(_) => write!(writer, "Transfer-Encoding: chunked\r\n")?,
        }
        write!(writer, "\r\n")
    }

    fn log_headers(&self) {
        for header in self.headers {
            debug!("http:   {}: {}", header.key, header.loggable_value());
        }
    }
}

/// Received response, described as offsets into the response buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    head: Range<usize>,
    body: Range<usize>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    pub fn body<'b>(&self, buf: &'b [u8]) -> &'b [u8] {
        &buf[self.body.clone()]
    }

    /// Case-insensitive header lookup.
    pub fn header<'b>(&self, buf: &'b [u8], name: &str) -> Option<&'b str> {
        let head = core::str::from_utf8(&buf[self.head.clone()]).ok()?;
        find_header(head, name)
    }
}

/// Find a header value in a response head. The status line is skipped.
pub fn find_header<'h>(head: &'h str, name: &str) -> Option<&'h str> {
    head.split("\r\n").skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

/// Parse `HTTP/1.x <code> <reason>` and return the code.
pub fn parse_status_line(head: &str) -> Option<u16> {
    let line = head.split("\r\n").next()?;
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/1.") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
        .map(|pos| pos + HEAD_TERMINATOR.len())
}

/// Read one response (head and body) into `buf`.
pub(crate) async fn read_response<T: Transport>(
    session: &mut TransportSession<'_, T>,
    buf: &mut [u8],
) -> TransferResult<Response> {
    let mut filled = 0;
    let head_end = loop {
        if filled == buf.len() {
            return Err(Error::ResponseTooLarge);
        }
        let n = session.recv(&mut buf[filled..]).await?;
        if n == 0 {
            debug!("http: connection closed while reading head");
            return Err(Error::Network);
        }
        let from = filled.saturating_sub(HEAD_TERMINATOR.len() - 1);
        filled += n;
        if let Some(end) = find_head_end(&buf[from..filled]) {
            break from + end;
        }
    };

    let head = core::str::from_utf8(&buf[..head_end]).map_err(|_| Error::Protocol)?;
    let status = parse_status_line(head).ok_or(Error::Protocol)?;
    if let Some(encoding) = find_header(head, "transfer-encoding") {
        if !encoding.eq_ignore_ascii_case("identity") {
            debug!("http: unsupported transfer encoding {}", encoding);
            return Err(Error::Protocol);
        }
    }
    let body_len = match find_header(head, "content-length") {
        Some(value) => value.parse::<usize>().map_err(|_| Error::Protocol)?,
        None => 0,
    };

    let total = head_end
        .checked_add(body_len)
        .ok_or(Error::ResponseTooLarge)?;
    if total > buf.len() {
        debug!("http: body of {} bytes does not fit", body_len);
        return Err(Error::ResponseTooLarge);
    }
    if filled > total {
        debug!("http: {} unexpected bytes after body", filled - total);
        return Err(Error::Protocol);
    }
    while filled < total {
        let n = session.recv(&mut buf[filled..total]).await?;
        if n == 0 {
            debug!("http: connection closed after {} of {} bytes", filled, total);
            return Err(Error::Network);
        }
        filled += n;
    }

    Ok(Response {
        status,
        head: 0..head_end,
        body: head_end..total,
    })
}

/// Request/response cycles over one session, reusing one buffer set.
pub struct HttpClient<'s, 'a, T: Transport, const HEADER: usize, const RESPONSE: usize> {
    session: &'s mut TransportSession<'a, T>,
    buffers: &'s mut TransferBuffers<HEADER, RESPONSE>,
}

impl<'s, 'a, T: Transport, const HEADER: usize, const RESPONSE: usize>
    HttpClient<'s, 'a, T, HEADER, RESPONSE>
{
    pub fn new(
        session: &'s mut TransportSession<'a, T>,
        buffers: &'s mut TransferBuffers<HEADER, RESPONSE>,
    ) -> Self {
        Self { session, buffers }
    }

    pub fn session(&mut self) -> &mut TransportSession<'a, T> {
        self.session
    }

    /// Send a request and read the whole response.
    pub async fn send(&mut self, request: &Request<'_>, body: Body<'_>) -> TransferResult<Response> {
        let (header, response) = self.buffers.split();
        write_head(header, request, &body)?;
        debug!(
            "http: {} {} ({} head bytes, {} body bytes)",
            request.method().as_str(),
            request.path(),
            header.len(),
            body.len()
        );
        request.log_headers();

        self.session.send_all(header.as_bytes()).await?;
        match body {
            Body::Empty => {}
            Body::Bytes(bytes) => self.session.send_all(bytes).await?,
            Body::Chunked(bytes) => {
                let mut size_line = String::<12>::new();
                write!(size_line, "{:x}\r\n", bytes.len())?;
                self.session.send_all(size_line.as_bytes()).await?;
                self.session.send_all(bytes).await?;
                self.session.send_all(CHUNKED_TRAILER).await?;
            }
        }

        let response = read_response(self.session, response).await?;
        debug!("http: status {} ({} body bytes)", response.status, response.body_len());
        Ok(response)
    }

    pub fn body(&self, response: &Response) -> &[u8] {
        response.body(self.buffers.response())
    }

    pub fn header(&self, response: &Response, name: &str) -> Option<&str> {
        response.header(self.buffers.response(), name)
    }
}

fn write_head<const N: usize>(
    header: &mut String<N>,
    request: &Request<'_>,
    body: &Body<'_>,
) -> TransferResult {
    request.write_head(header, body).map_err(|_| {
        debug!("http: request head exceeds {} bytes", N);
        Error::HeaderOverflow
    })
}
