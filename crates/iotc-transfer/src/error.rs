use core::fmt;

/// Result alias used across the transfer engine.
pub type TransferResult<T = ()> = Result<T, Error>;

/// Errors reported by a [`Transport`](crate::transport::Transport)
/// implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No session object could be set up
    Allocation,
    /// TLS handshake or configuration failure
    Tls,
    /// TCP connect, send or receive failure
    Network,
    /// Operation on a session that is not connected
    NotConnected,
}

/// Failure to read the total object size from the probe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    /// No `Content-Range` header in the response
    MissingHeader,
    /// The header does not read `bytes 0-0/<N>`
    Malformed,
    /// The total size has more digits than supported
    TooManyDigits,
}

/// Transfer engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// No session or buffer available
    Allocation,
    /// TLS handshake or configuration failure
    Tls,
    /// Transport-level connect, send or receive failure
    Network,
    /// Unexpected HTTP status code
    HttpStatus(u16),
    /// Size probe failed
    Probe(ProbeError),
    /// Response framing is malformed or unsupported
    Protocol,
    /// Response does not fit the response buffer
    ResponseTooLarge,
    /// Request head does not fit the header buffer
    HeaderOverflow,
    /// Sink accepted a different number of bytes than supplied
    WriteMismatch { expected: usize, written: usize },
    /// Caller supplied parameter violates a bound
    InvalidParam,
    /// Reconnect budget exhausted
    DownloadAborted,
    /// An OTA sink lifecycle hook failed
    Sink,
}

impl Error {
    /// Whether the error came from the transport and may be cured by
    /// reconnecting.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Network)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Allocation => write!(f, "no session available"),
            Error::Tls => write!(f, "tls failure"),
            Error::Network => write!(f, "network failure"),
            Error::HttpStatus(code) => write!(f, "unexpected http status {}", code),
            Error::Probe(e) => write!(f, "size probe failed: {:?}", e),
            Error::Protocol => write!(f, "malformed response"),
            Error::ResponseTooLarge => write!(f, "response exceeds buffer"),
            Error::HeaderOverflow => write!(f, "request head exceeds buffer"),
            Error::WriteMismatch { expected, written } => {
                write!(f, "sink wrote {} of {} bytes", written, expected)
            }
            Error::InvalidParam => write!(f, "invalid parameter"),
            Error::DownloadAborted => write!(f, "download aborted"),
            Error::Sink => write!(f, "sink failure"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Allocation => Error::Allocation,
            TransportError::Tls => Error::Tls,
            TransportError::Network | TransportError::NotConnected => Error::Network,
        }
    }
}

impl From<ProbeError> for Error {
    fn from(e: ProbeError) -> Self {
        Error::Probe(e)
    }
}

impl From<core::fmt::Error> for Error {
    fn from(_: core::fmt::Error) -> Self {
        Error::HeaderOverflow
    }
}
