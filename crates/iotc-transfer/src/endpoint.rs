use heapless::String;

use crate::error::{Error, TransferResult};

/// Longest host name the transport accepts.
pub const MAX_HOST_LEN: usize = 255;

const DEFAULT_PATH: &str = "/";

/// Host and path of a transfer target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint<'a> {
    host: String<MAX_HOST_LEN>,
    port: Option<u16>,
    path: &'a str,
}

impl<'a> Endpoint<'a> {
    /// Split `host[:port]/path` where the path starts at the first `/` or `?`.
    ///
    /// Without either the whole input is the authority and the path is `/`.
    /// A query directly after the host is kept as the path.
    pub fn split(combined: &'a str) -> TransferResult<Self> {
        let (authority, path) = match combined.find(['/', '?']) {
            Some(pos) => combined.split_at(pos),
            None => (combined, DEFAULT_PATH),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(parse_port(port)?)),
            None => (authority, None),
        };
        if host.is_empty() || host.contains(['@', '#', '[', ']']) {
            return Err(Error::InvalidParam);
        }
        let mut owned = String::new();
        owned.push_str(host).map_err(|()| Error::InvalidParam)?;
        Ok(Self {
            host: owned,
            port,
            path,
        })
    }

    /// Like [`Endpoint::split`], after dropping an `https://` or `http://`
    /// scheme.
    pub fn from_url(url: &'a str) -> TransferResult<Self> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .unwrap_or(url);
        Self::split(rest)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port given in the authority, if any.
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &'a str {
        self.path
    }
}

fn parse_port(port: &str) -> TransferResult<u16> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::InvalidParam),
        Ok(port) => Ok(port),
    }
}
