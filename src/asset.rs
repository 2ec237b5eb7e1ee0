//! Asset serving interface
//!
//! Pages loaded into the runtime fetch bundled resources through an `AssetResponder`.
//! Only the request/response shapes live here; serving them is up to the embedder.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub method: String,
    pub path: String,
    pub headers: BTreeMap<String, String>,
}

impl AssetRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: "GET".to_string(), path: path.into(), headers: BTreeMap::new() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub enum AssetBody {
    Empty,
    Bytes(Vec<u8>),
    /// Streamed from an open file; `length` is the byte count to send
    File { file: File, length: u64 },
}

impl AssetBody {
    pub fn len(&self) -> u64 {
        match self {
            Self::Empty => 0,
            Self::Bytes(bytes) => bytes.len() as u64,
            Self::File { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the whole body into memory
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Empty => Ok(Vec::new()),
            Self::Bytes(bytes) => Ok(bytes),
            Self::File { file, length } => {
                let mut bytes = Vec::with_capacity(length as usize);
                file.take(length).read_to_end(&mut bytes)?;
                Ok(bytes)
            }
        }
    }
}

impl fmt::Debug for AssetBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Empty"),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::File { length, .. } => write!(f, "File({} bytes)", length),
        }
    }
}

#[derive(Debug)]
pub struct AssetResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: AssetBody,
}

impl AssetResponse {
    pub fn ok(body: AssetBody) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Length".to_string(), body.len().to_string());
        Self { status: 200, headers, body }
    }

    pub fn not_found() -> Self {
        Self { status: 404, headers: BTreeMap::new(), body: AssetBody::Empty }
    }

    /// Open `path` and respond with its contents
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        Ok(Self::ok(AssetBody::File { file, length }))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

pub trait AssetResponder: Send + Sync {
    fn respond(&self, request: &AssetRequest) -> AssetResponse;
}

impl<F> AssetResponder for F
where
    F: Fn(&AssetRequest) -> AssetResponse + Send + Sync,
{
    fn respond(&self, request: &AssetRequest) -> AssetResponse {
        self(request)
    }
}
