//! In-memory collaborators for unit tests.

use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::download::{ContentRange, RangeResponse};
use super::error::{ManagerError, ManagerResult};
use super::traits::{Installer, RangeFetcher};

/// Deterministic artifact bytes.
pub fn artifact(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Archive item for [`zip_bytes`].
pub enum ZipItem<'a> {
    Dir(&'a str),
    File(&'a str, &'a [u8]),
}

/// Build a stored zip archive in memory.
pub fn zip_bytes(items: &[ZipItem<'_>]) -> Vec<u8> {
    zip_bytes_with(items, CompressionMethod::Stored)
}

/// Build a zip archive in memory with every entry using `method`.
pub fn zip_bytes_with(items: &[ZipItem<'_>], method: CompressionMethod) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(method);
    for item in items {
        match item {
            ZipItem::Dir(name) => zip.add_directory(*name, options).unwrap(),
            ZipItem::File(name, data) => {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
        }
    }
    zip.finish().unwrap().into_inner()
}

/// Build a stored zip whose entries carry data descriptors (flag bit 3).
///
/// Local headers hold zero CRC and sizes; the real values follow each
/// entry's data and are repeated in the central directory. This is the
/// layout streaming writers such as Java's `ZipOutputStream` produce.
pub fn zip_bytes_with_descriptors(items: &[ZipItem<'_>]) -> Vec<u8> {
    const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

    let mut out = Vec::new();
    let mut central = Vec::new();

    for item in items {
        let (name, data): (&str, &[u8]) = match item {
            ZipItem::Dir(name) => (*name, &[][..]),
            ZipItem::File(name, data) => (*name, *data),
        };
        let crc = crc32(data);
        let size = data.len() as u32;
        let header_offset = out.len() as u32;

        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // stored
        out.extend_from_slice(&0u16.to_le_bytes()); // mod time
        out.extend_from_slice(&0x0021u16.to_le_bytes()); // mod date, 1980-01-01
        out.extend_from_slice(&[0u8; 12]); // crc, compressed, uncompressed
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        out.extend_from_slice(&0x0807_4b50u32.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());

        central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes()); // made by
        central.extend_from_slice(&20u16.to_le_bytes()); // needed
        central.extend_from_slice(&FLAG_DATA_DESCRIPTOR.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&0x0021u16.to_le_bytes());
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&size.to_le_bytes());
        central.extend_from_slice(&size.to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&[0u8; 12]); // extra, comment, disk, attrs
        central.extend_from_slice(&header_offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }

    let central_offset = out.len() as u32;
    out.extend_from_slice(&central);

    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]); // disk numbers
    out.extend_from_slice(&(items.len() as u16).to_le_bytes());
    out.extend_from_slice(&(items.len() as u16).to_le_bytes());
    out.extend_from_slice(&(central.len() as u32).to_le_bytes());
    out.extend_from_slice(&central_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

/// How the fake server answers a ranged request.
#[derive(Debug, Clone, Copy)]
pub enum ServeMode {
    /// Honour the range with a 206.
    Honour,
    /// Ignore the range and send the full entity with a 200.
    IgnoreRange,
    /// Honour the range but omit the length.
    NoLength,
}

/// How the next response body is cut short.
#[derive(Debug, Clone, Copy)]
enum Interruption {
    /// Error with a connection reset after this many bytes.
    Reset(usize),
    /// End cleanly after this many bytes, despite the declared length.
    Truncate(usize),
}

/// In-memory server that records the offsets it was asked for.
pub struct MemoryFetcher {
    data: Vec<u8>,
    mode: ServeMode,
    interruption: Mutex<Option<Interruption>>,
    refuse: bool,
    requests: Mutex<Vec<u64>>,
}

impl MemoryFetcher {
    pub fn new(data: Vec<u8>, mode: ServeMode) -> Self {
        Self {
            data,
            mode,
            interruption: Mutex::new(None),
            refuse: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reset the connection after `bytes` of the next response body.
    ///
    /// Applies to one request only; later requests succeed.
    pub fn failing_after(self, bytes: usize) -> Self {
        *self.interruption.lock().unwrap() = Some(Interruption::Reset(bytes));
        self
    }

    /// End the next response body after `bytes` without an error.
    ///
    /// The declared length still covers the whole entity. Applies to one
    /// request only.
    pub fn truncating_after(self, bytes: usize) -> Self {
        *self.interruption.lock().unwrap() = Some(Interruption::Truncate(bytes));
        self
    }

    /// Refuse every connection.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Offsets requested so far.
    pub fn offsets(&self) -> Vec<u64> {
        self.requests.lock().unwrap().clone()
    }
}

/// Reader that errors once its limit is reached.
struct FailingReader {
    inner: Cursor<Vec<u8>>,
    remaining: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        }
        let max = buf.len().min(self.remaining);
        let n = self.inner.read(&mut buf[..max])?;
        self.remaining -= n;
        Ok(n)
    }
}

impl RangeFetcher for MemoryFetcher {
    fn fetch_from(&self, url: &str, offset: u64) -> ManagerResult<RangeResponse> {
        self.requests.lock().unwrap().push(offset);
        if self.refuse {
            return Err(ManagerError::Network {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let total = self.data.len() as u64;
        if offset >= total {
            return Ok(RangeResponse {
                status: 416,
                content_length: Some(0),
                content_range: Some(ContentRange {
                    start: None,
                    total: Some(total),
                }),
                body: Box::new(io::empty()),
            });
        }

        let (status, slice, content_range) = match self.mode {
            ServeMode::IgnoreRange => (200, self.data.clone(), None),
            ServeMode::Honour | ServeMode::NoLength => (
                206,
                self.data[offset as usize..].to_vec(),
                Some(ContentRange {
                    start: Some(offset),
                    total: None,
                }),
            ),
        };
        let content_length = match self.mode {
            ServeMode::NoLength => None,
            _ => Some(slice.len() as u64),
        };

        let body: Box<dyn Read + Send> = match self.interruption.lock().unwrap().take() {
            Some(Interruption::Reset(limit)) => Box::new(FailingReader {
                inner: Cursor::new(slice),
                remaining: limit,
            }),
            Some(Interruption::Truncate(limit)) => {
                let mut slice = slice;
                slice.truncate(limit);
                Box::new(Cursor::new(slice))
            }
            None => Box::new(Cursor::new(slice)),
        };

        Ok(RangeResponse {
            status,
            content_length,
            content_range,
            body,
        })
    }
}

/// Installer double that records payloads it was handed.
pub struct RecordingInstaller {
    available: bool,
    delay: Duration,
    installed: Mutex<Vec<PathBuf>>,
    threads: Mutex<Vec<Option<String>>>,
}

impl RecordingInstaller {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            delay: Duration::ZERO,
            installed: Mutex::new(Vec::new()),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Block for `delay` inside every install, like a real installer process.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn installed(&self) -> Vec<PathBuf> {
        self.installed.lock().unwrap().clone()
    }

    /// Names of the threads each install ran on.
    pub fn threads(&self) -> Vec<Option<String>> {
        self.threads.lock().unwrap().clone()
    }
}

impl Installer for RecordingInstaller {
    fn is_available(&self, _payload: &Path) -> bool {
        self.available
    }

    fn install(&self, payload: &Path) -> ManagerResult<()> {
        self.threads
            .lock()
            .unwrap()
            .push(thread::current().name().map(str::to_string));
        thread::sleep(self.delay);
        self.installed.lock().unwrap().push(payload.to_path_buf());
        Ok(())
    }
}
