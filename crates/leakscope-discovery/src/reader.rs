//! Format reader: classifies an input by container kind and turns it into
//! scannable bytes.
//!
//! Small plain and opaque files are read whole. Larger ones are streamed
//! through [`ChunkedReader`]. No pattern matches across whitespace, so each
//! window is cut after its last whitespace byte and the unfinished token is
//! carried into the next window. A token longer than the overlap cannot be
//! carried whole; matches inside such a token that straddle a boundary may
//! be missed or truncated, a known limitation of bounded-memory streaming.
//!
//! PDFs are text-extracted page by page. ZIP, RAR and 7z archives have all
//! entries concatenated (newline separated); a bad entry is skipped on its
//! own. A PDF that fails to parse yields empty content.

use crate::error::{ReadError, Result};
use leakscope_core::InputConfig;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Container type of an input, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    Plain,
    Pdf,
    Zip,
    Rar,
    SevenZ,
    Opaque,
}

/// Extensions read as plain text
const PLAIN_EXTENSIONS: &[&str] = &["txt", "csv", "log", "json", "md"];

impl ContainerKind {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Self::Pdf,
            "zip" => Self::Zip,
            "rar" => Self::Rar,
            "7z" => Self::SevenZ,
            e if PLAIN_EXTENSIONS.contains(&e) => Self::Plain,
            _ => Self::Opaque,
        }
    }

    #[must_use]
    pub fn is_archive(self) -> bool {
        matches!(self, Self::Zip | Self::Rar | Self::SevenZ)
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plain => "plain",
            Self::Pdf => "pdf",
            Self::Zip => "zip",
            Self::Rar => "rar",
            Self::SevenZ => "7z",
            Self::Opaque => "opaque",
        };
        f.write_str(name)
    }
}

/// Memory bounds for reading a single input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderLimits {
    /// Upper bound on bytes taken from one input
    pub max_read_bytes: u64,
    /// Bytes of new data per chunk
    pub chunk_size: usize,
    /// Inputs larger than this are streamed
    pub chunk_threshold: u64,
    /// Tail bytes of the previous chunk carried into the next
    pub chunk_overlap: usize,
}

impl ReaderLimits {
    #[must_use]
    pub fn from_config(input: &InputConfig) -> Self {
        Self {
            max_read_bytes: input.max_read_bytes,
            chunk_size: input.chunk_size,
            chunk_threshold: input.chunk_threshold,
            chunk_overlap: input.chunk_overlap,
        }
    }
}

impl Default for ReaderLimits {
    fn default() -> Self {
        Self::from_config(&InputConfig::default())
    }
}

/// Scannable content produced from one input.
pub enum Content {
    /// The whole decoded input in memory
    Whole(Vec<u8>),
    /// A large input streamed in overlapping windows
    Chunked(ChunkedReader<File>),
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Whole(bytes) => f.debug_tuple("Whole").field(&bytes.len()).finish(),
            Self::Chunked(_) => f.write_str("Chunked"),
        }
    }
}

/// Open an input and decode it according to its container kind.
///
/// # Errors
/// Returns error if the file cannot be opened or an archive cannot be
/// parsed at all. PDF parse failures are not errors; they yield empty
/// content.
pub fn open_source(path: &Path, limits: &ReaderLimits) -> Result<Content> {
    let kind = ContainerKind::from_path(path);
    let size = std::fs::metadata(path)
        .map_err(|e| ReadError::io(path, e))?
        .len();

    debug!(path = %path.display(), %kind, size, "opening input");

    match kind {
        ContainerKind::Plain | ContainerKind::Opaque => {
            let file = File::open(path).map_err(|e| ReadError::io(path, e))?;
            if size > limits.chunk_threshold {
                debug!(path = %path.display(), "streaming in chunks");
                return Ok(Content::Chunked(ChunkedReader::new(file, limits)));
            }
            let mut buf = Vec::new();
            file.take(limits.max_read_bytes)
                .read_to_end(&mut buf)
                .map_err(|e| ReadError::io(path, e))?;
            Ok(Content::Whole(buf))
        }
        ContainerKind::Pdf => {
            if size > limits.max_read_bytes {
                return Err(ReadError::TooLarge {
                    path: path.display().to_string(),
                    size,
                    limit: limits.max_read_bytes,
                });
            }
            Ok(Content::Whole(read_pdf(path)))
        }
        ContainerKind::Zip => read_zip(path, limits.max_read_bytes).map(Content::Whole),
        ContainerKind::Rar => read_rar(path, limits.max_read_bytes).map(Content::Whole),
        ContainerKind::SevenZ => read_7z(path, limits.max_read_bytes).map(Content::Whole),
    }
}

/// Extract text from every page; any failure yields what was extracted so far.
fn read_pdf(path: &Path) -> Vec<u8> {
    let doc = match lopdf::Document::load(path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "PDF parse failed, treating as empty");
            return Vec::new();
        }
    };

    let mut text = String::new();
    for page in doc.get_pages().keys() {
        match doc.extract_text(&[*page]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => debug!(path = %path.display(), page, error = %e, "skipping PDF page"),
        }
    }
    text.into_bytes()
}

/// Concatenates archive entries, newline separated, up to a byte budget.
struct EntrySink {
    buf: Vec<u8>,
    remaining: u64,
    entries: usize,
    skipped: usize,
}

impl EntrySink {
    fn new(limit: u64) -> Self {
        Self {
            buf: Vec::new(),
            remaining: limit,
            entries: 0,
            skipped: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.remaining == 0
    }

    /// Read one entry fully; a failed read discards the partial entry.
    fn read_entry<R: Read>(&mut self, name: &str, reader: R) {
        let mut data = Vec::new();
        match reader.take(self.remaining).read_to_end(&mut data) {
            Ok(_) => self.push(data),
            Err(e) => self.skip(name, &e),
        }
    }

    fn push(&mut self, mut data: Vec<u8>) {
        if data.len() as u64 > self.remaining {
            data.truncate(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        }
        self.remaining = self.remaining.saturating_sub(data.len() as u64);
        self.buf.extend_from_slice(&data);
        self.buf.push(b'\n');
        self.entries += 1;
    }

    fn skip(&mut self, name: &str, error: &dyn fmt::Display) {
        warn!(entry = name, error = %error, "skipping unreadable archive entry");
        self.skipped += 1;
    }

    fn finish(self, path: &Path, kind: ContainerKind) -> Vec<u8> {
        debug!(
            path = %path.display(),
            %kind,
            entries = self.entries,
            skipped = self.skipped,
            bytes = self.buf.len(),
            "archive read"
        );
        if self.remaining == 0 {
            warn!(path = %path.display(), "archive truncated at read limit");
        }
        self.buf
    }
}

fn read_zip(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let file = File::open(path).map_err(|e| ReadError::io(path, e))?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ReadError::archive(ContainerKind::Zip, path, e))?;

    let mut sink = EntrySink::new(limit);
    for index in 0..archive.len() {
        if sink.is_full() {
            break;
        }
        let entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                sink.skip(&format!("#{index}"), &e);
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        sink.read_entry(&name, entry);
    }
    Ok(sink.finish(path, ContainerKind::Zip))
}

fn read_7z(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let mut reader = sevenz_rust::SevenZReader::open(path, sevenz_rust::Password::empty())
        .map_err(|e| ReadError::archive(ContainerKind::SevenZ, path, e))?;

    let mut sink = EntrySink::new(limit);
    let walked = reader.for_each_entries(|entry, entry_reader| {
        // Stopping is per block; later blocks still call back.
        if sink.is_full() {
            return Ok(false);
        }
        if entry.is_directory() {
            return Ok(true);
        }
        sink.read_entry(entry.name(), entry_reader);
        Ok(!sink.is_full())
    });
    // A broken block ends the walk; entries decoded before it are kept.
    if let Err(e) = walked {
        warn!(path = %path.display(), error = %e, "7z archive ended early");
    }
    Ok(sink.finish(path, ContainerKind::SevenZ))
}

/// A RAR entry that fails to decompress invalidates the handle, so entries
/// after it are lost; entries already read are kept.
fn read_rar(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let mut archive = unrar::Archive::new(path)
        .open_for_processing()
        .map_err(|e| ReadError::archive(ContainerKind::Rar, path, e))?;

    let mut sink = EntrySink::new(limit);
    loop {
        let header = match archive.read_header() {
            Ok(Some(header)) => header,
            Ok(None) => break,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "RAR header unreadable, stopping");
                break;
            }
        };
        let name = header.entry().filename.display().to_string();
        archive = if header.entry().is_file() && !sink.is_full() {
            match header.read() {
                Ok((data, rest)) => {
                    sink.push(data);
                    rest
                }
                Err(e) => {
                    sink.skip(&name, &e);
                    break;
                }
            }
        } else {
            match header.skip() {
                Ok(rest) => rest,
                Err(e) => {
                    sink.skip(&name, &e);
                    break;
                }
            }
        };
    }
    Ok(sink.finish(path, ContainerKind::Rar))
}

/// Streams a reader as windows cut on whitespace.
///
/// Each window is the carry from the previous window followed by up to
/// `chunk_size` fresh bytes, cut after its last whitespace byte. The bytes
/// after the cut (at most `overlap`) become the next carry. When the trailing
/// token is longer than `overlap`, the whole window is yielded and its last
/// `overlap` bytes are carried. Reading stops at EOF or once
/// `max_read_bytes` fresh bytes have been consumed; the final window holds
/// everything left.
pub struct ChunkedReader<R> {
    inner: R,
    chunk_size: usize,
    overlap: usize,
    remaining: u64,
    carry: Vec<u8>,
    done: bool,
}

impl<R: Read> ChunkedReader<R> {
    pub fn new(inner: R, limits: &ReaderLimits) -> Self {
        Self {
            inner,
            chunk_size: limits.chunk_size.max(1),
            overlap: limits.chunk_overlap.min(limits.chunk_size),
            remaining: limits.max_read_bytes,
            carry: Vec::new(),
            done: false,
        }
    }

    /// Fill up to `want` bytes, tolerating short reads.
    fn fill(&mut self, want: usize) -> io::Result<Vec<u8>> {
        let mut chunk = vec![0u8; want];
        let mut filled = 0;
        while filled < want {
            match self.inner.read(&mut chunk[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        chunk.truncate(filled);
        Ok(chunk)
    }

    fn take_carry(&mut self) -> Option<io::Result<Vec<u8>>> {
        if self.carry.is_empty() {
            None
        } else {
            Some(Ok(std::mem::take(&mut self.carry)))
        }
    }
}

impl<R: Read> Iterator for ChunkedReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.remaining == 0 {
            self.done = true;
            return self.take_carry();
        }

        let want = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(self.chunk_size);
        let fresh = match self.fill(want) {
            Ok(fresh) => fresh,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        if fresh.is_empty() {
            self.done = true;
            return self.take_carry();
        }
        self.remaining -= fresh.len() as u64;

        let mut window = std::mem::take(&mut self.carry);
        window.extend_from_slice(&fresh);

        if fresh.len() < want || self.remaining == 0 {
            self.done = true;
            return Some(Ok(window));
        }

        // A window ending on whitespace carries nothing.
        self.carry = match window.iter().rposition(u8::is_ascii_whitespace) {
            Some(ws) if window.len() - (ws + 1) <= self.overlap => window.split_off(ws + 1),
            _ => window[window.len() - self.overlap..].to_vec(),
        };

        Some(Ok(window))
    }
}
