//! Media payloads.
//!
//! A [`Payload`] is one of three byte sources (an in-memory buffer, a seekable
//! stream, or a file on disk) behind a single capability set: probe the size,
//! rewind to the start, read everything. The delivery engine never looks at
//! which shape it was handed.

use std::fmt;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::PathBuf;

use tracing::debug;

use crate::types::{MediaKind, MediaUpload};

/// Anything that can be read from and repositioned.
pub trait MediaStream: Read + Seek + Send {}

impl<T: Read + Seek + Send> MediaStream for T {}

pub enum Payload {
    Memory {
        name: Option<String>,
        data: Cursor<Vec<u8>>,
    },
    Stream {
        name: Option<String>,
        reader: Box<dyn MediaStream>,
    },
    Path(PathBuf),
}

impl Payload {
    pub fn from_bytes(name: Option<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Memory {
            name,
            data: Cursor::new(data.into()),
        }
    }

    pub fn from_stream(name: Option<String>, reader: impl MediaStream + 'static) -> Self {
        Self::Stream {
            name,
            reader: Box::new(reader),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    /// File name used for classification and upload, if known.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Memory { name, .. } | Self::Stream { name, .. } => name.as_deref(),
            Self::Path(path) => path.file_name().and_then(|n| n.to_str()),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.name().map_or(MediaKind::Photo, MediaKind::from_file_name)
    }

    /// Total size in bytes, or `None` when the source cannot be introspected.
    ///
    /// Streams are measured by seeking to the end and back, leaving the
    /// position unchanged.
    pub fn probe_size(&mut self) -> Option<u64> {
        match self {
            Self::Memory { data, .. } => Some(data.get_ref().len() as u64),
            Self::Stream { reader, .. } => measure_stream(reader.as_mut()).ok(),
            Self::Path(path) => fs::metadata(path).map(|meta| meta.len()).ok(),
        }
    }

    /// Whether the payload carries no bytes at all.
    ///
    /// A payload whose size cannot be determined counts as non-empty: sending
    /// it and failing is better than silently dropping the media.
    pub fn is_empty(&mut self) -> bool {
        self.probe_size().is_some_and(|size| size == 0)
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        match self {
            Self::Memory { data, .. } => {
                data.set_position(0);
                Ok(())
            }
            Self::Stream { reader, .. } => reader.seek(SeekFrom::Start(0)).map(|_| ()),
            // Reopened on every read.
            Self::Path(_) => Ok(()),
        }
    }

    /// Reads from the current position to the end.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        match self {
            Self::Memory { data, .. } => {
                let mut buf = Vec::new();
                data.read_to_end(&mut buf)?;
                Ok(buf)
            }
            Self::Stream { reader, .. } => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                Ok(buf)
            }
            Self::Path(path) => fs::read(path),
        }
    }

    /// Rewinds and reads the whole payload into an upload.
    ///
    /// Safe to call repeatedly on the same payload; every call sees the same
    /// bytes. A stream that cannot seek is read from wherever it currently is.
    pub fn upload(&mut self) -> io::Result<MediaUpload> {
        if let Err(e) = self.rewind() {
            debug!(
                payload = ?self,
                error = %e,
                "Payload cannot rewind, reading from current position"
            );
        }
        let data = self.read_all()?;
        let kind = self.kind();
        let file_name = self
            .name()
            .map_or_else(|| default_file_name(kind).to_string(), str::to_string);
        Ok(MediaUpload {
            kind,
            file_name,
            data,
        })
    }
}

fn measure_stream(reader: &mut dyn MediaStream) -> io::Result<u64> {
    let current = reader.stream_position()?;
    let size = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(current))?;
    Ok(size)
}

fn default_file_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "photo.jpg",
        MediaKind::Video => "video.mp4",
        MediaKind::Animation => "animation.gif",
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory { name, data } => f
                .debug_struct("Memory")
                .field("name", name)
                .field("len", &data.get_ref().len())
                .finish(),
            Self::Stream { name, .. } => f
                .debug_struct("Stream")
                .field("name", name)
                .finish_non_exhaustive(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}
