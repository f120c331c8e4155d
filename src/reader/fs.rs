//! Direct-I/O filesystem reader.
//!
//! On Linux files are opened with `O_DIRECT`, which requires the destination
//! buffer, the file offset and the transfer length to be block aligned. Reads
//! therefore go through a page-aligned anonymous mapping sized to a multiple
//! of [`DIRECT_IO_ALIGN`], and the item is copied out of it afterwards.
//!
//! Some filesystems (tmpfs, several FUSE mounts) reject `O_DIRECT` with
//! `EINVAL`. The reader then falls back to a buffered open and logs a
//! warning; the bytes are the same, only the page cache is no longer
//! bypassed.
//!
//! A direct read that returns a count off the block boundary leaves the
//! next offset unaligned, so the direct loop stops there. If the item is
//! still incomplete the whole file is reread buffered.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use tracing::{trace, warn};

use crate::error::ReadError;
use crate::reader::StorageReader;

/// Alignment used for direct-I/O buffers and transfer lengths.
pub const DIRECT_IO_ALIGN: usize = 4096;

#[derive(Debug, Clone)]
pub struct FsReader {
    root: Option<PathBuf>,
    direct: bool,
}

impl FsReader {
    /// Reads keys as paths, relative to the process working directory.
    pub fn new() -> Self {
        Self {
            root: None,
            direct: true,
        }
    }

    /// Resolves relative keys against `root`. Absolute keys are used as-is.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            direct: true,
        }
    }

    /// Disables `O_DIRECT` and reads through the page cache.
    pub fn buffered(mut self) -> Self {
        self.direct = false;
        self
    }

    pub fn is_direct(&self) -> bool {
        self.direct
    }

    fn resolve(&self, key: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(key),
            None => PathBuf::from(key),
        }
    }

    /// Opens `path`, reporting whether `O_DIRECT` is in effect.
    fn open(&self, path: &Path) -> io::Result<(File, bool)> {
        #[cfg(target_os = "linux")]
        if self.direct {
            use std::os::unix::fs::OpenOptionsExt;

            match OpenOptions::new()
                .read(true)
                .custom_flags(libc::O_DIRECT)
                .open(path)
            {
                Ok(file) => return Ok((file, true)),
                Err(err) if err.raw_os_error() == Some(libc::EINVAL) => {
                    warn!(path = %path.display(), "filesystem rejected O_DIRECT, reading buffered");
                },
                Err(err) => return Err(err),
            }
        }
        OpenOptions::new().read(true).open(path).map(|file| (file, false))
    }
}

impl Default for FsReader {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageReader for FsReader {
    fn read_exact(&self, key: &str, max_size: usize) -> Result<Vec<u8>, ReadError> {
        let path = self.resolve(key);
        let io_err = |source: io::Error| map_io_error(key, source);

        let (mut file, direct) = self.open(&path).map_err(io_err)?;
        let len = file.metadata().map_err(io_err)?.len();
        let size = usize::try_from(len).unwrap_or(usize::MAX);
        if size > max_size {
            return Err(ReadError::TooLarge {
                size,
                max: max_size,
            });
        }
        if size == 0 {
            return Ok(Vec::new());
        }

        let aligned = if direct {
            read_aligned(&mut file, size).map_err(io_err)?
        } else {
            None
        };
        let bytes = match aligned {
            Some(bytes) => bytes,
            None => {
                if direct {
                    warn!(key, size, "short direct read, rereading buffered");
                    file = OpenOptions::new().read(true).open(&path).map_err(io_err)?;
                }
                read_buffered(&mut file, size).map_err(io_err)?
            },
        };
        trace!(key, size, direct, "storage read");
        Ok(bytes)
    }
}

/// Returns `None` when the direct reads stopped short of `size`.
fn read_aligned(file: &mut impl Read, size: usize) -> io::Result<Option<Vec<u8>>> {
    let padded = size.div_ceil(DIRECT_IO_ALIGN) * DIRECT_IO_ALIGN;
    let mut scratch = MmapMut::map_anon(padded)?;
    let mut filled = 0;
    while filled < size {
        match file.read(&mut scratch[filled..]) {
            Ok(0) => break,
            Ok(n) => {
                filled += n;
                // Every read after this one would start off the block boundary.
                if n % DIRECT_IO_ALIGN != 0 {
                    break;
                }
            },
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    if filled < size {
        return Ok(None);
    }
    Ok(Some(scratch[..size].to_vec()))
}

fn read_buffered(file: &mut impl Read, size: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0; size];
    let filled = fill(file, &mut buf, size)?;
    buf.truncate(filled);
    Ok(buf)
}

/// Reads until `want` bytes are in `buf` or EOF. Short files are an error.
fn fill(file: &mut impl Read, buf: &mut [u8], want: usize) -> io::Result<usize> {
    let mut filled = 0;
    while filled < want {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    if filled < want {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("file shrank to {filled} bytes while reading {want}"),
        ));
    }
    Ok(filled)
}

fn map_io_error(key: &str, source: io::Error) -> ReadError {
    if source.kind() == io::ErrorKind::NotFound {
        ReadError::NotFound(key.to_string())
    } else {
        ReadError::Io {
            key: key.to_string(),
            source,
        }
    }
}
