//! Optional zlib stage between the outbound buffer and the wire.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

use crate::pipe::buffer::ByteBuffer;

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("invalid compression level {0} (expected 1-9)")]
    InvalidLevel(u32),

    #[error("compressed output does not fit the scratch buffer")]
    NoSpace,

    #[error("zlib stream error: {0}")]
    Stream(#[source] std::io::Error),
}

/// Worst-case zlib output size for `len` input bytes (zlib's own bound).
pub fn compress_bound(len: usize) -> usize {
    len + (len >> 12) + (len >> 14) + (len >> 25) + 13
}

/// Scratch capacity needed for a given input capacity. The scratch buffer
/// also receives response bytes, so it never drops below a page.
pub fn scratch_capacity(input_capacity: usize) -> usize {
    compress_bound(input_capacity).max(4096)
}

/// A configured compression level. Level 0 means disabled.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    level: u32,
}

impl Compressor {
    pub fn new(level: u32) -> Result<Self, CompressError> {
        if level > 9 {
            return Err(CompressError::InvalidLevel(level));
        }
        Ok(Self { level })
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_enabled(&self) -> bool {
        self.level > 0
    }

    /// Compress `input` into `out`, replacing its contents.
    ///
    /// On error `out` is left cleared so the caller can fall back to the
    /// uncompressed body.
    pub fn compress(&self, input: &[u8], out: &mut ByteBuffer) -> Result<usize, CompressError> {
        out.clear();
        let result = self.encode(input, out);
        if result.is_err() {
            out.clear();
        }
        result
    }

    fn encode(&self, input: &[u8], out: &mut ByteBuffer) -> Result<usize, CompressError> {
        let mut encoder = ZlibEncoder::new(&mut *out, Compression::new(self.level));
        encoder.write_all(input).map_err(map_write_error)?;
        encoder.try_finish().map_err(map_write_error)?;
        drop(encoder);
        Ok(out.len())
    }
}

fn map_write_error(e: std::io::Error) -> CompressError {
    if e.kind() == std::io::ErrorKind::WriteZero {
        CompressError::NoSpace
    } else {
        CompressError::Stream(e)
    }
}
