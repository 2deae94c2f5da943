//! Fork decompression service.
//!
//! The archive model never interprets fork payloads. It hands the stored
//! bytes of a thread plus its [`CompressedDataDescriptor`] to a
//! [`ForkDecompressor`] and gets raw fork bytes back. Decoders for the NuFX
//! compression formats (squeeze, LZW/1, LZW/2, LZC) plug in through that
//! trait; this crate ships [`StoredDecompressor`], which handles
//! uncompressed threads only.
//!
//! # Thread CRCs
//! Version-3 records store a CRC-16 (seed `0xFFFF`) of the *uncompressed*
//! thread data. Older records store 0 or a CRC of something else, and it
//! is not checked.

use thiserror::Error;

use crate::crc::{crc16, THREAD_SEED};
use crate::record::ForkKind;

// ── Thread formats ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadFormat {
    Uncompressed = 0,
    Squeeze      = 1,
    Lzw1         = 2,
    Lzw2         = 3,
    Lzc12        = 4,
    Lzc16        = 5,
    Deflate      = 6,
    Bzip2        = 7,
}

impl ThreadFormat {
    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0 => Some(ThreadFormat::Uncompressed),
            1 => Some(ThreadFormat::Squeeze),
            2 => Some(ThreadFormat::Lzw1),
            3 => Some(ThreadFormat::Lzw2),
            4 => Some(ThreadFormat::Lzc12),
            5 => Some(ThreadFormat::Lzc16),
            6 => Some(ThreadFormat::Deflate),
            7 => Some(ThreadFormat::Bzip2),
            _ => None,
        }
    }

    /// Human-readable name (diagnostics only, never parsed).
    pub fn name(self) -> &'static str {
        match self {
            ThreadFormat::Uncompressed => "uncompressed",
            ThreadFormat::Squeeze      => "squeeze",
            ThreadFormat::Lzw1         => "LZW/1",
            ThreadFormat::Lzw2         => "LZW/2",
            ThreadFormat::Lzc12        => "12-bit LZC",
            ThreadFormat::Lzc16        => "16-bit LZC",
            ThreadFormat::Deflate      => "deflate",
            ThreadFormat::Bzip2        => "bzip2",
        }
    }
}

/// Display name for a raw format field, including unknown values.
pub fn format_name(format: u16) -> String {
    ThreadFormat::from_u16(format)
        .map(|f| f.name().to_string())
        .unwrap_or_else(|| format!("format {format:#06x}"))
}

// ── Descriptor ───────────────────────────────────────────────────────────────

/// Where a thread's stored bytes live and how they were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedDataDescriptor {
    pub format:           u16,
    pub thread_crc:       u16,
    pub uncompressed_len: u32,
    pub compressed_len:   u32,
    /// Absolute offset of the stored bytes in the archive byte source.
    pub offset:           u64,
    pub record_version:   u16,
}

impl CompressedDataDescriptor {
    pub fn thread_format(&self) -> Option<ThreadFormat> {
        ThreadFormat::from_u16(self.format)
    }

    pub fn crc_covers_data(&self) -> bool {
        self.record_version >= 3
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompressionError {
    #[error("record has no {0} fork")]
    ForkAbsent(ForkKind),
    #[error("{0} fork is not stored in the archive yet")]
    NotInArchive(ForkKind),
    #[error("stored data truncated: expected {expected} bytes, {available} available")]
    Truncated { expected: u64, available: u64 },
    #[error("unsupported compression: {0}")]
    Unsupported(String),
    #[error("thread CRC mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { stored: u16, computed: u16 },
    #[error("corrupt compressed data: {0}")]
    Corrupt(String),
}

// ── Service trait ────────────────────────────────────────────────────────────

/// Must be safe to call concurrently on different descriptors.
pub trait ForkDecompressor: Send + Sync {
    fn decompress(
        &self,
        descriptor: &CompressedDataDescriptor,
        compressed: &[u8],
    ) -> Result<Vec<u8>, DecompressionError>;
}

/// Handles `ThreadFormat::Uncompressed`; reports every other format as
/// unsupported.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoredDecompressor;

impl ForkDecompressor for StoredDecompressor {
    fn decompress(
        &self,
        descriptor: &CompressedDataDescriptor,
        compressed: &[u8],
    ) -> Result<Vec<u8>, DecompressionError> {
        if descriptor.thread_format() != Some(ThreadFormat::Uncompressed) {
            return Err(DecompressionError::Unsupported(format_name(descriptor.format)));
        }
        let expected = descriptor.uncompressed_len as usize;
        if compressed.len() < expected {
            return Err(DecompressionError::Truncated {
                expected:  expected as u64,
                available: compressed.len() as u64,
            });
        }
        let data = compressed[..expected].to_vec();
        verify_thread_crc(descriptor, &data)?;
        Ok(data)
    }
}

/// Check a version-3 thread CRC against decompressed bytes. A no-op for
/// older records.
pub fn verify_thread_crc(
    descriptor: &CompressedDataDescriptor,
    data:       &[u8],
) -> Result<(), DecompressionError> {
    if !descriptor.crc_covers_data() {
        return Ok(());
    }
    let computed = crc16(THREAD_SEED, data);
    if computed != descriptor.thread_crc {
        return Err(DecompressionError::ChecksumMismatch { stored: descriptor.thread_crc, computed });
    }
    Ok(())
}

/// The decompressor an archive uses unless told otherwise.
pub fn default_decompressor() -> Box<dyn ForkDecompressor> {
    Box::new(StoredDecompressor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(format: u16, len: u32, version: u16, thread_crc: u16) -> CompressedDataDescriptor {
        CompressedDataDescriptor {
            format,
            thread_crc,
            uncompressed_len: len,
            compressed_len:   len,
            offset:           0,
            record_version:   version,
        }
    }

    #[test]
    fn stored_returns_declared_prefix() {
        let out = StoredDecompressor.decompress(&descriptor(0, 5, 0, 0), b"HELLO\0\0\0").unwrap();
        assert_eq!(out, b"HELLO");
    }

    #[test]
    fn stored_checks_version3_crc() {
        let good = crc16(THREAD_SEED, b"HELLO");
        assert!(StoredDecompressor.decompress(&descriptor(0, 5, 3, good), b"HELLO").is_ok());
        assert!(matches!(
            StoredDecompressor.decompress(&descriptor(0, 5, 3, good ^ 1), b"HELLO"),
            Err(DecompressionError::ChecksumMismatch { .. })
        ));
        // Version 2 ignores the field.
        assert!(StoredDecompressor.decompress(&descriptor(0, 5, 2, 0xDEAD), b"HELLO").is_ok());
    }

    #[test]
    fn stored_rejects_compressed_formats_and_short_input() {
        assert_eq!(
            StoredDecompressor.decompress(&descriptor(2, 5, 0, 0), b"HELLO"),
            Err(DecompressionError::Unsupported("LZW/1".into()))
        );
        assert_eq!(
            StoredDecompressor.decompress(&descriptor(0, 9, 0, 0), b"HELLO"),
            Err(DecompressionError::Truncated { expected: 9, available: 5 })
        );
        assert_eq!(format_name(0x99), "format 0x0099");
    }
}
