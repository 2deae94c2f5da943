use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};
use thiserror::Error;

use crate::attrs::NuDateTime;
use crate::crc::{crc16, HEADER_SEED};

/// "NuFile" with alternating high bits.
pub const MASTER_SIGNATURE: [u8; 6] = [0x4E, 0xF5, 0x46, 0xE9, 0x6C, 0xE5];
pub const MASTER_HEADER_SIZE: usize = 48;
pub const MAX_MASTER_VERSION: u16 = 2;

/// Bytes covered by the master CRC: everything after the CRC field.
const CRC_START: usize = 8;

const BINARY2_HEADER_SIZE: usize = 128;
const BINARY2_ID: [u8; 3] = [0x0A, 0x47, 0x4C];
const BINARY2_ID_OFFSET_2: usize = 18;
const BINARY2_ID_2: u8 = 0x02;

#[derive(Error, Debug)]
pub enum MasterHeaderError {
    #[error("Invalid master header signature")]
    InvalidSignature,
    #[error("Master header checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { stored: u16, computed: u16 },
    #[error("Unsupported master version: {0}")]
    UnsupportedVersion(u16),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterHeader {
    pub master_crc:    u16,
    pub total_records: u32,
    pub create_when:   NuDateTime,
    pub mod_when:      NuDateTime,
    pub version:       u16,
    /// Declared archive length, counted from the start of the master header.
    pub master_eof:    u32,
}

impl MasterHeader {
    pub fn new(total_records: u32, master_eof: u32) -> Self {
        Self {
            master_crc: 0,
            total_records,
            create_when: NuDateTime::ABSENT,
            mod_when:    NuDateTime::ABSENT,
            version:     MAX_MASTER_VERSION,
            master_eof,
        }
    }

    /// Serialize with a freshly computed CRC.
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let mut body = Vec::with_capacity(MASTER_HEADER_SIZE - CRC_START);
        body.write_u32::<LittleEndian>(self.total_records)?;
        self.create_when.write(&mut body)?;
        self.mod_when.write(&mut body)?;
        body.write_u16::<LittleEndian>(self.version)?;
        body.write_all(&[0u8; 8])?;
        body.write_u32::<LittleEndian>(self.master_eof)?;
        body.write_all(&[0u8; 6])?;

        writer.write_all(&MASTER_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(crc16(HEADER_SEED, &body))?;
        writer.write_all(&body)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, MasterHeaderError> {
        let mut buf = [0u8; MASTER_HEADER_SIZE];
        reader.read_exact(&mut buf)?;
        if buf[..MASTER_SIGNATURE.len()] != MASTER_SIGNATURE {
            return Err(MasterHeaderError::InvalidSignature);
        }

        let mut cur = Cursor::new(&buf[MASTER_SIGNATURE.len()..]);
        let master_crc = cur.read_u16::<LittleEndian>()?;
        let computed = crc16(HEADER_SEED, &buf[CRC_START..]);
        if computed != master_crc {
            return Err(MasterHeaderError::ChecksumMismatch { stored: master_crc, computed });
        }

        let total_records = cur.read_u32::<LittleEndian>()?;
        let create_when   = NuDateTime::read(&mut cur)?;
        let mod_when      = NuDateTime::read(&mut cur)?;
        let version       = cur.read_u16::<LittleEndian>()?;
        if version > MAX_MASTER_VERSION {
            return Err(MasterHeaderError::UnsupportedVersion(version));
        }
        let mut reserved = [0u8; 8];
        cur.read_exact(&mut reserved)?;
        let master_eof = cur.read_u32::<LittleEndian>()?;

        Ok(Self { master_crc, total_records, create_when, mod_when, version, master_eof })
    }
}

/// Offset of the master header: 0 for a bare `.SHK`, 128 when wrapped in a
/// Binary II header (`.BXY`). `None` when neither holds a NuFX signature.
pub fn locate(bytes: &[u8], allow_wrappers: bool) -> Option<usize> {
    if bytes.starts_with(&MASTER_SIGNATURE) {
        return Some(0);
    }
    let wrapped = allow_wrappers
        && bytes.len() > BINARY2_HEADER_SIZE
        && bytes.starts_with(&BINARY2_ID)
        && bytes[BINARY2_ID_OFFSET_2] == BINARY2_ID_2
        && bytes[BINARY2_HEADER_SIZE..].starts_with(&MASTER_SIGNATURE);
    wrapped.then_some(BINARY2_HEADER_SIZE)
}
