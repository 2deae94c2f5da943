//! Record enumeration over the in-memory archive bytes.
//!
//! [`EntryReader`] walks the records that follow the master header in
//! storage order and yields one [`RawEntry`] per record: the parsed record
//! header, its thread headers and the absolute offset of each thread's
//! stored bytes. It does not interpret threads beyond copying small
//! uncompressed filename and comment payloads.
//!
//! ## Truncation
//!
//! | where input ends              | result                                      |
//! |-------------------------------|---------------------------------------------|
//! | inside the fixed header       | `Err(Truncated)`, enumeration stops         |
//! | inside the thread headers     | entry with the threads found, then stops    |
//! | inside thread data            | entry yielded; the next record fails        |

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};
use tracing::debug;

use crate::attrs::NuDateTime;
use crate::codec::CompressedDataDescriptor;
use crate::crc::{crc16, HEADER_SEED};
use crate::record::{StructuralError, StructuralErrorKind};
use crate::thread::{ThreadHeader, ThreadId, THREAD_HEADER_SIZE};

/// "NuFX" with alternating high bits.
pub const RECORD_SIGNATURE: [u8; 4] = [0x4E, 0xF5, 0x46, 0xD8];

/// Fixed fields through `archive_when`.
pub const BASE_ATTRIB_COUNT: u16 = 56;
/// Version 1+ headers add the option size field.
pub const OPTION_ATTRIB_COUNT: u16 = 58;

/// Header CRC coverage starts at `attrib_count`.
const CRC_START: usize = 6;

// ── Record header ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryHeader {
    pub header_crc:    u16,
    pub attrib_count:  u16,
    pub version:       u16,
    pub total_threads: u32,
    pub file_sys_id:   u16,
    /// Low byte is the path separator.
    pub file_sys_info: u16,
    pub access:        u32,
    pub file_type:     u32,
    pub extra_type:    u32,
    pub storage_type:  u16,
    pub create_when:   NuDateTime,
    pub mod_when:      NuDateTime,
    pub archive_when:  NuDateTime,
    pub option_list:   Vec<u8>,
    /// Old-style filename stored in the header itself. Usually empty when a
    /// filename thread is present.
    pub filename:      Vec<u8>,
}

impl EntryHeader {
    pub fn separator(&self) -> u8 {
        (self.file_sys_info & 0x00FF) as u8
    }

    /// Serialize the header followed by `threads`. `attrib_count`,
    /// `total_threads` and the header CRC are derived from the arguments;
    /// the stored values are ignored.
    pub fn write<W: Write>(&self, threads: &[ThreadHeader], mut writer: W) -> io::Result<()> {
        let attrib_count = if self.version >= 1 {
            OPTION_ATTRIB_COUNT as usize + self.option_list.len()
        } else {
            BASE_ATTRIB_COUNT as usize
        };
        let attrib_count = u16::try_from(attrib_count)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "option list too large"))?;
        let filename_len = u16::try_from(self.filename.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "header filename too long"))?;

        let mut body = Vec::new();
        body.write_u16::<LittleEndian>(attrib_count)?;
        body.write_u16::<LittleEndian>(self.version)?;
        body.write_u32::<LittleEndian>(threads.len() as u32)?;
        body.write_u16::<LittleEndian>(self.file_sys_id)?;
        body.write_u16::<LittleEndian>(self.file_sys_info)?;
        body.write_u32::<LittleEndian>(self.access)?;
        body.write_u32::<LittleEndian>(self.file_type)?;
        body.write_u32::<LittleEndian>(self.extra_type)?;
        body.write_u16::<LittleEndian>(self.storage_type)?;
        self.create_when.write(&mut body)?;
        self.mod_when.write(&mut body)?;
        self.archive_when.write(&mut body)?;
        if self.version >= 1 {
            body.write_u16::<LittleEndian>(self.option_list.len() as u16)?;
            body.write_all(&self.option_list)?;
        }
        body.write_u16::<LittleEndian>(filename_len)?;
        body.write_all(&self.filename)?;
        for thread in threads {
            thread.write(&mut body)?;
        }

        writer.write_all(&RECORD_SIGNATURE)?;
        writer.write_u16::<LittleEndian>(crc16(HEADER_SEED, &body))?;
        writer.write_all(&body)?;
        Ok(())
    }
}

// ── Raw entries ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawThread {
    pub header:      ThreadHeader,
    /// Absolute offset of the stored bytes.
    pub data_offset: u64,
    /// Payload of an uncompressed filename or comment thread.
    pub data:        Option<Vec<u8>>,
}

impl RawThread {
    pub fn id(&self) -> ThreadId {
        self.header.id()
    }

    pub fn descriptor(&self, record_version: u16) -> CompressedDataDescriptor {
        CompressedDataDescriptor {
            format:           self.header.format,
            thread_crc:       self.header.crc,
            uncompressed_len: self.header.eof,
            compressed_len:   self.header.comp_eof,
            offset:           self.data_offset,
            record_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Zero-based position in storage order.
    pub index:        usize,
    /// Absolute offset of the record signature.
    pub offset:       u64,
    pub header:       EntryHeader,
    /// Thread headers actually present; may be fewer than declared.
    pub threads:      Vec<RawThread>,
    pub computed_crc: u16,
}

impl RawEntry {
    pub fn crc_ok(&self) -> bool {
        self.computed_crc == self.header.header_crc
    }
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct EntryReader<'a> {
    bytes: &'a [u8],
    pos:   usize,
    index: usize,
    total: usize,
    done:  bool,
}

impl<'a> EntryReader<'a> {
    /// `start` is the absolute offset of the first record header.
    pub fn new(bytes: &'a [u8], start: usize, total_records: u32) -> Self {
        Self { bytes, pos: start, index: 0, total: total_records as usize, done: false }
    }

    fn error(&self, kind: StructuralErrorKind) -> StructuralError {
        StructuralError { index: self.index, path: String::new(), kind }
    }

    fn read_entry(&mut self) -> Result<RawEntry, StructuralError> {
        let bytes = self.bytes;
        let start = self.pos;
        let rest = bytes.get(start..).unwrap_or(&[]);
        if rest.len() < RECORD_SIGNATURE.len() {
            return Err(self.error(StructuralErrorKind::Truncated));
        }
        if rest[..RECORD_SIGNATURE.len()] != RECORD_SIGNATURE {
            return Err(self.error(StructuralErrorKind::BadSignature));
        }

        let mut cur = Cursor::new(rest);
        cur.set_position(RECORD_SIGNATURE.len() as u64);
        let mut header = read_fixed(&mut cur).map_err(|_| self.error(StructuralErrorKind::Truncated))?;

        let minimum = if header.version >= 1 { OPTION_ATTRIB_COUNT } else { BASE_ATTRIB_COUNT };
        if header.attrib_count < minimum {
            return Err(self.error(StructuralErrorKind::Malformed(format!(
                "attrib_count {} below {minimum}",
                header.attrib_count
            ))));
        }

        if header.version >= 1 {
            let declared = cur.read_u16::<LittleEndian>()
                .map_err(|_| self.error(StructuralErrorKind::Truncated))?;
            let room = (header.attrib_count - OPTION_ATTRIB_COUNT) as usize;
            let size = (declared as usize).min(room);
            if size < declared as usize {
                debug!(index = self.index, declared, room, "option list clamped to attrib_count");
            }
            let at = cur.position() as usize;
            header.option_list = rest
                .get(at..at + size)
                .ok_or_else(|| self.error(StructuralErrorKind::Truncated))?
                .to_vec();
        }

        cur.set_position(header.attrib_count as u64);
        let name_len = cur.read_u16::<LittleEndian>()
            .map_err(|_| self.error(StructuralErrorKind::Truncated))? as usize;
        let at = cur.position() as usize;
        header.filename = rest
            .get(at..at + name_len)
            .ok_or_else(|| self.error(StructuralErrorKind::Truncated))?
            .to_vec();
        cur.set_position((at + name_len) as u64);

        let mut thread_headers = Vec::new();
        for _ in 0..header.total_threads {
            if rest.len() - (cur.position() as usize) < THREAD_HEADER_SIZE {
                debug!(index = self.index, found = thread_headers.len(), "input ends inside thread headers");
                self.done = true;
                break;
            }
            thread_headers.push(
                ThreadHeader::read(&mut cur).map_err(|_| self.error(StructuralErrorKind::Truncated))?,
            );
        }
        let headers_end = cur.position() as usize;
        let computed_crc = crc16(HEADER_SEED, &rest[CRC_START..headers_end]);

        let mut data_offset = start + headers_end;
        let mut threads = Vec::with_capacity(thread_headers.len());
        for th in thread_headers {
            let data = match th.id() {
                ThreadId::Filename | ThreadId::Comment if th.format == 0 => {
                    let len = th.eof.min(th.comp_eof) as usize;
                    bytes.get(data_offset..data_offset + len).map(<[u8]>::to_vec)
                }
                _ => None,
            };
            let comp_eof = th.comp_eof as usize;
            threads.push(RawThread { header: th, data_offset: data_offset as u64, data });
            data_offset += comp_eof;
        }
        self.pos = data_offset;

        Ok(RawEntry { index: self.index, offset: start as u64, header, threads, computed_crc })
    }
}

impl Iterator for EntryReader<'_> {
    type Item = Result<RawEntry, StructuralError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.index >= self.total {
            return None;
        }
        let result = self.read_entry();
        if result.is_err() {
            self.done = true;
        }
        self.index += 1;
        Some(result)
    }
}

/// Fields from `header_crc` through `archive_when`.
fn read_fixed<R: Read>(mut reader: R) -> io::Result<EntryHeader> {
    Ok(EntryHeader {
        header_crc:    reader.read_u16::<LittleEndian>()?,
        attrib_count:  reader.read_u16::<LittleEndian>()?,
        version:       reader.read_u16::<LittleEndian>()?,
        total_threads: reader.read_u32::<LittleEndian>()?,
        file_sys_id:   reader.read_u16::<LittleEndian>()?,
        file_sys_info: reader.read_u16::<LittleEndian>()?,
        access:        reader.read_u32::<LittleEndian>()?,
        file_type:     reader.read_u32::<LittleEndian>()?,
        extra_type:    reader.read_u32::<LittleEndian>()?,
        storage_type:  reader.read_u16::<LittleEndian>()?,
        create_when:   NuDateTime::read(&mut reader)?,
        mod_when:      NuDateTime::read(&mut reader)?,
        archive_when:  NuDateTime::read(&mut reader)?,
        option_list:   Vec::new(),
        filename:      Vec::new(),
    })
}
