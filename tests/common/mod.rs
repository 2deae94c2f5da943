//! Builds real NuFX byte streams for the integration tests.
#![allow(dead_code)]

use shrinkit::attrs::NuDateTime;
use shrinkit::crc::{crc16, THREAD_SEED};
use shrinkit::entry::EntryHeader;
use shrinkit::master::{MasterHeader, MASTER_HEADER_SIZE};
use shrinkit::thread::{ThreadHeader, ThreadId};
use std::io::Write;
use tempfile::NamedTempFile;

pub const FILENAME_BUFFER: usize = 32;
pub const BINARY2_HEADER_SIZE: usize = 128;

/// One record: header fields plus threads with their stored bytes.
#[derive(Clone)]
pub struct RecordSpec {
    pub header:  EntryHeader,
    pub threads: Vec<(ThreadHeader, Vec<u8>)>,
}

impl RecordSpec {
    /// A ProDOS `BIN` record named `path` (`:`-separated) with a filename
    /// thread and no forks yet.
    pub fn new(path: &str) -> Self {
        let header = EntryHeader {
            version:       3,
            file_sys_id:   1,
            file_sys_info: b':' as u16,
            access:        0xE3,
            file_type:     0x06,
            storage_type:  1,
            ..EntryHeader::default()
        };
        Self { header, threads: Vec::new() }.padded_thread(ThreadId::Filename, path.as_bytes(), FILENAME_BUFFER)
    }

    pub fn file(path: &str, data: &[u8]) -> Self {
        Self::new(path).data(data)
    }

    pub fn directory(path: &str) -> Self {
        let mut spec = Self::new(path);
        spec.header.file_type = 0x0F;
        spec.header.storage_type = 0x0D;
        spec
    }

    pub fn disk(path: &str, blocks: u32, image: &[u8]) -> Self {
        let mut spec = Self::new(path).thread(ThreadId::DiskImage, image);
        spec.header.extra_type = blocks;
        spec.header.storage_type = 512;
        spec
    }

    pub fn data(self, data: &[u8]) -> Self {
        self.thread(ThreadId::DataFork, data)
    }

    pub fn resource(self, data: &[u8]) -> Self {
        self.thread(ThreadId::ResourceFork, data)
    }

    pub fn comment(self, text: &str) -> Self {
        let len = text.len();
        self.padded_thread(ThreadId::Comment, text.as_bytes(), len + 16)
    }

    pub fn file_type(mut self, file_type: u32, aux_type: u32) -> Self {
        self.header.file_type = file_type;
        self.header.extra_type = aux_type;
        self
    }

    pub fn file_sys(mut self, id: u16, separator: u8) -> Self {
        self.header.file_sys_id = id;
        self.header.file_sys_info = separator as u16;
        self
    }

    pub fn version(mut self, version: u16) -> Self {
        self.header.version = version;
        self
    }

    pub fn modified(mut self, when: NuDateTime) -> Self {
        self.header.mod_when = when;
        self
    }

    /// Uncompressed thread.
    pub fn thread(self, id: ThreadId, data: &[u8]) -> Self {
        let len = data.len();
        self.padded_thread(id, data, len)
    }

    /// Uncompressed thread stored in a buffer of `capacity` bytes.
    pub fn padded_thread(mut self, id: ThreadId, data: &[u8], capacity: usize) -> Self {
        let capacity = capacity.max(data.len());
        let mut stored = data.to_vec();
        stored.resize(capacity, 0);
        let header = ThreadHeader::new(id, 0, data.len() as u32, capacity as u32);
        self.threads.push((header, stored));
        self
    }

    /// Thread whose stored bytes are passed through as-is.
    pub fn raw_thread(mut self, id: ThreadId, format: u16, eof: u32, stored: &[u8]) -> Self {
        let header = ThreadHeader::new(id, format, eof, stored.len() as u32);
        self.threads.push((header, stored.to_vec()));
        self
    }

    /// Header bytes, thread headers and thread data. Version-3 records get
    /// thread CRCs over the uncompressed payload.
    pub fn encode(&self) -> Vec<u8> {
        let headers: Vec<ThreadHeader> = self
            .threads
            .iter()
            .map(|(th, data)| {
                let mut th = th.clone();
                if self.header.version >= 3 && th.format == 0 {
                    th.crc = crc16(THREAD_SEED, &data[..th.eof as usize]);
                }
                th
            })
            .collect();
        let mut buf = Vec::new();
        self.header.write(&headers, &mut buf).unwrap();
        for (_, data) in &self.threads {
            buf.extend_from_slice(data);
        }
        buf
    }

    /// Length of everything before the first thread's data.
    pub fn header_len(&self) -> usize {
        let mut buf = Vec::new();
        let headers: Vec<_> = self.threads.iter().map(|(th, _)| th.clone()).collect();
        self.header.write(&headers, &mut buf).unwrap();
        buf.len()
    }
}

#[derive(Default)]
pub struct ArchiveBuilder {
    records:       Vec<Vec<u8>>,
    total_records: Option<u32>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(mut self, spec: RecordSpec) -> Self {
        self.records.push(spec.encode());
        self
    }

    /// Pre-encoded (possibly damaged) record bytes.
    pub fn raw(mut self, bytes: Vec<u8>) -> Self {
        self.records.push(bytes);
        self
    }

    /// Override the record count in the master header.
    pub fn declare(mut self, total_records: u32) -> Self {
        self.total_records = Some(total_records);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let body: Vec<u8> = self.records.concat();
        let total = self.total_records.unwrap_or(self.records.len() as u32);
        let master = MasterHeader::new(total, (MASTER_HEADER_SIZE + body.len()) as u32);
        let mut buf = Vec::new();
        master.write(&mut buf).unwrap();
        buf.extend(body);
        buf
    }

    /// The archive behind a Binary II header, as in `.BXY` files.
    pub fn build_binary2(&self) -> Vec<u8> {
        let mut buf = vec![0u8; BINARY2_HEADER_SIZE];
        buf[..3].copy_from_slice(&[0x0A, 0x47, 0x4C]);
        buf[18] = 0x02;
        buf.extend(self.build());
        buf
    }

    pub fn write_temp(&self) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&self.build()).unwrap();
        file.flush().unwrap();
        file
    }
}

/// Overwrite a little-endian u32 inside encoded bytes.
pub fn patch_u32(bytes: &mut [u8], offset: usize, value: u32) {
    bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
