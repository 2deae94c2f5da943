//! Record decoding: raw entries → validated [`ArchiveRecord`]s.
//!
//! Each NuFX record is a header plus a list of threads. Decoding merges the
//! filename thread, the comment thread and the three fork threads into one
//! record and checks the structure along the way. Problems are reported as
//! [`StructuralError`]s; a record is never completed with made-up fork data.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

use crate::attrs::{FileSysId, NuDateTime};
use crate::attrs::types::TYPE_DIR;
use crate::codec::CompressedDataDescriptor;
use crate::entry::RawEntry;
use crate::path::{decode_name, ResolvedPath};
use crate::thread::ThreadId;

// ── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    File,
    Directory,
    Disk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkKind {
    Data,
    Resource,
    Disk,
}

impl fmt::Display for ForkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ForkKind::Data     => "data",
            ForkKind::Resource => "resource",
            ForkKind::Disk     => "disk image",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fork {
    pub uncompressed_size: u64,
    pub compressed_size:   u64,
    /// `None` for items added to the model but not yet written.
    pub descriptor:        Option<CompressedDataDescriptor>,
}

impl Fork {
    fn from_descriptor(descriptor: CompressedDataDescriptor) -> Self {
        Self {
            uncompressed_size: descriptor.uncompressed_len as u64,
            compressed_size:   descriptor.compressed_len as u64,
            descriptor:        Some(descriptor),
        }
    }
}

/// One archive entry, with its threads merged in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveRecord {
    /// Storage-order position; stable across skipped records.
    pub index:         usize,
    pub version:       u16,
    pub file_sys_id:   FileSysId,
    /// Raw header field; the low byte is the stored separator.
    pub file_sys_info: u16,
    /// Separator in effect, with the filesystem default filled in.
    pub separator:     u8,
    pub access:        u32,
    pub file_type:     u32,
    pub aux_type:      u32,
    pub storage_type:  u16,
    pub create_when:   NuDateTime,
    pub mod_when:      NuDateTime,
    pub archive_when:  NuDateTime,
    pub kind:          RecordKind,
    pub data_fork:     Option<Fork>,
    pub resource_fork: Option<Fork>,
    pub disk_image:    Option<Fork>,
    /// Full archive-native path.
    pub filename:      String,
    pub comment:       Option<String>,
    pub option_list:   Vec<u8>,
    pub total_threads: u32,
    /// Host file an added item was taken from.
    pub source:        Option<PathBuf>,
}

impl ArchiveRecord {
    pub fn fork(&self, kind: ForkKind) -> Option<&Fork> {
        match kind {
            ForkKind::Data     => self.data_fork.as_ref(),
            ForkKind::Resource => self.resource_fork.as_ref(),
            ForkKind::Disk     => self.disk_image.as_ref(),
        }
    }

    /// Size of a disk image record. ProDOS stores the block count in the
    /// aux type and the block size in the storage type.
    pub fn disk_image_size(&self) -> u64 {
        if self.aux_type != 0 && self.storage_type != 0 {
            self.aux_type as u64 * self.storage_type as u64
        } else {
            self.disk_image.as_ref().map_or(0, |f| f.uncompressed_size)
        }
    }

    /// Uncompressed size a leaf contributes to its directory.
    pub fn size(&self) -> u64 {
        match self.kind {
            RecordKind::Directory => 0,
            RecordKind::Disk      => self.disk_image_size(),
            RecordKind::File      => {
                self.data_fork.as_ref().map_or(0, |f| f.uncompressed_size)
                    + self.resource_fork.as_ref().map_or(0, |f| f.uncompressed_size)
            }
        }
    }

    pub fn compressed_size(&self) -> u64 {
        [&self.data_fork, &self.resource_fork, &self.disk_image]
            .iter()
            .filter_map(|f| f.as_ref())
            .map(|f| f.compressed_size)
            .sum()
    }

    pub fn resolved_path(&self) -> ResolvedPath {
        ResolvedPath::new(&self.filename, self.separator, self.kind == RecordKind::Directory)
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralErrorKind {
    #[error("declares {declared} threads but {found} were found")]
    ThreadCountMismatch { declared: u32, found: usize },
    #[error("required {0:?} thread is missing")]
    MissingThread(ThreadId),
    #[error("{0:?} thread appears more than once")]
    DuplicateThread(ThreadId),
    #[error("header checksum mismatch: stored {stored:#06x}, computed {computed:#06x}")]
    HeaderChecksum { stored: u16, computed: u16 },
    #[error("bad record signature")]
    BadSignature,
    #[error("archive ends inside the record header")]
    Truncated,
    #[error("malformed record header: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("record {index} ({path:?}): {kind}")]
pub struct StructuralError {
    pub index: usize,
    /// Stored path, empty when the header could not be read.
    pub path:  String,
    pub kind:  StructuralErrorKind,
}

/// What to do with a record that fails structural checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructuralPolicy {
    /// Fail the whole decode on the first error.
    #[default]
    Abort,
    /// Drop the record, report it and continue with the next one.
    SkipRecord,
}

// ── Decoding ─────────────────────────────────────────────────────────────────

pub fn decode_entry(raw: RawEntry) -> Result<ArchiveRecord, StructuralError> {
    let header = &raw.header;
    let header_name = decode_name(&header.filename);
    let fail = |path: &str, kind| StructuralError { index: raw.index, path: path.to_string(), kind };

    let mut thread_name: Option<String> = None;
    let mut comment = None;
    let mut create_dir = false;
    let mut data_fork = None;
    let mut resource_fork = None;
    let mut disk_image = None;
    let mut duplicate = None;

    for thread in &raw.threads {
        let id = thread.id();
        let slot = match id {
            ThreadId::DataFork     => &mut data_fork,
            ThreadId::ResourceFork => &mut resource_fork,
            ThreadId::DiskImage    => &mut disk_image,
            ThreadId::Filename => {
                if thread_name.is_some() {
                    duplicate.get_or_insert(id);
                }
                thread_name = thread.data.as_deref().map(decode_name);
                continue;
            }
            ThreadId::Comment => {
                if comment.is_none() {
                    comment = thread.data.as_deref().map(decode_comment);
                }
                continue;
            }
            ThreadId::CreateDirectory => {
                create_dir = true;
                continue;
            }
            other => {
                debug!(index = raw.index, thread = ?other, "ignoring thread");
                continue;
            }
        };
        if slot.is_some() {
            duplicate.get_or_insert(id);
        }
        *slot = Some(Fork::from_descriptor(thread.descriptor(header.version)));
    }

    let filename = match thread_name {
        Some(name) if !name.is_empty() => name,
        _ => header_name,
    };
    if raw.threads.len() != header.total_threads as usize {
        return Err(fail(&filename, StructuralErrorKind::ThreadCountMismatch {
            declared: header.total_threads,
            found:    raw.threads.len(),
        }));
    }
    if let Some(id) = duplicate {
        return Err(fail(&filename, StructuralErrorKind::DuplicateThread(id)));
    }
    if !raw.crc_ok() {
        return Err(fail(&filename, StructuralErrorKind::HeaderChecksum {
            stored:   header.header_crc,
            computed: raw.computed_crc,
        }));
    }
    if filename.is_empty() {
        return Err(fail(&filename, StructuralErrorKind::MissingThread(ThreadId::Filename)));
    }

    let file_sys_id = FileSysId::from_u16(header.file_sys_id);
    let has_forks = data_fork.is_some() || resource_fork.is_some();
    let kind = if disk_image.is_some() {
        RecordKind::Disk
    } else if create_dir
        || (!has_forks && !file_sys_id.uses_hfs_codes() && header.file_type == TYPE_DIR as u32)
    {
        RecordKind::Directory
    } else {
        RecordKind::File
    };
    if kind == RecordKind::File && !has_forks {
        return Err(fail(&filename, StructuralErrorKind::MissingThread(ThreadId::DataFork)));
    }

    let separator = match header.separator() {
        0 => file_sys_id.default_separator(),
        sep => sep,
    };

    debug!(index = raw.index, path = %filename, ?kind, "decoded record");
    Ok(ArchiveRecord {
        index:         raw.index,
        version:       header.version,
        file_sys_id,
        file_sys_info: header.file_sys_info,
        separator,
        access:        header.access,
        file_type:     header.file_type,
        aux_type:      header.extra_type,
        storage_type:  header.storage_type,
        create_when:   header.create_when,
        mod_when:      header.mod_when,
        archive_when:  header.archive_when,
        kind,
        data_fork,
        resource_fork,
        disk_image,
        filename,
        comment,
        option_list:   raw.header.option_list.clone(),
        total_threads: header.total_threads,
        source:        None,
    })
}

/// Comments are CR-terminated lines, NUL padded.
fn decode_comment(bytes: &[u8]) -> String {
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    decode_name(&bytes[..end]).replace('\r', "\n")
}

/// Decode every entry in storage order under `policy`.
///
/// Returns the records plus the errors of skipped records. Under
/// [`StructuralPolicy::Abort`] the first error is returned instead.
/// An enumeration error always ends the stream.
pub fn decode_records<I>(
    entries: I,
    policy:  StructuralPolicy,
) -> Result<(Vec<ArchiveRecord>, Vec<StructuralError>), StructuralError>
where
    I: IntoIterator<Item = Result<RawEntry, StructuralError>>,
{
    let mut records = Vec::new();
    let mut skipped = Vec::new();

    for entry in entries {
        let (result, fatal) = match entry {
            Ok(raw) => (decode_entry(raw), false),
            Err(e) => (Err(e), true),
        };
        match result {
            Ok(record) => records.push(record),
            Err(e) if policy == StructuralPolicy::SkipRecord => {
                warn!(index = e.index, path = %e.path, error = %e.kind, "skipping record");
                skipped.push(e);
                if fatal {
                    break;
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok((records, skipped))
}
