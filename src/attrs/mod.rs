//! Bidirectional mapping between NuFX record metadata and host metadata.
//!
//! [`to_host_attributes`] is what viewers and indexers consume;
//! [`from_host_attributes`] is used when an item is added to an archive and
//! must pick codes valid for the target filesystem.

pub mod datetime;
pub mod types;
pub mod xattr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use datetime::NuDateTime;
pub use types::{FileCategory, FileSysId};
pub use xattr::NufxXattr;

use crate::record::{ArchiveRecord, RecordKind, StructuralError};
use types::*;

// ── Access bits ──────────────────────────────────────────────────────────────

pub const ACCESS_DESTROY:   u32 = 0x80;
pub const ACCESS_RENAME:    u32 = 0x40;
pub const ACCESS_BACKUP:    u32 = 0x20;
pub const ACCESS_INVISIBLE: u32 = 0x04;
pub const ACCESS_WRITE:     u32 = 0x02;
pub const ACCESS_READ:      u32 = 0x01;

/// ShrinkIt-style `dnbiwr` listing of the access bits, `-` for each clear bit.
pub fn access_string(access: u32) -> String {
    [
        (ACCESS_DESTROY, 'd'),
        (ACCESS_RENAME, 'n'),
        (ACCESS_BACKUP, 'b'),
        (ACCESS_INVISIBLE, 'i'),
        (ACCESS_WRITE, 'w'),
        (ACCESS_READ, 'r'),
    ]
    .iter()
    .map(|&(bit, c)| if access & bit != 0 { c } else { '-' })
    .collect()
}

/// Host view of the six defined access bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct HostAccess {
    pub readable:     bool,
    pub writable:     bool,
    pub deletable:    bool,
    pub renamable:    bool,
    pub invisible:    bool,
    pub needs_backup: bool,
}

impl HostAccess {
    pub fn from_native(access: u32) -> Self {
        Self {
            readable:     access & ACCESS_READ != 0,
            writable:     access & ACCESS_WRITE != 0,
            deletable:    access & ACCESS_DESTROY != 0,
            renamable:    access & ACCESS_RENAME != 0,
            invisible:    access & ACCESS_INVISIBLE != 0,
            needs_backup: access & ACCESS_BACKUP != 0,
        }
    }

    pub fn to_native(self) -> u32 {
        [
            (self.readable, ACCESS_READ),
            (self.writable, ACCESS_WRITE),
            (self.deletable, ACCESS_DESTROY),
            (self.renamable, ACCESS_RENAME),
            (self.invisible, ACCESS_INVISIBLE),
            (self.needs_backup, ACCESS_BACKUP),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |acc, (_, bit)| acc | bit)
    }

    /// Destroy, rename and write all disabled.
    pub fn is_locked(&self) -> bool {
        !self.deletable && !self.renamable && !self.writable
    }

    /// Map POSIX owner permissions: writable files come back unlocked
    /// (`dnb-wr`), read-only files locked (`--b--r`).
    pub fn from_unix_mode(mode: u32) -> Self {
        let writable = mode & 0o200 != 0;
        Self {
            readable:     mode & 0o400 != 0,
            writable,
            deletable:    writable,
            renamable:    writable,
            invisible:    false,
            needs_backup: true,
        }
    }

    pub fn unix_mode(&self) -> u32 {
        let mut mode = 0;
        if self.readable {
            mode |= 0o444;
        }
        if self.writable && !self.is_locked() {
            mode |= 0o200;
        }
        mode
    }
}

impl Default for HostAccess {
    /// ShrinkIt's default for new items, `dnb-wr`.
    fn default() -> Self {
        Self::from_native(ACCESS_DESTROY | ACCESS_RENAME | ACCESS_BACKUP | ACCESS_WRITE | ACCESS_READ)
    }
}

// ── Host attributes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostFileType {
    /// HFS type code (big-endian four-char).
    pub type_code:    u32,
    /// HFS creator code.
    pub creator:      u32,
    pub category:     FileCategory,
    /// ProDOS three-letter abbreviation, `???` when outside the table.
    pub abbreviation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostAttributes {
    pub file_type:          HostFileType,
    pub access:             HostAccess,
    pub created:            Option<DateTime<Utc>>,
    pub modified:           Option<DateTime<Utc>>,
    pub archived:           Option<DateTime<Utc>>,
    pub is_directory:       bool,
    pub data_fork_size:     u64,
    pub resource_fork_size: u64,
    /// `com.apple.NuFX` blob found on the host file, if any. Its fields
    /// take precedence when the item is added back to an archive.
    #[serde(skip)]
    pub nufx:               Option<NufxXattr>,
}

impl HostAttributes {
    pub fn with_nufx(mut self, xattr: NufxXattr) -> Self {
        self.nufx = Some(xattr);
        self
    }
}

/// The archive attribute set for a new item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAttributes {
    pub file_sys_id:   FileSysId,
    /// Low byte is `separator`.
    pub file_sys_info: u16,
    pub separator:     u8,
    pub file_type:     u32,
    pub aux_type:     u32,
    pub access:       u32,
    pub storage_type: u16,
    pub create_when:  NuDateTime,
    pub mod_when:     NuDateTime,
    pub archive_when: NuDateTime,
    pub option_list:  Vec<u8>,
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("target path is empty")]
    EmptyPath,
    #[error("an item already exists at {0}")]
    PathCollision(String),
    #[error("name {name:?} contains the target separator {separator:?}")]
    SeparatorInName { name: String, separator: char },
    #[error("name {0:?} has characters outside the archive character set")]
    UnrepresentableName(String),
    #[error("file type ${file_type:02X} cannot be stored on {file_sys}")]
    UnsupportedFileType { file_type: u32, file_sys: FileSysId },
    #[error("{0} has no directories")]
    DirectoryNotSupported(FileSysId),
    #[error("{field} time in year {year} cannot be packed (1940..=2039)")]
    TimestampOutOfRange { field: &'static str, year: i32 },
    #[error("NuFX extended attribute must be 64 bytes, got {0}")]
    BadExtendedAttributes(usize),
    #[error("archive model unavailable: {0}")]
    ModelUnavailable(#[from] StructuralError),
}

// ── Native → host ────────────────────────────────────────────────────────────

pub fn to_host_attributes(record: &ArchiveRecord) -> HostAttributes {
    let (data_fork_size, resource_fork_size) = match record.kind {
        RecordKind::Disk => (record.disk_image_size(), 0),
        _ => (
            record.data_fork.as_ref().map_or(0, |f| f.uncompressed_size),
            record.resource_fork.as_ref().map_or(0, |f| f.uncompressed_size),
        ),
    };
    HostAttributes {
        file_type:    host_file_type(record),
        access:       HostAccess::from_native(record.access),
        created:      record.create_when.to_utc(),
        modified:     record.mod_when.to_utc(),
        archived:     record.archive_when.to_utc(),
        is_directory: record.kind == RecordKind::Directory,
        data_fork_size,
        resource_fork_size,
        nufx:         None,
    }
}

fn host_file_type(record: &ArchiveRecord) -> HostFileType {
    match record.kind {
        RecordKind::Directory => {
            return HostFileType {
                type_code:    0,
                creator:      0,
                category:     FileCategory::Directory,
                abbreviation: PRODOS_TYPE_NAMES[TYPE_DIR as usize],
            }
        }
        RecordKind::Disk => {
            return HostFileType {
                type_code:    TYPE_DISK_IMG,
                creator:      CREATOR_DISK,
                category:     FileCategory::DiskImage,
                abbreviation: "DSK",
            }
        }
        RecordKind::File => {}
    }

    if record.file_sys_id.uses_hfs_codes() {
        let (type_code, creator) = (record.file_type, record.aux_type);
        let (category, abbreviation) = match prodos_for_hfs_codes(type_code, creator) {
            Some((ft, _)) => (category_of(ft), PRODOS_TYPE_NAMES[ft as usize]),
            None if type_code == TYPE_TEXT => (FileCategory::Text, PRODOS_TYPE_NAMES[TYPE_TXT as usize]),
            None if type_code == four_cc(b"APPL") => (FileCategory::Application, UNKNOWN_TYPE_NAME),
            None => (FileCategory::Unknown, UNKNOWN_TYPE_NAME),
        };
        return HostFileType { type_code, creator, category, abbreviation };
    }

    match u8::try_from(record.file_type) {
        Ok(ft) => {
            let (type_code, creator) = hfs_codes_for_prodos(ft, record.aux_type as u16);
            HostFileType {
                type_code,
                creator,
                category:     category_of(ft),
                abbreviation: PRODOS_TYPE_NAMES[ft as usize],
            }
        }
        Err(_) => HostFileType {
            type_code:    0,
            creator:      0,
            category:     FileCategory::Unknown,
            abbreviation: UNKNOWN_TYPE_NAME,
        },
    }
}

// ── Host → native ────────────────────────────────────────────────────────────

const DOS_TYPES:    [u8; 8] = [TYPE_TXT, TYPE_BIN, TYPE_INT, TYPE_BAS, TYPE_REL, 0xF2, 0xF3, 0xF4];
const PASCAL_TYPES: [u8; 5] = [TYPE_NON, TYPE_BAD, TYPE_PCD, TYPE_PTX, TYPE_PDA];

/// Map host metadata onto `target`. A NuFX blob on the host item overrides
/// the filesystem, access, storage type and option list; only the separator
/// byte of its `file_sys_info` is replaced.
pub fn from_host_attributes(
    host:   &HostAttributes,
    target: FileSysId,
) -> Result<NativeAttributes, ValidationError> {
    let target = host.nufx.as_ref().map_or(target, |x| FileSysId::from_u16(x.file_sys_id));
    let (file_type, aux_type) = native_type_codes(host, target)?;
    let separator = target.default_separator();
    let mut native = NativeAttributes {
        file_sys_id:   target,
        file_sys_info: separator as u16,
        separator,
        file_type,
        aux_type,
        access:        host.access.to_native(),
        storage_type:  storage_type_for(host),
        create_when:   pack("create", host.created.as_ref())?,
        mod_when:      pack("modify", host.modified.as_ref())?,
        archive_when:  pack("archive", host.archived.as_ref())?,
        option_list:   Vec::new(),
    };
    if let Some(xattr) = &host.nufx {
        native.file_sys_info = (xattr.file_sys_info & 0xFF00) | separator as u16;
        native.access = xattr.access;
        native.storage_type = xattr.storage_type;
        native.option_list = xattr.option_bytes.clone();
    }
    Ok(native)
}

pub(crate) fn pack(field: &'static str, when: Option<&DateTime<Utc>>) -> Result<NuDateTime, ValidationError> {
    NuDateTime::from_utc(when).map_err(|year| ValidationError::TimestampOutOfRange { field, year })
}

fn native_type_codes(host: &HostAttributes, target: FileSysId) -> Result<(u32, u32), ValidationError> {
    let HostFileType { type_code, creator, .. } = host.file_type;

    if target.uses_hfs_codes() {
        return Ok(if host.is_directory { (0, 0) } else { (type_code, creator) });
    }

    let (ft, aux) = if host.is_directory {
        (TYPE_DIR, 0)
    } else {
        prodos_for_hfs_codes(type_code, creator).unwrap_or(match type_code {
            TYPE_TEXT => (TYPE_TXT, 0),
            TYPE_BINA => (TYPE_BIN, 0),
            _ => (TYPE_NON, 0),
        })
    };

    if host.is_directory && target.is_flat() {
        return Err(ValidationError::DirectoryNotSupported(target));
    }
    let ft = match (target, ft) {
        (FileSysId::Pascal, TYPE_TXT) => TYPE_PTX,
        (FileSysId::Pascal, TYPE_BIN) => TYPE_PDA,
        (_, ft) => ft,
    };

    let allowed = match target {
        FileSysId::Dos33 | FileSysId::Dos32 => DOS_TYPES.contains(&ft),
        FileSysId::Pascal => PASCAL_TYPES.contains(&ft),
        _ => true,
    };
    if !allowed {
        return Err(ValidationError::UnsupportedFileType { file_type: ft as u32, file_sys: target });
    }
    Ok((ft as u32, aux as u32))
}

/// Largest data fork ShrinkIt files as a tree; bigger ones get storage
/// type 0 (unknown).
const MAX_TREE_SIZE: u64 = 16 * 1024 * 1024;

/// ProDOS storage type implied by the item's shape.
fn storage_type_for(host: &HostAttributes) -> u16 {
    match host {
        h if h.is_directory => 0x0D,
        h if h.resource_fork_size > 0 => 0x05,
        h if h.data_fork_size <= 512 => 0x01,
        h if h.data_fork_size < 133_376 => 0x02,
        h if h.data_fork_size <= MAX_TREE_SIZE => 0x03,
        _ => 0x00,
    }
}
