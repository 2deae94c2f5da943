//! High-level [`Archive`] API, the primary embedding surface.
//!
//! ```no_run
//! use shrinkit::archive::Archive;
//! use shrinkit::record::ForkKind;
//!
//! let mut ar = Archive::open("GAMES.SHK")?;
//! let tree = ar.build_model()?;
//! let id = tree.find_path("GAMES/ADVENTURE/SAVE.DAT").unwrap();
//! let index = tree.node(id).origin.unwrap();
//! let record = ar.record(index).unwrap();
//! let bytes = ar.fork_contents(record, ForkKind::Data)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::attrs::{self, from_host_attributes, to_host_attributes, FileSysId, HostAttributes, ValidationError};
use crate::codec::{default_decompressor, DecompressionError, ForkDecompressor};
use crate::entry::EntryReader;
use crate::master::{self, MasterHeader, MasterHeaderError, MASTER_HEADER_SIZE};
use crate::path::{encode_name, split_display, ResolvedPath};
use crate::record::{decode_records, ArchiveRecord, Fork, ForkKind, RecordKind, StructuralError, StructuralPolicy};
use crate::tree::{HierarchyBuilder, Tree};

/// Record version given to added items.
pub const ADDED_RECORD_VERSION: u16 = 3;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum OpenError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("not a NuFX archive")]
    NotNuFx,
    #[error("bad master header: {0}")]
    MasterHeader(#[from] MasterHeaderError),
}

// ── ArchiveOptions ───────────────────────────────────────────────────────────

/// Configuration for [`Archive::open_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub policy:          StructuralPolicy,
    /// Filesystem that items passed to [`Archive::add_item`] are mapped to.
    pub target_file_sys: FileSysId,
    /// Look for the master header behind a Binary II wrapper.
    pub allow_wrappers:  bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            policy:          StructuralPolicy::Abort,
            target_file_sys: FileSysId::ProDos,
            allow_wrappers:  true,
        }
    }
}

// ── ItemInfo ─────────────────────────────────────────────────────────────────

/// Lightweight descriptor returned by [`Archive::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemInfo {
    pub index:           usize,
    /// Components joined with `/`.
    pub path:            String,
    pub kind:            RecordKind,
    pub file_sys:        FileSysId,
    pub file_type:       String,
    pub aux_type:        u32,
    pub access:          String,
    pub size:            u64,
    pub compressed_size: u64,
    pub modified:        Option<DateTime<Utc>>,
    pub comment:         Option<String>,
}

impl From<&ArchiveRecord> for ItemInfo {
    fn from(r: &ArchiveRecord) -> Self {
        let host = to_host_attributes(r);
        ItemInfo {
            index:           r.index,
            path:            r.resolved_path().display(),
            kind:            r.kind,
            file_sys:        r.file_sys_id,
            file_type:       host.file_type.abbreviation.to_string(),
            aux_type:        r.aux_type,
            access:          attrs::access_string(r.access),
            size:            r.size(),
            compressed_size: r.compressed_size(),
            modified:        host.modified,
            comment:         r.comment.clone(),
        }
    }
}

// ── Archive ──────────────────────────────────────────────────────────────────

pub struct Archive {
    path:          Option<PathBuf>,
    bytes:         Vec<u8>,
    master_offset: usize,
    master:        MasterHeader,
    options:       ArchiveOptions,
    records:       Vec<ArchiveRecord>,
    skipped:       Vec<StructuralError>,
    tree:          Option<Tree>,
    decompressor:  Box<dyn ForkDecompressor>,
}

impl Archive {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        Self::open_with_options(path, ArchiveOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self, OpenError> {
        let path = path.as_ref().to_owned();
        let bytes = fs::read(&path).map_err(|source| OpenError::Io { path: path.clone(), source })?;
        let mut archive = Self::from_bytes(bytes, options)?;
        info!(path = %path.display(), records = archive.master.total_records, "opened archive");
        archive.path = Some(path);
        Ok(archive)
    }

    /// Open an archive that is already in memory.
    pub fn from_bytes(bytes: Vec<u8>, options: ArchiveOptions) -> Result<Self, OpenError> {
        let master_offset = master::locate(&bytes, options.allow_wrappers).ok_or(OpenError::NotNuFx)?;
        let master = MasterHeader::read(&bytes[master_offset..])?;

        let available = bytes.len() - master_offset;
        if master.master_eof as usize > available {
            warn!(master_eof = master.master_eof, available, "master EOF extends past end of input");
        }
        if master_offset > 0 {
            debug!(master_offset, "skipped archive wrapper");
        }

        Ok(Self {
            path: None,
            bytes,
            master_offset,
            master,
            options,
            records: Vec::new(),
            skipped: Vec::new(),
            tree: None,
            decompressor: default_decompressor(),
        })
    }

    /// Replace the fork decompression service.
    pub fn with_decompressor(mut self, decompressor: Box<dyn ForkDecompressor>) -> Self {
        self.decompressor = decompressor;
        self
    }

    // ── Model ────────────────────────────────────────────────────────────────

    /// Decode every record and build the hierarchy. The work happens once;
    /// later calls return the cached tree.
    pub fn build_model(&mut self) -> Result<&Tree, StructuralError> {
        let tree = match self.tree.take() {
            Some(tree) => tree,
            None => {
                let start = self.master_offset + MASTER_HEADER_SIZE;
                let entries = EntryReader::new(&self.bytes, start, self.master.total_records);
                let (records, skipped) = decode_records(entries, self.options.policy)?;
                let tree = HierarchyBuilder::build(&records);
                debug!(
                    records = records.len(),
                    skipped = skipped.len(),
                    nodes = tree.len(),
                    duplicates = tree.duplicates().len(),
                    "built archive model"
                );
                self.records = records;
                self.skipped = skipped;
                tree
            }
        };
        Ok(self.tree.insert(tree))
    }

    /// `None` until [`build_model`](Self::build_model) has succeeded.
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn records(&self) -> &[ArchiveRecord] {
        &self.records
    }

    /// Look up a record by its storage index.
    pub fn record(&self, index: usize) -> Option<&ArchiveRecord> {
        self.records
            .binary_search_by_key(&index, |r| r.index)
            .ok()
            .map(|i| &self.records[i])
    }

    /// Records dropped under [`StructuralPolicy::SkipRecord`].
    pub fn skipped(&self) -> &[StructuralError] {
        &self.skipped
    }

    pub fn master(&self) -> &MasterHeader {
        &self.master
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn host_attributes(&self, record: &ArchiveRecord) -> HostAttributes {
        to_host_attributes(record)
    }

    pub fn list(&self) -> Vec<ItemInfo> {
        self.records.iter().map(ItemInfo::from).collect()
    }

    // ── Fork data ────────────────────────────────────────────────────────────

    /// Raw bytes of one fork. Every call decompresses again.
    pub fn fork_contents(&self, record: &ArchiveRecord, which: ForkKind) -> Result<Vec<u8>, DecompressionError> {
        let fork = record.fork(which).ok_or(DecompressionError::ForkAbsent(which))?;
        let descriptor = fork.descriptor.as_ref().ok_or(DecompressionError::NotInArchive(which))?;

        let start = descriptor.offset as usize;
        let len = descriptor.compressed_len as usize;
        let available = self.bytes.len().saturating_sub(start);
        if available < len {
            return Err(DecompressionError::Truncated { expected: len as u64, available: available as u64 });
        }
        self.decompressor.decompress(descriptor, &self.bytes[start..start + len])
    }

    // ── Adding items ─────────────────────────────────────────────────────────

    /// Add a prepared host item at `target_path`, a display path as produced
    /// by [`path::join`](crate::path::join). Nothing is changed when
    /// validation fails. Writing the archive bytes is left to the caller.
    ///
    /// An item carrying a `com.apple.NuFX` blob keeps the blob's filesystem,
    /// access, storage type and option list, and is stamped with the current
    /// time as its archive time.
    pub fn add_item<P: AsRef<Path>>(
        &mut self,
        host_path:   P,
        host:        &HostAttributes,
        target_path: &str,
    ) -> Result<&ArchiveRecord, ValidationError> {
        let components = split_display(target_path);
        if components.is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        let mut native = from_host_attributes(host, self.options.target_file_sys)?;
        if native.file_sys_id.is_flat() && components.len() > 1 {
            return Err(ValidationError::DirectoryNotSupported(native.file_sys_id));
        }
        if host.nufx.is_some() {
            native.archive_when = attrs::pack("archive", Some(&Utc::now()))?;
        }
        let separator = native.separator as char;
        for name in &components {
            if name.contains(separator) {
                return Err(ValidationError::SeparatorInName { name: name.clone(), separator });
            }
            if encode_name(name).is_none() {
                return Err(ValidationError::UnrepresentableName(name.clone()));
            }
        }

        let resolved = ResolvedPath::from_components(components, host.is_directory);
        let tree = self.build_model()?;
        if tree.find(resolved.components()).is_some() || tree.conflict(&resolved).is_some() {
            return Err(ValidationError::PathCollision(resolved.display()));
        }

        let index = self
            .records
            .last()
            .map_or(0, |r| r.index + 1)
            .max(self.master.total_records as usize);
        let new_fork = |size: u64| Fork { uncompressed_size: size, compressed_size: 0, descriptor: None };
        let (data_fork, resource_fork) = if host.is_directory {
            (None, None)
        } else {
            let resource = (host.resource_fork_size > 0).then(|| new_fork(host.resource_fork_size));
            let data = (host.data_fork_size > 0 || resource.is_none()).then(|| new_fork(host.data_fork_size));
            (data, resource)
        };
        let record = ArchiveRecord {
            index,
            version:       ADDED_RECORD_VERSION,
            file_sys_id:   native.file_sys_id,
            file_sys_info: native.file_sys_info,
            separator:     native.separator,
            access:        native.access,
            file_type:     native.file_type,
            aux_type:      native.aux_type,
            storage_type:  native.storage_type,
            create_when:   native.create_when,
            mod_when:      native.mod_when,
            archive_when:  native.archive_when,
            kind:          if host.is_directory { RecordKind::Directory } else { RecordKind::File },
            total_threads: 1 + data_fork.is_some() as u32 + resource_fork.is_some() as u32,
            data_fork,
            resource_fork,
            disk_image:    None,
            filename:      resolved.components().join(&separator.to_string()),
            comment:       None,
            option_list:   native.option_list,
            source:        Some(host_path.as_ref().to_owned()),
        };

        let mut builder = HierarchyBuilder::resume(self.tree.take().unwrap_or_default());
        let inserted = builder.insert(&record, &resolved);
        self.tree = Some(builder.finish());
        if let Err(kind) = inserted {
            debug!(path = %resolved.display(), %kind, "insert refused after validation");
            return Err(ValidationError::PathCollision(resolved.display()));
        }

        debug!(index, path = %record.filename, "added item");
        let at = self.records.len();
        self.records.push(record);
        Ok(&self.records[at])
    }
}
