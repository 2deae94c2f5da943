pub mod crc;
pub mod master;
pub mod thread;
pub mod entry;
pub mod codec;
pub mod attrs;
pub mod path;
pub mod record;
pub mod tree;
pub mod archive;

pub use archive::{Archive, ArchiveOptions, ItemInfo, OpenError};
pub use attrs::{from_host_attributes, to_host_attributes, HostAttributes, NativeAttributes, ValidationError};
pub use codec::{CompressedDataDescriptor, DecompressionError, ForkDecompressor, StoredDecompressor};
pub use record::{ArchiveRecord, ForkKind, RecordKind, StructuralError, StructuralPolicy};
pub use tree::{DuplicatePathError, HierarchyBuilder, NodeId, Tree, TreeNode};
