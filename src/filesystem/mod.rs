//! In-memory model of a GameCube file system table.
//!
//! The table is stored on disc as a flat, pre-order array of fixed-size node
//! records followed by a name table. This module rebuilds it into an owned
//! tree of directories and files, lets callers edit that tree, and flattens it
//! back into the on-disc form.

mod address_range;
mod deserialize;
mod error;
mod file_system;
mod mutation;
mod node;
mod raw_node;
mod serialize;

pub use address_range::AddressRange;
pub use error::{
    AddFileError, AddFilesError, DeserializeError, InvalidAlignmentError, SerializeError,
};
pub use file_system::{DEFAULT_FILE_ALIGNMENT, FileEntry, FileSystem};
pub use node::{DirectoryNode, FileNode, FileSystemNode, NodeKind, collate};
pub use raw_node::{MAX_NAME_OFFSET, NODE_RECORD_SIZE, RawNode, UnknownNodeTag};
