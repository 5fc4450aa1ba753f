//! Reading and writing the file system table of GameCube disc images.

#![allow(clippy::enum_variant_names)]

pub mod config;
pub mod ext;
pub mod filesystem;

pub use filesystem::{
    AddressRange, DirectoryNode, FileNode, FileSystem, FileSystemNode, NodeKind,
};
