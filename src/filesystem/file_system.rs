use snafu::ensure;

use crate::filesystem::address_range::AddressRange;
use crate::filesystem::error::{InvalidAlignmentError, InvalidAlignmentSnafu};
use crate::filesystem::node::{DirectoryNode, FileNode, FileSystemNode};

pub const DEFAULT_FILE_ALIGNMENT: u32 = 4;

/// A full path paired with the payload of the file it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry<'a> {
    pub path: String,
    pub file: &'a FileNode,
}

/// In-memory file system table: the tree plus the addresses it was read from or written to.
///
/// Instances are not meant to be shared between threads while a stream
/// operation is in progress; every read and write moves the caller's cursor.
#[derive(Debug, Clone)]
pub struct FileSystem {
    pub(crate) root: DirectoryNode,
    pub(crate) raw: Vec<u8>,
    pub(crate) alignment: u32,
    pub(crate) address_range: AddressRange,
    pub(crate) node_table_range: AddressRange,
    pub(crate) name_table_range: AddressRange,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self {
            root: DirectoryNode::root(),
            raw: Vec::new(),
            alignment: DEFAULT_FILE_ALIGNMENT,
            address_range: AddressRange::default(),
            node_table_range: AddressRange::default(),
            name_table_range: AddressRange::default(),
        }
    }
}

impl FileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> &DirectoryNode {
        &self.root
    }

    /// Verbatim table bytes captured by the last `deserialize`.
    ///
    /// Never refreshed by mutations or `serialize`, so it is stale once the tree changes.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn alignment(&self) -> u32 {
        self.alignment
    }

    pub fn set_alignment(&mut self, alignment: u32) -> Result<(), InvalidAlignmentError> {
        ensure!(alignment > 0, InvalidAlignmentSnafu);
        self.alignment = alignment;
        Ok(())
    }

    pub fn with_alignment(mut self, alignment: u32) -> Result<Self, InvalidAlignmentError> {
        self.set_alignment(alignment)?;
        Ok(self)
    }

    /// Span of the node array plus the name table.
    pub fn address_range(&self) -> AddressRange {
        self.address_range
    }

    pub fn node_table_range(&self) -> AddressRange {
        self.node_table_range
    }

    pub fn name_table_range(&self) -> AddressRange {
        self.name_table_range
    }

    /// Number of records the table holds, root included.
    pub fn node_count(&self) -> usize {
        1 + self.root.descendant_count()
    }

    /// Every directory below the root, depth-first.
    pub fn directories(&self) -> Vec<&DirectoryNode> {
        let mut directories = Vec::new();
        collect_directories(&self.root, &mut directories);
        directories
    }

    /// Every file, depth-first.
    pub fn files(&self) -> Vec<&FileNode> {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files);
        files
    }

    /// Every file with its `/`-joined path, depth-first.
    pub fn file_entries(&self) -> Vec<FileEntry<'_>> {
        let mut entries = Vec::new();
        collect_entries(&self.root, "", &mut entries);
        entries
    }

    /// Finds a node by `/`-separated path. The empty path is not a node.
    pub fn find(&self, path: &str) -> Option<&FileSystemNode> {
        let mut segments = path.split(['/', '\\']).filter(|s| !s.is_empty()).peekable();
        let mut current = &self.root;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                return current.children().iter().find(|child| child.name() == segment);
            }
            current = current.get_child_directory_node(segment)?;
        }
        None
    }
}

fn collect_directories<'a>(directory: &'a DirectoryNode, out: &mut Vec<&'a DirectoryNode>) {
    for child in directory.children() {
        if let FileSystemNode::Directory(sub) = child {
            out.push(sub);
            collect_directories(sub, out);
        }
    }
}

fn collect_files<'a>(directory: &'a DirectoryNode, out: &mut Vec<&'a FileNode>) {
    for child in directory.children() {
        match child {
            FileSystemNode::Directory(sub) => collect_files(sub, out),
            FileSystemNode::File(file) => out.push(file),
        }
    }
}

fn collect_entries<'a>(directory: &'a DirectoryNode, prefix: &str, out: &mut Vec<FileEntry<'a>>) {
    for child in directory.children() {
        let path = format!("{prefix}{}", child.name());
        match child {
            FileSystemNode::Directory(sub) => collect_entries(sub, &format!("{path}/"), out),
            FileSystemNode::File(file) => out.push(FileEntry { path, file }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileSystem {
        let mut fs = FileSystem::new();
        fs.add_file("docs/readme.txt", b"hello".to_vec(), false)
            .unwrap();
        fs.add_file("docs/img/logo.tpl", vec![1, 2, 3], false)
            .unwrap();
        fs.add_file("main.dol", vec![0; 100], false).unwrap();
        fs
    }

    #[test]
    fn new_file_system_only_has_root() {
        let fs = FileSystem::new();

        assert_eq!(fs.node_count(), 1);
        assert_eq!(fs.alignment(), DEFAULT_FILE_ALIGNMENT);
        assert!(fs.files().is_empty());
        assert!(fs.directories().is_empty());
        assert!(fs.raw().is_empty());
    }

    #[test]
    fn zero_alignment_is_rejected() {
        let mut fs = FileSystem::new();

        let err = fs.set_alignment(0).unwrap_err();
        assert_eq!(err.to_string(), "File alignment must be greater than zero");
        assert_eq!(fs.alignment(), DEFAULT_FILE_ALIGNMENT);
        assert!(fs.set_alignment(32).is_ok());
        assert_eq!(fs.alignment(), 32);
    }

    #[test]
    fn traversals_exclude_root_and_walk_depth_first() {
        let fs = sample();

        let directories = fs
            .directories()
            .iter()
            .map(|d| d.name())
            .collect::<Vec<_>>();
        let files = fs.files().iter().map(|f| f.name()).collect::<Vec<_>>();

        assert_eq!(directories, vec!["docs", "img"]);
        assert_eq!(files, vec!["readme.txt", "logo.tpl", "main.dol"]);
        assert_eq!(fs.node_count(), 6);
    }

    #[test]
    fn file_entries_carry_full_paths() {
        let fs = sample();

        let entries = fs
            .file_entries()
            .into_iter()
            .map(|entry| (entry.path, entry.file.data().len()))
            .collect::<Vec<_>>();

        assert_eq!(
            entries,
            vec![
                ("docs/readme.txt".to_string(), 5),
                ("docs/img/logo.tpl".to_string(), 3),
                ("main.dol".to_string(), 100),
            ]
        );
    }

    #[test]
    fn find_resolves_files_and_directories() {
        let fs = sample();

        assert_eq!(fs.find("docs/img").map(|n| n.name()), Some("img"));
        assert_eq!(
            fs.find("docs\\readme.txt")
                .and_then(|n| n.as_file())
                .map(|f| f.data().to_vec()),
            Some(b"hello".to_vec())
        );
        assert!(fs.find("docs/missing").is_none());
        assert!(fs.find("").is_none());
    }
}
