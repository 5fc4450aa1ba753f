use std::cmp::Ordering;

use derive_more::{Display, From};

/// On-disk type tag of a node record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NodeKind {
    #[display("file")]
    File,
    #[display("directory")]
    Directory,
}

impl NodeKind {
    pub const fn tag(self) -> u8 {
        match self {
            NodeKind::File => 0,
            NodeKind::Directory => 1,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(NodeKind::File),
            1 => Some(NodeKind::Directory),
            _ => None,
        }
    }
}

/// A resolved node of the table: either a directory owning its children, or a file.
#[derive(Debug, Clone, PartialEq, Eq, From)]
pub enum FileSystemNode {
    Directory(DirectoryNode),
    File(FileNode),
}

impl FileSystemNode {
    pub fn name(&self) -> &str {
        match self {
            FileSystemNode::Directory(directory) => directory.name(),
            FileSystemNode::File(file) => file.name(),
        }
    }

    pub fn name_offset(&self) -> u32 {
        match self {
            FileSystemNode::Directory(directory) => directory.name_offset,
            FileSystemNode::File(file) => file.name_offset,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FileSystemNode::Directory(_) => NodeKind::Directory,
            FileSystemNode::File(_) => NodeKind::File,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryNode> {
        match self {
            FileSystemNode::Directory(directory) => Some(directory),
            FileSystemNode::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            FileSystemNode::File(file) => Some(file),
            FileSystemNode::Directory(_) => None,
        }
    }

    /// Number of nodes below this one. Always zero for files.
    pub fn descendant_count(&self) -> usize {
        match self {
            FileSystemNode::Directory(directory) => directory.descendant_count(),
            FileSystemNode::File(_) => 0,
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        match self {
            FileSystemNode::Directory(directory) => directory.name = name,
            FileSystemNode::File(file) => file.name = name,
        }
    }

    pub(crate) fn set_name_offset(&mut self, name_offset: u32) {
        match self {
            FileSystemNode::Directory(directory) => directory.name_offset = name_offset,
            FileSystemNode::File(file) => file.name_offset = name_offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryNode {
    name: String,
    name_offset: u32,
    parent_index: u32,
    last_child_index: u32,
    children: Vec<FileSystemNode>,
}

impl DirectoryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The unnamed root directory. Its last-child index doubles as the table's node count.
    pub fn root() -> Self {
        Self {
            last_child_index: 1,
            ..Self::default()
        }
    }

    pub(crate) fn with_indices(name_offset: u32, parent_index: u32, last_child_index: u32) -> Self {
        Self {
            name_offset,
            parent_index,
            last_child_index,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_offset(&self) -> u32 {
        self.name_offset
    }

    pub fn parent_index(&self) -> u32 {
        self.parent_index
    }

    /// Flat index one past this directory's last transitive descendant.
    ///
    /// Kept current by every mutation, in the present child order. Serializing
    /// renumbers again after sorting.
    pub fn last_child_index(&self) -> u32 {
        self.last_child_index
    }

    pub fn children(&self) -> &[FileSystemNode] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<FileSystemNode> {
        &mut self.children
    }

    pub(crate) fn push_child(&mut self, node: impl Into<FileSystemNode>) {
        self.children.push(node.into());
    }

    pub(crate) fn set_indices(&mut self, parent_index: u32, last_child_index: u32) {
        self.parent_index = parent_index;
        self.last_child_index = last_child_index;
    }

    /// Case-sensitive lookup of the first child directory called `name`.
    /// Files with the same name are ignored.
    pub fn get_child_directory_node(&self, name: &str) -> Option<&DirectoryNode> {
        self.children
            .iter()
            .filter_map(FileSystemNode::as_directory)
            .find(|directory| directory.name == name)
    }

    pub(crate) fn get_child_directory_node_mut(&mut self, name: &str) -> Option<&mut DirectoryNode> {
        self.children.iter_mut().find_map(|child| match child {
            FileSystemNode::Directory(directory) if directory.name == name => Some(directory),
            _ => None,
        })
    }

    /// Position of the first child, of either kind, called `name`.
    pub fn child_position(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|child| child.name() == name)
    }

    /// Returns the child directory called `name`, appending an empty one if none exists.
    pub(crate) fn child_directory_or_insert(&mut self, name: &str) -> &mut DirectoryNode {
        let index = self
            .children
            .iter()
            .position(|child| matches!(child, FileSystemNode::Directory(d) if d.name == name))
            .unwrap_or_else(|| {
                self.children.push(DirectoryNode::new(name).into());
                self.children.len() - 1
            });

        match &mut self.children[index] {
            FileSystemNode::Directory(directory) => directory,
            FileSystemNode::File(_) => unreachable!("position only matches directories"),
        }
    }

    /// Reassigns pre-order indices to the subtree of this directory, which sits
    /// at flat index `index`. Returns this directory's new last-child index.
    pub(crate) fn renumber(&mut self, index: u32, parent_index: u32) -> u32 {
        let mut next = index.saturating_add(1);
        for child in &mut self.children {
            next = match child {
                FileSystemNode::Directory(sub) => sub.renumber(next, index),
                FileSystemNode::File(_) => next.saturating_add(1),
            };
        }
        self.set_indices(parent_index, next);
        next
    }

    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Recursively sorts children into the canonical on-disk order.
    pub fn sort_recursive(&mut self) {
        self.children
            .sort_by(|left, right| collate(left.name(), right.name()));
        for child in &mut self.children {
            if let FileSystemNode::Directory(directory) = child {
                directory.sort_recursive();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileNode {
    name: String,
    name_offset: u32,
    offset: u32,
    length: u32,
    data: Vec<u8>,
}

impl FileNode {
    /// Creates a file holding `data`. `None` when the payload does not fit a 32-bit length.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Option<Self> {
        let length = payload_length(data.len())?;
        Some(Self {
            name: name.into(),
            length,
            data,
            ..Self::default()
        })
    }

    pub(crate) fn with_extent(name_offset: u32, offset: u32, length: u32) -> Self {
        Self {
            name_offset,
            offset,
            length,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_offset(&self) -> u32 {
        self.name_offset
    }

    /// Absolute offset of the payload in the disc image.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    /// Payload bytes. Empty until `FileSystem::read_all_files` ran for a parsed table.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn set_data(&mut self, data: Vec<u8>) {
        self.data = data;
    }

    pub(crate) fn set_extent(&mut self, offset: u32, length: u32) {
        self.offset = offset;
        self.length = length;
    }
}

fn payload_length(len: usize) -> Option<u32> {
    u32::try_from(len).ok()
}

/// Canonical ordering of sibling names: ASCII case-folded bytes first, raw bytes as tie-break.
pub fn collate(left: &str, right: &str) -> Ordering {
    let folded = left
        .bytes()
        .map(|b| b.to_ascii_lowercase())
        .cmp(right.bytes().map(|b| b.to_ascii_lowercase()));
    folded.then_with(|| left.as_bytes().cmp(right.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn file(name: &str, data: Vec<u8>) -> FileNode {
        FileNode::new(name, data).unwrap()
    }

    fn sample_directory() -> DirectoryNode {
        let mut docs = DirectoryNode::new("docs");
        docs.push_child(file("readme.txt", b"hello".to_vec()));
        docs.push_child(DirectoryNode::new("empty"));

        let mut root = DirectoryNode::root();
        root.push_child(file("docs", b"not a directory".to_vec()));
        root.push_child(docs);
        root.push_child(file("main.dol", vec![0; 100]));
        root
    }

    #[test]
    fn node_kind_tags_round_trip() {
        assert_eq!(NodeKind::from_tag(NodeKind::File.tag()), Some(NodeKind::File));
        assert_eq!(
            NodeKind::from_tag(NodeKind::Directory.tag()),
            Some(NodeKind::Directory)
        );
        assert_eq!(NodeKind::from_tag(2), None);
    }

    #[test]
    fn child_directory_lookup_skips_files_with_same_name() {
        let root = sample_directory();

        let docs = root.get_child_directory_node("docs").unwrap();
        assert_eq!(docs.children().len(), 2);
        assert!(root.get_child_directory_node("main.dol").is_none());
    }

    #[test]
    fn child_directory_lookup_is_case_sensitive() {
        let root = sample_directory();

        assert!(root.get_child_directory_node("DOCS").is_none());
    }

    #[test]
    fn descendant_count_is_transitive() {
        let root = sample_directory();

        assert_eq!(root.descendant_count(), 5);
        assert_eq!(root.children()[1].descendant_count(), 2);
        assert_eq!(root.children()[2].descendant_count(), 0);
    }

    #[test]
    fn child_directory_or_insert_reuses_existing_directory() {
        let mut root = sample_directory();

        root.child_directory_or_insert("docs");
        root.child_directory_or_insert("new");

        assert_eq!(root.children().len(), 4);
        assert_eq!(root.children()[3].name(), "new");
        assert_eq!(root.children()[3].kind(), NodeKind::Directory);
    }

    #[test]
    fn renumber_assigns_pre_order_bounds() {
        let mut root = sample_directory();

        let last = root.renumber(0, 0);

        assert_eq!(last, 6);
        assert_eq!(root.last_child_index(), 6);
        let docs = root.children()[1].as_directory().unwrap();
        assert_eq!(docs.parent_index(), 0);
        assert_eq!(docs.last_child_index(), 5);
        let empty = docs.get_child_directory_node("empty").unwrap();
        assert_eq!(empty.parent_index(), 2);
        assert_eq!(empty.last_child_index(), 5);
    }

    #[test]
    fn file_length_comes_from_payload() {
        let node = file("main.dol", vec![0; 100]);

        assert_eq!(node.length(), 100);
        assert_eq!(node.data().len(), 100);
    }

    #[rstest]
    #[case(0, Some(0))]
    #[case(0xFFFF_FFFF, Some(u32::MAX))]
    fn payload_length_fits_32_bits(#[case] len: usize, #[case] expected: Option<u32>) {
        assert_eq!(payload_length(len), expected);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn payload_length_rejects_oversized_payloads() {
        assert_eq!(payload_length(0x1_0000_0000), None);
    }

    #[rstest]
    #[case("a", "b", Ordering::Less)]
    #[case("B", "a", Ordering::Greater)]
    #[case("Zelda", "apple", Ordering::Greater)]
    #[case("A", "a", Ordering::Less)]
    #[case("abc", "ab", Ordering::Greater)]
    #[case("same", "same", Ordering::Equal)]
    #[case("_x", "a", Ordering::Less)]
    fn collate_folds_ascii_case(
        #[case] left: &str,
        #[case] right: &str,
        #[case] expected: Ordering,
    ) {
        assert_eq!(collate(left, right), expected);
    }

    #[test]
    fn sort_recursive_orders_every_level() {
        let mut root = DirectoryNode::root();
        let mut sub = DirectoryNode::new("sub");
        sub.push_child(file("z.bin", Vec::new()));
        sub.push_child(file("A.bin", Vec::new()));
        root.push_child(file("main.dol", Vec::new()));
        root.push_child(sub);

        root.sort_recursive();

        let names = root
            .children()
            .iter()
            .map(FileSystemNode::name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["main.dol", "sub"]);
        let sub_names = root.children()[1]
            .as_directory()
            .unwrap()
            .children()
            .iter()
            .map(FileSystemNode::name)
            .collect::<Vec<_>>();
        assert_eq!(sub_names, vec!["A.bin", "z.bin"]);
    }
}
