use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::filesystem::node::{DirectoryNode, FileNode, FileSystemNode, NodeKind};

/// Size in bytes of one node record.
pub const NODE_RECORD_SIZE: u64 = 12;

/// Largest name-table offset the 24-bit field can address.
pub const MAX_NAME_OFFSET: u32 = 0x00FF_FFFF;

/// One fixed-size record of the node array, before its tag is interpreted.
///
/// `first`/`second` hold the file offset and length for files, or the parent
/// index and last-child index for directories. The root's `second` is the
/// total node count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawNode {
    pub tag: u8,
    pub name_offset: u32,
    pub first: u32,
    pub second: u32,
}

impl RawNode {
    pub fn directory(name_offset: u32, parent_index: u32, last_child_index: u32) -> Self {
        Self {
            tag: NodeKind::Directory.tag(),
            name_offset,
            first: parent_index,
            second: last_child_index,
        }
    }

    pub fn file(name_offset: u32, offset: u32, length: u32) -> Self {
        Self {
            tag: NodeKind::File.tag(),
            name_offset,
            first: offset,
            second: length,
        }
    }

    pub fn kind(&self) -> Option<NodeKind> {
        NodeKind::from_tag(self.tag)
    }

    pub fn read_from<R: Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            tag: reader.read_u8()?,
            name_offset: reader.read_u24::<BigEndian>()?,
            first: reader.read_u32::<BigEndian>()?,
            second: reader.read_u32::<BigEndian>()?,
        })
    }

    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(self.tag)?;
        writer.write_u24::<BigEndian>(self.name_offset & MAX_NAME_OFFSET)?;
        writer.write_u32::<BigEndian>(self.first)?;
        writer.write_u32::<BigEndian>(self.second)
    }
}

/// Raised when a record carries a tag that is neither file nor directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownNodeTag(pub u8);

impl TryFrom<RawNode> for FileSystemNode {
    type Error = UnknownNodeTag;

    /// Resolves the record into its concrete shape. The name stays empty
    /// until it is looked up in the name table.
    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        match raw.kind() {
            Some(NodeKind::Directory) => Ok(DirectoryNode::with_indices(
                raw.name_offset,
                raw.first,
                raw.second,
            )
            .into()),
            Some(NodeKind::File) => {
                Ok(FileNode::with_extent(raw.name_offset, raw.first, raw.second).into())
            }
            None => Err(UnknownNodeTag(raw.tag)),
        }
    }
}
