use std::io::{Cursor, Seek, Write};

use snafu::{OptionExt, ResultExt, ensure};
use tracing::debug;

use crate::ext::{BinaryWriteExt, align_up};
use crate::filesystem::address_range::AddressRange;
use crate::filesystem::error::{
    InvariantSnafu, OverflowSnafu, PayloadNotLoadedSnafu, SerializeError, WriteSnafu,
};
use crate::filesystem::file_system::FileSystem;
use crate::filesystem::node::{DirectoryNode, FileNode, FileSystemNode};
use crate::filesystem::raw_node::{MAX_NAME_OFFSET, NODE_RECORD_SIZE, RawNode};

/// Sizes of the two table regions, known before anything is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TableSize {
    node_count: u64,
    name_table_size: u64,
}

impl TableSize {
    fn measure(root: &DirectoryNode) -> Self {
        let mut size = TableSize {
            node_count: 1,
            name_table_size: 0,
        };
        size.add_children(root);
        size
    }

    fn add_children(&mut self, directory: &DirectoryNode) {
        for child in directory.children() {
            self.node_count += 1;
            self.name_table_size += child.name().len() as u64 + 1;
            if let FileSystemNode::Directory(sub) = child {
                self.add_children(sub);
            }
        }
    }

    fn node_table_size(&self) -> u64 {
        self.node_count * NODE_RECORD_SIZE
    }
}

/// Flattened form of the tree: final records and name table, ready to emit.
struct Layout {
    records: Vec<RawNode>,
    names: Vec<u8>,
    next_file_address: u64,
    alignment: u64,
}

impl Layout {
    fn new(payload_start: u64, alignment: u32) -> Self {
        Self {
            records: Vec::new(),
            names: Vec::new(),
            next_file_address: payload_start,
            alignment: u64::from(alignment),
        }
    }

    fn next_index(&self) -> Result<u32, SerializeError> {
        u32::try_from(self.records.len())
            .ok()
            .context(OverflowSnafu {
                what: "node count",
                value: self.records.len() as u64,
            })
    }

    fn place_root(&mut self, root: &mut DirectoryNode) -> Result<(), SerializeError> {
        self.records.push(RawNode::directory(0, 0, 0));
        self.place_children(root, 0)?;
        let last_child_index = self.next_index()?;
        root.set_indices(0, last_child_index);
        self.records[0].second = last_child_index;
        Ok(())
    }

    /// Assigns flat indices to `directory`'s children in pre-order.
    fn place_children(
        &mut self,
        directory: &mut DirectoryNode,
        directory_index: u32,
    ) -> Result<(), SerializeError> {
        for child in directory.children_mut() {
            let index = self.next_index()?;
            let name_offset = self.push_name(child.name())?;
            child.set_name_offset(name_offset);

            match child {
                FileSystemNode::Directory(sub) => {
                    self.records
                        .push(RawNode::directory(name_offset, directory_index, 0));
                    self.place_children(sub, index)?;
                    let last_child_index = self.next_index()?;
                    sub.set_indices(directory_index, last_child_index);
                    self.records[index as usize].second = last_child_index;
                }
                FileSystemNode::File(file) => {
                    let (offset, length) = self.place_file(file)?;
                    file.set_extent(offset, length);
                    self.records.push(RawNode::file(name_offset, offset, length));
                }
            }
        }
        Ok(())
    }

    fn push_name(&mut self, name: &str) -> Result<u32, SerializeError> {
        ensure!(
            !name.is_empty(),
            InvariantSnafu {
                reason: "non-root node without a name",
            }
        );
        let offset = self.names.len() as u64;
        ensure!(
            offset <= u64::from(MAX_NAME_OFFSET),
            OverflowSnafu {
                what: "name table offset",
                value: offset,
            }
        );
        self.names.extend_from_slice(name.as_bytes());
        self.names.push(0);
        Ok(offset as u32)
    }

    /// Reserves the next aligned slot for a payload and returns its offset and length.
    fn place_file(&mut self, file: &FileNode) -> Result<(u32, u32), SerializeError> {
        let address = align_up(self.next_file_address, self.alignment);
        let offset = u32::try_from(address).ok().context(OverflowSnafu {
            what: format!("offset of '{}'", file.name()),
            value: address,
        })?;
        let length = u32::try_from(file.data().len())
            .ok()
            .context(OverflowSnafu {
                what: format!("length of '{}'", file.name()),
                value: file.data().len() as u64,
            })?;
        self.next_file_address = address + u64::from(length);
        Ok((offset, length))
    }
}

impl FileSystem {
    /// Writes the table at the writer's current position, followed by every payload.
    ///
    /// Children are sorted into canonical order first, and every node's name
    /// offset, indices and file extent are updated to what was written. The
    /// cached [`FileSystem::raw`] bytes are left untouched.
    ///
    /// Every file must hold its whole payload: a table parsed with
    /// [`FileSystem::deserialize`] needs [`FileSystem::read_all_files`] first.
    pub fn serialize<W: Write + Seek>(&mut self, writer: &mut W) -> Result<(), SerializeError> {
        check_payloads(&self.root, "")?;
        let start = writer.stream_position().context(WriteSnafu {
            what: "stream position",
        })?;

        self.root.sort_recursive();

        let size = TableSize::measure(&self.root);
        let node_table_end = start + size.node_table_size();
        let table_end = node_table_end + size.name_table_size;

        let mut layout = Layout::new(table_end, self.alignment);
        layout.place_root(&mut self.root)?;
        verify_layout(&self.root, &layout, size)?;

        for record in &layout.records {
            record
                .write_to(writer)
                .context(WriteSnafu { what: "node table" })?;
        }
        writer
            .write_all(&layout.names)
            .context(WriteSnafu { what: "name table" })?;
        write_payloads(&self.root, writer)?;

        self.address_range = AddressRange::new(start, table_end);
        self.node_table_range = AddressRange::new(start, node_table_end);
        self.name_table_range = AddressRange::new(node_table_end, table_end);

        debug!(
            "Wrote file system table: {} nodes, region {}, payloads end at {:#x}",
            size.node_count, self.address_range, layout.next_file_address
        );
        Ok(())
    }

    /// Serializes into a fresh buffer whose first byte is the table start.
    pub fn to_bytes(&mut self) -> Result<Vec<u8>, SerializeError> {
        let mut cursor = Cursor::new(Vec::new());
        self.serialize(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

/// Fails on the first file whose held bytes disagree with its recorded length.
fn check_payloads(directory: &DirectoryNode, prefix: &str) -> Result<(), SerializeError> {
    for child in directory.children() {
        let path = format!("{prefix}{}", child.name());
        match child {
            FileSystemNode::Directory(sub) => check_payloads(sub, &format!("{path}/"))?,
            FileSystemNode::File(file) => {
                ensure!(
                    file.data().len() as u64 == u64::from(file.length()),
                    PayloadNotLoadedSnafu {
                        path,
                        held: file.data().len(),
                        length: file.length(),
                    }
                );
            }
        }
    }
    Ok(())
}

/// Re-derives every directory's bound from the tree itself and compares it with the layout.
fn verify_layout(
    root: &DirectoryNode,
    layout: &Layout,
    size: TableSize,
) -> Result<(), SerializeError> {
    ensure!(
        layout.records.len() as u64 == size.node_count,
        InvariantSnafu {
            reason: format!(
                "flattened {} nodes, measured {}",
                layout.records.len(),
                size.node_count
            ),
        }
    );
    ensure!(
        layout.names.len() as u64 == size.name_table_size,
        InvariantSnafu {
            reason: format!(
                "built a {} byte name table, measured {}",
                layout.names.len(),
                size.name_table_size
            ),
        }
    );

    let mut next_index = 0u64;
    verify_directory(root, &layout.records, &mut next_index)
}

fn verify_directory(
    directory: &DirectoryNode,
    records: &[RawNode],
    next_index: &mut u64,
) -> Result<(), SerializeError> {
    let index = *next_index;
    let expected = index + 1 + directory.descendant_count() as u64;
    let recorded = records
        .get(index as usize)
        .map(|record| u64::from(record.second));
    ensure!(
        u64::from(directory.last_child_index()) == expected && recorded == Some(expected),
        InvariantSnafu {
            reason: format!(
                "directory '{}' at {index} ends at {} (record {:?}), expected {expected}",
                directory.name(),
                directory.last_child_index(),
                recorded
            ),
        }
    );

    *next_index += 1;
    for child in directory.children() {
        match child {
            FileSystemNode::Directory(sub) => verify_directory(sub, records, next_index)?,
            FileSystemNode::File(_) => *next_index += 1,
        }
    }
    Ok(())
}

fn write_payloads<W: Write + Seek>(
    directory: &DirectoryNode,
    writer: &mut W,
) -> Result<(), SerializeError> {
    for child in directory.children() {
        match child {
            FileSystemNode::Directory(sub) => write_payloads(sub, writer)?,
            FileSystemNode::File(file) => {
                writer
                    .pad_to(u64::from(file.offset()))
                    .context(WriteSnafu {
                        what: format!("padding before '{}'", file.name()),
                    })?;
                writer.write_all(file.data()).context(WriteSnafu {
                    what: format!("payload of '{}'", file.name()),
                })?;
            }
        }
    }
    Ok(())
}
