use std::io::{Read, Seek};

use snafu::{ResultExt, ensure};
use tracing::{debug, warn};

use crate::ext::BinaryReadExt;
use crate::filesystem::address_range::AddressRange;
use crate::filesystem::error::{DeserializeError, FormatSnafu, ReadSnafu};
use crate::filesystem::file_system::FileSystem;
use crate::filesystem::node::{DirectoryNode, FileSystemNode, NodeKind};
use crate::filesystem::raw_node::{NODE_RECORD_SIZE, RawNode};

/// A directory whose subtree is still receiving children during reconstruction.
struct OpenDirectory {
    index: u32,
    directory: DirectoryNode,
}

impl FileSystem {
    /// Parses a table starting at the reader's current position.
    ///
    /// Only the tree is built; file payloads stay empty until
    /// [`FileSystem::read_all_files`] runs. On success the reader sits at
    /// the end of the name table.
    pub fn deserialize<R: Read + Seek>(reader: &mut R) -> Result<Self, DeserializeError> {
        let start = reader.address().context(ReadSnafu {
            what: "stream position",
            address: 0u64,
        })?;

        let node_count = read_node_count(reader, start)?;
        reader.jump_to(start).context(ReadSnafu {
            what: "table start",
            address: start,
        })?;
        let records = read_records(reader, start, node_count)?;

        let node_table_end = start + u64::from(node_count) * NODE_RECORD_SIZE;
        let (root, name_table_end) = build_tree(reader, &records, node_table_end)?;

        let address_range = AddressRange::new(start, name_table_end);
        reader.jump_to(start).context(ReadSnafu {
            what: "table start",
            address: start,
        })?;
        let raw = reader
            .read_bytes(address_range.size() as usize)
            .context(ReadSnafu {
                what: "raw table",
                address: start,
            })?;

        debug!(
            "Parsed file system table: {} nodes, region {}",
            node_count, address_range
        );

        Ok(FileSystem {
            root,
            raw,
            address_range,
            node_table_range: AddressRange::new(start, node_table_end),
            name_table_range: AddressRange::new(node_table_end, name_table_end),
            ..FileSystem::default()
        })
    }

    /// Reads the payload of every file from the offsets recorded in the table.
    ///
    /// Each file seeks the shared reader, so this must not run concurrently with
    /// other users of the same stream.
    pub fn read_all_files<R: Read + Seek>(&mut self, reader: &mut R) -> Result<(), DeserializeError> {
        read_directory_files(&mut self.root, reader)
    }

    /// Parses the table and then reads every file payload.
    pub fn deserialize_with_files<R: Read + Seek>(
        reader: &mut R,
    ) -> Result<Self, DeserializeError> {
        let mut file_system = Self::deserialize(reader)?;
        file_system.read_all_files(reader)?;
        Ok(file_system)
    }
}

/// Reads only the root record and returns the node count it announces.
fn read_node_count<R: Read + Seek>(reader: &mut R, start: u64) -> Result<u32, DeserializeError> {
    let root = RawNode::read_from(reader).context(ReadSnafu {
        what: "root record",
        address: start,
    })?;

    ensure!(
        root.kind() == Some(NodeKind::Directory),
        FormatSnafu {
            reason: format!("root record has tag {} instead of a directory", root.tag),
        }
    );
    ensure!(
        root.second > 0,
        FormatSnafu {
            reason: "root announces zero nodes",
        }
    );
    Ok(root.second)
}

fn read_records<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    node_count: u32,
) -> Result<Vec<RawNode>, DeserializeError> {
    (0..u64::from(node_count))
        .map(|index| {
            RawNode::read_from(reader).context(ReadSnafu {
                what: format!("node record {index}"),
                address: start + index * NODE_RECORD_SIZE,
            })
        })
        .collect()
}

/// Rebuilds the nested tree from the flat records, resolving names along the way.
///
/// Returns the root and the highest address reached in the name table.
fn build_tree<R: Read + Seek>(
    reader: &mut R,
    records: &[RawNode],
    name_table_start: u64,
) -> Result<(DirectoryNode, u64), DeserializeError> {
    let node_count = records.len() as u32;
    let root_record = records[0];
    let mut stack = vec![OpenDirectory {
        index: 0,
        directory: DirectoryNode::with_indices(root_record.name_offset, 0, node_count),
    }];
    let mut name_table_end = name_table_start;

    for (index, raw) in records.iter().enumerate().skip(1) {
        let index = index as u32;
        close_finished_directories(&mut stack, index);

        let mut node = FileSystemNode::try_from(*raw).map_err(|unknown| {
            FormatSnafu {
                reason: format!("node {index} has unknown tag {}", unknown.0),
            }
            .build()
        })?;

        let name_address = name_table_start + u64::from(raw.name_offset);
        let name = read_name(reader, name_address, index)?;
        name_table_end = name_table_end.max(reader.address().context(ReadSnafu {
            what: "stream position",
            address: name_address,
        })?);
        node.set_name(name);

        match node {
            FileSystemNode::Directory(directory) => {
                let enclosing_end = stack
                    .last()
                    .map(|open| open.directory.last_child_index())
                    .unwrap_or(node_count);
                ensure!(
                    directory.last_child_index() >= index
                        && directory.last_child_index() <= enclosing_end,
                    FormatSnafu {
                        reason: format!(
                            "directory {index} ends at {} outside [{index}, {enclosing_end}]",
                            directory.last_child_index()
                        ),
                    }
                );
                stack.push(OpenDirectory { index, directory });
            }
            file @ FileSystemNode::File(_) => {
                if let Some(open) = stack.last_mut() {
                    open.directory.push_child(file);
                }
            }
        }
    }

    close_finished_directories(&mut stack, node_count);
    let root = stack
        .pop()
        .map(|open| open.directory)
        .unwrap_or_else(DirectoryNode::root);
    Ok((root, name_table_end))
}

/// Pops every open directory whose subtree ends at or before `index` and attaches
/// it to its enclosing directory. The root is never popped.
fn close_finished_directories(stack: &mut Vec<OpenDirectory>, index: u32) {
    while stack.len() > 1 {
        let Some(top) = stack.last() else { break };
        if index < top.directory.last_child_index() {
            break;
        }
        if let Some(closed) = stack.pop() {
            debug!(
                "Closing directory '{}' (node {})",
                closed.directory.name(),
                closed.index
            );
            if let Some(parent) = stack.last_mut() {
                parent.directory.push_child(closed.directory);
            }
        }
    }
}

fn read_name<R: Read + Seek>(
    reader: &mut R,
    address: u64,
    index: u32,
) -> Result<String, DeserializeError> {
    reader.jump_to(address).context(ReadSnafu {
        what: format!("name of node {index}"),
        address,
    })?;
    let bytes = reader.read_c_string().context(ReadSnafu {
        what: format!("name of node {index}"),
        address,
    })?;
    ensure!(
        !bytes.is_empty(),
        FormatSnafu {
            reason: format!("node {index} has an empty name"),
        }
    );

    match String::from_utf8(bytes) {
        Ok(name) => Ok(name),
        Err(err) => {
            let name = String::from_utf8_lossy(err.as_bytes()).into_owned();
            warn!("Name of node {} is not valid UTF-8, using '{}'", index, name);
            Ok(name)
        }
    }
}

fn read_directory_files<R: Read + Seek>(
    directory: &mut DirectoryNode,
    reader: &mut R,
) -> Result<(), DeserializeError> {
    for child in directory.children_mut() {
        match child {
            FileSystemNode::Directory(sub) => read_directory_files(sub, reader)?,
            FileSystemNode::File(file) => {
                let address = u64::from(file.offset());
                let what = format!("payload of '{}'", file.name());
                reader
                    .jump_to(address)
                    .context(ReadSnafu { what: &what, address })?;
                let data = reader
                    .read_bytes(file.length() as usize)
                    .context(ReadSnafu { what, address })?;
                file.set_data(data);
            }
        }
    }
    Ok(())
}
