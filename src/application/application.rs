use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use colored::Colorize;
use snafu::prelude::*;
use tracing::{debug, info, warn};

use gcfst::config::{ManifestError, PackManifest};
use gcfst::ext::BinaryReadExt;
use gcfst::filesystem::{
    AddFilesError, DeserializeError, DirectoryNode, FileSystem, FileSystemNode,
    InvalidAlignmentError, SerializeError,
};

use crate::cli::{Cli, Command};

/// Disc header word holding the absolute offset of the file system table.
const DISC_HEADER_FST_OFFSET: u64 = 0x424;

pub struct Application;

impl Application {
    pub fn run(cli: Cli) -> Result<(), ApplicationError> {
        match cli.command {
            Command::List { image, fst_offset } => {
                let file_system = Self::open_table(&image, fst_offset, false)?;
                print_directory(file_system.root(), 0);
                println!(
                    "{} {} files, {} directories, table at {}",
                    "=".dimmed(),
                    file_system.files().len(),
                    file_system.directories().len(),
                    file_system.address_range()
                );
            }
            Command::Extract {
                image,
                output,
                fst_offset,
            } => {
                let file_system = Self::open_table(&image, fst_offset, true)?;
                extract_files(&file_system, &output)?;
            }
            Command::Pack { output, root } => pack(&root, &output)?,
        }
        Ok(())
    }

    fn open_table(
        image: &Path,
        fst_offset: Option<u64>,
        with_files: bool,
    ) -> Result<FileSystem, ApplicationError> {
        let file = File::open(image).context(ImageOpenSnafu {
            path: image.display().to_string(),
        })?;
        let mut reader = BufReader::new(file);

        let offset = match fst_offset {
            Some(offset) => offset,
            None => read_table_offset(&mut reader)?,
        };
        debug!("Reading file system table at {:#x}", offset);
        reader.jump_to(offset).context(HeaderSnafu)?;

        let file_system = if with_files {
            FileSystem::deserialize_with_files(&mut reader)
        } else {
            FileSystem::deserialize(&mut reader)
        };
        file_system.context(TableSnafu)
    }
}

fn read_table_offset<R: Read + Seek>(reader: &mut R) -> Result<u64, ApplicationError> {
    reader.jump_to(DISC_HEADER_FST_OFFSET).context(HeaderSnafu)?;
    let offset = reader.read_u32::<BigEndian>().context(HeaderSnafu)?;
    Ok(u64::from(offset))
}

fn print_directory(directory: &DirectoryNode, depth: usize) {
    for child in directory.children() {
        let indent = "  ".repeat(depth);
        match child {
            FileSystemNode::Directory(sub) => {
                println!("{indent}{}", format!("{}/", sub.name()).blue().bold());
                print_directory(sub, depth + 1);
            }
            FileSystemNode::File(file) => {
                println!(
                    "{indent}{} {}",
                    file.name(),
                    format!("{:#010x} +{}", file.offset(), file.length()).dimmed()
                );
            }
        }
    }
}

fn extract_files(file_system: &FileSystem, output: &Path) -> Result<(), ApplicationError> {
    for entry in file_system.file_entries() {
        if entry
            .path
            .split('/')
            .any(|segment| segment == "." || segment == "..")
        {
            warn!("Skipping {} as it would escape the output directory", entry.path);
            continue;
        }
        let destination = entry
            .path
            .split('/')
            .fold(output.to_path_buf(), |path, segment| path.join(segment));
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).context(OutputSnafu {
                path: parent.display().to_string(),
            })?;
        }
        std::fs::write(&destination, entry.file.data()).context(OutputSnafu {
            path: destination.display().to_string(),
        })?;
        println!("+ {} {}", "Extracted".green(), entry.path);
    }
    Ok(())
}

fn pack(project: &Path, output: &Path) -> Result<(), ApplicationError> {
    let manifest = PackManifest::read(project).context(LoadManifestSnafu)?;
    debug!("Loaded manifest: {:?}", manifest);

    let mut file_system = FileSystem::new()
        .with_alignment(manifest.alignment)
        .context(AlignmentSnafu)?;
    let sources = manifest.source_files().context(LoadManifestSnafu)?;
    let added = file_system
        .add_files(&sources, &manifest.root, manifest.overwrite)
        .context(CollectSnafu)?;

    let file = File::create(output).context(OutputSnafu {
        path: output.display().to_string(),
    })?;
    let mut writer = BufWriter::new(file);
    file_system.serialize(&mut writer).context(WriteTableSnafu)?;
    writer.flush().context(OutputSnafu {
        path: output.display().to_string(),
    })?;

    info!(
        "Packed {} files into {} ({} nodes)",
        added,
        output.display(),
        file_system.node_count()
    );
    Ok(())
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Failed to open disc image {}", path))]
    ImageOpenError {
        path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to locate the file system table in the disc header"))]
    HeaderError { source: std::io::Error },
    #[snafu(display("Failed to read the file system table"))]
    TableError { source: DeserializeError },
    #[snafu(display("Failed to load the pack manifest"))]
    LoadManifestError { source: ManifestError },
    #[snafu(display("Invalid file alignment in the pack manifest"))]
    AlignmentError { source: InvalidAlignmentError },
    #[snafu(display("Failed to collect the files to pack"))]
    CollectError { source: AddFilesError },
    #[snafu(display("Failed to write the file system table"))]
    WriteTableError { source: SerializeError },
    #[snafu(display("Failed to write {}", path))]
    OutputError {
        path: String,
        source: std::io::Error,
    },
}
