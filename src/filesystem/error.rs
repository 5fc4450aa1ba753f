use std::path::PathBuf;

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DeserializeError {
    #[snafu(display("Malformed file system table: {reason}"))]
    FormatError { reason: String },
    #[snafu(display("Failed to read {what} at {address:#x}"))]
    ReadError {
        what: String,
        address: u64,
        source: std::io::Error,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SerializeError {
    #[snafu(display("Failed to write {what}"))]
    WriteError {
        what: String,
        source: std::io::Error,
    },
    #[snafu(display(
        "Payload of '{path}' holds {held} bytes but the table records {length}; was it read?"
    ))]
    PayloadNotLoadedError {
        path: String,
        held: usize,
        length: u32,
    },
    #[snafu(display("{what} {value:#x} does not fit its on-disk field"))]
    OverflowError { what: String, value: u64 },
    #[snafu(display("Internal layout defect: {reason}"))]
    InvariantError { reason: String },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AddFileError {
    #[snafu(display("Invalid path '{path}': {reason}"))]
    ArgumentError { path: String, reason: String },
    #[snafu(display("An entry already exists at '{path}'"))]
    DuplicateEntryError { path: String },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AddFilesError {
    #[snafu(display("Source file {} does not exist", path.display()))]
    NotFoundError { path: PathBuf },
    #[snafu(display("Failed to read source file {}", path.display()))]
    SourceReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Source file {} is not under {}", path.display(), root.display()))]
    OutsideRootError { path: PathBuf, root: PathBuf },
    #[snafu(display("Failed to add {}", path.display()))]
    InsertError { path: PathBuf, source: AddFileError },
}

#[derive(Debug, Snafu)]
#[snafu(display("File alignment must be greater than zero"), visibility(pub(crate)))]
pub struct InvalidAlignmentError;
