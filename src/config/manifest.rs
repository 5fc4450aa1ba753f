use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::filesystem::DEFAULT_FILE_ALIGNMENT;

const MANIFEST_FILE_NAME: &str = "fst.yaml";

pub fn get_manifest_path(project: &Path) -> PathBuf {
    project.join(MANIFEST_FILE_NAME)
}

/// Describes how to pack a host directory into a file system table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackManifest {
    pub alignment: u32,
    pub overwrite: bool,
    /// Host directory whose prefix is stripped from every source path.
    pub root: PathBuf,
    /// Explicit source files. `None` packs everything under `root`.
    pub files: Option<Vec<PathBuf>>,
}

impl Default for PackManifest {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_FILE_ALIGNMENT,
            overwrite: false,
            root: PathBuf::from("."),
            files: None,
        }
    }
}

impl PackManifest {
    pub fn read(project: &Path) -> Result<Self, ManifestError> {
        Self::from_path(get_manifest_path(project))
    }

    /// Reads a manifest and resolves its relative paths against the manifest's directory.
    pub fn from_path(path: PathBuf) -> Result<Self, ManifestError> {
        debug!("Reading manifest: {}", path.display());
        let contents = std::fs::read_to_string(&path).context(ReadSnafu {
            file_path: path.display().to_string(),
        })?;
        let manifest = Self::try_from(contents.as_str())?;

        let base = path.parent().unwrap_or(Path::new("."));
        Ok(manifest.resolved_against(base))
    }

    fn resolved_against(self, base: &Path) -> Self {
        Self {
            root: base.join(&self.root),
            files: self
                .files
                .map(|files| files.iter().map(|file| base.join(file)).collect()),
            ..self
        }
    }

    /// The host files to pack, in a stable order.
    pub fn source_files(&self) -> Result<Vec<PathBuf>, ManifestError> {
        if let Some(files) = &self.files {
            return Ok(files.clone());
        }

        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;
        files.sort();
        debug!(
            "Found {} files under {}",
            files.len(),
            self.root.display()
        );
        Ok(files)
    }

    fn parse_alignment(top_level: &LinkedHashMap<Yaml, Yaml>) -> Result<u32, ManifestError> {
        match get_value(top_level, "alignment") {
            None => Ok(DEFAULT_FILE_ALIGNMENT),
            Some(Yaml::Value(Scalar::Integer(value))) => u32::try_from(*value)
                .ok()
                .filter(|alignment| *alignment > 0)
                .context(InvalidAlignmentSnafu {
                    value: value.to_string(),
                }),
            Some(other) => InvalidAlignmentSnafu {
                value: format!("{other:?}"),
            }
            .fail(),
        }
    }

    fn parse_files(
        top_level: &LinkedHashMap<Yaml, Yaml>,
    ) -> Result<Option<Vec<PathBuf>>, ManifestError> {
        let Some(files) = get_value(top_level, "files") else {
            return Ok(None);
        };
        let files = files
            .as_sequence()
            .ok_or(ManifestError::FilesNotSequence)?
            .iter()
            .filter_map(|item| {
                let file = item.as_str().map(PathBuf::from);
                if file.is_none() {
                    debug!("Skipping non-string file entry: {:?}", item);
                }
                file
            })
            .collect();
        Ok(Some(files))
    }
}

impl TryFrom<&str> for PackManifest {
    type Error = ManifestError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let contents_vec =
            Yaml::load_from_str(contents).map_err(|e| ManifestError::ParseError { source: e })?;
        let contents = contents_vec
            .first()
            .ok_or(ManifestError::MalformedManifest)?;
        let top_level = contents
            .as_mapping()
            .ok_or(ManifestError::TopLevelNotMap)?;

        let overwrite = match get_value(top_level, "overwrite") {
            None => false,
            Some(Yaml::Value(Scalar::Boolean(value))) => *value,
            Some(_) => return InvalidValueSnafu { key: "overwrite" }.fail(),
        };
        let root = match get_value(top_level, "root") {
            None => PathBuf::from("."),
            Some(value) => value
                .as_str()
                .map(PathBuf::from)
                .context(InvalidValueSnafu { key: "root" })?,
        };

        Ok(PackManifest {
            alignment: Self::parse_alignment(top_level)?,
            overwrite,
            root,
            files: Self::parse_files(top_level)?,
        })
    }
}

fn get_value<'a, 'input>(
    map: &'a LinkedHashMap<Yaml<'input>, Yaml<'input>>,
    key: &'static str,
) -> Option<&'a Yaml<'input>> {
    map.get(&Yaml::Value(Scalar::String(Cow::Borrowed(key))))
}

fn collect_files(directory: &Path, out: &mut Vec<PathBuf>) -> Result<(), ManifestError> {
    let entries = std::fs::read_dir(directory).context(WalkSnafu {
        path: directory.to_path_buf(),
    })?;
    for entry in entries {
        let path = entry
            .context(WalkSnafu {
                path: directory.to_path_buf(),
            })?
            .path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.file_name().is_some_and(|name| name != MANIFEST_FILE_NAME) {
            out.push(path);
        }
    }
    Ok(())
}

#[derive(Debug, Snafu)]
pub enum ManifestError {
    #[snafu(display("Failed to read the manifest: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to parse the manifest"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted manifest"))]
    MalformedManifest,
    #[snafu(display("Top level of the manifest should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Alignment must be a positive 32-bit integer, got {}", value))]
    InvalidAlignment { value: String },
    #[snafu(display("Manifest key '{}' has the wrong type", key))]
    InvalidValue { key: String },
    #[snafu(display("Files section should be a list"))]
    FilesNotSequence,
    #[snafu(display("Failed to list {}", path.display()))]
    WalkError {
        path: PathBuf,
        source: std::io::Error,
    },
}
