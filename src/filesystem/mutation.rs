use std::path::Path;

use snafu::{OptionExt, ResultExt, ensure};
use tracing::{debug, info};

use crate::filesystem::error::{
    AddFileError, AddFilesError, ArgumentSnafu, DuplicateEntrySnafu, InsertSnafu, NotFoundSnafu,
    OutsideRootSnafu, SourceReadSnafu,
};
use crate::filesystem::file_system::FileSystem;
use crate::filesystem::node::{DirectoryNode, FileNode};

/// A table path split into the directories to walk and the final name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TablePath<'a> {
    directories: Vec<&'a str>,
    leaf: &'a str,
}

impl<'a> TablePath<'a> {
    /// Accepts `/` and `\` separators; repeated, leading and trailing separators are ignored.
    fn parse(path: &'a str) -> Result<Self, AddFileError> {
        ensure!(
            !path.trim().is_empty(),
            ArgumentSnafu {
                path,
                reason: "path is empty",
            }
        );
        ensure!(
            !path.contains('\0'),
            ArgumentSnafu {
                path,
                reason: "path contains a NUL byte",
            }
        );

        let mut directories = path
            .split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();
        ensure!(
            directories
                .iter()
                .all(|segment| *segment != "." && *segment != ".."),
            ArgumentSnafu {
                path,
                reason: "relative segments are not allowed",
            }
        );

        let leaf = directories.pop().context(ArgumentSnafu {
            path,
            reason: "path has no name",
        })?;
        Ok(Self { directories, leaf })
    }
}

impl FileSystem {
    /// Adds `data` as a file at `path`, creating missing directories.
    ///
    /// An existing node with the leaf name is replaced only when `overwrite` is
    /// set. A failed call leaves the tree exactly as it was.
    pub fn add_file(
        &mut self,
        path: &str,
        data: Vec<u8>,
        overwrite: bool,
    ) -> Result<(), AddFileError> {
        let table_path = TablePath::parse(path)?;
        let file = FileNode::new(table_path.leaf, data).context(ArgumentSnafu {
            path,
            reason: "payload does not fit a 32-bit length",
        })?;
        check_insertion(&self.root, &table_path, path, overwrite)?;

        let mut directory = &mut self.root;
        for segment in &table_path.directories {
            directory = directory.child_directory_or_insert(segment);
        }

        match directory.child_position(table_path.leaf) {
            Some(index) => {
                debug!("Replacing existing entry at '{}'", path);
                directory.children_mut()[index] = file.into();
            }
            None => directory.push_child(file),
        }
        self.root.renumber(0, 0);
        Ok(())
    }

    /// Adds every host file in `paths` under its path relative to `root`.
    ///
    /// Stops at the first failure. Files added before the failure stay in the tree.
    pub fn add_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        root: &Path,
        overwrite: bool,
    ) -> Result<usize, AddFilesError> {
        for source in paths {
            let source = source.as_ref();
            ensure!(source.is_file(), NotFoundSnafu { path: source });

            let relative = source
                .strip_prefix(root)
                .ok()
                .context(OutsideRootSnafu { path: source, root })?;
            let table_path = table_path_of(relative);
            let data = std::fs::read(source).context(SourceReadSnafu { path: source })?;

            info!("+ Adding {} ({} bytes)", table_path, data.len());
            self.add_file(&table_path, data, overwrite)
                .context(InsertSnafu { path: source })?;
        }
        Ok(paths.len())
    }

    /// Removes the node at `path`. Returns `false` when nothing is there.
    pub fn remove_node(&mut self, path: &str) -> bool {
        let Ok(table_path) = TablePath::parse(path) else {
            return false;
        };

        let mut directory = &mut self.root;
        for segment in &table_path.directories {
            directory = match directory.get_child_directory_node_mut(segment) {
                Some(child) => child,
                None => return false,
            };
        }

        match directory.child_position(table_path.leaf) {
            Some(index) => {
                directory.children_mut().remove(index);
                debug!("Removed '{}'", path);
                self.root.renumber(0, 0);
                true
            }
            None => false,
        }
    }
}

/// Validates an insertion without touching the tree.
fn check_insertion(
    root: &DirectoryNode,
    table_path: &TablePath<'_>,
    path: &str,
    overwrite: bool,
) -> Result<(), AddFileError> {
    let mut directory = root;
    for (depth, segment) in table_path.directories.iter().enumerate() {
        match directory.get_child_directory_node(segment) {
            Some(child) => directory = child,
            None => {
                ensure!(
                    directory.child_position(segment).is_none(),
                    DuplicateEntrySnafu {
                        path: table_path.directories[..=depth].join("/"),
                    }
                );
                // Everything below is created fresh, so nothing can collide.
                return Ok(());
            }
        }
    }

    ensure!(
        overwrite || directory.child_position(table_path.leaf).is_none(),
        DuplicateEntrySnafu { path }
    );
    Ok(())
}

fn table_path_of(relative: &Path) -> String {
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
