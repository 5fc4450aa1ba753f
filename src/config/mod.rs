mod manifest;

pub use manifest::{ManifestError, PackManifest, get_manifest_path};
