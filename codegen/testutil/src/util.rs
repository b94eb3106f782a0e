use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use osy_codegen::{Codegen, GenerateOptions};
use osy_core::Node;
use tempfile::{tempdir, TempDir};

/// Run the generator for `app` into a fresh temporary directory.
///
/// The directory lives as long as the returned [`TempDir`].
pub fn generate_into_tempdir(
    node: &Node,
    app: &str,
    opts: GenerateOptions,
) -> Result<(TempDir, Vec<PathBuf>)> {
    let dir = tempdir()?;
    let out = dir.path().join("generated");

    let files = Codegen::new(node, app, opts)?.generate(&out)?;
    Ok((dir, files))
}

/// File names of `paths`, in order.
pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect()
}

/// Every file of `dir` by name.
pub fn read_dir_files(dir: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut out = BTreeMap::new();

    for entry in std::fs::read_dir(dir).context(format!("Failed to list {}", dir.display()))? {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.insert(name, std::fs::read(&path)?);
    }

    Ok(out)
}

/// Text of the generated file named `name` among `paths`.
pub fn read_generated(paths: &[PathBuf], name: &str) -> Result<String> {
    let path = paths
        .iter()
        .find(|p| p.file_name().is_some_and(|n| n == name))
        .context(format!("`{name}` was not generated"))?;

    std::fs::read_to_string(path).context(format!("Failed to read {}", path.display()))
}
