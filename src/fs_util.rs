use std::fs::{self, File};

use camino::Utf8Path;

use crate::error::SearchError;

pub fn ensure_dir(path: &Utf8Path) -> Result<(), SearchError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| SearchError::Filesystem(format!("create dir {path}: {err}")))
}

/// Writes `dest` through a temporary file in the same directory.
///
/// `dest` only ever holds a complete artifact: if `write` fails the temporary
/// file is dropped and the previous content, if any, stays in place.
pub fn write_atomic<F>(dest: &Utf8Path, write: F) -> Result<(), SearchError>
where
    F: FnOnce(&mut File) -> Result<(), SearchError>,
{
    let parent = match dest.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    ensure_dir(parent)?;
    let mut temp = tempfile::Builder::new()
        .prefix(".vdjdb-search")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| SearchError::Filesystem(err.to_string()))?;
    write(temp.as_file_mut())?;
    temp.as_file()
        .sync_all()
        .map_err(|err| SearchError::Filesystem(err.to_string()))?;
    temp.persist(dest.as_std_path())
        .map_err(|err| SearchError::Filesystem(format!("persist {dest}: {err}")))?;
    Ok(())
}
