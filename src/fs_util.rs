//! Ambient-authority file helpers built on `cap-std`.

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};

fn open_parent(path: &Utf8Path) -> Result<(Dir, &Utf8Path), String> {
    let (dir_path, file_path) = if path.is_absolute() {
        let parent = path
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path}"))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    Ok((dir, file_path))
}

/// Reads a UTF-8 file, returning `Ok(None)` when it does not exist.
pub(crate) fn read_optional(path: &Utf8Path) -> Result<Option<String>, String> {
    let (dir, file) = open_parent(path)?;
    match dir.read_to_string(file) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.to_string()),
    }
}

/// Reads a UTF-8 file.
pub(crate) fn read_to_string(path: &Utf8Path) -> Result<String, String> {
    read_optional(path)?.ok_or_else(|| format!("{path}: file not found"))
}

/// Replaces the contents of a file.
pub(crate) fn write(path: &Utf8Path, content: &str) -> Result<(), String> {
    let (dir, file) = open_parent(path)?;
    dir.write(file, content).map_err(|err| err.to_string())
}
