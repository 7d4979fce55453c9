//! File I/O utilities with atomic writes
//!
//! Everything that lands on disk is written to a temporary sibling first and
//! renamed into place, so an interrupted write never leaves a partial file
//! under the final name.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::backup::naming::temp_name_for;
use crate::backup::FileCopier;
use crate::error::BackupError;

/// Whether an atomic write may replace an existing file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    Allow,
    Forbid,
}

/// Temporary sibling used while `dest` is being written
pub fn temp_path_for(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(temp_name_for(&name))
}

/// Copy `from` to `dest` through `copier`, atomically from the caller's view
///
/// Either `dest` ends up holding the full copy, or it is left exactly as it
/// was. The temporary file is removed on every failure path.
pub fn copy_atomic<C>(copier: &C, from: &Path, dest: &Path, overwrite: Overwrite) -> io::Result<u64>
where
    C: FileCopier + ?Sized,
{
    write_via_temp(dest, overwrite, |temp| copier.copy(from, temp))
}

/// Run `fill` against a temp path, then rename the result onto `dest`
fn write_via_temp<F>(dest: &Path, overwrite: Overwrite, fill: F) -> io::Result<u64>
where
    F: FnOnce(&Path) -> io::Result<u64>,
{
    let temp = temp_path_for(dest);

    // Leftover from an earlier crash
    if temp.exists() {
        let _ = fs::remove_file(&temp);
    }

    let written = match fill(&temp) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }
    };

    if let Err(e) = place(&temp, dest, overwrite) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    Ok(written)
}

/// Move a finished temp file onto `dest`
///
/// With `Overwrite::Forbid` the file is hard-linked into place, which fails
/// instead of replacing a file that appeared after the name was chosen.
fn place(temp: &Path, dest: &Path, overwrite: Overwrite) -> io::Result<()> {
    if overwrite == Overwrite::Allow {
        return fs::rename(temp, dest);
    }

    match fs::hard_link(temp, dest) {
        Ok(()) => {
            let _ = fs::remove_file(temp);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
        Err(_) if dest.exists() => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", dest.display()),
        )),
        // No hard link support on this filesystem
        Err(_) => fs::rename(temp, dest),
    }
}

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> Result<T, BackupError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if !path.exists() {
        return Ok(T::default());
    }

    let file = File::open(path)
        .map_err(|e| BackupError::Storage(format!("Failed to open {}: {}", path.display(), e)))?;

    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| BackupError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), BackupError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BackupError::Storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let json = serde_json::to_vec_pretty(data)?;

    write_via_temp(path, Overwrite::Allow, |temp| {
        let mut writer = BufWriter::new(File::create(temp)?);
        writer.write_all(&json)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(json.len() as u64)
    })
    .map_err(|e| BackupError::Storage(format!("Failed to write {}: {}", path.display(), e)))?;

    Ok(())
}
