use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::SeqRemoteError;

/// Gzip `path` to `<path>.gz` unless it already ends in `.gz`.
///
/// Returns whether a compressed copy was created along with the path to
/// upload. The original file is left in place, and an existing `<path>.gz`
/// is never overwritten.
pub fn gzip_if_needed(path: &Path) -> Result<(bool, PathBuf), SeqRemoteError> {
    let already_gzipped = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.ends_with(".gz"))
        .unwrap_or(false);
    if already_gzipped {
        return Ok((false, path.to_path_buf()));
    }

    let mut target = path.as_os_str().to_owned();
    target.push(".gz");
    let target = PathBuf::from(target);

    let input = File::open(path)
        .map_err(|err| SeqRemoteError::Filesystem(format!("open {}: {err}", path.display())))?;
    let output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .map_err(|err| match err.kind() {
            io::ErrorKind::AlreadyExists => SeqRemoteError::Filesystem(format!(
                "{} already exists; move it aside or upload it directly",
                target.display()
            )),
            _ => SeqRemoteError::Filesystem(format!("create {}: {err}", target.display())),
        })?;
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    let written = io::copy(&mut BufReader::new(input), &mut encoder)
        .and_then(|_| encoder.finish())
        .and_then(|mut writer| writer.flush());
    if let Err(err) = written {
        let _ = fs::remove_file(&target);
        return Err(SeqRemoteError::Filesystem(format!(
            "compress {}: {err}",
            target.display()
        )));
    }
    Ok((true, target))
}

/// Temp file in the destination directory, so the final rename stays on one
/// filesystem. The directory must already exist.
pub fn temp_file_in(dir: &Path) -> Result<NamedTempFile, SeqRemoteError> {
    tempfile::Builder::new()
        .prefix(".seqremote")
        .tempfile_in(dir)
        .map_err(|err| SeqRemoteError::Filesystem(format!("{}: {err}", dir.display())))
}

pub fn persist(temp: NamedTempFile, dest: &Path) -> Result<(), SeqRemoteError> {
    temp.persist(dest)
        .map_err(|err| SeqRemoteError::Filesystem(format!("{}: {err}", dest.display())))?;
    Ok(())
}

pub fn write_json_atomic<T: Serialize>(dest: &Path, value: &T) -> Result<(), SeqRemoteError> {
    let dir = parent_dir(dest);
    let mut temp = temp_file_in(dir)?;
    let content = serde_json::to_vec_pretty(value)
        .map_err(|err| SeqRemoteError::Filesystem(err.to_string()))?;
    temp.write_all(&content)
        .and_then(|_| temp.write_all(b"\n"))
        .map_err(|err| SeqRemoteError::Filesystem(format!("{}: {err}", dest.display())))?;
    persist(temp, dest)
}

pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

pub fn remove_file(path: &Path) -> Result<(), SeqRemoteError> {
    fs::remove_file(path)
        .map_err(|err| SeqRemoteError::Filesystem(format!("remove {}: {err}", path.display())))
}
