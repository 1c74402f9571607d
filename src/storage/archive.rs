//! Compressed tarballs of a file or directory tree
//!
//! Every entry in a bundle sits below a single root named after the packed
//! file or directory. The tar stream is compressed with zstd.

use crate::storage::{StorageError, StorageResult};
use std::fs;
use std::path::{Component, Path, PathBuf};

const COMPRESSION_LEVEL: i32 = 3;

/// Packs `source` (a file or a directory tree) into a compressed bundle
pub fn pack(source: &Path) -> StorageResult<Vec<u8>> {
    let root = source.file_name().ok_or_else(|| {
        StorageError::InvalidArchive(format!("{} has no usable name", source.display()))
    })?;

    let encoder = zstd::Encoder::new(Vec::new(), COMPRESSION_LEVEL)?;
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    if source.is_dir() {
        builder.append_dir_all(root, source)?;
    } else {
        builder.append_path_with_name(source, root)?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Extracts a bundle below `dest_dir`, returning the extracted root path
pub fn unpack(payload: &[u8], dest_dir: &Path) -> StorageResult<PathBuf> {
    fs::create_dir_all(dest_dir)?;

    let decoder = zstd::Decoder::new(payload)?;
    let mut archive = tar::Archive::new(decoder);

    let mut root: Option<PathBuf> = None;
    for entry in archive.entries().map_err(invalid)? {
        let mut entry = entry.map_err(invalid)?;
        let path = entry.path().map_err(invalid)?.into_owned();

        let first = match path.components().next() {
            Some(Component::Normal(name)) => PathBuf::from(name),
            _ => {
                return Err(StorageError::InvalidArchive(format!(
                    "unsafe entry path {}",
                    path.display()
                )))
            }
        };
        match &root {
            Some(root) if *root != first => {
                return Err(StorageError::InvalidArchive(format!(
                    "entry {} outside of root {}",
                    path.display(),
                    root.display()
                )))
            }
            Some(_) => {}
            None => root = Some(first),
        }

        if !entry.unpack_in(dest_dir).map_err(invalid)? {
            return Err(StorageError::InvalidArchive(format!(
                "unsafe entry path {}",
                path.display()
            )));
        }
    }

    root.map(|root| dest_dir.join(root))
        .ok_or_else(|| StorageError::InvalidArchive("empty bundle".to_string()))
}

fn invalid(e: std::io::Error) -> StorageError {
    StorageError::InvalidArchive(e.to_string())
}
