#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{PackError, Result};

/// Filters applied when archiving a directory tree.
///
/// When `include` is present a file must match at least one of its patterns
/// to be picked up; `exclude` removes files from the selection and wins over
/// `include`. Patterns match against slash-separated paths relative to the
/// archived directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

/// Packs the contents of `src_dir` into an uncompressed tar archive at `out`.
///
/// Entries are stored with paths relative to `src_dir`, sorted by file name so
/// the archive bytes are deterministic for an unchanged tree.
pub fn archive_dir(src_dir: &Path, out: &Path, opts: &ArchiveOptions) -> Result<()> {
    let meta = fs::metadata(src_dir).map_err(|err| PackError::io(src_dir, err))?;
    if !meta.is_dir() {
        return Err(PackError::NotADirectory {
            path: src_dir.to_path_buf(),
        });
    }

    let include = opts.include.as_deref().map(build_glob_set).transpose()?;
    let exclude = opts.exclude.as_deref().map(build_glob_set).transpose()?;

    if let Some(parent) = out.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| PackError::io(parent, err))?;
    }

    let file = File::create(out).map_err(|err| PackError::io(out, err))?;
    let mut builder = tar::Builder::new(file);

    let mut count = 0usize;
    for entry in WalkDir::new(src_dir).follow_links(false).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(src_dir) else {
            continue;
        };

        if let Some(set) = &include
            && !set.is_match(rel)
        {
            continue;
        }
        if let Some(set) = &exclude
            && set.is_match(rel)
        {
            continue;
        }

        builder
            .append_path_with_name(entry.path(), rel)
            .map_err(|err| PackError::io(entry.path(), err))?;
        count += 1;
    }

    builder.finish().map_err(|err| PackError::io(out, err))?;
    debug!(count, out = %out.display(), "archived directory");
    Ok(())
}

/// Unpacks the tar archive at `archive` into `out_dir`, creating the
/// directory if needed.
///
/// A payload that does not parse as a tar stream is reported as
/// [`PackError::NotAnArchive`]; failures past that point (I/O while
/// unpacking) keep their underlying error.
pub fn extract_archive(archive: &Path, out_dir: &Path) -> Result<()> {
    if !is_tar_stream(archive)? {
        return Err(PackError::NotAnArchive {
            path: archive.to_path_buf(),
        });
    }

    fs::create_dir_all(out_dir).map_err(|err| PackError::io(out_dir, err))?;

    let file = File::open(archive).map_err(|err| PackError::io(archive, err))?;
    tar::Archive::new(file)
        .unpack(out_dir)
        .map_err(|err| PackError::io(archive, err))?;

    debug!(archive = %archive.display(), out_dir = %out_dir.display(), "extracted archive");
    Ok(())
}

/// Checks whether the first entry header parses as tar. An empty stream is
/// treated as a valid (empty) archive.
fn is_tar_stream(path: &Path) -> Result<bool> {
    let file = File::open(path).map_err(|err| PackError::io(path, err))?;
    let mut archive = tar::Archive::new(file);
    let mut entries = archive.entries().map_err(|err| PackError::io(path, err))?;

    Ok(match entries.next() {
        Some(Ok(_)) | None => true,
        Some(Err(_)) => false,
    })
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
