#![forbid(unsafe_code)]

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::archive::{self, ArchiveOptions};
use crate::compress::{self, Algorithm, CompressOptions};
use crate::error::Result;
use crate::sign::{self, SignOptions};

/// Options for the composite archive→compress(→sign) operation.
#[derive(Debug, Clone, Default)]
pub struct PackageOptions {
    pub algorithm: Algorithm,
    /// Sign the compressed package when present.
    pub sign: Option<SignOptions>,
}

/// Paths produced by [`package_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOutcome {
    /// Intermediate tar archive, left on disk for the caller to inspect and
    /// remove.
    pub archive_path: PathBuf,
    /// Final compressed package.
    pub package_path: PathBuf,
    /// Detached signature, present only when signing was requested.
    pub signature_path: Option<PathBuf>,
}

/// Archives `src_dir` to `<out>.tar`, compresses the archive to `out`, and
/// optionally signs the package to `<out>.sig`.
///
/// The intermediate archive survives a successful run so callers can report
/// its size before removing it; on failure it is cleaned up here.
pub fn package_dir(src_dir: &Path, out: &Path, opts: &PackageOptions) -> Result<PackageOutcome> {
    let archive_path = append_extension(out, "tar");
    archive::archive_dir(src_dir, &archive_path, &ArchiveOptions::default())?;

    let signature_path = match compress_and_sign(&archive_path, out, opts) {
        Ok(signature_path) => signature_path,
        Err(err) => {
            let _ = fs::remove_file(&archive_path);
            return Err(err);
        }
    };
    info!(
        src = %src_dir.display(),
        package = %out.display(),
        algorithm = %opts.algorithm,
        signed = signature_path.is_some(),
        "packaged directory"
    );

    Ok(PackageOutcome {
        archive_path,
        package_path: out.to_path_buf(),
        signature_path,
    })
}

fn compress_and_sign(
    archive_path: &Path,
    out: &Path,
    opts: &PackageOptions,
) -> Result<Option<PathBuf>> {
    compress::compress_file(
        archive_path,
        out,
        &CompressOptions {
            algorithm: opts.algorithm,
            level: None,
        },
    )?;

    match &opts.sign {
        Some(sign_opts) => {
            let signature_path = append_extension(out, "sig");
            sign::sign_file(out, &signature_path, sign_opts)?;
            Ok(Some(signature_path))
        }
        None => Ok(None),
    }
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}
