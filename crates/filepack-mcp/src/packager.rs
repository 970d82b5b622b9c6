#![forbid(unsafe_code)]

use std::path::Path;

use filepack::{
    Algorithm, ArchiveOptions, CompressOptions, PackError, PackageOptions, PackageOutcome,
    SignOptions,
};

/// Narrow capability surface over the packaging library.
///
/// The orchestrator only ever talks to this trait, so its staging and
/// formatting logic can be exercised against a fake without running real
/// compression or crypto.
pub trait Packager: Send + Sync {
    fn archive_dir(&self, src: &Path, out: &Path, opts: &ArchiveOptions) -> Result<(), PackError>;

    fn compress_file(&self, src: &Path, out: &Path, opts: &CompressOptions)
    -> Result<(), PackError>;

    fn decompress_file(
        &self,
        src: &Path,
        out: &Path,
        algorithm: Option<Algorithm>,
    ) -> Result<(), PackError>;

    fn extract_archive(&self, archive: &Path, out_dir: &Path) -> Result<(), PackError>;

    fn sign_file(&self, src: &Path, sig_out: &Path, opts: &SignOptions) -> Result<(), PackError>;

    /// `Ok(false)` means a well-formed signature that does not match.
    fn verify_file(&self, src: &Path, sig: &Path, public_key: &Path) -> Result<bool, PackError>;

    /// Returns the generated key id.
    fn generate_keypair(&self, private_out: &Path, public_out: &Path) -> Result<String, PackError>;

    /// Returns the derived key id.
    fn derive_public_key(&self, private_in: &Path, public_out: &Path)
    -> Result<String, PackError>;

    fn package_dir(
        &self,
        src: &Path,
        out: &Path,
        opts: &PackageOptions,
    ) -> Result<PackageOutcome, PackError>;
}

/// Production [`Packager`] backed by the `filepack` library.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibPackager;

impl LibPackager {
    pub fn new() -> Self {
        Self
    }
}

impl Packager for LibPackager {
    fn archive_dir(&self, src: &Path, out: &Path, opts: &ArchiveOptions) -> Result<(), PackError> {
        filepack::archive_dir(src, out, opts)
    }

    fn compress_file(
        &self,
        src: &Path,
        out: &Path,
        opts: &CompressOptions,
    ) -> Result<(), PackError> {
        filepack::compress_file(src, out, opts)
    }

    fn decompress_file(
        &self,
        src: &Path,
        out: &Path,
        algorithm: Option<Algorithm>,
    ) -> Result<(), PackError> {
        filepack::decompress_file(src, out, algorithm)
    }

    fn extract_archive(&self, archive: &Path, out_dir: &Path) -> Result<(), PackError> {
        filepack::extract_archive(archive, out_dir)
    }

    fn sign_file(&self, src: &Path, sig_out: &Path, opts: &SignOptions) -> Result<(), PackError> {
        filepack::sign_file(src, sig_out, opts)
    }

    fn verify_file(&self, src: &Path, sig: &Path, public_key: &Path) -> Result<bool, PackError> {
        filepack::verify_file(src, sig, public_key)
    }

    fn generate_keypair(&self, private_out: &Path, public_out: &Path) -> Result<String, PackError> {
        filepack::generate_keypair(private_out, public_out)
    }

    fn derive_public_key(
        &self,
        private_in: &Path,
        public_out: &Path,
    ) -> Result<String, PackError> {
        filepack::derive_public_key(private_in, public_out)
    }

    fn package_dir(
        &self,
        src: &Path,
        out: &Path,
        opts: &PackageOptions,
    ) -> Result<PackageOutcome, PackError> {
        filepack::package_dir(src, out, opts)
    }
}
