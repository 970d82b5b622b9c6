#![forbid(unsafe_code)]

pub mod archive;
pub mod compress;
pub mod error;
pub mod keys;
pub mod package;
pub mod sign;

pub use archive::{ArchiveOptions, archive_dir, extract_archive};
pub use compress::{Algorithm, CompressOptions, compress_file, decompress_file};
pub use error::PackError;
pub use keys::{derive_public_key, generate_keypair};
pub use package::{PackageOptions, PackageOutcome, package_dir};
pub use sign::{SignOptions, sign_file, verify_file};
