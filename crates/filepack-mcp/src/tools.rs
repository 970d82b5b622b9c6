#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use filepack::{Algorithm, ArchiveOptions, CompressOptions, PackError, PackageOptions, SignOptions};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;

use crate::packager::Packager;
use crate::staging::{StagedArtifact, staged_path};

/// Parameters for the `archive` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ArchiveParams {
    /// Directory to archive
    pub source: PathBuf,
    /// Output archive path
    pub output: PathBuf,
    /// Comma-separated glob patterns a file must match to be included
    #[serde(default)]
    pub include: Option<String>,
    /// Comma-separated glob patterns that exclude files
    #[serde(default)]
    pub exclude: Option<String>,
}

/// Parameters for the `compress` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CompressParams {
    /// File (or directory, with `archive`) to compress
    pub source: PathBuf,
    /// Output path
    pub output: PathBuf,
    /// Compression algorithm (default gzip)
    #[serde(default)]
    pub algorithm: Option<Algorithm>,
    /// Compression level, 1-9
    #[serde(default)]
    pub level: Option<u32>,
    /// Archive a source directory before compressing it
    #[serde(default)]
    pub archive: bool,
    /// Comma-separated include globs for the archive step
    #[serde(default)]
    pub include: Option<String>,
    /// Comma-separated exclude globs for the archive step
    #[serde(default)]
    pub exclude: Option<String>,
}

/// Parameters for the `decompress` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DecompressParams {
    /// Compressed input file
    pub source: PathBuf,
    /// Output path
    pub output: PathBuf,
    /// Compression algorithm; auto-detected when absent
    #[serde(default)]
    pub algorithm: Option<Algorithm>,
    /// Extract the decompressed payload as an archive into `output`
    #[serde(default)]
    pub unarchive: bool,
}

/// Parameters for the `sign` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SignParams {
    /// File to sign
    pub source: PathBuf,
    /// Output signature path
    pub output: PathBuf,
    /// Ed25519 private key (PKCS#8 PEM)
    pub privkey: PathBuf,
}

/// Parameters for the `verify` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct VerifyParams {
    /// File the signature covers
    pub file: PathBuf,
    /// Detached signature path
    pub signature: PathBuf,
    /// Ed25519 public key (SPKI PEM)
    pub pubkey: PathBuf,
}

/// Parameters for the `generate-keys` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerateKeysParams {
    /// Output path for the private key
    #[serde(rename = "privateKeyPath")]
    pub private_key_path: PathBuf,
    /// Output path for the public key
    #[serde(rename = "publicKeyPath")]
    pub public_key_path: PathBuf,
}

/// Parameters for the `derive-public-key` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeriveKeyParams {
    /// Existing private key (PKCS#8 PEM)
    #[serde(rename = "privateKeyPath")]
    pub private_key_path: PathBuf,
    /// Output path for the derived public key
    #[serde(rename = "publicKeyPath")]
    pub public_key_path: PathBuf,
}

/// Parameters for the `package` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PackageParams {
    /// Directory to package
    pub source: PathBuf,
    /// Output package path
    pub output: PathBuf,
    /// Compression algorithm (default gzip)
    #[serde(default)]
    pub algorithm: Option<Algorithm>,
    /// Sign the package with this private key when present
    #[serde(default)]
    pub privkey: Option<PathBuf>,
}

/// Parameters for the `unarchive` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UnarchiveParams {
    /// Archive file to extract
    #[serde(rename = "archiveFile")]
    pub archive_file: PathBuf,
    /// Directory to extract into
    #[serde(rename = "outputDirectory")]
    pub output_directory: PathBuf,
}

/// Outcome of one tool invocation: a human-readable message plus a failure
/// flag. Failures never escape the orchestrator as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResponse {
    pub text: String,
    pub is_error: bool,
}

impl ToolResponse {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_error: true,
        }
    }
}

/// Validates parameters, stages intermediate artifacts, delegates to the
/// [`Packager`], and formats responses. Holds no state across invocations.
pub struct Orchestrator<P> {
    packager: P,
}

impl<P: Packager> Orchestrator<P> {
    pub fn new(packager: P) -> Self {
        Self { packager }
    }

    pub fn archive(&self, params: ArchiveParams) -> ToolResponse {
        respond(self.run_archive(&params))
    }

    pub fn compress(&self, params: CompressParams) -> ToolResponse {
        respond(self.run_compress(&params))
    }

    pub fn decompress(&self, params: DecompressParams) -> ToolResponse {
        respond(self.run_decompress(&params))
    }

    pub fn sign(&self, params: SignParams) -> ToolResponse {
        respond(self.run_sign(&params))
    }

    /// An invalid signature is a failure-flagged response, distinct from a
    /// verification that could not run at all.
    pub fn verify(&self, params: VerifyParams) -> ToolResponse {
        match self
            .packager
            .verify_file(&params.file, &params.signature, &params.pubkey)
        {
            Ok(true) => ToolResponse::ok(format!(
                "Signature is valid for {}",
                params.file.display()
            )),
            Ok(false) => ToolResponse::error(format!(
                "Signature is invalid for {}",
                params.file.display()
            )),
            Err(err) => {
                ToolResponse::error(format!("Verification failed: {}", error_text(&err.into())))
            }
        }
    }

    pub fn generate_keys(&self, params: GenerateKeysParams) -> ToolResponse {
        respond(self.run_generate_keys(&params))
    }

    pub fn derive_public_key(&self, params: DeriveKeyParams) -> ToolResponse {
        respond(self.run_derive_public_key(&params))
    }

    pub fn package(&self, params: PackageParams) -> ToolResponse {
        respond(self.run_package(&params))
    }

    pub fn unarchive(&self, params: UnarchiveParams) -> ToolResponse {
        respond(self.run_unarchive(&params))
    }

    fn run_archive(&self, params: &ArchiveParams) -> Result<String> {
        let opts = ArchiveOptions {
            include: params.include.as_deref().and_then(split_patterns),
            exclude: params.exclude.as_deref().and_then(split_patterns),
        };

        self.packager
            .archive_dir(&params.source, &params.output, &opts)?;
        let size = file_size(&params.output)?;

        info!(source = %params.source.display(), output = %params.output.display(), size, "archive complete");
        Ok(format!(
            "Archived {} to {} ({size} bytes)",
            params.source.display(),
            params.output.display()
        ))
    }

    fn run_compress(&self, params: &CompressParams) -> Result<String> {
        if let Some(level) = params.level
            && !(1..=9).contains(&level)
        {
            bail!("level must be between 1 and 9, got {level}");
        }

        let algorithm = params.algorithm.unwrap_or_default();
        let opts = CompressOptions {
            algorithm,
            level: params.level,
        };

        if params.archive && params.source.is_dir() {
            let staged = StagedArtifact::new(staged_path(&params.output, "archive.tmp"));
            let archive_opts = ArchiveOptions {
                include: params.include.as_deref().and_then(split_patterns),
                exclude: params.exclude.as_deref().and_then(split_patterns),
            };

            self.packager
                .archive_dir(&params.source, staged.path(), &archive_opts)?;
            self.packager
                .compress_file(staged.path(), &params.output, &opts)?;

            let source_size = file_size(staged.path())?;
            let output_size = file_size(&params.output)?;
            Ok(compress_report(
                &params.source,
                &params.output,
                algorithm,
                source_size,
                output_size,
            ))
        } else {
            self.packager
                .compress_file(&params.source, &params.output, &opts)?;

            let source_size = file_size(&params.source)?;
            let output_size = file_size(&params.output)?;
            Ok(compress_report(
                &params.source,
                &params.output,
                algorithm,
                source_size,
                output_size,
            ))
        }
    }

    fn run_decompress(&self, params: &DecompressParams) -> Result<String> {
        if !params.unarchive {
            self.packager
                .decompress_file(&params.source, &params.output, params.algorithm)?;
            let size = file_size(&params.output)?;
            return Ok(format!(
                "Decompressed {} to {} ({size} bytes)",
                params.source.display(),
                params.output.display()
            ));
        }

        let staged = StagedArtifact::new(staged_path(&params.output, "decompressed.tmp"));
        self.packager
            .decompress_file(&params.source, staged.path(), params.algorithm)?;

        if let Some(parent) = params.output.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        match self.packager.extract_archive(staged.path(), &params.output) {
            Ok(()) => Ok(format!(
                "Decompressed and extracted {} to {}",
                params.source.display(),
                params.output.display()
            )),
            Err(PackError::NotAnArchive { .. }) => {
                fs::copy(staged.path(), &params.output).with_context(|| {
                    format!("failed to copy raw output to {}", params.output.display())
                })?;
                Ok(format!(
                    "Warning: decompressed content is not an archive; wrote raw file to {}",
                    params.output.display()
                ))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn run_sign(&self, params: &SignParams) -> Result<String> {
        self.packager.sign_file(
            &params.source,
            &params.output,
            &SignOptions {
                private_key: params.privkey.clone(),
            },
        )?;
        Ok(format!(
            "Signed {}\n  signature: {}",
            params.source.display(),
            params.output.display()
        ))
    }

    fn run_generate_keys(&self, params: &GenerateKeysParams) -> Result<String> {
        let key_id = self
            .packager
            .generate_keypair(&params.private_key_path, &params.public_key_path)?;

        Ok(format!(
            "Generated Ed25519 key pair (key id {key_id})\n  private key: {}\n  public key: {}\nKeep the private key secret; never share or commit it.",
            params.private_key_path.display(),
            params.public_key_path.display()
        ))
    }

    fn run_derive_public_key(&self, params: &DeriveKeyParams) -> Result<String> {
        let key_id = self
            .packager
            .derive_public_key(&params.private_key_path, &params.public_key_path)?;

        Ok(format!(
            "Derived public key (key id {key_id})\n  public key: {}",
            params.public_key_path.display()
        ))
    }

    fn run_package(&self, params: &PackageParams) -> Result<String> {
        let opts = PackageOptions {
            algorithm: params.algorithm.unwrap_or_default(),
            sign: params
                .privkey
                .clone()
                .map(|private_key| SignOptions { private_key }),
        };

        let outcome = self
            .packager
            .package_dir(&params.source, &params.output, &opts)?;

        let archive_size = file_size(&outcome.archive_path)?;
        let package_size = file_size(&outcome.package_path)?;
        let ratio = reduction_ratio(archive_size, package_size);

        let mut report = format!(
            "Packaged {}\n  archive: {} ({archive_size} bytes)\n  package: {} ({package_size} bytes)",
            params.source.display(),
            outcome.archive_path.display(),
            outcome.package_path.display()
        );
        if let Some(signature) = &outcome.signature_path {
            report.push_str(&format!("\n  signature: {}", signature.display()));
        }
        report.push_str(&format!("\n  reduction: {ratio}%"));

        fs::remove_file(&outcome.archive_path).with_context(|| {
            format!(
                "failed to remove intermediate archive {}",
                outcome.archive_path.display()
            )
        })?;
        report.push_str(&format!(
            "\nRemoved intermediate archive {}",
            outcome.archive_path.display()
        ));

        Ok(report)
    }

    fn run_unarchive(&self, params: &UnarchiveParams) -> Result<String> {
        self.packager
            .extract_archive(&params.archive_file, &params.output_directory)?;
        Ok(format!(
            "Extracted {} to {}",
            params.archive_file.display(),
            params.output_directory.display()
        ))
    }
}

fn respond(result: Result<String>) -> ToolResponse {
    match result {
        Ok(text) => ToolResponse::ok(text),
        Err(err) => ToolResponse::error(error_text(&err)),
    }
}

/// Extracts a message from a failure, falling back to a fixed placeholder
/// for errors that render as empty text.
fn error_text(err: &anyhow::Error) -> String {
    let text = format!("{err:#}");
    if text.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        text
    }
}

fn compress_report(
    source: &Path,
    output: &Path,
    algorithm: Algorithm,
    source_size: u64,
    output_size: u64,
) -> String {
    let ratio = reduction_ratio(source_size, output_size);
    format!(
        "Compressed {} to {} with {algorithm} ({source_size} -> {output_size} bytes, {ratio}% reduction)",
        source.display(),
        output.display()
    )
}

/// Percentage size decrease, two decimals; `0.00` for an empty source.
fn reduction_ratio(source_size: u64, output_size: u64) -> String {
    if source_size == 0 {
        return "0.00".to_string();
    }
    let ratio = (source_size as f64 - output_size as f64) / source_size as f64 * 100.0;
    format!("{ratio:.2}")
}

/// Splits a comma-separated pattern list, dropping empty segments. Returns
/// `None` when nothing remains so collaborator defaults stay untouched.
fn split_patterns(raw: &str) -> Option<Vec<String>> {
    let patterns: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty())
        .map(String::from)
        .collect();
    (!patterns.is_empty()).then_some(patterns)
}

fn file_size(path: &Path) -> Result<u64> {
    let meta =
        fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    Ok(meta.len())
}
