#![forbid(unsafe_code)]

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PackError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Supported compression codecs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    #[default]
    Gzip,
    Brotli,
    Deflate,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gzip => "gzip",
            Self::Brotli => "brotli",
            Self::Deflate => "deflate",
        })
    }
}

/// Options for a single compression pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressOptions {
    pub algorithm: Algorithm,
    /// Compression level in `1..=9`; the codec default when absent.
    pub level: Option<u32>,
}

/// Compresses the file at `src` into `out` using the configured codec.
pub fn compress_file(src: &Path, out: &Path, opts: &CompressOptions) -> Result<()> {
    let input = File::open(src).map_err(|err| PackError::io(src, err))?;
    let mut reader = BufReader::new(input);

    ensure_parent_dir(out)?;
    let output = File::create(out).map_err(|err| PackError::io(out, err))?;
    let mut writer = BufWriter::new(output);

    match opts.algorithm {
        Algorithm::Gzip => {
            let level = opts
                .level
                .map(Compression::new)
                .unwrap_or_else(Compression::default);
            let mut encoder = GzEncoder::new(writer, level);
            io::copy(&mut reader, &mut encoder).map_err(|err| PackError::io(out, err))?;
            writer = encoder.finish().map_err(|err| PackError::io(out, err))?;
        }
        Algorithm::Deflate => {
            let level = opts
                .level
                .map(Compression::new)
                .unwrap_or_else(Compression::default);
            let mut encoder = DeflateEncoder::new(writer, level);
            io::copy(&mut reader, &mut encoder).map_err(|err| PackError::io(out, err))?;
            writer = encoder.finish().map_err(|err| PackError::io(out, err))?;
        }
        Algorithm::Brotli => {
            let mut params = brotli::enc::BrotliEncoderParams::default();
            if let Some(level) = opts.level {
                params.quality = level as i32;
            }
            brotli::BrotliCompress(&mut reader, &mut writer, &params)
                .map_err(|err| PackError::io(out, err))?;
        }
    }

    writer.flush().map_err(|err| PackError::io(out, err))?;
    debug!(src = %src.display(), out = %out.display(), algorithm = %opts.algorithm, "compressed file");
    Ok(())
}

/// Decompresses `src` into `out`.
///
/// When `algorithm` is absent the codec is detected from the gzip magic bytes
/// first, then from the file extension (`.gz`, `.br`, `.deflate`/`.zz`).
pub fn decompress_file(src: &Path, out: &Path, algorithm: Option<Algorithm>) -> Result<()> {
    let algorithm = match algorithm {
        Some(algorithm) => algorithm,
        None => detect_algorithm(src)?,
    };

    let input = File::open(src).map_err(|err| PackError::io(src, err))?;
    let mut reader = BufReader::new(input);

    ensure_parent_dir(out)?;
    let output = File::create(out).map_err(|err| PackError::io(out, err))?;
    let mut writer = BufWriter::new(output);

    match algorithm {
        Algorithm::Gzip => {
            let mut decoder = GzDecoder::new(reader);
            io::copy(&mut decoder, &mut writer).map_err(|err| PackError::io(src, err))?;
        }
        Algorithm::Deflate => {
            let mut decoder = DeflateDecoder::new(reader);
            io::copy(&mut decoder, &mut writer).map_err(|err| PackError::io(src, err))?;
        }
        Algorithm::Brotli => {
            brotli::BrotliDecompress(&mut reader, &mut writer)
                .map_err(|err| PackError::io(src, err))?;
        }
    }

    writer.flush().map_err(|err| PackError::io(out, err))?;
    debug!(src = %src.display(), out = %out.display(), algorithm = %algorithm, "decompressed file");
    Ok(())
}

fn detect_algorithm(src: &Path) -> Result<Algorithm> {
    let mut file = File::open(src).map_err(|err| PackError::io(src, err))?;
    let mut magic = [0u8; 2];
    let read = file.read(&mut magic).map_err(|err| PackError::io(src, err))?;
    if read == magic.len() && magic == GZIP_MAGIC {
        return Ok(Algorithm::Gzip);
    }

    match src.extension().and_then(|ext| ext.to_str()) {
        Some("gz" | "gzip") => Ok(Algorithm::Gzip),
        Some("br") => Ok(Algorithm::Brotli),
        Some("deflate" | "zz") => Ok(Algorithm::Deflate),
        _ => Err(PackError::UnknownFormat {
            path: src.to_path_buf(),
        }),
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| PackError::io(parent, err))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names_are_lowercase() {
        assert_eq!(Algorithm::Gzip.to_string(), "gzip");
        assert_eq!(Algorithm::Brotli.to_string(), "brotli");
        assert_eq!(Algorithm::Deflate.to_string(), "deflate");
    }

    #[test]
    fn algorithm_deserializes_from_lowercase() {
        let parsed: Algorithm = serde_json::from_str("\"brotli\"").expect("parse");
        assert_eq!(parsed, Algorithm::Brotli);
        assert!(serde_json::from_str::<Algorithm>("\"zstd\"").is_err());
    }
}
