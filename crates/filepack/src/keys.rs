#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use pkcs8::LineEnding;
use rand_core_06::OsRng;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{PackError, Result};

/// Generates an Ed25519 key pair, writing the private key as PKCS#8 PEM and
/// the public key as SPKI PEM. Returns the key id (truncated SHA-256
/// fingerprint of the public key bytes).
pub fn generate_keypair(private_out: &Path, public_out: &Path) -> Result<String> {
    let mut rng = OsRng;
    let signing_key = SigningKey::generate(&mut rng);

    let key_id = write_keypair(&signing_key, private_out, public_out)?;
    info!(key_id, private_key = %private_out.display(), public_key = %public_out.display(), "generated key pair");
    Ok(key_id)
}

/// Derives the public key from an existing PKCS#8 PEM private key and writes
/// it as SPKI PEM. Returns the key id.
pub fn derive_public_key(private_in: &Path, public_out: &Path) -> Result<String> {
    let pem = fs::read_to_string(private_in).map_err(|err| PackError::io(private_in, err))?;
    let signing_key = load_signing_key(&pem)?;

    let verifying_key = signing_key.verifying_key();
    let public_pem = verifying_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|err| PackError::Key(format!("failed to encode public key: {err}")))?;
    write_pem(public_out, public_pem.as_bytes())?;

    let key_id = derive_key_id(verifying_key.as_bytes());
    info!(key_id, public_key = %public_out.display(), "derived public key");
    Ok(key_id)
}

pub(crate) fn load_signing_key(pem: &str) -> Result<SigningKey> {
    SigningKey::from_pkcs8_pem(pem)
        .map_err(|err| PackError::Key(format!("failed to parse private key PEM: {err}")))
}

fn write_keypair(signing_key: &SigningKey, private_out: &Path, public_out: &Path) -> Result<String> {
    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|err| PackError::Key(format!("failed to encode private key: {err}")))?;
    write_pem(private_out, private_pem.as_bytes())?;

    let verifying_key = signing_key.verifying_key();
    let public_pem = verifying_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|err| PackError::Key(format!("failed to encode public key: {err}")))?;
    write_pem(public_out, public_pem.as_bytes())?;

    Ok(derive_key_id(verifying_key.as_bytes()))
}

fn write_pem(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| PackError::io(parent, err))?;
    }
    fs::write(path, contents).map_err(|err| PackError::io(path, err))
}

/// Truncated SHA-256 fingerprint: first 16 bytes, hex encoded.
pub(crate) fn derive_key_id(public_key_bytes: &[u8]) -> String {
    let digest = Sha256::digest(public_key_bytes);
    hex::encode(&digest[..16])
}
