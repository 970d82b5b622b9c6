#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::pkcs8::DecodePublicKey;
use ed25519_dalek::{Signature, Signer as _, Verifier as _, VerifyingKey};
use tracing::debug;

use crate::error::{PackError, Result};
use crate::keys;

/// Options used when producing a detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOptions {
    /// Ed25519 private key in PKCS#8 PEM format.
    pub private_key: PathBuf,
}

/// Signs the file at `src`, writing a detached Ed25519 signature to
/// `sig_out` as URL-safe base64 text (no padding).
pub fn sign_file(src: &Path, sig_out: &Path, opts: &SignOptions) -> Result<()> {
    let payload = fs::read(src).map_err(|err| PackError::io(src, err))?;
    let pem =
        fs::read_to_string(&opts.private_key).map_err(|err| PackError::io(&opts.private_key, err))?;
    let signing_key = keys::load_signing_key(&pem)?;

    let signature = signing_key.sign(&payload);
    let encoded = URL_SAFE_NO_PAD.encode(signature.to_bytes());

    if let Some(parent) = sig_out.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| PackError::io(parent, err))?;
    }
    fs::write(sig_out, &encoded).map_err(|err| PackError::io(sig_out, err))?;

    debug!(src = %src.display(), sig = %sig_out.display(), "signed file");
    Ok(())
}

/// Verifies a detached signature against the file at `src`.
///
/// Returns `Ok(false)` for a well-formed signature that does not match;
/// unreadable files, bad keys, and malformed signature encodings are errors.
pub fn verify_file(src: &Path, sig: &Path, public_key: &Path) -> Result<bool> {
    let payload = fs::read(src).map_err(|err| PackError::io(src, err))?;
    let sig_text = fs::read_to_string(sig).map_err(|err| PackError::io(sig, err))?;
    let pem = fs::read_to_string(public_key).map_err(|err| PackError::io(public_key, err))?;

    let verifying_key = VerifyingKey::from_public_key_pem(&pem)
        .map_err(|err| PackError::Key(format!("failed to parse public key PEM: {err}")))?;

    let raw = URL_SAFE_NO_PAD.decode(sig_text.trim().as_bytes())?;
    if raw.len() != Signature::BYTE_SIZE {
        return Err(PackError::SignatureLength(raw.len()));
    }
    let signature =
        Signature::from_slice(&raw).map_err(|_| PackError::SignatureLength(raw.len()))?;

    Ok(verifying_key.verify(&payload, &signature).is_ok())
}
