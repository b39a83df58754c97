// SPDX-License-Identifier: MIT OR Apache-2.0
//! Identifier and token minting primitives.
//!
//! This crate is deliberately tiny and side-effect free: it holds no
//! persistence and no shared state, and every function is pure given its
//! entropy source. Callers (the orchestrator, the token repository) decide
//! what to do with the values produced here.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as B64_STANDARD, URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Minimum number of entropy bytes a minted secret token must draw from
/// its cryptographic source.
pub const MIN_SECRET_TOKEN_BYTES: usize = 24;

/// Hash an API key's plaintext with SHA-256, returning standard (padded)
/// base64 — 44 characters for a 32-byte digest.
///
/// Deterministic: the same plaintext always hashes to the same string.
#[must_use]
pub fn hash_api_key(plaintext: &str) -> String {
    let digest = Sha256::digest(plaintext.as_bytes());
    B64_STANDARD.encode(digest)
}

/// Draw `byte_size` bytes (at least [`MIN_SECRET_TOKEN_BYTES`]) from the
/// system's cryptographic RNG and encode them as URL-safe base64 without
/// padding.
///
/// # Panics
///
/// Panics if `byte_size` is below [`MIN_SECRET_TOKEN_BYTES`] — callers are
/// expected to validate configuration once at boot, not per call.
#[must_use]
pub fn generate_secret_token(byte_size: usize) -> String {
    assert!(
        byte_size >= MIN_SECRET_TOKEN_BYTES,
        "secret token entropy must be at least {MIN_SECRET_TOKEN_BYTES} bytes, got {byte_size}"
    );
    let mut buf = vec![0u8; byte_size];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Generate a 16-byte random identifier, hex-encoded (32 lowercase hex
/// characters, no dashes).
#[must_use]
pub fn generate_uuid() -> String {
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}
