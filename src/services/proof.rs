//! Signature boundary for actions that must be bound to a participant.
//!
//! Player ids are hex-encoded ed25519 public keys; a forfeit is only accepted
//! when its signature verifies over the fixed message template for this match
//! and requester.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::{Signature, VerifyingKey};
use thiserror::Error;
use uuid::Uuid;

/// Failures produced by the proof boundary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofError {
    /// The player id is not a valid hex-encoded ed25519 public key.
    #[error("player id is not a valid public key")]
    MalformedKey,
    /// The signature is not valid base64 or has the wrong length.
    #[error("signature is malformed")]
    MalformedSignature,
    /// The signature does not bind this requester to this action.
    #[error("signature verification failed")]
    Invalid,
}

/// The fixed message template a forfeit signature must cover.
pub fn forfeit_message(match_id: Uuid, player_id: &str) -> String {
    format!("chain-clash:forfeit:{match_id}:{player_id}")
}

/// Verify that `signature_b64` signs the forfeit template with the key that
/// *is* the player id.
pub fn verify_forfeit(
    match_id: Uuid,
    player_id: &str,
    signature_b64: &str,
) -> Result<(), ProofError> {
    let key_bytes = decode_hex32(player_id).ok_or(ProofError::MalformedKey)?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| ProofError::MalformedKey)?;

    let signature_bytes = BASE64
        .decode(signature_b64)
        .map_err(|_| ProofError::MalformedSignature)?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|_| ProofError::MalformedSignature)?;

    let message = forfeit_message(match_id, player_id);
    key.verify_strict(message.as_bytes(), &signature)
        .map_err(|_| ProofError::Invalid)
}

/// Decode a 64-character lowercase-hex string into 32 bytes.
fn decode_hex32(input: &str) -> Option<[u8; 32]> {
    if input.len() != 64 || !input.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let mut bytes = [0u8; 32];
    for (index, chunk) in input.as_bytes().chunks_exact(2).enumerate() {
        let pair = std::str::from_utf8(chunk).ok()?;
        bytes[index] = u8::from_str_radix(pair, 16).ok()?;
    }
    Some(bytes)
}
